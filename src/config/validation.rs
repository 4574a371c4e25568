use super::schema::Config;
use crate::github::types::RepoRef;

/// Validate configuration at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_config(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Some(ref repo) = config.repo {
        if let Err(e) = repo.parse::<RepoRef>() {
            errors.push(format!("repo: {}", e));
        }
    }

    for (field, logins) in [("authors", &config.authors), ("reviewers", &config.reviewers)] {
        for (i, login) in logins.iter().enumerate() {
            if login.trim().is_empty() {
                errors.push(format!("{}[{}]: must not be empty", field, i));
            }
        }
    }

    if config.concurrency == Some(0) {
        errors.push("concurrency: must be at least 1".to_string());
    }

    if config.timeout_secs == Some(0) {
        errors.push("timeout_secs: must be at least 1".to_string());
    }

    if let Some(ref retry) = config.retry {
        if retry.attempts == Some(0) {
            errors.push("retry.attempts: must be at least 1".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::github::retry::{RetryPolicy, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS};
use crate::github::search::StateFilter;
use crate::output::OutputFormat;
use crate::pipeline::DraftMode;

/// Contents of `config.yaml`. Every key is optional; command-line flags win
/// over anything set here.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Default repository, `owner/name`
    pub repo: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub reviewers: Vec<String>,
    pub state: Option<StateFilter>,
    pub draft: Option<DraftMode>,
    pub format: Option<OutputFormat>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub retry: Option<RetryConfig>,
    /// Review log location
    pub database: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    pub attempts: Option<usize>,
    pub backoff_secs: Option<u64>,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = self.retry.clone().unwrap_or_default();
        RetryPolicy {
            max_attempts: retry.attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            backoff: retry
                .backoff_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_BACKOFF),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

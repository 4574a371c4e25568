use anyhow::{Context, Result};
use octocrab::Octocrab;

/// Create a GitHub client, authenticated when a personal access token is
/// available and anonymous otherwise.
pub fn create_client(token: Option<&str>) -> Result<Octocrab> {
    let builder = match token {
        Some(token) => Octocrab::builder().personal_token(token.to_string()),
        None => {
            tracing::warn!(
                "No GitHub token found. Requests will be rate limited to 60 per hour. \
                 Set GHI_GITHUB_TOKEN (or run `ghi auth set --token ...`) to raise the limit to 5000 per hour."
            );
            Octocrab::builder()
        }
    };

    builder.build().context("Failed to create GitHub client")
}

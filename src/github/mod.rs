pub mod api;
pub mod client;
pub mod error;
pub mod retry;
pub mod search;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use api::{OctocrabApi, PullRequestApi};
pub use client::create_client;
pub use error::{ApiError, ApiErrorKind, InvalidRepoError};
pub use retry::{fetch_with_retry, RetryPolicy};
pub use search::{build_search_query, StateFilter};
pub use types::{IssueState, IssueStub, PrDetail, RepoRef, Review, ReviewState};

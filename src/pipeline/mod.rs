//! Search, enrich and filter the pull requests of one repository.
//!
//! The stages run in a fixed order, each over the whole collection:
//! search, detail enrichment, review enrichment, draft filter.

pub mod classify;
pub mod collection;
pub mod filter;
pub mod record;

pub use classify::{classify_age_band, highlight, AgeBand, Highlight};
pub use collection::{FinishedCollection, PrCollection};
pub use filter::{filter_drafts, DraftMode};
pub use record::{FetchStatus, PullRequestRecord};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::github::error::{ApiError, InvalidRepoError};
use crate::github::retry::{fetch_with_retry, RetryPolicy};
use crate::github::search::{build_search_query, StateFilter};
use crate::github::types::RepoRef;
use crate::github::PullRequestApi;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidRepository(#[from] InvalidRepoError),
    #[error("{0} filter contains an empty login")]
    EmptyFilter(&'static str),
    #[error("search failed: {0}")]
    Search(ApiError),
    #[error("cancelled")]
    Cancelled,
}

/// What to list
#[derive(Debug, Clone, Default)]
pub struct PullRequestQuery {
    /// `owner/name`
    pub repo: String,
    pub state: StateFilter,
    pub authors: Vec<String>,
    pub reviewers: Vec<String>,
    pub draft_mode: DraftMode,
}

/// How to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub retry: RetryPolicy,
    /// Calls in flight per stage; 1 fetches records one at a time
    pub concurrency: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            concurrency: 1,
        }
    }
}

/// Validate the query and build the empty collection plus its search string.
/// Nothing here touches the network.
pub fn plan(query: &PullRequestQuery) -> Result<(PrCollection, String), PipelineError> {
    let repo: RepoRef = query.repo.parse()?;
    if query.authors.iter().any(|a| a.trim().is_empty()) {
        return Err(PipelineError::EmptyFilter("author"));
    }
    let authors: Vec<String> = query.authors.iter().map(|a| a.trim().to_string()).collect();
    let search = build_search_query(&repo, query.state, &authors);
    let collection = PrCollection::new(repo, query.draft_mode, &query.reviewers)?;
    Ok((collection, search))
}

/// Run every stage over `collection`.
///
/// On `Cancelled` the collection holds whatever the finished calls produced;
/// the caller decides whether to render it.
pub async fn run_pipeline(
    collection: &mut PrCollection,
    search_query: &str,
    api: &dyn PullRequestApi,
    options: &PipelineOptions,
    cancel: &CancellationToken,
) -> Result<(), PipelineError> {
    tracing::debug!("searching: {}", search_query);
    let issues = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
        result = fetch_with_retry(&options.retry, || api.search_issues(search_query)) => {
            result.map_err(PipelineError::Search)?
        }
    };
    tracing::debug!("search returned {} pull requests", issues.len());

    collection.fetch_issues(issues);
    collection.enrich_with_pull_requests(api, options, cancel).await?;
    collection.enrich_with_reviews(api, options, cancel).await?;
    collection.filter_drafts();
    Ok(())
}

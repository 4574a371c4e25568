//! The three GitHub calls the pipeline needs, behind a trait so the pipeline
//! can run against a scripted fake in tests.

use async_trait::async_trait;
use octocrab::models::pulls::ReviewState as ApiReviewState;
use octocrab::models::IssueState as ApiIssueState;
use octocrab::Octocrab;

use crate::github::error::{map_octocrab_error, ApiError};
use crate::github::types::{IssueState, IssueStub, PrDetail, RepoRef, Review, ReviewState};

#[async_trait]
pub trait PullRequestApi: Send + Sync {
    /// Run an issue search and return the pull requests among the hits, in
    /// the order GitHub returned them.
    async fn search_issues(&self, query: &str) -> Result<Vec<IssueStub>, ApiError>;

    async fn get_pull_request(&self, repo: &RepoRef, number: u64) -> Result<PrDetail, ApiError>;

    async fn list_reviews(&self, repo: &RepoRef, number: u64) -> Result<Vec<Review>, ApiError>;
}

/// Octocrab-backed implementation
#[derive(Clone)]
pub struct OctocrabApi {
    client: Octocrab,
}

impl OctocrabApi {
    pub fn new(client: Octocrab) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PullRequestApi for OctocrabApi {
    async fn search_issues(&self, query: &str) -> Result<Vec<IssueStub>, ApiError> {
        let page = self
            .client
            .search()
            .issues_and_pull_requests(query)
            .per_page(100)
            .send()
            .await
            .map_err(|e| map_octocrab_error("search", &e))?;

        let issues = self
            .client
            .all_pages(page)
            .await
            .map_err(|e| map_octocrab_error("search", &e))?;

        Ok(issues
            .into_iter()
            .filter(|issue| issue.pull_request.is_some()) // Only PRs, not issues
            .map(|issue| IssueStub {
                number: issue.number,
                title: issue.title,
                author: issue.user.login,
                state: convert_issue_state(&issue.state),
                created_at: issue.created_at,
                url: issue.html_url.to_string(),
            })
            .collect())
    }

    async fn get_pull_request(&self, repo: &RepoRef, number: u64) -> Result<PrDetail, ApiError> {
        let operation = format!("get pull request #{}", number);
        let pr = self
            .client
            .pulls(&repo.owner, &repo.name)
            .get(number)
            .await
            .map_err(|e| map_octocrab_error(&operation, &e))?;

        Ok(PrDetail {
            draft: pr.draft.unwrap_or(false),
            merged_at: pr.merged_at,
            body: pr.body,
            url: pr
                .html_url
                .map(|u| u.to_string())
                .unwrap_or_else(|| format!("https://github.com/{}/pull/{}", repo, number)),
            title: pr.title,
            author: pr.user.map(|u| u.login),
            state: pr.state.as_ref().map(convert_issue_state),
            created_at: pr.created_at,
            updated_at: pr.updated_at,
        })
    }

    async fn list_reviews(&self, repo: &RepoRef, number: u64) -> Result<Vec<Review>, ApiError> {
        let operation = format!("list reviews for #{}", number);
        let page = self
            .client
            .pulls(&repo.owner, &repo.name)
            .list_reviews(number)
            .per_page(100)
            .send()
            .await
            .map_err(|e| map_octocrab_error(&operation, &e))?;

        let reviews = self
            .client
            .all_pages(page)
            .await
            .map_err(|e| map_octocrab_error(&operation, &e))?;

        Ok(reviews
            .into_iter()
            .map(|review| Review {
                reviewer: review.user.map(|u| u.login).unwrap_or_default(),
                state: convert_review_state(review.state.as_ref()),
                submitted_at: review.submitted_at,
            })
            .collect())
    }
}

fn convert_issue_state(state: &ApiIssueState) -> IssueState {
    match state {
        ApiIssueState::Closed => IssueState::Closed,
        _ => IssueState::Open,
    }
}

fn convert_review_state(state: Option<&ApiReviewState>) -> ReviewState {
    match state {
        Some(ApiReviewState::Approved) => ReviewState::Approved,
        Some(ApiReviewState::Commented) => ReviewState::Commented,
        Some(ApiReviewState::ChangesRequested) => ReviewState::ChangesRequested,
        Some(ApiReviewState::Dismissed) => ReviewState::Other("DISMISSED".to_string()),
        Some(ApiReviewState::Pending) => ReviewState::Other("PENDING".to_string()),
        Some(other) => ReviewState::Other(format!("{:?}", other).to_uppercase()),
        None => ReviewState::Other("none".to_string()),
    }
}

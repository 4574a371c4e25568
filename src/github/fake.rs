//! Scripted stand-in for the GitHub API.
//!
//! Each PR number gets a queue of responses. Calls pop from the front until
//! one response is left, which then repeats. Unscripted numbers answer
//! `NotFound`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::github::api::PullRequestApi;
use crate::github::error::ApiError;
use crate::github::types::{IssueState, IssueStub, PrDetail, RepoRef, Review};

#[derive(Default)]
pub(crate) struct FakeApi {
    search: Mutex<VecDeque<Result<Vec<IssueStub>, ApiError>>>,
    details: Mutex<HashMap<u64, VecDeque<Result<PrDetail, ApiError>>>>,
    reviews: Mutex<HashMap<u64, VecDeque<Result<Vec<Review>, ApiError>>>>,
    calls: Mutex<Vec<String>>,
}

fn next_response<T: Clone>(queue: Option<&mut VecDeque<T>>) -> Option<T> {
    let queue = queue?;
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(self, result: Result<Vec<IssueStub>, ApiError>) -> Self {
        self.search.lock().unwrap().push_back(result);
        self
    }

    pub fn with_detail(self, number: u64, result: Result<PrDetail, ApiError>) -> Self {
        self.details
            .lock()
            .unwrap()
            .entry(number)
            .or_default()
            .push_back(result);
        self
    }

    pub fn with_reviews(self, number: u64, result: Result<Vec<Review>, ApiError>) -> Self {
        self.reviews
            .lock()
            .unwrap()
            .entry(number)
            .or_default()
            .push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PullRequestApi for FakeApi {
    async fn search_issues(&self, query: &str) -> Result<Vec<IssueStub>, ApiError> {
        self.record(format!("search {}", query));
        next_response(Some(&mut *self.search.lock().unwrap()))
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_pull_request(&self, _repo: &RepoRef, number: u64) -> Result<PrDetail, ApiError> {
        self.record(format!("get #{}", number));
        next_response(self.details.lock().unwrap().get_mut(&number))
            .unwrap_or_else(|| Err(ApiError::not_found(format!("get pull request #{}", number), "Not Found")))
    }

    async fn list_reviews(&self, _repo: &RepoRef, number: u64) -> Result<Vec<Review>, ApiError> {
        self.record(format!("reviews #{}", number));
        next_response(self.reviews.lock().unwrap().get_mut(&number))
            .unwrap_or_else(|| Err(ApiError::not_found(format!("list reviews for #{}", number), "Not Found")))
    }
}

pub(crate) fn stub(number: u64, author: &str) -> IssueStub {
    stub_created(number, author, Utc::now() - Duration::days(3))
}

pub(crate) fn stub_created(number: u64, author: &str, created_at: DateTime<Utc>) -> IssueStub {
    IssueStub {
        number,
        title: format!("PR #{}", number),
        author: author.to_string(),
        state: IssueState::Open,
        created_at,
        url: format!("https://github.com/octo/widgets/pull/{}", number),
    }
}

pub(crate) fn detail(number: u64, draft: bool) -> PrDetail {
    PrDetail {
        draft,
        merged_at: None,
        body: Some("body".to_string()),
        url: format!("https://github.com/octo/widgets/pull/{}", number),
        title: Some(format!("PR #{}", number)),
        author: None,
        state: Some(IssueState::Open),
        created_at: None,
        updated_at: None,
    }
}

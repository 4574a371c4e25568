use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use tokio_util::sync::CancellationToken;

use super::classify::normalize_logins;
use super::filter::{filter_drafts, DraftMode};
use super::record::PullRequestRecord;
use super::{PipelineError, PipelineOptions};
use crate::github::error::ApiError;
use crate::github::retry::fetch_with_retry;
use crate::github::types::{IssueStub, RepoRef};
use crate::github::PullRequestApi;

/// The pull requests of one repository, enriched stage by stage.
///
/// Records keep the order the search returned them in. No stage re-orders
/// them; only [`PrCollection::filter_drafts`] removes any.
#[derive(Debug)]
pub struct PrCollection {
    repo: RepoRef,
    draft_mode: DraftMode,
    reviewer_filter: Vec<String>,
    records: Vec<PullRequestRecord>,
}

impl PrCollection {
    /// Create an empty collection. The reviewer filter is lower-cased here;
    /// an empty or whitespace-only entry is rejected.
    pub fn new(
        repo: RepoRef,
        draft_mode: DraftMode,
        reviewer_filter: &[String],
    ) -> Result<Self, PipelineError> {
        if reviewer_filter.iter().any(|r| r.trim().is_empty()) {
            return Err(PipelineError::EmptyFilter("reviewer"));
        }
        Ok(Self {
            repo,
            draft_mode,
            reviewer_filter: normalize_logins(reviewer_filter),
            records: Vec::new(),
        })
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    pub fn draft_mode(&self) -> DraftMode {
        self.draft_mode
    }

    pub fn reviewer_filter(&self) -> &[String] {
        &self.reviewer_filter
    }

    pub fn records(&self) -> &[PullRequestRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Initialize one record per search result. The first occurrence of a
    /// number wins.
    pub fn fetch_issues(&mut self, issues: Vec<IssueStub>) {
        let mut seen: HashSet<u64> = self.records.iter().map(|r| r.number()).collect();
        for issue in issues {
            if !seen.insert(issue.number) {
                tracing::warn!("search returned #{} more than once; keeping the first", issue.number);
                continue;
            }
            self.records.push(PullRequestRecord::new(issue));
        }
        tracing::debug!("{} records initialized for {}", self.records.len(), self.repo);
    }

    /// Fetch the full pull request for every record.
    ///
    /// A failed fetch is recorded on the record and the stage moves on.
    pub async fn enrich_with_pull_requests(
        &mut self,
        api: &dyn PullRequestApi,
        options: &PipelineOptions,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let numbers = self.numbers();
        let repo = &self.repo;
        let retry = &options.retry;
        let records = &mut self.records;

        run_stage(
            numbers,
            options.concurrency,
            cancel,
            |number| async move {
                fetch_with_retry(retry, || api.get_pull_request(repo, number)).await
            },
            |index, result| {
                let record = &mut records[index];
                match result {
                    Ok(detail) => {
                        tracing::debug!("#{} detail fetched (draft: {})", record.number(), detail.draft);
                        record.set_detail(detail);
                    }
                    Err(e) => {
                        tracing::warn!("skipping detail for #{}: {}", record.number(), e);
                        record.mark_detail_failed(&e);
                    }
                }
            },
        )
        .await
    }

    /// Fetch reviews for every record and recompute the review-derived fields.
    pub async fn enrich_with_reviews(
        &mut self,
        api: &dyn PullRequestApi,
        options: &PipelineOptions,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let numbers = self.numbers();
        let repo = &self.repo;
        let retry = &options.retry;
        let filter = &self.reviewer_filter;
        let records = &mut self.records;

        run_stage(
            numbers,
            options.concurrency,
            cancel,
            |number| async move {
                fetch_with_retry(retry, || api.list_reviews(repo, number)).await
            },
            |index, result| {
                let record = &mut records[index];
                match result {
                    Ok(reviews) => {
                        tracing::debug!("#{} has {} reviews", record.number(), reviews.len());
                        record.set_reviews(reviews, filter);
                    }
                    Err(e) => {
                        tracing::warn!("skipping reviews for #{}: {}", record.number(), e);
                        record.mark_reviews_failed(&e);
                    }
                }
            },
        )
        .await
    }

    pub fn filter_drafts(&mut self) {
        let before = self.records.len();
        let records = std::mem::take(&mut self.records);
        self.records = filter_drafts(records, self.draft_mode);
        if self.records.len() != before {
            tracing::debug!("hid {} draft pull requests", before - self.records.len());
        }
    }

    /// Hand the records over for display
    pub fn finish(self) -> FinishedCollection {
        FinishedCollection {
            owner: self.repo.owner,
            repo: self.repo.name,
            reviewer_filter_active: !self.reviewer_filter.is_empty(),
            draft_mode: self.draft_mode,
            records: self.records,
        }
    }

    fn numbers(&self) -> Vec<u64> {
        self.records.iter().map(|r| r.number()).collect()
    }
}

/// Read-only result of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct FinishedCollection {
    owner: String,
    repo: String,
    reviewer_filter_active: bool,
    draft_mode: DraftMode,
    records: Vec<PullRequestRecord>,
}

impl FinishedCollection {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn reviewer_filter_active(&self) -> bool {
        self.reviewer_filter_active
    }

    pub fn draft_mode(&self) -> DraftMode {
        self.draft_mode
    }

    pub fn records(&self) -> &[PullRequestRecord] {
        &self.records
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        owner: &str,
        repo: &str,
        reviewer_filter_active: bool,
        draft_mode: DraftMode,
        records: Vec<PullRequestRecord>,
    ) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            reviewer_filter_active,
            draft_mode,
            records,
        }
    }

    /// Records where an enrichment call failed or never ran
    pub fn incomplete_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_fully_enriched()).count()
    }
}

/// Run `fetch` for every number with at most `concurrency` calls in flight,
/// handing each result to `apply` with the index it was dispatched from.
async fn run_stage<T, F, Fut, A>(
    numbers: Vec<u64>,
    concurrency: usize,
    cancel: &CancellationToken,
    fetch: F,
    mut apply: A,
) -> Result<(), PipelineError>
where
    F: Fn(u64) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
    A: FnMut(usize, Result<T, ApiError>),
{
    let limit = concurrency.max(1);
    let mut pending = numbers.into_iter().enumerate();
    let mut in_flight = FuturesUnordered::new();

    loop {
        while in_flight.len() < limit {
            let Some((index, number)) = pending.next() else {
                break;
            };
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let call = fetch(number);
            in_flight.push(async move { (index, call.await) });
        }

        if in_flight.is_empty() {
            return Ok(());
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            Some((index, result)) = in_flight.next() => apply(index, result),
        }
    }
}

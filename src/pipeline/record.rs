use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::github::error::ApiError;
use crate::github::types::{IssueStub, PrDetail, Review};
use crate::pipeline::classify::{
    classify_age_band, compute_approval_count, compute_draft_status, compute_reviewer_match,
    compute_unique_reviewers, highlight, AgeBand, Highlight,
};

/// Outcome of one enrichment call for one record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "lowercase")]
pub enum FetchStatus {
    #[default]
    Pending,
    Fetched,
    Failed(String),
}

impl FetchStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, FetchStatus::Failed(_))
    }
}

/// One pull request's accumulated state through the pipeline.
///
/// Review-derived fields are only ever written together with `reviews`, so
/// they always match a fresh recomputation.
#[derive(Debug, Clone, Serialize)]
pub struct PullRequestRecord {
    issue: IssueStub,
    detail: Option<PrDetail>,
    reviews: Vec<Review>,
    unique_reviewers: BTreeSet<String>,
    approval_count: usize,
    reviewer_matched: bool,
    is_draft: bool,
    detail_status: FetchStatus,
    reviews_status: FetchStatus,
}

impl PullRequestRecord {
    pub fn new(issue: IssueStub) -> Self {
        Self {
            issue,
            detail: None,
            reviews: Vec::new(),
            unique_reviewers: BTreeSet::new(),
            approval_count: 0,
            reviewer_matched: false,
            is_draft: false,
            detail_status: FetchStatus::Pending,
            reviews_status: FetchStatus::Pending,
        }
    }

    pub fn number(&self) -> u64 {
        self.issue.number
    }

    pub fn issue(&self) -> &IssueStub {
        &self.issue
    }

    pub fn detail(&self) -> Option<&PrDetail> {
        self.detail.as_ref()
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    pub fn unique_reviewers(&self) -> &BTreeSet<String> {
        &self.unique_reviewers
    }

    pub fn approval_count(&self) -> usize {
        self.approval_count
    }

    pub fn reviewer_matched(&self) -> bool {
        self.reviewer_matched
    }

    pub fn is_draft(&self) -> bool {
        self.is_draft
    }

    pub fn detail_status(&self) -> &FetchStatus {
        &self.detail_status
    }

    pub fn reviews_status(&self) -> &FetchStatus {
        &self.reviews_status
    }

    /// True only once both enrichment calls have succeeded. A record left
    /// `Pending` by a cancelled run counts as incomplete.
    pub fn is_fully_enriched(&self) -> bool {
        matches!(
            (&self.detail_status, &self.reviews_status),
            (FetchStatus::Fetched, FetchStatus::Fetched)
        )
    }

    pub fn age_band(&self, now: DateTime<Utc>) -> AgeBand {
        classify_age_band(self.issue.created_at, now)
    }

    pub fn highlight(&self, now: DateTime<Utc>) -> Highlight {
        highlight(self.age_band(now), self.is_draft)
    }

    pub(crate) fn set_detail(&mut self, detail: PrDetail) {
        self.is_draft = compute_draft_status(Some(&detail));
        self.detail = Some(detail);
        self.detail_status = FetchStatus::Fetched;
    }

    /// Keeps whatever detail the record already had
    pub(crate) fn mark_detail_failed(&mut self, error: &ApiError) {
        self.detail_status = FetchStatus::Failed(error.to_string());
    }

    /// Replace the review list and recompute every review-derived field
    pub(crate) fn set_reviews(&mut self, reviews: Vec<Review>, reviewer_filter: &[String]) {
        self.unique_reviewers = compute_unique_reviewers(&reviews, &self.issue.author);
        self.approval_count = compute_approval_count(&reviews);
        self.reviewer_matched = compute_reviewer_match(&reviews, reviewer_filter);
        self.reviews = reviews;
        self.reviews_status = FetchStatus::Fetched;
    }

    /// Resets every review-derived field to its zero value
    pub(crate) fn mark_reviews_failed(&mut self, error: &ApiError) {
        self.reviews.clear();
        self.unique_reviewers.clear();
        self.approval_count = 0;
        self.reviewer_matched = false;
        self.reviews_status = FetchStatus::Failed(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::fake;
    use crate::github::types::ReviewState;

    #[test]
    fn test_new_record_is_pending_with_zeroed_fields() {
        let record = PullRequestRecord::new(fake::stub(4, "octocat"));
        assert_eq!(record.number(), 4);
        assert_eq!(record.detail_status(), &FetchStatus::Pending);
        assert_eq!(record.approval_count(), 0);
        assert!(record.unique_reviewers().is_empty());
        assert!(!record.reviewer_matched());
        assert!(!record.is_draft());
        assert!(!record.is_fully_enriched());
    }

    #[test]
    fn test_fully_enriched_needs_both_calls() {
        let mut record = PullRequestRecord::new(fake::stub(4, "octocat"));
        record.set_detail(fake::detail(4, false));
        assert!(!record.is_fully_enriched());
        record.set_reviews(Vec::new(), &[]);
        assert!(record.is_fully_enriched());
    }

    #[test]
    fn test_set_reviews_recomputes_from_scratch() {
        let mut record = PullRequestRecord::new(fake::stub(4, "octocat"));
        let filter = vec!["alice".to_string()];
        record.set_reviews(
            vec![
                Review::new("alice", ReviewState::Approved),
                Review::new("bob", ReviewState::Approved),
            ],
            &filter,
        );
        assert_eq!(record.approval_count(), 2);
        assert!(record.reviewer_matched());

        record.set_reviews(vec![Review::new("bob", ReviewState::Commented)], &filter);
        assert_eq!(record.approval_count(), 0);
        assert!(!record.reviewer_matched());
        assert_eq!(record.unique_reviewers().len(), 1);
    }

    #[test]
    fn test_detail_failure_keeps_issue() {
        let mut record = PullRequestRecord::new(fake::stub(4, "octocat"));
        record.mark_detail_failed(&ApiError::other("get pull request #4", "boom"));
        assert!(record.detail().is_none());
        assert!(!record.is_draft());
        assert!(!record.is_fully_enriched());
        assert_eq!(record.issue().title, "PR #4");
    }

    #[test]
    fn test_review_failure_zeroes_derived_fields() {
        let mut record = PullRequestRecord::new(fake::stub(4, "octocat"));
        let filter = vec!["alice".to_string()];
        record.set_reviews(vec![Review::new("alice", ReviewState::Approved)], &filter);
        record.mark_reviews_failed(&ApiError::rate_limited("list reviews for #4", "slow down"));
        assert!(record.reviews().is_empty());
        assert_eq!(record.approval_count(), 0);
        assert!(!record.reviewer_matched());
        assert!(record.unique_reviewers().is_empty());
        assert!(record.reviews_status().is_failed());
    }

    #[test]
    fn test_set_detail_derives_draft() {
        let mut record = PullRequestRecord::new(fake::stub(4, "octocat"));
        record.set_detail(fake::detail(4, true));
        assert!(record.is_draft());
        assert_eq!(record.detail_status(), &FetchStatus::Fetched);
    }

    #[test]
    fn test_fetch_status_serialization() {
        let json = serde_json::to_string(&FetchStatus::Failed("boom".to_string())).unwrap();
        assert_eq!(json, r#"{"status":"failed","error":"boom"}"#);
    }
}

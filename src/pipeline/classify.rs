//! Derived fields computed from already-fetched data. Nothing here touches the
//! network, so every helper can be tested in isolation.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::github::types::{PrDetail, Review};

/// True only when the detail was fetched and GitHub marked it as a draft
pub fn compute_draft_status(detail: Option<&PrDetail>) -> bool {
    detail.is_some_and(|d| d.draft)
}

/// Number of `APPROVED` review events. A reviewer approving twice counts twice.
pub fn compute_approval_count(reviews: &[Review]) -> usize {
    reviews.iter().filter(|r| r.state.is_approved()).count()
}

/// Lower-cased logins of everyone except the author who approved or commented
pub fn compute_unique_reviewers(reviews: &[Review], author: &str) -> BTreeSet<String> {
    let author = author.to_lowercase();
    reviews
        .iter()
        .filter(|r| r.state.is_approved_or_commented())
        .map(|r| r.reviewer.to_lowercase())
        .filter(|login| !login.is_empty() && *login != author)
        .collect()
}

/// Whether any login in `filter` approved or commented. Case-insensitive.
pub fn compute_reviewer_match(reviews: &[Review], filter: &[String]) -> bool {
    if filter.is_empty() {
        return false;
    }
    let filter = normalize_logins(filter);
    reviews.iter().any(|r| {
        r.state.is_approved_or_commented() && filter.contains(&r.reviewer.to_lowercase())
    })
}

pub fn normalize_logins(logins: &[String]) -> Vec<String> {
    logins.iter().map(|l| l.trim().to_lowercase()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeBand {
    /// Opened within the last day
    Fresh,
    Normal,
    /// Older than 30 days
    Stale,
}

pub fn classify_age_band(created_at: DateTime<Utc>, now: DateTime<Utc>) -> AgeBand {
    let age = now - created_at;
    if age > Duration::days(30) {
        AgeBand::Stale
    } else if age <= Duration::days(1) {
        AgeBand::Fresh
    } else {
        AgeBand::Normal
    }
}

/// How a record is emphasised when displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Highlight {
    Stale,
    Draft,
    Fresh,
    Plain,
}

/// Stale wins over draft, draft wins over fresh.
pub fn highlight(band: AgeBand, is_draft: bool) -> Highlight {
    match (band, is_draft) {
        (AgeBand::Stale, _) => Highlight::Stale,
        (_, true) => Highlight::Draft,
        (AgeBand::Fresh, false) => Highlight::Fresh,
        (AgeBand::Normal, false) => Highlight::Plain,
    }
}

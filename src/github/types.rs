use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::github::error::InvalidRepoError;

/// A repository in `owner/name` form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl FromStr for RepoRef {
    type Err = InvalidRepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let valid = parts.len() == 2
            && parts
                .iter()
                .all(|p| !p.is_empty() && !p.chars().any(char::is_whitespace));
        if !valid {
            return Err(InvalidRepoError(s.to_string()));
        }
        Ok(Self::new(parts[0], parts[1]))
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A search hit. Immutable once the search has returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueStub {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub state: IssueState,
    pub created_at: DateTime<Utc>,
    pub url: String,
}

/// Fields only available from the full pull request endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrDetail {
    pub draft: bool,
    pub merged_at: Option<DateTime<Utc>>,
    pub body: Option<String>,
    pub url: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub state: Option<IssueState>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Review state as reported by GitHub.
///
/// Parsing is case-sensitive: only the platform's literal strings map to the
/// named variants, anything else is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewState {
    Approved,
    Commented,
    ChangesRequested,
    Other(String),
}

impl ReviewState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "APPROVED" => ReviewState::Approved,
            "COMMENTED" => ReviewState::Commented,
            "CHANGES_REQUESTED" => ReviewState::ChangesRequested,
            other => ReviewState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReviewState::Approved => "APPROVED",
            ReviewState::Commented => "COMMENTED",
            ReviewState::ChangesRequested => "CHANGES_REQUESTED",
            ReviewState::Other(raw) => raw,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ReviewState::Approved)
    }

    /// Whether the review counts as engagement (approval or comment)
    pub fn is_approved_or_commented(&self) -> bool {
        matches!(self, ReviewState::Approved | ReviewState::Commented)
    }
}

impl Serialize for ReviewState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    /// Login as returned by the API (empty when the account was deleted)
    pub reviewer: String,
    pub state: ReviewState,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Review {
    pub fn new(reviewer: impl Into<String>, state: ReviewState) -> Self {
        Self {
            reviewer: reviewer.into(),
            state,
            submitted_at: None,
        }
    }
}

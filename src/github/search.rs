use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::github::types::RepoRef;

/// Which pull requests the search should return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StateFilter {
    #[default]
    All,
    Open,
    Closed,
}

impl fmt::Display for StateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateFilter::All => write!(f, "all"),
            StateFilter::Open => write!(f, "open"),
            StateFilter::Closed => write!(f, "closed"),
        }
    }
}

/// Build the issue search query for pull requests in one repository.
///
/// Format: `repo:<owner>/<name>[ state:<state>][ author:<login>]... type:pr`.
/// Authors are lower-cased, matching GitHub's case-insensitive logins.
pub fn build_search_query(repo: &RepoRef, state: StateFilter, authors: &[String]) -> String {
    let mut query = format!("repo:{}", repo);
    if state != StateFilter::All {
        query.push_str(&format!(" state:{}", state));
    }
    for author in authors {
        query.push_str(&format!(" author:{}", author.to_lowercase()));
    }
    query.push_str(" type:pr");
    query
}

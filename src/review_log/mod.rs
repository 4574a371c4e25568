//! Local record of which pull requests the user has reviewed.

pub mod store;

pub use store::{LoggedReview, ReviewLog, ReviewQuery};

use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewLogError {
    #[error("cannot open review log at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("cannot create directory for review log {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("review log query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("pull request number {0} is too large for the review log")]
    NumberOutOfRange(u64),
    #[error("invalid time '{0}': expected YYYY-MM-DD, an RFC 3339 timestamp or a duration like 7d")]
    InvalidTime(String),
}

/// Which end of a time range an input describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Start,
    End,
}

/// Parse a `--since` / `--until` value.
///
/// Accepts a calendar date, an RFC 3339 timestamp or a duration meaning "that
/// long before `now`". A date used as an `End` covers the whole day.
pub fn parse_when(
    input: &str,
    now: DateTime<Utc>,
    boundary: Boundary,
) -> Result<DateTime<Utc>, ReviewLogError> {
    let input = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let day = match boundary {
            Boundary::Start => Some(date),
            Boundary::End => date.succ_opt(),
        };
        return day
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .ok_or_else(|| ReviewLogError::InvalidTime(input.to_string()));
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    let ago = humantime::parse_duration(input)
        .map_err(|_| ReviewLogError::InvalidTime(input.to_string()))?;
    let ago = chrono::Duration::from_std(ago)
        .map_err(|_| ReviewLogError::InvalidTime(input.to_string()))?;
    now.checked_sub_signed(ago)
        .ok_or_else(|| ReviewLogError::InvalidTime(input.to_string()))
}

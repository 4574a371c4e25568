use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;

use super::ReviewLogError;

/// One row of the review log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggedReview {
    pub id: i64,
    /// `owner/name`
    pub repo: String,
    pub pr_number: u64,
    pub reviewer: String,
    pub timestamp: DateTime<Utc>,
}

/// Filters for [`ReviewLog::reviews_by_reviewer`]. `until` is exclusive.
#[derive(Debug, Clone, Default)]
pub struct ReviewQuery {
    pub repo: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// SQLite-backed review log
pub struct ReviewLog {
    db: Connection,
}

impl ReviewLog {
    /// Open or create the log at `path`, creating parent directories as needed
    pub fn open(path: &Path) -> Result<Self, ReviewLogError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ReviewLogError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let db = Connection::open(path).map_err(|source| ReviewLogError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init_schema(&db)?;
        tracing::debug!("review log opened at {}", path.display());
        Ok(Self { db })
    }

    pub fn open_in_memory() -> Result<Self, ReviewLogError> {
        let db = Connection::open_in_memory()?;
        Self::init_schema(&db)?;
        Ok(Self { db })
    }

    fn init_schema(db: &Connection) -> Result<(), ReviewLogError> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                repo TEXT NOT NULL,
                pr_number INTEGER NOT NULL,
                reviewer TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                UNIQUE(repo, pr_number, reviewer, timestamp)
            )",
            [],
        )?;
        Ok(())
    }

    /// Record that `reviewer` reviewed the pull request now
    pub fn log_review(
        &self,
        repo: &str,
        pr_number: u64,
        reviewer: &str,
    ) -> Result<LoggedReview, ReviewLogError> {
        self.log_review_at(repo, pr_number, reviewer, Utc::now())
    }

    /// Record a review at a given time. Logging the same review twice returns
    /// the existing row.
    pub fn log_review_at(
        &self,
        repo: &str,
        pr_number: u64,
        reviewer: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<LoggedReview, ReviewLogError> {
        let number = sql_number(pr_number)?;
        let inserted: Option<i64> = self
            .db
            .query_row(
                "INSERT INTO reviews (repo, pr_number, reviewer, timestamp)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT DO NOTHING
                 RETURNING id",
                params![repo, number, reviewer, timestamp],
                |row| row.get(0),
            )
            .optional()?;

        let id = match inserted {
            Some(id) => id,
            None => self.db.query_row(
                "SELECT id FROM reviews
                 WHERE repo = ?1 AND pr_number = ?2 AND reviewer = ?3 AND timestamp = ?4",
                params![repo, number, reviewer, timestamp],
                |row| row.get(0),
            )?,
        };

        Ok(LoggedReview {
            id,
            repo: repo.to_string(),
            pr_number,
            reviewer: reviewer.to_string(),
            timestamp,
        })
    }

    /// Every logged review of one pull request, newest first
    pub fn reviews_for_pull_request(
        &self,
        repo: &str,
        pr_number: u64,
    ) -> Result<Vec<LoggedReview>, ReviewLogError> {
        let number = sql_number(pr_number)?;
        let mut stmt = self.db.prepare(
            "SELECT id, repo, pr_number, reviewer, timestamp FROM reviews
             WHERE repo = ?1 AND pr_number = ?2
             ORDER BY timestamp DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![repo, number], logged_review_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Reviews by one reviewer, newest first. The reviewer match ignores case.
    pub fn reviews_by_reviewer(
        &self,
        reviewer: &str,
        query: &ReviewQuery,
    ) -> Result<Vec<LoggedReview>, ReviewLogError> {
        let mut stmt = self.db.prepare(
            "SELECT id, repo, pr_number, reviewer, timestamp FROM reviews
             WHERE reviewer = ?1 COLLATE NOCASE
               AND (?2 IS NULL OR repo = ?2)
               AND (?3 IS NULL OR timestamp >= ?3)
               AND (?4 IS NULL OR timestamp < ?4)
             ORDER BY timestamp DESC, id DESC",
        )?;
        let rows = stmt.query_map(
            params![reviewer, query.repo, query.since, query.until],
            logged_review_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn sql_number(pr_number: u64) -> Result<i64, ReviewLogError> {
    i64::try_from(pr_number).map_err(|_| ReviewLogError::NumberOutOfRange(pr_number))
}

fn logged_review_from_row(row: &Row<'_>) -> rusqlite::Result<LoggedReview> {
    let stored: i64 = row.get(2)?;
    let pr_number =
        u64::try_from(stored).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(2, stored))?;
    Ok(LoggedReview {
        id: row.get(0)?,
        repo: row.get(1)?,
        pr_number,
        reviewer: row.get(3)?,
        timestamp: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0).unwrap()
    }

    fn seeded() -> ReviewLog {
        let log = ReviewLog::open_in_memory().unwrap();
        log.log_review_at("octo/widgets", 1, "alice", at(1, 9)).unwrap();
        log.log_review_at("octo/widgets", 1, "alice", at(3, 9)).unwrap();
        log.log_review_at("octo/widgets", 2, "bob", at(2, 9)).unwrap();
        log.log_review_at("octo/gadgets", 7, "Alice", at(5, 9)).unwrap();
        log
    }

    #[test]
    fn test_reviews_for_pull_request_newest_first() {
        let log = seeded();
        let reviews = log.reviews_for_pull_request("octo/widgets", 1).unwrap();
        let times: Vec<_> = reviews.iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![at(3, 9), at(1, 9)]);
        assert!(reviews.iter().all(|r| r.reviewer == "alice"));
    }

    #[test]
    fn test_duplicate_log_is_ignored() {
        let log = seeded();
        let again = log.log_review_at("octo/widgets", 2, "bob", at(2, 9)).unwrap();
        let reviews = log.reviews_for_pull_request("octo/widgets", 2).unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].id, again.id);
    }

    #[test]
    fn test_reviews_by_reviewer_ignores_case() {
        let log = seeded();
        let reviews = log.reviews_by_reviewer("ALICE", &ReviewQuery::default()).unwrap();
        let numbers: Vec<_> = reviews.iter().map(|r| r.pr_number).collect();
        assert_eq!(numbers, vec![7, 1, 1]);
    }

    #[test]
    fn test_reviews_by_reviewer_filters() {
        let log = seeded();
        let query = ReviewQuery {
            repo: Some("octo/widgets".to_string()),
            since: Some(at(2, 0)),
            until: None,
        };
        let reviews = log.reviews_by_reviewer("alice", &query).unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].timestamp, at(3, 9));

        let query = ReviewQuery {
            until: Some(at(3, 9)),
            ..Default::default()
        };
        let reviews = log.reviews_by_reviewer("alice", &query).unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].timestamp, at(1, 9));
    }

    #[test]
    fn test_out_of_range_numbers_are_rejected() {
        let log = ReviewLog::open_in_memory().unwrap();
        let err = log.log_review_at("octo/widgets", u64::MAX, "alice", at(1, 9)).unwrap_err();
        assert!(matches!(err, ReviewLogError::NumberOutOfRange(n) if n == u64::MAX));
        assert!(log.reviews_for_pull_request("octo/widgets", u64::MAX).is_err());

        log.db
            .execute(
                "INSERT INTO reviews (repo, pr_number, reviewer, timestamp) VALUES (?1, -1, ?2, ?3)",
                params!["octo/widgets", "alice", at(1, 9)],
            )
            .unwrap();
        let err = log.reviews_by_reviewer("alice", &ReviewQuery::default()).unwrap_err();
        assert!(matches!(
            err,
            ReviewLogError::Sqlite(rusqlite::Error::IntegralValueOutOfRange(2, -1))
        ));
    }

    #[test]
    fn test_log_review_uses_current_time() {
        let log = ReviewLog::open_in_memory().unwrap();
        let before = Utc::now() - Duration::seconds(1);
        let logged = log.log_review("octo/widgets", 3, "carol").unwrap();
        assert!(logged.timestamp >= before);
        assert_eq!(log.reviews_for_pull_request("octo/widgets", 3).unwrap(), vec![logged]);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("ghi-review-log-{}", std::process::id()));
        let path = dir.join("nested").join("reviews.db");
        let log = ReviewLog::open(&path).unwrap();
        log.log_review("octo/widgets", 1, "alice").unwrap();
        drop(log);

        let reopened = ReviewLog::open(&path).unwrap();
        assert_eq!(reopened.reviews_for_pull_request("octo/widgets", 1).unwrap().len(), 1);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

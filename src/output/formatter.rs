use std::io::IsTerminal;
use chrono::{DateTime, Duration, Utc};
use owo_colors::OwoColorize;
use terminal_size::terminal_size;

use crate::github::types::{IssueState, PrDetail};
use crate::pipeline::{DraftMode, FinishedCollection, Highlight, PullRequestRecord};
use crate::review_log::LoggedReview;

/// Longest title shown in the table when writing to a terminal
pub const TITLE_WIDTH: usize = 25;

const RULE: &str = "=====================================";
const SEPARATOR: &str = "  ";

/// One table cell, optionally colored by highlight after padding
struct Cell {
    text: String,
    highlight: Option<Highlight>,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlight: None,
        }
    }
}

fn checkbox(checked: bool) -> &'static str {
    if checked {
        "[X]"
    } else {
        "[ ]"
    }
}

fn paint(text: &str, highlight: Highlight) -> String {
    match highlight {
        Highlight::Stale => text.red().to_string(),
        Highlight::Draft => text.bright_black().to_string(),
        Highlight::Fresh => text.green().to_string(),
        Highlight::Plain => text.to_string(),
    }
}

/// Render rows as left-aligned columns separated by two spaces
fn render_columns(header: &[&str], rows: &[Vec<Cell>], use_colors: bool) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.text.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    let header_line = header
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:<width$}", h, width = w))
        .collect::<Vec<_>>()
        .join(SEPARATOR);
    lines.push(if use_colors {
        header_line.trim_end().bold().to_string()
    } else {
        header_line.trim_end().to_string()
    });

    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| {
                let padded = format!("{:<width$}", cell.text, width = w);
                match (cell.highlight, use_colors) {
                    (Some(h), true) => paint(&padded, h),
                    _ => padded,
                }
            })
            .collect::<Vec<_>>()
            .join(SEPARATOR);
        lines.push(line.trim_end().to_string());
    }

    lines.join("\n")
}

fn display_title(record: &PullRequestRecord, truncate: bool) -> String {
    let title = if record.is_draft() {
        format!("DRAFT: {}", record.issue().title)
    } else {
        record.issue().title.clone()
    };
    if truncate {
        truncate_title(&title, TITLE_WIDTH)
    } else {
        title
    }
}

/// Format the collection as a table with a banner.
///
/// The number column is colored by highlight and marked with `!` when an
/// enrichment call failed for that record.
pub fn format_table(
    collection: &FinishedCollection,
    now: DateTime<Utc>,
    use_colors: bool,
    truncate: bool,
) -> String {
    let records = collection.records();
    let show_draft = collection.draft_mode() == DraftMode::Show;
    let show_reviewer = collection.reviewer_filter_active();

    let mut out = vec![
        RULE.to_string(),
        format!("Pull requests for {}/{}", collection.owner(), collection.repo()),
        format!("Count: {}", records.len()),
        RULE.to_string(),
        String::new(),
    ];

    if records.is_empty() {
        out.push("No pull requests found.".to_string());
        return out.join("\n");
    }

    let mut header = vec!["NUMBER", "TITLE", "AUTHOR", "STATE", "REVIEWS"];
    if show_draft {
        header.push("DRAFT");
    }
    if show_reviewer {
        header.push("REVIEWER");
    }
    header.push("APPROVALS");

    let rows: Vec<Vec<Cell>> = records
        .iter()
        .map(|record| {
            let marker = if record.is_fully_enriched() { "" } else { "!" };
            let mut row = vec![
                Cell {
                    text: format!("{}{}", record.number(), marker),
                    highlight: Some(record.highlight(now)),
                },
                Cell::plain(display_title(record, truncate)),
                Cell::plain(record.issue().author.as_str()),
                Cell::plain(record.issue().state.as_str()),
                Cell::plain(record.unique_reviewers().len().to_string()),
            ];
            if show_draft {
                row.push(Cell::plain(checkbox(record.is_draft())));
            }
            if show_reviewer {
                row.push(Cell::plain(checkbox(record.reviewer_matched())));
            }
            row.push(Cell::plain(record.approval_count().to_string()));
            row
        })
        .collect();

    out.push(render_columns(&header, &rows, use_colors));

    let incomplete = collection.incomplete_count();
    if incomplete > 0 {
        out.push(String::new());
        out.push(format!(
            "{} of {} records could not be fully enriched",
            incomplete,
            records.len()
        ));
    }

    out.join("\n")
}

/// Format the collection as tab-separated values for scripting
/// Columns: number, title, author, state, draft, reviews, reviewer_matched,
/// approvals, enriched, url (no headers, no colors)
pub fn format_tsv(collection: &FinishedCollection) -> String {
    collection
        .records()
        .iter()
        .map(|r| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                r.number(),
                r.issue().title.replace('\t', " "),
                r.issue().author,
                r.issue().state,
                r.is_draft(),
                r.unique_reviewers().len(),
                r.reviewer_matched(),
                r.approval_count(),
                r.is_fully_enriched(),
                r.issue().url
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_json(collection: &FinishedCollection) -> serde_json::Result<String> {
    serde_json::to_string_pretty(collection)
}

/// Format one pull request for `pr view`
pub fn format_pr_detail(number: u64, pr: &PrDetail, now: DateTime<Utc>, use_colors: bool) -> String {
    let title = pr.title.as_deref().unwrap_or("N/A");
    let author = pr.author.as_deref().unwrap_or("unknown");
    let state = pr.state.map(|s| s.as_str()).unwrap_or("unknown");

    let mut lines = Vec::new();
    if use_colors {
        lines.push(format!("Pull Request #{}", number).bold().to_string());
        lines.push(format!("Title: {}", title.bold()));
        lines.push(format!("Author: {}", author.yellow()));
    } else {
        lines.push(format!("Pull Request #{}", number));
        lines.push(format!("Title: {}", title));
        lines.push(format!("Author: {}", author));
    }
    lines.push(format!("State: {}", state));
    if pr.draft {
        lines.push("Draft: yes".to_string());
    }
    if let Some(created) = pr.created_at {
        lines.push(format!(
            "Created At: {} ({} ago)",
            created.to_rfc2822(),
            format_age(now - created)
        ));
    }
    if let Some(updated) = pr.updated_at {
        lines.push(format!("Updated At: {}", updated.to_rfc2822()));
    }
    if let Some(merged) = pr.merged_at {
        lines.push(format!("Merged At: {}", merged.to_rfc2822()));
    }
    lines.push(format!("URL: {}", pr.url));
    lines.push(format!("Body:\n{}", pr.body.as_deref().unwrap_or("")));
    lines.join("\n")
}

/// Past reviews of one pull request, newest first
pub fn format_review_history(repo: &str, reviews: &[LoggedReview]) -> String {
    if reviews.is_empty() {
        return "No previous reviews found for this PR".to_string();
    }
    let mut lines = vec!["Review History:".to_string(), "----------------".to_string()];
    lines.extend(reviews.iter().map(|r| {
        format!("- {} by {} at {}", repo, r.reviewer, r.timestamp.to_rfc2822())
    }));
    lines.join("\n")
}

/// A logged review with the pull request's current state, if it could be fetched
pub struct ReviewedPr<'a> {
    pub review: &'a LoggedReview,
    pub state: Option<IssueState>,
}

/// Format the `review` listing
pub fn format_review_log(rows: &[ReviewedPr], now: DateTime<Utc>) -> String {
    if rows.is_empty() {
        return "No reviews found.".to_string();
    }
    let header = ["REPOSITORY", "PR", "STATUS", "REVIEWED AT"];
    let cells: Vec<Vec<Cell>> = rows
        .iter()
        .map(|row| {
            vec![
                Cell::plain(row.review.repo.as_str()),
                Cell::plain(format!("#{}", row.review.pr_number)),
                Cell::plain(row.state.map(|s| s.as_str()).unwrap_or("unknown")),
                Cell::plain(format!(
                    "{} ({} ago)",
                    row.review.timestamp.format("%Y-%m-%d %H:%M"),
                    format_age(now - row.review.timestamp)
                )),
            ]
        })
        .collect();
    render_columns(&header, &cells, false)
}

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Titles are shortened only when stdout is an interactive terminal
pub fn should_truncate_titles() -> bool {
    terminal_size().is_some()
}

/// Truncate title to `max_width` characters, accounting for Unicode
pub fn truncate_title(title: &str, max_width: usize) -> String {
    let chars: Vec<char> = title.chars().collect();
    if chars.len() <= max_width {
        title.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

/// Format a duration into a human-readable age string
/// "2h" for hours, "3d" for days, "1w" for weeks
pub fn format_age(duration: Duration) -> String {
    let hours = duration.num_hours();
    let days = duration.num_days();
    let weeks = days / 7;

    if weeks >= 1 {
        format!("{}w", weeks)
    } else if days >= 1 {
        format!("{}d", days)
    } else if hours >= 1 {
        format!("{}h", hours)
    } else {
        let minutes = duration.num_minutes();
        if minutes >= 1 {
            format!("{}m", minutes)
        } else {
            "now".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::error::ApiError;
    use crate::github::fake;
    use crate::github::types::{RepoRef, Review, ReviewState};
    use crate::pipeline::PrCollection;

    fn finished(mode: DraftMode, reviewers: &[&str]) -> FinishedCollection {
        let reviewers: Vec<String> = reviewers.iter().map(|s| s.to_string()).collect();
        let mut collection =
            PrCollection::new(RepoRef::new("octo", "widgets"), mode, &reviewers).unwrap();
        let now = Utc::now();
        collection.fetch_issues(vec![
            fake::stub_created(1, "dev", now - Duration::days(40)),
            fake::stub_created(2, "dev", now - Duration::hours(3)),
        ]);
        let mut records: Vec<PullRequestRecord> = collection.finish().records().to_vec();
        for record in &mut records {
            record.set_detail(fake::detail(record.number(), false));
            record.set_reviews(Vec::new(), &reviewers);
        }
        FinishedCollection::from_parts("octo", "widgets", !reviewers.is_empty(), mode, records)
    }

    fn enriched(mode: DraftMode, reviewers: &[&str]) -> FinishedCollection {
        let reviewers: Vec<String> = reviewers.iter().map(|s| s.to_string()).collect();
        let mut collection =
            PrCollection::new(RepoRef::new("octo", "widgets"), mode, &reviewers).unwrap();
        collection.fetch_issues(vec![
            fake::stub(1, "dev"),
            fake::stub(2, "dev"),
            fake::stub(3, "dev"),
        ]);
        let mut records: Vec<PullRequestRecord> = collection.finish().records().to_vec();
        records[0].set_detail(fake::detail(1, false));
        records[0].set_reviews(
            vec![
                Review::new("alice", ReviewState::Approved),
                Review::new("bob", ReviewState::Commented),
            ],
            &reviewers,
        );
        records[1].set_detail(fake::detail(2, true));
        records[1].set_reviews(Vec::new(), &reviewers);
        records[2].mark_detail_failed(&ApiError::other("get pull request #3", "boom"));
        records[2].set_reviews(Vec::new(), &reviewers);
        FinishedCollection::from_parts("octo", "widgets", !reviewers.is_empty(), mode, records)
    }

    #[test]
    fn test_truncate_title() {
        assert_eq!(truncate_title("short", TITLE_WIDTH), "short");
        let long = "Refactor the entire authentication layer";
        let cut = truncate_title(long, TITLE_WIDTH);
        assert_eq!(cut.chars().count(), 25);
        assert_eq!(cut, "Refactor the entire au...");
        assert_eq!(truncate_title("ünïcödé-tïtlé", 5), "ün...");
    }

    #[test]
    fn test_table_banner_and_empty() {
        let empty = FinishedCollection::from_parts("octo", "widgets", false, DraftMode::Hide, vec![]);
        let out = format_table(&empty, Utc::now(), false, false);
        assert!(out.contains("Pull requests for octo/widgets"));
        assert!(out.contains("Count: 0"));
        assert!(out.ends_with("No pull requests found."));
    }

    #[test]
    fn test_table_columns_follow_modes() {
        let out = format_table(&finished(DraftMode::Hide, &[]), Utc::now(), false, false);
        let header = out.lines().find(|l| l.starts_with("NUMBER")).unwrap();
        assert_eq!(
            header.split_whitespace().collect::<Vec<_>>(),
            vec!["NUMBER", "TITLE", "AUTHOR", "STATE", "REVIEWS", "APPROVALS"]
        );

        let out = format_table(&finished(DraftMode::Show, &["alice"]), Utc::now(), false, false);
        let header = out.lines().find(|l| l.starts_with("NUMBER")).unwrap();
        assert_eq!(
            header.split_whitespace().collect::<Vec<_>>(),
            vec!["NUMBER", "TITLE", "AUTHOR", "STATE", "REVIEWS", "DRAFT", "REVIEWER", "APPROVALS"]
        );
    }

    #[test]
    fn test_table_rows() {
        let out = format_table(&enriched(DraftMode::Show, &["alice"]), Utc::now(), false, true);
        let rows: Vec<Vec<&str>> = out
            .lines()
            .skip_while(|l| !l.starts_with("NUMBER"))
            .skip(1)
            .take(3)
            .map(|l| l.split_whitespace().collect())
            .collect();
        assert_eq!(rows[0], vec!["1", "PR", "#1", "dev", "open", "2", "[", "]", "[X]", "1"]);
        assert_eq!(rows[1], vec!["2", "DRAFT:", "PR", "#2", "dev", "open", "0", "[X]", "[", "]", "0"]);
        assert_eq!(rows[2][0], "3!");
        assert!(out.ends_with("1 of 3 records could not be fully enriched"));
    }

    #[test]
    fn test_unfetched_records_are_flagged() {
        let mut collection =
            PrCollection::new(RepoRef::new("octo", "widgets"), DraftMode::Show, &[]).unwrap();
        collection.fetch_issues(vec![fake::stub(1, "dev"), fake::stub(2, "dev")]);
        let out = format_table(&collection.finish(), Utc::now(), false, false);
        let numbers: Vec<&str> = out
            .lines()
            .skip_while(|l| !l.starts_with("NUMBER"))
            .skip(1)
            .take(2)
            .filter_map(|l| l.split_whitespace().next())
            .collect();
        assert_eq!(numbers, vec!["1!", "2!"]);
        assert!(out.ends_with("2 of 2 records could not be fully enriched"));
    }

    #[test]
    fn test_number_colors_follow_highlight() {
        let now = Utc::now();
        let out = format_table(&finished(DraftMode::Hide, &[]), now, true, false);
        assert!(out.contains(&"1     ".red().to_string()));
        assert!(out.contains(&"2     ".green().to_string()));
    }

    #[test]
    fn test_tsv() {
        let out = format_tsv(&enriched(DraftMode::Show, &["alice"]));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "1\tPR #1\tdev\topen\tfalse\t2\ttrue\t1\ttrue\thttps://github.com/octo/widgets/pull/1"
        );
        assert!(lines[2].contains("\tfalse\thttps://"));
    }

    #[test]
    fn test_json() {
        let out = format_json(&enriched(DraftMode::Hide, &[])).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["owner"], "octo");
        assert_eq!(value["draft_mode"], "hide");
        assert_eq!(value["records"][0]["approval_count"], 1);
        assert_eq!(value["records"][2]["detail_status"]["status"], "failed");
    }

    #[test]
    fn test_pr_detail() {
        let now = Utc::now();
        let mut pr = fake::detail(7, true);
        pr.author = Some("octocat".to_string());
        pr.created_at = Some(now - Duration::days(2));
        let out = format_pr_detail(7, &pr, now, false);
        assert!(out.starts_with("Pull Request #7\nTitle: PR #7\nAuthor: octocat\nState: open"));
        assert!(out.contains("Draft: yes"));
        assert!(out.contains("(2d ago)"));
        assert!(out.ends_with("Body:\nbody"));
        assert!(!out.contains("Merged At"));
    }

    #[test]
    fn test_review_history() {
        assert_eq!(
            format_review_history("octo/widgets", &[]),
            "No previous reviews found for this PR"
        );
        let review = LoggedReview {
            id: 1,
            repo: "octo/widgets".to_string(),
            pr_number: 3,
            reviewer: "alice".to_string(),
            timestamp: Utc::now(),
        };
        let out = format_review_history("octo/widgets", &[review]);
        assert!(out.starts_with("Review History:"));
        assert!(out.contains("- octo/widgets by alice at "));
    }

    #[test]
    fn test_review_log() {
        let now = Utc::now();
        let review = LoggedReview {
            id: 1,
            repo: "octo/widgets".to_string(),
            pr_number: 3,
            reviewer: "alice".to_string(),
            timestamp: now - Duration::days(3),
        };
        let rows = vec![
            ReviewedPr { review: &review, state: Some(IssueState::Open) },
            ReviewedPr { review: &review, state: None },
        ];
        let out = format_review_log(&rows, now);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("REPOSITORY"));
        assert!(lines[1].contains("#3") && lines[1].contains("open") && lines[1].ends_with("(3d ago)"));
        assert!(lines[2].contains("unknown"));
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(Duration::seconds(30)), "now");
        assert_eq!(format_age(Duration::minutes(30)), "30m");
        assert_eq!(format_age(Duration::hours(3)), "3h");
        assert_eq!(format_age(Duration::days(2)), "2d");
        assert_eq!(format_age(Duration::weeks(2)), "2w");
    }
}

pub mod formatter;

pub use formatter::{
    format_age, format_json, format_pr_detail, format_review_history, format_review_log,
    format_table, format_tsv, should_truncate_titles, should_use_colors, truncate_title, ReviewedPr,
};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How `pr` prints the finished collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Tsv,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Tsv => write!(f, "tsv"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::record::PullRequestRecord;

/// Whether draft pull requests are kept in the final listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DraftMode {
    Show,
    #[default]
    Hide,
}

impl fmt::Display for DraftMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftMode::Show => write!(f, "show"),
            DraftMode::Hide => write!(f, "hide"),
        }
    }
}

/// Drop drafts when hiding them. Order is preserved and a record whose
/// detail never arrived counts as non-draft.
pub fn filter_drafts(records: Vec<PullRequestRecord>, mode: DraftMode) -> Vec<PullRequestRecord> {
    match mode {
        DraftMode::Show => records,
        DraftMode::Hide => records.into_iter().filter(|r| !r.is_draft()).collect(),
    }
}

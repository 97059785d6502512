use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::sheet::Cell;

/// Column names of a staging sheet, in order.
pub const STAGING_COLUMNS: [&str; 7] = [
    "Issue Type",
    "Issue Key",
    "Summary",
    "Epic Key",
    "Status",
    "Assignee",
    "Created",
];

pub const KEY_COLUMN: &str = "Issue Key";
pub const STATUS_COLUMN: &str = "Status";

/// One ticket as returned by a single search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub issue_type: String,
    pub key: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epic_key: Option<String>,
    pub status: String,
    /// Empty when the ticket is unassigned.
    #[serde(default)]
    pub assignee: String,
    pub created: DateTime<FixedOffset>,
}

impl IssueRecord {
    /// Cells of this record in [`STAGING_COLUMNS`] order.
    pub fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::text(&self.issue_type),
            Cell::text(&self.key),
            Cell::text(&self.summary),
            self.epic_key.clone().into(),
            Cell::text(&self.status),
            Cell::text(&self.assignee),
            Cell::Date(self.created.date_naive()),
        ]
    }
}

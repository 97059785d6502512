use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Audit trail of one ticket, oldest event first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeHistory {
    pub key: String,
    pub created: DateTime<FixedOffset>,
    pub current_status: String,
    pub events: Vec<ChangeEvent>,
    /// Number of events the tracker says exist; may exceed `events.len()`
    /// when the tracker truncates the history.
    pub reported_total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub at: DateTime<FixedOffset>,
    pub deltas: Vec<FieldDelta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDelta {
    pub field: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

impl ChangeHistory {
    pub fn is_truncated(&self) -> bool {
        self.reported_total > self.events.len()
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use super::IssueTracker;
use crate::model::history::{ChangeEvent, ChangeHistory, FieldDelta};
use crate::model::issue::IssueRecord;
use crate::util::dates::parse_timestamp;

/// In-memory tracker serving canned pages and histories, recording calls.
pub struct MockTracker {
    issues: Vec<IssueRecord>,
    page_size: usize,
    histories: HashMap<String, ChangeHistory>,
    should_fail: bool,
    pub search_calls: Arc<Mutex<Vec<(String, usize)>>>,
    pub history_calls: Arc<Mutex<Vec<String>>>,
}

impl MockTracker {
    pub fn new() -> Self {
        Self {
            issues: Vec::new(),
            page_size: 50,
            histories: HashMap::new(),
            should_fail: false,
            search_calls: Arc::new(Mutex::new(Vec::new())),
            history_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_issues(mut self, issues: Vec<IssueRecord>) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_history(mut self, history: ChangeHistory) -> Self {
        self.histories.insert(history.key.clone(), history);
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

#[async_trait]
impl IssueTracker for MockTracker {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn search(&self, jql: &str, start_at: usize) -> Result<Vec<IssueRecord>> {
        self.search_calls
            .lock()
            .unwrap()
            .push((jql.to_string(), start_at));
        if self.should_fail {
            anyhow::bail!("Mock failure");
        }
        let start = start_at.min(self.issues.len());
        let end = (start + self.page_size).min(self.issues.len());
        Ok(self.issues[start..end].to_vec())
    }

    async fn change_history(&self, key: &str) -> Result<ChangeHistory> {
        self.history_calls.lock().unwrap().push(key.to_string());
        if self.should_fail {
            anyhow::bail!("Mock failure");
        }
        self.histories
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Issue {key} does not exist"))
    }

    async fn verify(&self) -> Result<()> {
        if self.should_fail {
            anyhow::bail!("Mock failure");
        }
        Ok(())
    }
}

pub fn issue(key: &str, status: &str) -> IssueRecord {
    IssueRecord {
        issue_type: "Story".into(),
        key: key.into(),
        summary: format!("Summary of {key}"),
        epic_key: None,
        status: status.into(),
        assignee: String::new(),
        created: parse_timestamp("2024-01-01T09:00:00.000+0000").unwrap(),
    }
}

/// History created at `created` whose status moves through `changes`
/// (`(timestamp, from, to)`).
pub fn history(key: &str, created: &str, current: &str, changes: &[(&str, &str, &str)]) -> ChangeHistory {
    let events: Vec<ChangeEvent> = changes
        .iter()
        .map(|(at, from, to)| ChangeEvent {
            at: parse_timestamp(at).unwrap(),
            deltas: vec![FieldDelta {
                field: "status".into(),
                from: Some(from.to_string()),
                to: Some(to.to_string()),
            }],
        })
        .collect();
    ChangeHistory {
        key: key.into(),
        created: parse_timestamp(created).unwrap(),
        current_status: current.into(),
        reported_total: events.len(),
        events,
    }
}

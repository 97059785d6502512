pub mod jira;

#[cfg(test)]
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::ConfigurationError;
use crate::model::history::ChangeHistory;
use crate::model::issue::IssueRecord;

#[async_trait]
pub trait IssueTracker: Send + Sync {
    fn name(&self) -> &str;

    /// One page of `jql` results beginning at offset `start_at`. An empty page
    /// means there is nothing further.
    async fn search(&self, jql: &str, start_at: usize) -> Result<Vec<IssueRecord>>;

    /// Full change history of one ticket, oldest event first.
    async fn change_history(&self, key: &str) -> Result<ChangeHistory>;

    /// Issue a cheap authenticated call to prove the credentials work.
    async fn verify(&self) -> Result<()>;
}

/// Every ticket matching `jql`, paging until the tracker returns an empty
/// page. Totals reported by the tracker are not trusted.
pub async fn fetch_all<T: IssueTracker + ?Sized>(tracker: &T, jql: &str) -> Result<Vec<IssueRecord>> {
    if jql.trim().is_empty() {
        return Err(ConfigurationError::EmptyQuery.into());
    }
    let mut start_at = 0;
    let mut issues = Vec::new();
    loop {
        let page = tracker.search(jql, start_at).await?;
        if page.is_empty() {
            break;
        }
        debug!(tracker = tracker.name(), start_at, count = page.len(), "fetched page");
        start_at += page.len();
        issues.extend(page);
    }
    info!(tracker = tracker.name(), count = issues.len(), "fetched issues");
    Ok(issues)
}

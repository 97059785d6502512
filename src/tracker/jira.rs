use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::IssueTracker;
use crate::model::history::{ChangeEvent, ChangeHistory, FieldDelta};
use crate::model::issue::IssueRecord;
use crate::util::dates::parse_timestamp;

pub const DEFAULT_EPIC_FIELD: &str = "customfield_11423";

pub struct JiraClient {
    base_url: String,
    auth_header: String,
    epic_field: String,
    page_size: Option<u32>,
    client: reqwest::Client,
}

impl JiraClient {
    pub fn new(url: &str, user: &str, secret: &str) -> Self {
        let creds = format!("{user}:{secret}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        Self {
            base_url: url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {encoded}"),
            epic_field: DEFAULT_EPIC_FIELD.to_string(),
            page_size: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_epic_field(mut self, field: impl Into<String>) -> Self {
        self.epic_field = field.into();
        self
    }

    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/rest{path}", self.base_url);
        debug!(%url, "jira request");
        let resp = self
            .client
            .get(&url)
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Jira API request failed")?
            .error_for_status()
            .context("Jira API returned an error")?;
        resp.json().await.context("Failed to parse Jira response")
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

#[derive(Deserialize)]
struct JiraIssue {
    key: String,
    fields: IssueFields,
}

#[derive(Deserialize)]
struct IssueFields {
    issuetype: Option<NameField>,
    summary: Option<String>,
    status: Option<NameField>,
    assignee: Option<UserField>,
    created: String,
    /// Custom fields, among them the epic link.
    #[serde(flatten)]
    extra: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct NameField {
    name: String,
}

#[derive(Deserialize)]
struct UserField {
    key: Option<String>,
    name: Option<String>,
    #[serde(rename = "accountId")]
    account_id: Option<String>,
}

#[derive(Deserialize)]
struct IssueWithChangelog {
    key: String,
    fields: HistoryFields,
    changelog: Changelog,
}

#[derive(Deserialize)]
struct HistoryFields {
    created: String,
    status: NameField,
}

#[derive(Deserialize)]
struct Changelog {
    total: Option<usize>,
    #[serde(default)]
    histories: Vec<ChangelogEntry>,
}

#[derive(Deserialize)]
struct ChangelogEntry {
    created: String,
    #[serde(default)]
    items: Vec<ChangelogItem>,
}

#[derive(Deserialize)]
struct ChangelogItem {
    field: String,
    #[serde(rename = "fromString")]
    from_value: Option<String>,
    #[serde(rename = "toString")]
    to_value: Option<String>,
}

impl JiraIssue {
    fn into_record(self, epic_field: &str) -> Result<IssueRecord> {
        let fields = self.fields;
        let created = parse_timestamp(&fields.created)
            .with_context(|| format!("Bad created date on {}", self.key))?;
        let epic_key = match fields.extra.get(epic_field) {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };
        let assignee = fields
            .assignee
            .and_then(|a| a.key.or(a.name).or(a.account_id))
            .unwrap_or_default();

        Ok(IssueRecord {
            issue_type: fields.issuetype.map(|t| t.name).unwrap_or_default(),
            key: self.key,
            summary: fields.summary.unwrap_or_default(),
            epic_key,
            status: fields.status.map(|s| s.name).unwrap_or_default(),
            assignee,
            created,
        })
    }
}

impl IssueWithChangelog {
    fn into_history(self) -> Result<ChangeHistory> {
        let created = parse_timestamp(&self.fields.created)
            .with_context(|| format!("Bad created date on {}", self.key))?;
        let events = self
            .changelog
            .histories
            .into_iter()
            .map(|entry| -> Result<ChangeEvent> {
                Ok(ChangeEvent {
                    at: parse_timestamp(&entry.created)?,
                    deltas: entry
                        .items
                        .into_iter()
                        .map(|item| FieldDelta {
                            field: item.field,
                            from: item.from_value,
                            to: item.to_value,
                        })
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let reported_total = self.changelog.total.unwrap_or(events.len());

        Ok(ChangeHistory {
            key: self.key,
            created,
            current_status: self.fields.status.name,
            events,
            reported_total,
        })
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    fn name(&self) -> &str {
        "Jira"
    }

    async fn search(&self, jql: &str, start_at: usize) -> Result<Vec<IssueRecord>> {
        let mut path = format!(
            "/api/2/search?jql={}&startAt={start_at}&fields=issuetype,summary,status,assignee,created,{}",
            urlencoding::encode(jql),
            self.epic_field
        );
        if let Some(size) = self.page_size {
            path.push_str(&format!("&maxResults={size}"));
        }
        let search: SearchResponse = self.get_json(&path).await?;
        search
            .issues
            .into_iter()
            .map(|issue| issue.into_record(&self.epic_field))
            .collect()
    }

    async fn change_history(&self, key: &str) -> Result<ChangeHistory> {
        let path = format!("/api/2/issue/{}?expand=changelog", urlencoding::encode(key));
        let issue: IssueWithChangelog = self.get_json(&path).await?;
        issue.into_history()
    }

    async fn verify(&self) -> Result<()> {
        let _: serde_json::Value = self.get_json("/api/2/myself").await?;
        Ok(())
    }
}

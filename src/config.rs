use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigurationError;
use crate::tracker::jira::{JiraClient, DEFAULT_EPIC_FIELD};
use crate::wiki::confluence::ConfluenceClient;

/// Settings read from `config.toml`. Keys are camelCase on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wiki_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wiki_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wiki_secret: Option<String>,
    /// Where the workbook lives; defaults to `workbook.json` in the data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workbook: Option<PathBuf>,
    /// Tracker custom field holding a ticket's epic key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epic_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// Base URL, user and secret for one remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub url: String,
    pub user: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(url: &str, user: &str, secret: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            secret: secret.to_string(),
        }
    }
}

fn require(value: &Option<String>, key: &'static str) -> Result<String> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigurationError::MissingSetting(key).into())
}

impl AppConfig {
    pub fn tracker_credentials(&self) -> Result<Credentials> {
        Ok(Credentials::new(
            &require(&self.tracker_url, "trackerUrl")?,
            &require(&self.tracker_user, "trackerUser")?,
            &require(&self.tracker_secret, "trackerSecret")?,
        ))
    }

    pub fn wiki_credentials(&self) -> Result<Credentials> {
        Ok(Credentials::new(
            &require(&self.wiki_url, "wikiUrl")?,
            &require(&self.wiki_user, "wikiUser")?,
            &require(&self.wiki_secret, "wikiSecret")?,
        ))
    }

    pub fn set_tracker(&mut self, creds: Credentials) {
        self.tracker_url = Some(creds.url);
        self.tracker_user = Some(creds.user);
        self.tracker_secret = Some(creds.secret);
    }

    pub fn set_wiki(&mut self, creds: Credentials) {
        self.wiki_url = Some(creds.url);
        self.wiki_user = Some(creds.user);
        self.wiki_secret = Some(creds.secret);
    }

    pub fn workbook_path(&self) -> PathBuf {
        self.workbook
            .clone()
            .unwrap_or_else(|| data_dir().join("workbook.json"))
    }

    pub fn tracker_client(&self) -> Result<JiraClient> {
        Ok(jira_client(&self.tracker_credentials()?, self))
    }

    pub fn wiki_client(&self) -> Result<ConfluenceClient> {
        let creds = self.wiki_credentials()?;
        Ok(ConfluenceClient::new(&creds.url, &creds.user, &creds.secret))
    }
}

/// Jira client for `creds`, carrying the field settings of `config`.
pub fn jira_client(creds: &Credentials, config: &AppConfig) -> JiraClient {
    JiraClient::new(&creds.url, &creds.user, &creds.secret)
        .with_epic_field(
            config
                .epic_field
                .clone()
                .unwrap_or_else(|| DEFAULT_EPIC_FIELD.to_string()),
        )
        .with_page_size(config.page_size)
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".statusbook")
}

pub fn default_config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    Ok(())
}

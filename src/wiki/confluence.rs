use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use super::{Attachment, AttachmentService};

pub struct ConfluenceClient {
    base_url: String,
    auth_header: String,
    client: reqwest::Client,
}

impl ConfluenceClient {
    pub fn new(url: &str, user: &str, secret: &str) -> Self {
        let creds = format!("{user}:{secret}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        Self {
            base_url: url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {encoded}"),
            client: reqwest::Client::new(),
        }
    }

    fn upload_form(file: Attachment, comment: &str) -> Result<Form> {
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.content_type)
            .with_context(|| format!("Invalid file type {:?}", file.content_type))?;
        Ok(Form::new()
            .text("minorEdit", "true")
            .text("comment", comment.to_string())
            .part("file", part))
    }

    async fn post_form(&self, path: &str, form: Form) -> Result<reqwest::Response> {
        let url = format!("{}/rest{path}", self.base_url);
        debug!(%url, "confluence upload");
        self.client
            .post(&url)
            .header("Authorization", &self.auth_header)
            .header("X-Atlassian-Token", "nocheck")
            .multipart(form)
            .send()
            .await
            .context("Confluence API request failed")?
            .error_for_status()
            .context("Confluence API returned an error")
    }
}

#[derive(Deserialize)]
struct AttachmentResults {
    #[serde(default)]
    results: Vec<AttachmentResult>,
}

#[derive(Deserialize)]
struct AttachmentResult {
    id: String,
}

impl AttachmentResults {
    fn single_id(self) -> Option<String> {
        match <[AttachmentResult; 1]>::try_from(self.results) {
            Ok([only]) => Some(only.id),
            Err(_) => None,
        }
    }
}

#[async_trait]
impl AttachmentService for ConfluenceClient {
    async fn create_attachment(&self, page_id: &str, file: Attachment) -> Result<Option<String>> {
        let form = Self::upload_form(file, "Added by statusbook")?;
        let resp = self
            .post_form(&format!("/api/content/{page_id}/child/attachment"), form)
            .await?;
        let created: AttachmentResults = resp
            .json()
            .await
            .context("Failed to parse Confluence response")?;
        Ok(created.single_id())
    }

    async fn update_attachment(&self, page_id: &str, attachment_id: &str, file: Attachment) -> Result<()> {
        let form = Self::upload_form(file, "Updated by statusbook")?;
        self.post_form(
            &format!("/api/content/{page_id}/child/attachment/{attachment_id}/data"),
            form,
        )
        .await?;
        Ok(())
    }

    async fn verify(&self) -> Result<()> {
        let url = format!("{}/rest/api/user/current", self.base_url);
        self.client
            .get(&url)
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Confluence API request failed")?
            .error_for_status()
            .context("Confluence rejected the credentials")?;
        Ok(())
    }
}

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use super::{Attachment, AttachmentService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upload {
    Created { page_id: String, file_name: String },
    Updated { page_id: String, attachment_id: String },
}

/// Records uploads and hands out sequential attachment ids.
pub struct MockWiki {
    should_fail: bool,
    pub uploads: Arc<Mutex<Vec<Upload>>>,
}

impl MockWiki {
    pub fn new() -> Self {
        Self {
            should_fail: false,
            uploads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

#[async_trait]
impl AttachmentService for MockWiki {
    async fn create_attachment(&self, page_id: &str, file: Attachment) -> Result<Option<String>> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(Upload::Created {
            page_id: page_id.to_string(),
            file_name: file.file_name,
        });
        Ok(Some(format!("att{}", uploads.len())))
    }

    async fn update_attachment(&self, page_id: &str, attachment_id: &str, _file: Attachment) -> Result<()> {
        self.uploads.lock().unwrap().push(Upload::Updated {
            page_id: page_id.to_string(),
            attachment_id: attachment_id.to_string(),
        });
        Ok(())
    }

    async fn verify(&self) -> Result<()> {
        if self.should_fail {
            anyhow::bail!("Mock failure");
        }
        Ok(())
    }
}

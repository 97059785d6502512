pub mod confluence;

#[cfg(test)]
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;

/// A binary file to attach to a wiki page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait AttachmentService: Send + Sync {
    /// Attach a new file to `page_id`, returning the new attachment's id when
    /// the service reports exactly one.
    async fn create_attachment(&self, page_id: &str, file: Attachment) -> Result<Option<String>>;

    /// Replace the data of an existing attachment.
    async fn update_attachment(&self, page_id: &str, attachment_id: &str, file: Attachment) -> Result<()>;

    async fn verify(&self) -> Result<()>;
}

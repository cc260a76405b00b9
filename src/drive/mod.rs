//! Google Drive upload target.

pub mod auth;
pub mod client;
pub mod models;

use async_trait::async_trait;

pub use auth::Authenticator;
pub use client::DriveClient;
pub use models::DriveFile;

use crate::canvas::FileContent;
use crate::error::DriveError;

/// Destination for downloaded files.
#[async_trait]
pub trait DriveSink: Send + Sync {
    /// Upload a file and return the remote file id.
    async fn upload(&self, file: FileContent, folder_id: Option<&str>) -> Result<String, DriveError>;
}

#[async_trait]
impl DriveSink for DriveClient {
    async fn upload(&self, file: FileContent, folder_id: Option<&str>) -> Result<String, DriveError> {
        let uploaded = self
            .upload_bytes(file.bytes, &file.filename, &file.content_type, folder_id)
            .await?;
        Ok(uploaded.id)
    }
}

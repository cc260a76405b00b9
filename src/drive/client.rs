//! Google Drive API client: folder listing and file upload.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use tracing::{debug, info};

use crate::drive::auth::Authenticator;
use crate::drive::models::{ApiErrorResponse, DriveFile, FileListResponse, FOLDER_MIME_TYPE};
use crate::error::DriveError;

type Result<T> = std::result::Result<T, DriveError>;

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Payloads larger than this use a resumable upload session (5 MB).
const RESUMABLE_THRESHOLD: usize = 5 * 1024 * 1024;

const FILE_FIELDS: &str = "id, name, size, mimeType, webViewLink, parents";

/// Client for listing folders in and uploading files to Google Drive.
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    /// Create a new DriveClient against the public Google endpoints.
    pub fn new(auth: Authenticator) -> Self {
        Self::with_base_urls(auth, DRIVE_API_BASE, UPLOAD_API_BASE)
    }

    /// Create a DriveClient against custom endpoints.
    pub fn with_base_urls(
        auth: Authenticator,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            http: Client::new(),
            api_base: api_base.into(),
            upload_base: upload_base.into(),
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    /// List all folders visible to the app.
    pub async fn list_folders(&self) -> Result<Vec<DriveFile>> {
        let query = format!("mimeType = '{}' and trashed = false", FOLDER_MIME_TYPE);
        let folders = self.query_files(&query).await?;
        info!(count = folders.len(), "retrieved Drive folders");
        Ok(folders)
    }

    /// Query files using Google Drive query syntax, following all pages.
    pub async fn query_files(&self, query: &str) -> Result<Vec<DriveFile>> {
        let token = self.auth.get_access_token().await?;
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(format!("{}/files", self.api_base))
                .bearer_auth(&token)
                .query(&[
                    ("q", query),
                    ("spaces", "drive"),
                    ("fields", "nextPageToken, files(id, name, mimeType, parents)"),
                ]);

            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = check(request.send().await?).await?;
            let list_response: FileListResponse = response.json().await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    /// Upload raw bytes as a new file, optionally inside a folder.
    ///
    /// Existing files with the same name are left alone; Drive allows
    /// duplicate names.
    pub async fn upload_bytes(
        &self,
        content: Vec<u8>,
        filename: &str,
        mime_type: &str,
        folder_id: Option<&str>,
    ) -> Result<DriveFile> {
        let mut metadata = serde_json::json!({ "name": filename });
        if let Some(folder_id) = folder_id {
            metadata["parents"] = serde_json::json!([folder_id]);
        }

        let uploaded = if content.len() > RESUMABLE_THRESHOLD {
            self.upload_resumable(content, &metadata, mime_type).await?
        } else {
            self.upload_multipart(content, &metadata, filename, mime_type)
                .await?
        };
        info!(filename, id = %uploaded.id, "uploaded file to Drive");
        Ok(uploaded)
    }

    /// Single-request upload of metadata and bytes.
    async fn upload_multipart(
        &self,
        content: Vec<u8>,
        metadata: &serde_json::Value,
        filename: &str,
        mime_type: &str,
    ) -> Result<DriveFile> {
        let token = self.auth.get_access_token().await?;

        let metadata_part = Part::text(metadata.to_string()).mime_str("application/json")?;

        let file_part = Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str(mime_type)?;

        let form = Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        let response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&token)
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .multipart(form)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    /// Two-step upload through a resumable session.
    async fn upload_resumable(
        &self,
        content: Vec<u8>,
        metadata: &serde_json::Value,
        mime_type: &str,
    ) -> Result<DriveFile> {
        let token = self.auth.get_access_token().await?;
        let file_size = content.len();

        // Open the session; Drive answers with its URL in Location.
        let init_response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&token)
            .query(&[("uploadType", "resumable")])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", file_size.to_string())
            .json(metadata)
            .send()
            .await?;
        let init_response = check(init_response).await?;

        let upload_url = init_response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DriveError::ApiError {
                status: init_response.status().as_u16(),
                message: "No upload URL in response".to_string(),
            })?
            .to_string();
        debug!(bytes = file_size, "started resumable upload session");

        let upload_response = self
            .http
            .put(&upload_url)
            .header("Content-Type", mime_type)
            .header("Content-Length", file_size.to_string())
            .query(&[("fields", FILE_FIELDS)])
            .body(content)
            .send()
            .await?;

        Ok(check(upload_response).await?.json().await?)
    }
}

/// Turn a non-success response into a DriveError.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(DriveError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(DriveError::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}

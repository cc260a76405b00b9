//! Error types for the canvas_drive crate.

use thiserror::Error;

/// Longest payload excerpt carried by [`CanvasError::MalformedResponse`].
const FRAGMENT_LIMIT: usize = 256;

/// Errors returned by the Canvas client.
///
/// Only [`CanvasError::Transient`] is safe to retry; the client itself never
/// retries.
#[derive(Error, Debug)]
pub enum CanvasError {
    #[error("Canvas rejected the access token ({status}) for {resource}")]
    Auth { status: u16, resource: String },

    #[error("Transient failure fetching {resource}: {reason}")]
    Transient { resource: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed response from {resource}: {reason} (payload: {fragment})")]
    MalformedResponse {
        resource: String,
        reason: String,
        fragment: String,
    },

    #[error("Canvas API error ({status}) for {resource}: {message}")]
    Api {
        status: u16,
        resource: String,
        message: String,
    },
}

impl CanvasError {
    /// Whether the caller may retry the failed call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CanvasError::Transient { .. })
    }

    /// Classify a transport-level failure from reqwest.
    ///
    /// Payloads are parsed with serde_json separately, so every reqwest error
    /// here is a network problem: timeouts, refused connections and bodies
    /// cut short all map to `Transient`.
    pub(crate) fn transport(resource: &str, err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else if err.is_body() || err.is_decode() {
            format!("response body interrupted: {}", err)
        } else {
            err.to_string()
        };
        CanvasError::Transient {
            resource: resource.to_string(),
            reason,
        }
    }

    /// Build a `MalformedResponse` keeping a bounded excerpt of the payload.
    pub(crate) fn malformed(resource: &str, reason: impl ToString, payload: &str) -> Self {
        CanvasError::MalformedResponse {
            resource: resource.to_string(),
            reason: reason.to_string(),
            fragment: truncate(payload, FRAGMENT_LIMIT),
        }
    }
}

fn truncate(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        return s.to_string();
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("{0} cannot be empty")]
    Empty(String),

    #[error("Invalid URL for {name}: {value} (must be http:// or https://)")]
    InvalidUrl { name: String, value: String },

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Errors that can occur when interacting with Google Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Failed to read or write credentials file: {0}")]
    CredentialsFileError(#[from] std::io::Error),

    #[error("Failed to parse credentials JSON: {0}")]
    CredentialsParseError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid URL or ID: {0}")]
    InvalidUrlOrId(String),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("Authorization flow failed: {0}")]
    AuthorizationFlowError(String),
}

/// Errors surfaced by the Canvas to Drive orchestration.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Canvas(#[from] CanvasError),

    #[error(transparent)]
    Drive(#[from] DriveError),
}

/// Result type alias, defaulting to CanvasError.
pub type Result<T, E = CanvasError> = std::result::Result<T, E>;

//! Google OAuth2 authentication for the Drive sink.
//!
//! Two credential kinds are supported: an installed-app OAuth client, whose
//! user token is persisted to a token file between runs, and a service
//! account key.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::Client;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::DriveError;
use crate::drive::models::{
    CredentialsFile, OAuthClientSecrets, ServiceAccountCredentials, StoredToken, TokenResponse,
};

type Result<T> = std::result::Result<T, DriveError>;

/// Google OAuth2 token endpoint.
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Access limited to files this app created or opened.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Local port for the OAuth redirect listener.
pub const REDIRECT_PORT: u16 = 8080;

/// Tokens this close to expiry are treated as expired.
const EXPIRY_MARGIN_SECS: u64 = 60;

const MAX_REDIRECT_REQUEST: usize = 8 * 1024;

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scope
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

enum TokenSource {
    ServiceAccount(ServiceAccountCredentials),
    User {
        secrets: OAuthClientSecrets,
        token_path: PathBuf,
    },
}

/// Authenticator for the Google Drive API.
#[derive(Clone)]
pub struct Authenticator {
    source: Arc<TokenSource>,
    client: Client,
    cached_token: Arc<RwLock<Option<StoredToken>>>,
}

impl Authenticator {
    /// Create an authenticator from a Google credentials file.
    ///
    /// # Arguments
    /// * `credentials_path` - OAuth client secrets or service account key
    /// * `token_path` - Where the user token is persisted (unused for service accounts)
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(
        credentials_path: P,
        token_path: Q,
    ) -> Result<Self> {
        let content = fs::read_to_string(credentials_path)?;
        let credentials: CredentialsFile = serde_json::from_str(&content)?;
        Ok(match credentials {
            CredentialsFile::ServiceAccount(creds) => Self::service_account(creds),
            CredentialsFile::Installed { installed: secrets }
            | CredentialsFile::Web { web: secrets } => {
                Self::installed_app(secrets, token_path.as_ref().to_path_buf())
            }
        })
    }

    /// Authenticate as a service account.
    pub fn service_account(credentials: ServiceAccountCredentials) -> Self {
        Self::with_source(TokenSource::ServiceAccount(credentials))
    }

    /// Authenticate as a user through an installed-app OAuth client.
    pub fn installed_app(secrets: OAuthClientSecrets, token_path: PathBuf) -> Self {
        Self::with_source(TokenSource::User {
            secrets,
            token_path,
        })
    }

    fn with_source(source: TokenSource) -> Self {
        Self {
            source: Arc::new(source),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Make sure a usable access token is available.
    ///
    /// Reuses the persisted token when valid, refreshes it when expired, and
    /// otherwise runs the interactive browser flow. Calling this again is a
    /// no-op while the token stays valid.
    pub async fn authenticate(&self) -> Result<()> {
        self.get_access_token().await.map(|_| ())
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.is_valid_at(unix_now(), EXPIRY_MARGIN_SECS) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let fresh = match self.source.as_ref() {
            TokenSource::ServiceAccount(creds) => self.service_account_token(creds).await?,
            TokenSource::User {
                secrets,
                token_path,
            } => self.user_token(secrets, token_path).await?,
        };

        let access_token = fresh.access_token.clone();
        *self.cached_token.write().await = Some(fresh);
        Ok(access_token)
    }

    async fn user_token(&self, secrets: &OAuthClientSecrets, token_path: &Path) -> Result<StoredToken> {
        let stored = match self.cached_token.read().await.clone() {
            Some(token) => Some(token),
            None => load_token(token_path)?,
        };

        if let Some(stored) = stored {
            if stored.is_valid_at(unix_now(), EXPIRY_MARGIN_SECS) {
                debug!(path = %token_path.display(), "reusing persisted token");
                return Ok(stored);
            }
            if let Some(refresh_token) = stored.refresh_token.as_deref() {
                match self.refresh_user_token(secrets, refresh_token).await {
                    Ok(token) => {
                        save_token(token_path, &token)?;
                        info!("refreshed Google Drive token");
                        return Ok(token);
                    }
                    Err(e) => warn!(error = %e, "token refresh failed, starting authorization flow"),
                }
            }
        }

        let token = self.authorize_interactively(secrets).await?;
        save_token(token_path, &token)?;
        info!(path = %token_path.display(), "saved Google Drive token");
        Ok(token)
    }

    async fn refresh_user_token(
        &self,
        secrets: &OAuthClientSecrets,
        refresh_token: &str,
    ) -> Result<StoredToken> {
        let params = [
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let response = self.request_token(&secrets.token_uri, &params).await?;
        let mut token = stored_from(response);
        // Google usually omits the refresh token on refresh.
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }

    async fn authorize_interactively(&self, secrets: &OAuthClientSecrets) -> Result<StoredToken> {
        let listener = TcpListener::bind(("127.0.0.1", REDIRECT_PORT))
            .await
            .map_err(|e| {
                DriveError::AuthorizationFlowError(format!(
                    "failed to listen on port {}: {}",
                    REDIRECT_PORT, e
                ))
            })?;
        let redirect_uri = format!("http://localhost:{}/", REDIRECT_PORT);
        let state = random_state();
        let authorize_url = build_authorize_url(secrets, &redirect_uri, &state)?;

        println!("Open this URL in your browser to authorize Google Drive access:");
        println!("{}", authorize_url);
        if let Err(e) = webbrowser::open(&authorize_url) {
            warn!(error = %e, "could not open a browser");
        }

        let code = wait_for_code(&listener, &state).await?;
        let params = [
            ("code", code.as_str()),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let response = self.request_token(&secrets.token_uri, &params).await?;
        Ok(stored_from(response))
    }

    /// Exchange a signed JWT assertion for an access token.
    async fn service_account_token(&self, creds: &ServiceAccountCredentials) -> Result<StoredToken> {
        let now = unix_now();
        let token_uri = creds.token_uri.as_deref().unwrap_or(TOKEN_URI);

        let claims = Claims {
            iss: creds.client_email.clone(),
            scope: DRIVE_SCOPE.to_string(),
            aud: token_uri.to_string(),
            iat: now,
            exp: now + 3600, // 1 hour
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(creds.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ];
        let response = self.request_token(token_uri, &params).await?;
        Ok(stored_from(response))
    }

    async fn request_token(&self, token_uri: &str, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self.client.post(token_uri).form(params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::TokenRefreshError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }
}

fn stored_from(response: TokenResponse) -> StoredToken {
    StoredToken {
        access_token: response.access_token,
        refresh_token: response.refresh_token,
        expires_at: unix_now() + response.expires_in,
        scope: response.scope,
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Read a persisted token. A missing file is not an error.
pub fn load_token(path: &Path) -> Result<Option<StoredToken>> {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable token file");
                Ok(None)
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Persist a token, readable by the current user only.
pub fn save_token(path: &Path, token: &StoredToken) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(token)?)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn build_authorize_url(
    secrets: &OAuthClientSecrets,
    redirect_uri: &str,
    state: &str,
) -> Result<String> {
    let mut url = Url::parse(&secrets.auth_uri)
        .map_err(|e| DriveError::AuthorizationFlowError(format!("invalid auth_uri: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("client_id", &secrets.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", DRIVE_SCOPE)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("state", state);
    Ok(url.into())
}

/// Accept redirect requests until one carries an authorization code or error.
async fn wait_for_code(listener: &TcpListener, expected_state: &str) -> Result<String> {
    loop {
        let (mut stream, _) = listener.accept().await.map_err(flow_io)?;

        let mut buf = vec![0u8; MAX_REDIRECT_REQUEST];
        let mut read = 0;
        while read < buf.len() {
            let n = stream.read(&mut buf[read..]).await.map_err(flow_io)?;
            if n == 0 {
                break;
            }
            read += n;
            if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        let request = String::from_utf8_lossy(&buf[..read]);

        let outcome = parse_redirect(&request, expected_state);
        let page = match &outcome {
            Some(Ok(_)) => "Authorization complete. You can close this window.",
            Some(Err(_)) => "Authorization failed. Check the terminal for details.",
            None => "Waiting for authorization...",
        };
        let reply = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            page.len(),
            page
        );
        stream.write_all(reply.as_bytes()).await.map_err(flow_io)?;
        stream.shutdown().await.ok();

        if let Some(result) = outcome {
            return result;
        }
    }
}

fn flow_io(e: std::io::Error) -> DriveError {
    DriveError::AuthorizationFlowError(format!("redirect listener failed: {}", e))
}

/// Extract the authorization code from the redirect's request line.
///
/// Returns `None` for unrelated requests such as `/favicon.ico`.
fn parse_redirect(request: &str, expected_state: &str) -> Option<Result<String>> {
    let target = request.lines().next()?.split_whitespace().nth(1)?;
    let url = Url::parse(&format!("http://localhost{}", target)).ok()?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Err(DriveError::AuthorizationFlowError(error)));
    }
    let code = code?;
    if state.as_deref() != Some(expected_state) {
        return Some(Err(DriveError::AuthorizationFlowError(
            "state mismatch in authorization response".to_string(),
        )));
    }
    Some(Ok(code))
}

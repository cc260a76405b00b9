//! Tests for the Drive sink: folder listing, uploads and token handling.

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use canvas_drive::canvas::FileContent;
use canvas_drive::drive::auth::{load_token, save_token};
use canvas_drive::drive::models::{OAuthClientSecrets, StoredToken};
use canvas_drive::{Authenticator, DriveClient, DriveError, DriveSink};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use tempfile::TempDir;

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn secrets(token_uri: &str) -> OAuthClientSecrets {
    OAuthClientSecrets {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
        token_uri: token_uri.to_string(),
    }
}

fn write_token(path: &Path, access_token: &str, expires_at: u64) {
    let token = StoredToken {
        access_token: access_token.to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at,
        scope: None,
    };
    save_token(path, &token).unwrap();
}

/// A Drive client against the mock server, authenticated with a stored token.
fn drive_for(server: &ServerGuard, dir: &TempDir) -> DriveClient {
    let token_path = dir.path().join("token.json");
    write_token(&token_path, "stored-access", now() + 3600);
    let auth = Authenticator::installed_app(
        secrets(&format!("{}/token", server.url())),
        token_path,
    );
    DriveClient::with_base_urls(auth, server.url(), format!("{}/upload", server.url()))
}

mod folders {
    use super::*;

    #[tokio::test]
    async fn lists_folders_across_pages() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();

        // The first request ends with the fields parameter; later ones append pageToken.
        let page1 = server
            .mock("GET", "/files")
            .match_query(Matcher::Regex("fields=[^&]*$".into()))
            .match_header("authorization", "Bearer stored-access")
            .with_status(200)
            .with_body(
                json!({
                    "nextPageToken": "p2",
                    "files": [{"id": "f1", "name": "Semester 1",
                               "mimeType": "application/vnd.google-apps.folder"}]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let page2 = server
            .mock("GET", "/files")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "p2".into()))
            .with_status(200)
            .with_body(
                json!({
                    "files": [{"id": "f2", "name": "Semester 2",
                               "mimeType": "application/vnd.google-apps.folder"}]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let drive = drive_for(&server, &dir);
        let folders = drive.list_folders().await.unwrap();

        let names: Vec<&str> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Semester 1", "Semester 2"]);
        assert!(folders.iter().all(|f| f.is_folder()));

        page1.assert_async().await;
        page2.assert_async().await;
    }

    #[tokio::test]
    async fn api_error_is_reported() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();

        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(
                json!({"error": {"code": 403, "message": "Insufficient Permission"}}).to_string(),
            )
            .create_async()
            .await;

        let drive = drive_for(&server, &dir);
        match drive.list_folders().await {
            Err(DriveError::ApiError { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "Insufficient Permission");
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
    }
}

mod uploads {
    use super::*;

    fn content(name: &str, bytes: Vec<u8>) -> FileContent {
        FileContent {
            filename: name.to_string(),
            content_type: "application/pdf".to_string(),
            bytes,
        }
    }

    #[tokio::test]
    async fn multipart_upload_returns_drive_id() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();

        let mock = server
            .mock("POST", "/upload/files")
            .match_query(Matcher::UrlEncoded("uploadType".into(), "multipart".into()))
            .match_header("authorization", "Bearer stored-access")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""parents":\["folder1"\]"#.into()),
                Matcher::Regex("slides.pdf".into()),
            ]))
            .with_status(200)
            .with_body(json!({"id": "new1", "name": "slides.pdf"}).to_string())
            .expect(1)
            .create_async()
            .await;

        let drive = drive_for(&server, &dir);
        let id = drive
            .upload(content("slides.pdf", b"%PDF-1.4".to_vec()), Some("folder1"))
            .await
            .unwrap();

        assert_eq!(id, "new1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upload_to_root_has_no_parents() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();

        server
            .mock("POST", "/upload/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"id": "root1", "name": "a.pdf"}).to_string())
            .create_async()
            .await;

        let drive = drive_for(&server, &dir);
        let file = drive
            .upload_bytes(b"data".to_vec(), "a.pdf", "application/pdf", None)
            .await
            .unwrap();
        assert_eq!(file.id, "root1");
        assert!(file.parents.is_empty());
    }

    #[tokio::test]
    async fn large_payload_uses_resumable_session() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let session_url = format!("{}/upload-session/xyz", server.url());

        let init = server
            .mock("POST", "/upload/files")
            .match_query(Matcher::UrlEncoded("uploadType".into(), "resumable".into()))
            .match_header("x-upload-content-type", "application/pdf")
            .with_status(200)
            .with_header("location", session_url.as_str())
            .expect(1)
            .create_async()
            .await;

        let put = server
            .mock("PUT", "/upload-session/xyz")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"id": "big1", "name": "big.pdf"}).to_string())
            .expect(1)
            .create_async()
            .await;

        let drive = drive_for(&server, &dir);
        let payload = vec![7u8; 5 * 1024 * 1024 + 1];
        let id = drive.upload(content("big.pdf", payload), Some("folder1")).await.unwrap();

        assert_eq!(id, "big1");
        init.assert_async().await;
        put.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_upload_is_an_error() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();

        server
            .mock("POST", "/upload/files")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(json!({"error": {"code": 404, "message": "File not found: folder1."}}).to_string())
            .create_async()
            .await;

        let drive = drive_for(&server, &dir);
        let err = drive
            .upload(content("a.pdf", b"x".to_vec()), Some("folder1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::ApiError { status: 404, .. }));
    }
}

mod tokens {
    use super::*;

    #[tokio::test]
    async fn expired_token_is_refreshed_and_persisted() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("token.json");
        write_token(&token_path, "old-access", now() - 10);

        let refresh = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "refresh-1".into()),
                Matcher::UrlEncoded("client_id".into(), "client-id".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({"access_token": "new-access", "expires_in": 3600, "token_type": "Bearer"})
                    .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let auth = Authenticator::installed_app(
            secrets(&format!("{}/token", server.url())),
            token_path.clone(),
        );

        assert_eq!(auth.get_access_token().await.unwrap(), "new-access");
        // Cached afterwards: no second refresh.
        assert_eq!(auth.get_access_token().await.unwrap(), "new-access");
        refresh.assert_async().await;

        let saved = load_token(&token_path).unwrap().unwrap();
        assert_eq!(saved.access_token, "new-access");
        assert_eq!(saved.refresh_token.as_deref(), Some("refresh-1"));
        assert!(saved.expires_at > now());
    }

    #[tokio::test]
    async fn valid_token_needs_no_network() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("token.json");
        write_token(&token_path, "still-good", now() + 3600);

        let auth = Authenticator::installed_app(secrets("http://127.0.0.1:9/token"), token_path);
        auth.authenticate().await.unwrap();
        assert_eq!(auth.get_access_token().await.unwrap(), "still-good");
    }

    #[test]
    fn missing_token_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load_token(&dir.path().join("absent.json")).unwrap(), None);
    }

    #[test]
    fn corrupt_token_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_token(&path).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn saved_token_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        write_token(&path, "a", now());
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

mod credentials {
    use super::*;

    #[test]
    fn loads_installed_app_credentials() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(
            &path,
            json!({"installed": {"client_id": "cid", "client_secret": "secret",
                                 "redirect_uris": ["http://localhost"]}})
            .to_string(),
        )
        .unwrap();

        assert!(Authenticator::from_files(&path, dir.path().join("token.json")).is_ok());
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let result = Authenticator::from_files(dir.path().join("nope.json"), dir.path().join("t.json"));
        assert!(matches!(result, Err(DriveError::CredentialsFileError(_))));
    }

    #[test]
    fn unrecognised_shape_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, r#"{"something": "else"}"#).unwrap();

        let result = Authenticator::from_files(&path, dir.path().join("token.json"));
        assert!(matches!(result, Err(DriveError::CredentialsParseError(_))));
    }
}

//! Google Drive backend.
//!
//! The document lives as a single JSON file in the Drive `appDataFolder`,
//! a per-application storage area the user never sees in their Drive UI.
//! Tokens come from the standard OAuth code/refresh flows; the
//! authorization code itself is obtained out of band (the CLI prints the
//! consent URL and accepts the pasted code).

use std::sync::Mutex;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::{CloudProvider, Identity, OauthApp, RemoteRef};
use crate::config::{ProviderKind, SyncConfig};
use crate::document::{now_ms, Document};
use crate::error::SyncError;
use crate::intercept::DocumentStore;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const ABOUT_URL: &str = "https://www.googleapis.com/drive/v3/about";

/// Only the app-private storage area is requested.
const SCOPE: &str = "https://www.googleapis.com/auth/drive.appdata";
/// Out-of-band flow: the user pastes the code back into the CLI.
const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Well-known name of the singleton remote file.
const REMOTE_NAME: &str = "packtrack-sync.json";

/// Refresh a token this long before it actually expires.
const TOKEN_EXPIRY_MARGIN_MS: i64 = 60_000;

/// Builds the consent URL the user visits to authorize the app.
pub fn consent_url(oauth: &OauthApp) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
        AUTH_URL,
        urlencoding::encode(&oauth.client_id),
        urlencoding::encode(REDIRECT_URI),
        urlencoding::encode(SCOPE),
    )
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Lifetime in seconds
    expires_in: i64,
    /// Only present on the initial code exchange
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct About {
    user: AboutUser,
}

#[derive(Debug, Deserialize)]
struct AboutUser {
    #[serde(rename = "emailAddress")]
    email_address: String,
}

/// Cloud provider storing the document in the Drive `appDataFolder`.
pub struct GoogleDriveProvider {
    http: reqwest::Client,
    oauth: OauthApp,
    store: DocumentStore,
    /// Pending authorization code, consumed by the first interactive auth
    auth_code: Mutex<Option<String>>,
}

impl GoogleDriveProvider {
    pub fn new(oauth: OauthApp, store: DocumentStore, auth_code: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            oauth,
            store,
            auth_code: Mutex::new(auth_code),
        }
    }

    fn config(&self) -> Result<SyncConfig, SyncError> {
        Ok(self
            .store
            .sync_config()?
            .unwrap_or_else(|| SyncConfig::new(ProviderKind::GoogleDrive)))
    }

    async fn exchange_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse, SyncError> {
        let resp = self.http.post(TOKEN_URL).form(params).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }
        Ok(resp.json().await?)
    }

    fn apply_token(config: &mut SyncConfig, token: &TokenResponse, now_ms: i64) {
        config.access_token = Some(token.access_token.clone());
        config.token_expires_at = now_ms + token.expires_in * 1000;
        if let Some(refresh) = &token.refresh_token {
            config.refresh_token = Some(refresh.clone());
        }
    }

    /// Returns a usable access token, refreshing it if needed, along with
    /// the current config.
    async fn ensure_token(&self) -> Result<(String, SyncConfig), SyncError> {
        let mut config = self.config()?;
        let now = now_ms();

        if let Some(token) = config.access_token.clone() {
            if config.token_valid(now, TOKEN_EXPIRY_MARGIN_MS) {
                return Ok((token, config));
            }
        }

        let refresh = config.refresh_token.clone().ok_or_else(|| {
            SyncError::Auth("no stored credential; run the login flow".to_string())
        })?;
        let token = self
            .exchange_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh.as_str()),
                ("client_id", self.oauth.client_id.as_str()),
                ("client_secret", self.oauth.client_secret.as_str()),
            ])
            .await?;
        Self::apply_token(&mut config, &token, now);
        self.store.put_sync_config(&config)?;
        debug!("refreshed access token");
        Ok((token.access_token, config))
    }

    async fn fetch_account(&self, token: &str) -> Result<String, SyncError> {
        let resp = self
            .http
            .get(ABOUT_URL)
            .query(&[("fields", "user(emailAddress)")])
            .bearer_auth(token)
            .send()
            .await?;
        let resp = error_for_status(resp, "about lookup").await?;
        let about: About = resp.json().await?;
        Ok(about.user.email_address)
    }

    /// Locates the remote file by name, caching its id on success.
    async fn discover_file(
        &self,
        token: &str,
        config: &mut SyncConfig,
    ) -> Result<Option<String>, SyncError> {
        if let Some(id) = config.remote_file_id.clone() {
            return Ok(Some(id));
        }

        let query = format!("name = '{}' and trashed = false", REMOTE_NAME);
        let resp = self
            .http
            .get(FILES_URL)
            .query(&[
                ("spaces", "appDataFolder"),
                ("q", query.as_str()),
                ("fields", "files(id)"),
            ])
            .bearer_auth(token)
            .send()
            .await?;
        let resp = error_for_status(resp, "file listing").await?;
        let listing: FileList = resp.json().await?;

        match listing.files.into_iter().next() {
            Some(file) => {
                debug!(file_id = %file.id, "discovered remote sync file");
                config.remote_file_id = Some(file.id.clone());
                self.store.put_sync_config(config)?;
                Ok(Some(file.id))
            }
            None => Ok(None),
        }
    }

    async fn create_file(
        &self,
        token: &str,
        config: &mut SyncConfig,
        content: &str,
    ) -> Result<String, SyncError> {
        let metadata = serde_json::json!({
            "name": REMOTE_NAME,
            "parents": ["appDataFolder"],
        })
        .to_string();
        let boundary = "packtrack_multipart_boundary";
        let body = multipart_related_body(&metadata, content, boundary);

        let resp = self
            .http
            .post(format!("{}?uploadType=multipart", UPLOAD_URL))
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;
        let resp = error_for_status(resp, "file create").await?;
        let file: DriveFile = resp.json().await?;

        config.remote_file_id = Some(file.id.clone());
        self.store.put_sync_config(config)?;
        Ok(file.id)
    }
}

#[async_trait::async_trait]
impl CloudProvider for GoogleDriveProvider {
    async fn authenticate(&self, interactive: bool) -> Result<Identity, SyncError> {
        if interactive {
            // A forced grant ignores any cached credential.
            let code = self.auth_code.lock().unwrap().take().ok_or_else(|| {
                SyncError::Auth(
                    "interactive grant requires an authorization code; run the login flow"
                        .to_string(),
                )
            })?;
            let token = self
                .exchange_token(&[
                    ("grant_type", "authorization_code"),
                    ("code", code.as_str()),
                    ("client_id", self.oauth.client_id.as_str()),
                    ("client_secret", self.oauth.client_secret.as_str()),
                    ("redirect_uri", REDIRECT_URI),
                ])
                .await?;

            let mut config = SyncConfig::new(ProviderKind::GoogleDrive);
            Self::apply_token(&mut config, &token, now_ms());
            let account = self.fetch_account(&token.access_token).await?;
            config.account = Some(account.clone());
            self.store.put_sync_config(&config)?;
            debug!(account = %account, "interactive authentication complete");
            return Ok(Identity { account });
        }

        let (_, config) = self.ensure_token().await?;
        Ok(Identity {
            account: config.account.unwrap_or_default(),
        })
    }

    async fn push(&self, document: &Document) -> Result<RemoteRef, SyncError> {
        let (token, mut config) = self.ensure_token().await?;
        let content = document.to_json()?;

        if let Some(id) = config.remote_file_id.clone() {
            let resp = self
                .http
                .patch(format!("{}/{}?uploadType=media", UPLOAD_URL, id))
                .bearer_auth(&token)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(content.clone())
                .send()
                .await?;

            if resp.status() != StatusCode::NOT_FOUND {
                error_for_status(resp, "file update").await?;
                return Ok(RemoteRef { file_id: id });
            }
            // The cached file is gone (revoked or deleted remotely);
            // fall through and recreate it.
            debug!(file_id = %id, "cached remote file missing, recreating");
            config.remote_file_id = None;
        }

        let file_id = self.create_file(&token, &mut config, &content).await?;
        Ok(RemoteRef { file_id })
    }

    async fn pull(&self) -> Result<Option<Document>, SyncError> {
        let (token, mut config) = self.ensure_token().await?;

        let Some(file_id) = self.discover_file(&token, &mut config).await? else {
            return Ok(None);
        };

        let resp = self
            .http
            .get(format!("{}/{}", FILES_URL, file_id))
            .query(&[("alt", "media")])
            .bearer_auth(&token)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = error_for_status(resp, "file download").await?;
        let text = resp.text().await?;
        Ok(Some(Document::from_json(&text)?))
    }
}

/// Maps an unsuccessful response to the error taxonomy: 401/403 are auth
/// failures, everything else is transient.
async fn error_for_status(
    resp: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(SyncError::Auth(format!("{}: {} {}", context, status, body)))
    } else {
        Err(SyncError::Network(format!("{}: {} {}", context, status, body)))
    }
}

/// Builds a `multipart/related` upload body (metadata part + content part).
fn multipart_related_body(metadata: &str, content: &str, boundary: &str) -> String {
    format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
         --{b}\r\nContent-Type: application/json\r\n\r\n{content}\r\n--{b}--",
        b = boundary,
        metadata = metadata,
        content = content,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn provider(auth_code: Option<String>) -> GoogleDriveProvider {
        let oauth = OauthApp {
            client_id: "client id".to_string(),
            client_secret: "secret".to_string(),
        };
        GoogleDriveProvider::new(oauth, DocumentStore::new(MemoryStore::new()), auth_code)
    }

    #[test]
    fn test_consent_url_encodes_parameters() {
        let oauth = OauthApp {
            client_id: "client id".to_string(),
            client_secret: "secret".to_string(),
        };
        let url = consent_url(&oauth);
        assert!(url.starts_with(AUTH_URL));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fdrive.appdata"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_related_body("{\"name\":\"f\"}", "{\"profiles\":{}}", "XYZ");
        assert!(body.starts_with("--XYZ\r\n"));
        assert!(body.ends_with("--XYZ--"));
        assert!(body.contains("{\"name\":\"f\"}"));
        assert!(body.contains("{\"profiles\":{}}"));
        assert_eq!(body.matches("--XYZ").count(), 3);
    }

    #[tokio::test]
    async fn test_authenticate_without_credential_fails() {
        let provider = provider(None);
        match provider.authenticate(false).await {
            Err(SyncError::Auth(msg)) => assert!(msg.contains("login")),
            other => panic!("expected Auth error, got {:?}", other.map(|i| i.account)),
        }
    }

    #[tokio::test]
    async fn test_interactive_without_code_fails() {
        let provider = provider(None);
        match provider.authenticate(true).await {
            Err(SyncError::Auth(msg)) => assert!(msg.contains("authorization code")),
            other => panic!("expected Auth error, got {:?}", other.map(|i| i.account)),
        }
    }

    #[test]
    fn test_token_application() {
        let token = TokenResponse {
            access_token: "at".to_string(),
            expires_in: 3600,
            refresh_token: Some("rt".to_string()),
        };
        let mut config = SyncConfig::new(ProviderKind::GoogleDrive);
        GoogleDriveProvider::apply_token(&mut config, &token, 1_000_000);

        assert_eq!(config.access_token.as_deref(), Some("at"));
        assert_eq!(config.refresh_token.as_deref(), Some("rt"));
        assert_eq!(config.token_expires_at, 1_000_000 + 3_600_000);

        // A refresh response without a refresh token keeps the stored one.
        let refresh_only = TokenResponse {
            access_token: "at2".to_string(),
            expires_in: 3600,
            refresh_token: None,
        };
        GoogleDriveProvider::apply_token(&mut config, &refresh_only, 2_000_000);
        assert_eq!(config.access_token.as_deref(), Some("at2"));
        assert_eq!(config.refresh_token.as_deref(), Some("rt"));
    }
}

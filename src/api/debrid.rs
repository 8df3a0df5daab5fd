//! Real-Debrid REST API client
//!
//! Typed binding to the endpoints the stream resolver and library need:
//! magnet submission, file selection, status, unrestricting, transcoding
//! lookup, instant availability and deletion.
//! API docs: https://api.real-debrid.com/

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Credentials, DEFAULT_API_BASE_URL};
use crate::models::{
    DebridUser, InfoHash, MagnetRequest, RemoteTorrent, TranscodeOptions, UnrestrictedLink,
};

/// Debrid API error types
#[derive(Error, Debug)]
pub enum DebridError {
    /// Malformed magnet link or hash; never retried
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Missing or rejected API token
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Non-2xx response from the provider
    #[error("API error: {status} - {body}")]
    Remote { status: u16, body: String },

    /// 2xx response whose content did not match what we expect
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Torrent did not reach a ready state in time; it may still complete server-side
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
}

impl DebridError {
    /// Provider-side failures (bad status or bad payload)
    pub fn is_remote(&self) -> bool {
        matches!(self, DebridError::Remote { .. } | DebridError::Decode(_))
    }

    /// Failures that may succeed if the user tries again later
    pub fn is_retryable_later(&self) -> bool {
        matches!(self, DebridError::Timeout(_) | DebridError::Network(_))
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            DebridError::Validation(msg) => format!("Please check your input: {}", msg),
            DebridError::Auth(_) => {
                "Real-Debrid rejected the request. Configure your API token in settings."
                    .to_string()
            }
            DebridError::Remote { status, body } => {
                format!("Real-Debrid returned an error ({}): {}", status, body)
            }
            DebridError::Decode(msg) => format!("Real-Debrid sent an unexpected response: {}", msg),
            DebridError::Timeout(_) => {
                "The torrent is still processing. Try again later.".to_string()
            }
            DebridError::Cancelled => "Cancelled.".to_string(),
            DebridError::Network(e) => format!("Could not reach Real-Debrid: {}", e),
        }
    }

    fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                DebridError::Auth(format!("{} - {}", status.as_u16(), body))
            }
            _ => DebridError::Remote {
                status: status.as_u16(),
                body,
            },
        }
    }
}

pub type DebridResult<T> = Result<T, DebridError>;

/// Real-Debrid API client
#[derive(Debug, Clone)]
pub struct DebridClient {
    credentials: Credentials,
    base_url: String,
    client: reqwest::Client,
}

impl DebridClient {
    /// Create a new client against the public API
    pub fn new(credentials: Credentials) -> Self {
        Self::with_base_url(credentials, DEFAULT_API_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(credentials: Credentials, base_url: impl Into<String>) -> Self {
        Self {
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Build an authenticated request; fails before any I/O without a token
    fn request(&self, method: Method, endpoint: &str) -> DebridResult<RequestBuilder> {
        let token = self
            .credentials
            .token()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DebridError::Auth("No API token configured".to_string()))?;

        let url = format!("{}{}", self.base_url, endpoint);
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header("Accept", "application/json"))
    }

    /// Send and return the body text of a successful response
    async fn send(&self, request: RequestBuilder) -> DebridResult<String> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(body)
        } else {
            debug!(status = status.as_u16(), "debrid API error response");
            Err(DebridError::from_status(status, body))
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> DebridResult<T> {
        let body = self.send(request).await?;
        serde_json::from_str(&body)
            .map_err(|e| DebridError::Decode(format!("JSON parse error: {}", e)))
    }

    /// Check that the configured token is accepted
    pub async fn verify_token(&self) -> bool {
        match self.user().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "token verification failed");
                false
            }
        }
    }

    /// Account information for the configured token
    pub async fn user(&self) -> DebridResult<DebridUser> {
        let request = self.request(Method::GET, "/user")?;
        self.send_json(request).await
    }

    /// Submit a magnet link; returns the new torrent id.
    ///
    /// The prefix check happens before any network call.
    pub async fn submit_magnet(&self, magnet: &str) -> DebridResult<String> {
        let magnet = MagnetRequest::parse(magnet).map_err(DebridError::Validation)?;

        #[derive(Deserialize)]
        struct AddMagnetResponse {
            id: String,
        }

        let request = self
            .request(Method::POST, "/torrents/addMagnet")?
            .form(&[("magnet", magnet.as_str())]);
        let response: AddMagnetResponse = self.send_json(request).await?;

        debug!(torrent_id = %response.id, "magnet submitted");
        Ok(response.id)
    }

    /// Mark files for download. `file_ids` is a comma-separated id list or `all`.
    pub async fn select_files(&self, torrent_id: &str, file_ids: &str) -> DebridResult<()> {
        let endpoint = format!("/torrents/selectFiles/{}", urlencoding::encode(torrent_id));
        let request = self
            .request(Method::POST, &endpoint)?
            .form(&[("files", file_ids)]);
        self.send(request).await?;
        Ok(())
    }

    /// Select every file of a torrent
    pub async fn select_all_files(&self, torrent_id: &str) -> DebridResult<()> {
        self.select_files(torrent_id, "all").await
    }

    /// Current state of a torrent
    pub async fn torrent_status(&self, torrent_id: &str) -> DebridResult<RemoteTorrent> {
        let endpoint = format!("/torrents/info/{}", urlencoding::encode(torrent_id));
        let request = self.request(Method::GET, &endpoint)?;
        self.send_json(request).await
    }

    /// Every torrent on the account
    pub async fn list_torrents(&self) -> DebridResult<Vec<RemoteTorrent>> {
        let request = self.request(Method::GET, "/torrents")?;
        let body = self.send(request).await?;

        // 204 with an empty body means no torrents
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&body)
            .map_err(|e| DebridError::Decode(format!("JSON parse error: {}", e)))
    }

    /// Resolve a link reference to a direct URL. Never cached: expiring URLs
    /// must be re-derived on every play attempt.
    pub async fn unrestrict(&self, link: &str) -> DebridResult<UnrestrictedLink> {
        let request = self
            .request(Method::POST, "/unrestrict/link")?
            .form(&[("link", link)]);
        self.send_json(request).await
    }

    /// Transcoding URLs for a file; fails when the file is not transcodable
    pub async fn transcode_options(&self, file_id: &str) -> DebridResult<TranscodeOptions> {
        let endpoint = format!("/streaming/transcode/{}", urlencoding::encode(file_id));
        let request = self.request(Method::GET, &endpoint)?;
        self.send_json(request).await
    }

    /// Whether the provider already caches the torrent behind a magnet link.
    ///
    /// A UI hint only. Provider failures are logged and reported as `false`;
    /// a magnet without an extractable hash fails with `Validation`.
    pub async fn instant_availability(&self, magnet: &str) -> DebridResult<bool> {
        let hash = InfoHash::from_magnet(magnet).ok_or_else(|| {
            DebridError::Validation("could not extract info hash from magnet link".to_string())
        })?;

        let endpoint = format!("/torrents/instantAvailability/{}", hash);
        let request = self.request(Method::GET, &endpoint)?;

        match self.send_json::<serde_json::Value>(request).await {
            Ok(data) => Ok(is_cached(&data, &hash)),
            Err(e @ DebridError::Auth(_)) => Err(e),
            Err(e) => {
                warn!(hash = %hash, error = %e, "instant availability check failed");
                Ok(false)
            }
        }
    }

    /// Remove a torrent. An already-deleted torrent counts as success.
    pub async fn delete_torrent(&self, torrent_id: &str) -> DebridResult<()> {
        let endpoint = format!("/torrents/delete/{}", urlencoding::encode(torrent_id));
        let request = self.request(Method::DELETE, &endpoint)?;

        match self.send(request).await {
            Ok(_) => Ok(()),
            Err(DebridError::Remote { status: 404, .. }) => {
                debug!(torrent_id, "torrent already deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// The provider answers `{hash: {host: [variants...]}}` when cached and
/// `{hash: []}` (or nothing) when not.
fn is_cached(data: &serde_json::Value, hash: &InfoHash) -> bool {
    data.get(hash.as_str())
        .and_then(|entry| entry.as_object())
        .map(|hosts| {
            hosts.values().any(|variants| match variants {
                serde_json::Value::Array(items) => !items.is_empty(),
                serde_json::Value::Object(items) => !items.is_empty(),
                _ => false,
            })
        })
        .unwrap_or(false)
}

//! qBittorrent WebUI (API v2) client.
//!
//! Authentication is cookie based. The session is acquired lazily on first
//! use and treated as revocable: a 403 on any call drops it, logs in again
//! and retries the call once before giving up with [`BackendError::AuthFailure`].

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::transfer::{TransferFile, TransferInfo};

/// Operations the reconciler and submission flow need from a torrent backend.
#[async_trait]
pub trait TorrentBackend: Send + Sync {
    /// Start fetching a magnet link. The backend does not hand back a hash;
    /// callers resolve it later through [`TorrentBackend::list_transfers`].
    async fn add_magnet(&self, magnet_link: &str, title: Option<&str>) -> Result<(), BackendError>;

    /// Snapshot of all transfers, or only those whose hash is in `hashes`
    /// (pipe-separated, as the API expects).
    async fn list_transfers(&self, hashes: Option<&str>) -> Result<Vec<TransferInfo>, BackendError>;

    async fn list_files(&self, hash: &str) -> Result<Vec<TransferFile>, BackendError>;

    async fn remove_transfer(&self, hash: &str, delete_files: bool) -> Result<(), BackendError>;

    /// Backend application version, used for health checks.
    async fn version(&self) -> Result<String, BackendError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("qBittorrent request failed: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("qBittorrent auth failed: {0}")]
    AuthFailure(String),

    #[error("Unexpected qBittorrent response: {0}")]
    Protocol(String),
}

/// Connection settings for [`QBitClient`].
#[derive(Debug, Clone)]
pub struct QBitSettings {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub category: String,
    pub downloads_path: String,
    pub timeout: Duration,
}

pub struct QBitClient {
    http: Client,
    api_url: String,
    settings: QBitSettings,
    authenticated: AtomicBool,
    login_lock: Mutex<()>,
}

fn is_ok_body(body: &str) -> bool {
    body.trim().eq_ignore_ascii_case("Ok.")
}

impl QBitClient {
    pub fn new(settings: QBitSettings) -> Result<Self, BackendError> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            http,
            api_url: format!("{}/api/v2", settings.base_url.trim_end_matches('/')),
            settings,
            authenticated: AtomicBool::new(false),
            login_lock: Mutex::new(()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Drop the cached session so the next call logs in again.
    pub fn invalidate_session(&self) {
        self.authenticated.store(false, Ordering::Release);
    }

    async fn ensure_session(&self) -> Result<(), BackendError> {
        if self.authenticated.load(Ordering::Acquire) {
            return Ok(());
        }

        let _guard = self.login_lock.lock().await;
        if self.authenticated.load(Ordering::Acquire) {
            return Ok(());
        }

        self.login().await?;
        self.authenticated.store(true, Ordering::Release);
        Ok(())
    }

    async fn login(&self) -> Result<(), BackendError> {
        debug!(user = %self.settings.username, "Logging in to qBittorrent");

        let response = self
            .http
            .post(self.url("/auth/login"))
            .form(&[
                ("username", self.settings.username.as_str()),
                ("password", self.settings.password.as_str()),
            ])
            .send()
            .await?;

        if response.status() == StatusCode::FORBIDDEN {
            return Err(BackendError::AuthFailure(
                "login forbidden (too many failed attempts?)".to_string(),
            ));
        }

        // Anything else outside 2xx (proxy errors, restarts) is a transport problem.
        let body = response.error_for_status()?.text().await?;
        if !is_ok_body(&body) {
            return Err(BackendError::AuthFailure(format!(
                "{}. Set the WebUI username/password in qBittorrent and make sure \
                 QBIT_USERNAME/QBIT_PASSWORD match",
                body.trim()
            )));
        }

        info!("Authenticated with qBittorrent");
        Ok(())
    }

    /// Send an authenticated request, re-authenticating once on 403.
    async fn send<F>(&self, build: F) -> Result<Response, BackendError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.ensure_session().await?;
        let response = build(&self.http).send().await?;
        if response.status() != StatusCode::FORBIDDEN {
            return Ok(response.error_for_status()?);
        }

        warn!("qBittorrent rejected the session, logging in again");
        self.invalidate_session();
        self.ensure_session().await?;

        let response = build(&self.http).send().await?;
        if response.status() == StatusCode::FORBIDDEN {
            self.invalidate_session();
            return Err(BackendError::AuthFailure(
                "session rejected right after logging in".to_string(),
            ));
        }

        Ok(response.error_for_status()?)
    }

    async fn get_json<T>(&self, build: impl Fn(&Client) -> RequestBuilder) -> Result<T, BackendError>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self.send(build).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| BackendError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl TorrentBackend for QBitClient {
    async fn add_magnet(&self, magnet_link: &str, title: Option<&str>) -> Result<(), BackendError> {
        let url = self.url("/torrents/add");
        let form = [
            ("urls", magnet_link),
            ("category", self.settings.category.as_str()),
            ("savepath", self.settings.downloads_path.as_str()),
        ];

        let response = self.send(|http| http.post(&url).form(&form)).await?;
        let body = response.text().await?;
        if !is_ok_body(&body) {
            warn!(body = %body.trim(), title = ?title, "qBittorrent add magnet response");
        }

        Ok(())
    }

    async fn list_transfers(&self, hashes: Option<&str>) -> Result<Vec<TransferInfo>, BackendError> {
        let url = self.url("/torrents/info");
        let filter = hashes.map(str::trim).filter(|h| !h.is_empty());

        self.get_json(|http| {
            let request = http.get(&url);
            match filter {
                Some(h) => request.query(&[("hashes", h)]),
                None => request,
            }
        })
        .await
    }

    async fn list_files(&self, hash: &str) -> Result<Vec<TransferFile>, BackendError> {
        let url = self.url("/torrents/files");
        self.get_json(|http| http.get(&url).query(&[("hash", hash)])).await
    }

    async fn remove_transfer(&self, hash: &str, delete_files: bool) -> Result<(), BackendError> {
        let url = self.url("/torrents/delete");
        let delete_files = if delete_files { "true" } else { "false" };
        let form = [("hashes", hash), ("deleteFiles", delete_files)];

        self.send(|http| http.post(&url).form(&form)).await?;
        Ok(())
    }

    async fn version(&self) -> Result<String, BackendError> {
        let url = self.url("/app/version");
        let response = self.send(|http| http.get(&url)).await?;
        Ok(response.text().await?.trim().to_string())
    }
}

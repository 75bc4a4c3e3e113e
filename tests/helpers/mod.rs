//! Test doubles shared by the integration tests.
//!
//! `FakeQbit` is a small axum app that speaks enough of the qBittorrent
//! WebUI API (cookie login, add/info/files/delete) to drive the real client.
//! `ScriptedBackend` and the recording collaborators run in-process for
//! reconciler tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use phono_intake::models::transfer::{TransferFile, TransferInfo};
use phono_intake::services::collaborators::{AudioCompressor, CatalogImporter, CollaboratorError};
use phono_intake::services::qbit::{BackendError, QBitClient, QBitSettings, TorrentBackend};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "adminadmin";
pub const CATEGORY: &str = "phono";

#[derive(Debug, Clone, PartialEq)]
pub struct AddedMagnet {
    pub urls: String,
    pub category: String,
    pub savepath: String,
}

#[derive(Debug)]
pub struct FakeQbitState {
    pub transfers: Vec<TransferInfo>,
    pub files: HashMap<String, Vec<TransferFile>>,
    pub added: Vec<AddedMagnet>,
    pub deleted: Vec<(String, String)>,
    pub logins: usize,
    pub valid_sid: Option<String>,
    pub add_response: String,
    pub password: String,
    /// Answer logins with 502, like a reverse proxy whose upstream is down.
    pub login_outage: bool,
}

impl Default for FakeQbitState {
    fn default() -> Self {
        Self {
            transfers: Vec::new(),
            files: HashMap::new(),
            added: Vec::new(),
            deleted: Vec::new(),
            logins: 0,
            valid_sid: None,
            add_response: "Ok.".to_string(),
            password: PASSWORD.to_string(),
            login_outage: false,
        }
    }
}

pub type SharedQbit = Arc<Mutex<FakeQbitState>>;

pub struct FakeQbit {
    pub base_url: String,
    pub state: SharedQbit,
}

impl FakeQbit {
    pub async fn start() -> Self {
        let state: SharedQbit = Arc::new(Mutex::new(FakeQbitState::default()));

        let app = Router::new()
            .route("/api/v2/auth/login", post(login))
            .route("/api/v2/app/version", get(version))
            .route("/api/v2/torrents/add", post(add))
            .route("/api/v2/torrents/info", get(info))
            .route("/api/v2/torrents/files", get(files))
            .route("/api/v2/torrents/delete", post(delete))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn client(&self) -> QBitClient {
        self.client_with_password(PASSWORD)
    }

    pub fn client_with_password(&self, password: &str) -> QBitClient {
        QBitClient::new(QBitSettings {
            base_url: self.base_url.clone(),
            username: USERNAME.to_string(),
            password: password.to_string(),
            category: CATEGORY.to_string(),
            downloads_path: "/downloads".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    pub fn set_transfers(&self, transfers: Vec<TransferInfo>) {
        self.state.lock().unwrap().transfers = transfers;
    }

    /// Forget the issued session, as qBittorrent does when it restarts.
    pub fn expire_session(&self) {
        self.state.lock().unwrap().valid_sid = None;
    }
}

fn authorized(state: &FakeQbitState, headers: &HeaderMap) -> bool {
    let Some(valid) = state.valid_sid.as_deref() else {
        return false;
    };
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .any(|pair| pair.trim() == format!("SID={}", valid))
}

async fn login(State(state): State<SharedQbit>, Form(form): Form<HashMap<String, String>>) -> Response {
    let mut state = state.lock().unwrap();
    if state.login_outage {
        return StatusCode::BAD_GATEWAY.into_response();
    }
    let ok = form.get("username").map(String::as_str) == Some(USERNAME)
        && form.get("password") == Some(&state.password);
    if !ok {
        return "Fails.".into_response();
    }

    state.logins += 1;
    let sid = format!("sid{}", state.logins);
    state.valid_sid = Some(sid.clone());
    (
        [(header::SET_COOKIE, format!("SID={}; path=/; HttpOnly", sid))],
        "Ok.",
    )
        .into_response()
}

async fn version(State(state): State<SharedQbit>, headers: HeaderMap) -> Response {
    if !authorized(&state.lock().unwrap(), &headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    "v4.6.4".into_response()
}

async fn add(
    State(state): State<SharedQbit>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    if !authorized(&state, &headers) {
        return StatusCode::FORBIDDEN.into_response();
    }

    state.added.push(AddedMagnet {
        urls: form.get("urls").cloned().unwrap_or_default(),
        category: form.get("category").cloned().unwrap_or_default(),
        savepath: form.get("savepath").cloned().unwrap_or_default(),
    });
    state.add_response.clone().into_response()
}

async fn info(
    State(state): State<SharedQbit>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let state = state.lock().unwrap();
    if !authorized(&state, &headers) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let transfers: Vec<TransferInfo> = match query.get("hashes") {
        Some(hashes) => {
            let wanted: Vec<&str> = hashes.split('|').collect();
            state
                .transfers
                .iter()
                .filter(|t| wanted.contains(&t.hash.as_str()))
                .cloned()
                .collect()
        }
        None => state.transfers.clone(),
    };
    Json(transfers).into_response()
}

async fn files(
    State(state): State<SharedQbit>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let state = state.lock().unwrap();
    if !authorized(&state, &headers) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let hash = query.get("hash").cloned().unwrap_or_default();
    match state.files.get(&hash) {
        Some(files) => Json(files.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete(
    State(state): State<SharedQbit>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    if !authorized(&state, &headers) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let hash = form.get("hashes").cloned().unwrap_or_default();
    let delete_files = form.get("deleteFiles").cloned().unwrap_or_default();
    state.transfers.retain(|t| t.hash != hash);
    state.deleted.push((hash, delete_files));
    StatusCode::OK.into_response()
}

pub fn transfer(hash: &str, name: &str, state: &str, progress: f64, seeders: i32) -> TransferInfo {
    TransferInfo {
        hash: hash.to_string(),
        name: name.to_string(),
        state: state.to_string(),
        progress,
        download_rate: 1024,
        seeders,
        content_path: format!("/downloads/{}", name),
        save_path: "/downloads".to_string(),
        category: CATEGORY.to_string(),
    }
}

/// In-process backend whose snapshot is set by the test.
#[derive(Default)]
pub struct ScriptedBackend {
    pub transfers: Mutex<Vec<TransferInfo>>,
    pub removed: Mutex<Vec<(String, bool)>>,
    pub added: Mutex<Vec<String>>,
    pub fail_listing: Mutex<bool>,
    pub fail_add: Mutex<bool>,
    /// When set, `remove_transfer` is refused with this auth failure text.
    pub refuse_remove: Mutex<Option<String>>,
    pub list_calls: Mutex<usize>,
}

impl ScriptedBackend {
    pub fn set_transfers(&self, transfers: Vec<TransferInfo>) {
        *self.transfers.lock().unwrap() = transfers;
    }

    pub fn removed(&self) -> Vec<(String, bool)> {
        self.removed.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }
}

#[async_trait]
impl TorrentBackend for ScriptedBackend {
    async fn add_magnet(&self, magnet_link: &str, _title: Option<&str>) -> Result<(), BackendError> {
        if *self.fail_add.lock().unwrap() {
            return Err(BackendError::AuthFailure("Fails.".to_string()));
        }
        self.added.lock().unwrap().push(magnet_link.to_string());
        Ok(())
    }

    async fn list_transfers(&self, _hashes: Option<&str>) -> Result<Vec<TransferInfo>, BackendError> {
        *self.list_calls.lock().unwrap() += 1;
        if *self.fail_listing.lock().unwrap() {
            return Err(BackendError::Protocol("connection reset".to_string()));
        }
        Ok(self.transfers.lock().unwrap().clone())
    }

    async fn list_files(&self, _hash: &str) -> Result<Vec<TransferFile>, BackendError> {
        Ok(Vec::new())
    }

    async fn remove_transfer(&self, hash: &str, delete_files: bool) -> Result<(), BackendError> {
        if let Some(reason) = self.refuse_remove.lock().unwrap().clone() {
            return Err(BackendError::AuthFailure(reason));
        }
        self.removed.lock().unwrap().push((hash.to_string(), delete_files));
        self.transfers.lock().unwrap().retain(|t| t.hash != hash);
        Ok(())
    }

    async fn version(&self) -> Result<String, BackendError> {
        Ok("scripted".to_string())
    }
}

/// Records every call; optionally fails for one file name.
#[derive(Default)]
pub struct RecordingCollaborators {
    pub compressed: Mutex<Vec<String>>,
    pub imported: Mutex<Vec<String>>,
    pub fail_compress: Option<String>,
}

impl RecordingCollaborators {
    pub fn imported(&self) -> Vec<String> {
        self.imported.lock().unwrap().clone()
    }

    pub fn compressed(&self) -> Vec<String> {
        self.compressed.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioCompressor for RecordingCollaborators {
    async fn compress(&self, file_name: &str) -> Result<String, CollaboratorError> {
        if self.fail_compress.as_deref() == Some(file_name) {
            return Err(CollaboratorError::Compression {
                file: file_name.to_string(),
                reason: "encoder crashed".to_string(),
            });
        }
        self.compressed.lock().unwrap().push(file_name.to_string());
        Ok(file_name.to_string())
    }
}

#[async_trait]
impl CatalogImporter for RecordingCollaborators {
    async fn import(&self, file_name: &str) -> Result<(), CollaboratorError> {
        self.imported.lock().unwrap().push(file_name.to_string());
        Ok(())
    }
}

pub fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"audio").unwrap();
}

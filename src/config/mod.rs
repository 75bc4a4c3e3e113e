use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Unused by the worker.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// qBittorrent WebUI base URL, without the `/api/v2` suffix
    #[serde(default = "default_qbit_base_url")]
    pub qbit_base_url: String,

    #[serde(default = "default_qbit_username")]
    pub qbit_username: String,

    #[serde(default = "default_qbit_password")]
    pub qbit_password: String,

    /// Category tag put on every added torrent and used when matching by title
    #[serde(default = "default_qbit_category")]
    pub qbit_category: String,

    /// Downloads root as qBittorrent sees it
    #[serde(default = "default_qbit_downloads_path")]
    pub qbit_downloads_path: String,

    /// The same downloads root as mounted locally
    #[serde(default = "default_incoming_path")]
    pub incoming_path: PathBuf,

    /// Directory finished audio files are moved into
    #[serde(default = "default_intake_dir")]
    pub intake_dir: PathBuf,

    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,

    #[serde(default = "default_stall_minutes")]
    pub stall_minutes: u64,

    /// Per-request timeout for backend calls
    #[serde(default = "default_qbit_timeout_secs")]
    pub qbit_timeout_secs: u64,

    /// Optional endpoint notified for every imported file
    #[serde(default)]
    pub catalog_import_url: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_qbit_base_url() -> String {
    "http://qbittorrent:8080".to_string()
}

fn default_qbit_username() -> String {
    "admin".to_string()
}

fn default_qbit_password() -> String {
    "adminadmin".to_string()
}

fn default_qbit_category() -> String {
    "phono".to_string()
}

fn default_qbit_downloads_path() -> String {
    "/downloads".to_string()
}

fn default_incoming_path() -> PathBuf {
    PathBuf::from("/app/incoming")
}

fn default_intake_dir() -> PathBuf {
    PathBuf::from("wwwroot/uploads")
}

fn default_poll_seconds() -> u64 {
    10
}

fn default_stall_minutes() -> u64 {
    30
}

fn default_qbit_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_seconds.max(1))
    }

    pub fn stall_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.stall_minutes as i64)
    }

    pub fn qbit_timeout(&self) -> Duration {
        Duration::from_secs(self.qbit_timeout_secs)
    }
}

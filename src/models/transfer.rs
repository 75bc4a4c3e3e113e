use serde::{Deserialize, Serialize};

/// One torrent as reported by `GET /torrents/info`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransferInfo {
    pub hash: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
    /// Fraction in [0, 1].
    #[serde(default)]
    pub progress: f64,
    #[serde(default, rename = "dlspeed")]
    pub download_rate: i64,
    #[serde(default, rename = "num_seeds")]
    pub seeders: i32,
    #[serde(default)]
    pub content_path: String,
    #[serde(default)]
    pub save_path: String,
    #[serde(default)]
    pub category: String,
}

impl TransferInfo {
    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }

    /// Where the finished payload lives on the backend's filesystem.
    ///
    /// Older backends leave `content_path` empty; fall back to `save_path/name`.
    pub fn payload_path(&self) -> String {
        if !self.content_path.trim().is_empty() {
            return self.content_path.clone();
        }
        if self.save_path.is_empty() {
            return self.name.clone();
        }
        format!("{}/{}", self.save_path.trim_end_matches(['/', '\\']), self.name)
    }
}

/// A file inside a torrent, from `GET /torrents/files`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferFile {
    pub name: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub progress: f64,
}

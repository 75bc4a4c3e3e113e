use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Status of a download job as seen by users and the reconciler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Downloading,
    Processing,
    Completed,
    Failed,
    Stalled,
}

impl JobStatus {
    /// Completed and Failed jobs are never touched by the reconciler again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A magnet download tracked from submission until its audio is imported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadJob {
    pub id: Uuid,
    pub magnet_link: String,
    /// Torrent hash, set once the job has been matched to a transfer.
    pub transfer_handle: Option<String>,
    pub title: Option<String>,
    pub status: JobStatus,
    pub progress_percent: f64,
    /// Bytes per second, as last reported by the backend.
    pub download_rate: i64,
    pub seeder_count: i32,
    pub error_message: Option<String>,
    pub last_progress_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DownloadJob {
    /// A freshly submitted job in the Queued state.
    pub fn new(magnet_link: impl Into<String>, title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            magnet_link: magnet_link.into(),
            transfer_handle: None,
            title,
            status: JobStatus::Queued,
            progress_percent: 0.0,
            download_rate: 0,
            seeder_count: 0,
            error_message: None,
            last_progress_at: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Mark the job failed with a message. `completed_at` stays unset.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
    }
}

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::DownloadJob;

/// Request to start downloading a magnet link.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitDownloadRequest {
    #[garde(length(min = 1, max = 8192), custom(is_magnet_link))]
    pub magnet_link: String,

    #[garde(length(max = 500))]
    pub title: Option<String>,
}

fn is_magnet_link(value: &String, _ctx: &()) -> garde::Result {
    if value.trim_start().starts_with("magnet:?") {
        Ok(())
    } else {
        Err(garde::Error::new("not a magnet link"))
    }
}

/// Response after a download was submitted to the backend.
#[derive(Debug, Serialize)]
pub struct SubmitDownloadResponse {
    pub job_id: Uuid,
    pub status: String,
    pub message: String,
}

/// Job status as shown on the downloads page.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub title: Option<String>,
    pub status: String,
    pub progress: f64,
    pub download_rate: i64,
    pub seeders: i32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<DownloadJob> for JobStatusResponse {
    fn from(job: DownloadJob) -> Self {
        Self {
            job_id: job.id,
            title: job.title,
            status: job.status.to_string(),
            progress: job.progress_percent,
            download_rate: job.download_rate,
            seeders: job.seeder_count,
            error: job.error_message,
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
        }
    }
}

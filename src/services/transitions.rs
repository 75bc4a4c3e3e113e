//! Pure job state machine.
//!
//! Given a job and what the backend currently reports for its transfer,
//! [`transition`] decides the next status and error message and whether the
//! file pipeline must run. Precedence, highest first:
//!
//! 1. transfer progress reached 100%: Processing + run pipeline
//! 2. stalled without seeders past the stall timeout: Failed
//! 3. coarse backend state (see [`map_backend_state`]), with the
//!    "waiting for seeders" advisory attached or cleared

use chrono::{DateTime, Duration, Utc};

use crate::models::job::{DownloadJob, JobStatus};
use crate::models::transfer::TransferInfo;

pub const WAITING_FOR_SEEDERS: &str = "Waiting for active seeders.";
pub const STALLED_NO_SEEDERS: &str = "Download stalled: No active seeders found.";

/// Map a qBittorrent torrent state onto a job status.
///
/// Unknown states count as Downloading so a job never sits in Queued once
/// its transfer is visible.
pub fn map_backend_state(state: &str) -> JobStatus {
    if state.trim().is_empty() {
        return JobStatus::Queued;
    }

    match state {
        "error" | "missingFiles" => JobStatus::Failed,
        "stalledDL" | "pausedDL" => JobStatus::Stalled,
        "queuedDL" => JobStatus::Queued,
        "checkingDL" | "downloading" | "forcedDL" => JobStatus::Downloading,
        "uploading" | "stalledUP" | "queuedUP" => JobStatus::Processing,
        _ => JobStatus::Downloading,
    }
}

/// Fraction in [0, 1] to a percentage rounded to two decimals.
pub fn progress_percent(fraction: f64) -> f64 {
    let percent = (fraction * 100.0).clamp(0.0, 100.0);
    (percent * 100.0).round() / 100.0
}

/// What one poll saw for a transfer.
#[derive(Debug, Clone, Copy)]
pub struct Signal<'a> {
    pub state: &'a str,
    pub progress: f64,
    pub seeders: i32,
}

impl<'a> From<&'a TransferInfo> for Signal<'a> {
    fn from(transfer: &'a TransferInfo) -> Self {
        Self {
            state: &transfer.state,
            progress: transfer.progress,
            seeders: transfer.seeders,
        }
    }
}

/// Side effect the caller must perform after applying a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Persist the Processing state, then run the file pipeline.
    RunPipeline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub effect: Option<Effect>,
}

impl Transition {
    pub fn apply(self, job: &mut DownloadJob) -> Option<Effect> {
        job.status = self.status;
        job.error_message = self.error_message;
        self.effect
    }
}

/// Copy telemetry from the transfer onto the job.
///
/// Adopts the transfer hash if the job has none yet; an existing hash is
/// never replaced. `last_progress_at` only moves when progress strictly grows.
pub fn observe(job: &mut DownloadJob, transfer: &TransferInfo, now: DateTime<Utc>) {
    let previous = job.progress_percent;

    if job.transfer_handle.is_none() {
        job.transfer_handle = Some(transfer.hash.clone());
    }
    job.progress_percent = progress_percent(transfer.progress);
    job.download_rate = transfer.download_rate;
    job.seeder_count = transfer.seeders;
    if job.progress_percent > previous {
        job.last_progress_at = Some(now);
    }
    job.updated_at = now;
}

/// Decide the next state of `job` for the observed `signal`.
///
/// `job` is expected to already carry the telemetry of this poll (see
/// [`observe`]), since stall detection reads `last_progress_at` from it.
pub fn transition(
    job: &DownloadJob,
    signal: Signal<'_>,
    now: DateTime<Utc>,
    stall_timeout: Duration,
) -> Transition {
    if signal.progress >= 1.0 {
        return Transition {
            status: JobStatus::Processing,
            error_message: None,
            effect: Some(Effect::RunPipeline),
        };
    }

    let status = map_backend_state(signal.state);
    let is_advisory = job.error_message.as_deref() == Some(WAITING_FOR_SEEDERS);
    let mut error_message = job.error_message.clone();

    if status == JobStatus::Failed && (error_message.is_none() || is_advisory) {
        error_message = Some(format!("Torrent error: {}", signal.state));
    }

    let starved = status == JobStatus::Stalled && signal.seeders == 0;
    if starved {
        let stalled_since = job.last_progress_at.unwrap_or(job.created_at);
        if now - stalled_since > stall_timeout {
            return Transition {
                status: JobStatus::Failed,
                error_message: Some(STALLED_NO_SEEDERS.to_string()),
                effect: None,
            };
        }
        error_message.get_or_insert_with(|| WAITING_FOR_SEEDERS.to_string());
    } else if is_advisory && status != JobStatus::Failed {
        error_message = None;
    }

    if !matches!(status, JobStatus::Failed | JobStatus::Stalled) {
        error_message = None;
    }

    Transition {
        status,
        error_message,
        effect: None,
    }
}

/// Case-insensitive comparison that also folds non-ASCII letters.
fn same_text(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

/// Find the transfer a job belongs to.
///
/// Once a job has a hash it is matched by hash only, even if the transfer has
/// since been renamed. Before that, the job title must equal the transfer
/// name and the transfer must carry `category`.
pub fn resolve_transfer<'a>(
    job: &DownloadJob,
    transfers: &'a [TransferInfo],
    category: &str,
) -> Option<&'a TransferInfo> {
    if let Some(handle) = job.transfer_handle.as_deref().filter(|h| !h.trim().is_empty()) {
        return transfers.iter().find(|t| t.hash.eq_ignore_ascii_case(handle));
    }

    find_by_title(job.title.as_deref()?, transfers, category)
}

pub fn find_by_title<'a>(
    title: &str,
    transfers: &'a [TransferInfo],
    category: &str,
) -> Option<&'a TransferInfo> {
    let title = title.trim();
    if title.is_empty() {
        return None;
    }

    transfers
        .iter()
        .find(|t| same_text(&t.name, title) && same_text(&t.category, category))
}

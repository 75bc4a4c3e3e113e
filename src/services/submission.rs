use chrono::Utc;

use super::qbit::{BackendError, TorrentBackend};
use super::transitions;
use crate::db::{JobStore, StoreError};
use crate::models::job::{DownloadJob, JobStatus};

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Magnet link was missing.")]
    MissingMagnet,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to start download: {source}")]
    Backend {
        job: Box<DownloadJob>,
        #[source]
        source: BackendError,
    },
}

/// Record a new job and hand the magnet link to the backend.
///
/// If the backend call fails the job is stored as Failed and the error is
/// returned together with it. When a title is given, the freshly added
/// transfer is looked up once so the job shows progress before the next
/// reconciler tick.
pub async fn submit_download(
    store: &dyn JobStore,
    backend: &dyn TorrentBackend,
    category: &str,
    magnet_link: &str,
    title: Option<&str>,
) -> Result<DownloadJob, SubmitError> {
    let magnet_link = magnet_link.trim();
    if magnet_link.is_empty() {
        return Err(SubmitError::MissingMagnet);
    }

    let title = title.map(str::trim).filter(|t| !t.is_empty());
    let mut job = DownloadJob::new(magnet_link, title.map(str::to_string));
    store.create(&job).await?;

    metrics::counter!("downloads_jobs_submitted").increment(1);
    tracing::info!(job_id = %job.id, title = ?job.title, "Download job created");

    if let Err(e) = start_transfer(backend, category, &mut job).await {
        tracing::error!(job_id = %job.id, error = %e, "Failed to start download");
        job.fail(e.to_string());
        store.update(&job).await?;
        return Err(SubmitError::Backend {
            job: Box::new(job),
            source: e,
        });
    }

    store.update(&job).await?;
    Ok(job)
}

async fn start_transfer(
    backend: &dyn TorrentBackend,
    category: &str,
    job: &mut DownloadJob,
) -> Result<(), BackendError> {
    backend.add_magnet(&job.magnet_link, job.title.as_deref()).await?;

    let Some(title) = job.title.clone() else {
        return Ok(());
    };

    let transfers = backend.list_transfers(None).await?;
    if let Some(transfer) = transitions::find_by_title(&title, &transfers, category) {
        let now = Utc::now();
        transitions::observe(job, transfer, now);
        job.status = if transfer.is_complete() {
            JobStatus::Processing
        } else {
            JobStatus::Downloading
        };

        tracing::debug!(job_id = %job.id, hash = %transfer.hash, "Pre-resolved transfer");
    }

    Ok(())
}

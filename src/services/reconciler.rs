//! Background reconciliation of download jobs against qBittorrent.
//!
//! One tick loads every active job, takes a single snapshot of the backend's
//! transfers and walks the jobs oldest first, persisting each one as soon as
//! it has been handled. Ticks never overlap and jobs are handled one at a
//! time, so the reconciler is the only writer of a job after submission.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::pipeline::{FilePipeline, PipelineError};
use super::qbit::{BackendError, TorrentBackend};
use super::transitions::{self, Effect, Signal};
use crate::db::{JobStore, StoreError};
use crate::models::job::{DownloadJob, JobStatus};
use crate::models::transfer::TransferInfo;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Category a transfer must carry to be matched by title.
    pub category: String,
    pub poll_interval: Duration,
    pub stall_timeout: chrono::Duration,
}

/// Counts for one tick, mostly for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub active: usize,
    pub matched: usize,
    pub completed: usize,
    pub failed: usize,
    /// True when shutdown interrupted the tick before every job was handled.
    pub interrupted: bool,
}

/// How handling a single job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Unmatched,
    Advanced,
    Completed,
    Failed,
}

pub struct Reconciler {
    store: Arc<dyn JobStore>,
    backend: Arc<dyn TorrentBackend>,
    pipeline: Arc<FilePipeline>,
    settings: ReconcilerSettings,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn JobStore>,
        backend: Arc<dyn TorrentBackend>,
        pipeline: Arc<FilePipeline>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            store,
            backend,
            pipeline,
            settings,
        }
    }

    /// Tick every `poll_interval` until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            "Reconciler starting (poll_interval={}s, stall_timeout={}m)",
            self.settings.poll_interval.as_secs(),
            self.settings.stall_timeout.num_minutes()
        );

        while !shutdown.is_cancelled() {
            match self.tick(&shutdown).await {
                Ok(summary) if summary.active > 0 => {
                    debug!(
                        active = summary.active,
                        matched = summary.matched,
                        completed = summary.completed,
                        failed = summary.failed,
                        "Reconcile tick finished"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Error while reconciling download jobs");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                _ = shutdown.cancelled() => {}
            }
        }

        info!("Reconciler stopped");
    }

    /// Run one reconciliation pass.
    ///
    /// Fails only when the active jobs or the transfer snapshot cannot be
    /// loaded; in that case no job is touched. Errors for individual jobs are
    /// recorded on those jobs.
    pub async fn tick(&self, shutdown: &CancellationToken) -> Result<TickSummary, ReconcileError> {
        metrics::counter!("downloads_reconcile_ticks").increment(1);

        let jobs = self.store.list_active().await?;
        metrics::gauge!("downloads_active_jobs").set(jobs.len() as f64);

        let mut summary = TickSummary {
            active: jobs.len(),
            ..Default::default()
        };
        if jobs.is_empty() {
            return Ok(summary);
        }

        let transfers = self.backend.list_transfers(None).await?;
        debug!(jobs = jobs.len(), transfers = transfers.len(), "Reconciling download jobs");

        for mut job in jobs {
            if shutdown.is_cancelled() {
                info!("Shutdown requested, leaving remaining jobs for the next run");
                summary.interrupted = true;
                break;
            }

            let outcome = match self.process_job(&mut job, &transfers).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "Failed processing download job");
                    job.fail(e.to_string());
                    JobOutcome::Failed
                }
            };

            match outcome {
                JobOutcome::Unmatched => {}
                JobOutcome::Advanced => summary.matched += 1,
                JobOutcome::Completed => {
                    summary.matched += 1;
                    summary.completed += 1;
                    metrics::counter!("downloads_jobs_completed").increment(1);
                }
                JobOutcome::Failed => {
                    summary.matched += 1;
                    summary.failed += 1;
                    metrics::counter!("downloads_jobs_failed").increment(1);
                }
            }

            if let Err(e) = self.store.update(&job).await {
                error!(job_id = %job.id, error = %e, "Failed to persist download job");
            }
        }

        Ok(summary)
    }

    async fn process_job(
        &self,
        job: &mut DownloadJob,
        transfers: &[TransferInfo],
    ) -> Result<JobOutcome, ReconcileError> {
        let now = Utc::now();
        let Some(transfer) = transitions::resolve_transfer(job, transfers, &self.settings.category)
        else {
            job.updated_at = now;
            return Ok(JobOutcome::Unmatched);
        };

        let previous_status = job.status;
        transitions::observe(job, transfer, now);
        let effect = transitions::transition(
            job,
            Signal::from(transfer),
            now,
            self.settings.stall_timeout,
        )
        .apply(job);

        if job.status != previous_status {
            info!(
                job_id = %job.id,
                hash = %transfer.hash,
                from = %previous_status,
                to = %job.status,
                progress = job.progress_percent,
                "Download job changed state"
            );
        }

        match effect {
            Some(Effect::RunPipeline) => self.finish(job, transfer).await,
            None if job.status == JobStatus::Failed => Ok(JobOutcome::Failed),
            None => Ok(JobOutcome::Advanced),
        }
    }

    /// Import the finished download and clean up the transfer.
    async fn finish(
        &self,
        job: &mut DownloadJob,
        transfer: &TransferInfo,
    ) -> Result<JobOutcome, ReconcileError> {
        // Observers should see "processing" while files are being moved.
        self.store.update(job).await?;

        let payload = transfer.payload_path();
        match self.pipeline.process(&payload).await {
            Ok(result) => {
                match self.backend.remove_transfer(&transfer.hash, true).await {
                    Ok(()) => {}
                    // Transport errors are not fatal; the transfer is left behind.
                    Err(e @ BackendError::Unavailable(_)) => {
                        warn!(
                            job_id = %job.id,
                            hash = %transfer.hash,
                            error = %e,
                            "Imported files but could not reach qBittorrent to remove the transfer"
                        );
                    }
                    Err(e) => {
                        error!(
                            job_id = %job.id,
                            hash = %transfer.hash,
                            error = %e,
                            "qBittorrent refused to remove the transfer"
                        );
                        job.fail(e.to_string());
                        return Ok(JobOutcome::Failed);
                    }
                }

                let now = Utc::now();
                job.status = JobStatus::Completed;
                job.completed_at = Some(now);
                job.updated_at = now;
                job.error_message = None;

                info!(
                    job_id = %job.id,
                    hash = %transfer.hash,
                    files = result.files.len(),
                    "Download job completed"
                );
                Ok(JobOutcome::Completed)
            }
            Err(e) => {
                // The transfer is kept so its data can be recovered by hand.
                warn!(job_id = %job.id, path = %payload, error = %e, "File pipeline failed");
                job.fail(e.to_string());
                Ok(JobOutcome::Failed)
            }
        }
    }
}

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use crate::models::job::DownloadJob;

pub mod memory;
pub mod queries;

pub use memory::MemoryJobStore;
pub use queries::PgJobStore;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Corrupt job row: {0}")]
    Corrupt(String),
}

/// Durable collection of download jobs.
///
/// The reconciler is the only writer after creation, so implementations need
/// no row-level locking.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &DownloadJob) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<DownloadJob>, StoreError>;

    /// All jobs, newest first.
    async fn list(&self) -> Result<Vec<DownloadJob>, StoreError>;

    /// Jobs that are neither Completed nor Failed, oldest first.
    async fn list_active(&self) -> Result<Vec<DownloadJob>, StoreError>;

    /// Overwrite every mutable column of an existing job.
    async fn update(&self, job: &DownloadJob) -> Result<(), StoreError>;

    /// Connectivity check for health endpoints.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

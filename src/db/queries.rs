use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use super::{JobStore, StoreError};
use crate::models::job::{DownloadJob, JobStatus};

const JOB_COLUMNS: &str = r#"
    id, magnet_link, transfer_handle, title, status, progress_percent,
    download_rate, seeder_count, error_message, last_progress_at,
    created_at, updated_at, completed_at
"#;

/// Postgres-backed job store over the `download_jobs` table.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn job_from_row(row: &PgRow) -> Result<DownloadJob, StoreError> {
    let status_str: String = row.try_get("status")?;
    let status = JobStatus::from_str(&status_str)
        .map_err(|_| StoreError::Corrupt(format!("unknown status '{}'", status_str)))?;

    Ok(DownloadJob {
        id: row.try_get("id")?,
        magnet_link: row.try_get("magnet_link")?,
        transfer_handle: row.try_get("transfer_handle")?,
        title: row.try_get("title")?,
        status,
        progress_percent: row.try_get("progress_percent")?,
        download_rate: row.try_get("download_rate")?,
        seeder_count: row.try_get("seeder_count")?,
        error_message: row.try_get("error_message")?,
        last_progress_at: row.try_get("last_progress_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: &DownloadJob) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO download_jobs (
                id, magnet_link, transfer_handle, title, status, progress_percent,
                download_rate, seeder_count, error_message, last_progress_at,
                created_at, updated_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(job.id)
        .bind(&job.magnet_link)
        .bind(&job.transfer_handle)
        .bind(&job.title)
        .bind(job.status.to_string())
        .bind(job.progress_percent)
        .bind(job.download_rate)
        .bind(job.seeder_count)
        .bind(&job.error_message)
        .bind(job.last_progress_at)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DownloadJob>, StoreError> {
        let sql = format!("SELECT {} FROM download_jobs WHERE id = $1", JOB_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<DownloadJob>, StoreError> {
        let sql = format!(
            "SELECT {} FROM download_jobs ORDER BY created_at DESC",
            JOB_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn list_active(&self) -> Result<Vec<DownloadJob>, StoreError> {
        let sql = format!(
            "SELECT {} FROM download_jobs \
             WHERE status NOT IN ('completed', 'failed') \
             ORDER BY created_at ASC",
            JOB_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn update(&self, job: &DownloadJob) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE download_jobs
            SET transfer_handle = $1,
                title = $2,
                status = $3,
                progress_percent = $4,
                download_rate = $5,
                seeder_count = $6,
                error_message = $7,
                last_progress_at = $8,
                updated_at = $9,
                completed_at = $10
            WHERE id = $11
            "#,
        )
        .bind(&job.transfer_handle)
        .bind(&job.title)
        .bind(job.status.to_string())
        .bind(job.progress_percent)
        .bind(job.download_rate)
        .bind(job.seeder_count)
        .bind(&job.error_message)
        .bind(job.last_progress_at)
        .bind(job.updated_at)
        .bind(job.completed_at)
        .bind(job.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(job.id));
        }

        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

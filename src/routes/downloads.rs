use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::Validate;
use serde_json::json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::StoreError;
use crate::models::download::{JobStatusResponse, SubmitDownloadRequest, SubmitDownloadResponse};
use crate::models::transfer::TransferFile;
use crate::services::qbit::BackendError;
use crate::services::submission::{self, SubmitError};

/// Error body returned by the downloads API.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "Job store error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Job store unavailable")
    }
}

impl From<BackendError> for ApiError {
    fn from(e: BackendError) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, e.to_string())
    }
}

impl From<SubmitError> for ApiError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::MissingMagnet => Self::new(StatusCode::BAD_REQUEST, e.to_string()),
            SubmitError::Store(inner) => inner.into(),
            SubmitError::Backend { .. } => Self::new(StatusCode::BAD_GATEWAY, e.to_string()),
        }
    }
}

/// POST /api/v1/downloads: Queue a magnet link for download.
pub async fn submit_download(
    State(state): State<AppState>,
    Json(request): Json<SubmitDownloadRequest>,
) -> Result<(StatusCode, Json<SubmitDownloadResponse>), ApiError> {
    request
        .validate()
        .map_err(|report| ApiError::new(StatusCode::BAD_REQUEST, report.to_string()))?;

    let job = submission::submit_download(
        state.store.as_ref(),
        state.backend.as_ref(),
        &state.category,
        &request.magnet_link,
        request.title.as_deref(),
    )
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitDownloadResponse {
            job_id: job.id,
            status: job.status.to_string(),
            message: "Download queued. Track status in Downloads.".to_string(),
        }),
    ))
}

/// GET /api/v1/downloads: All jobs, newest first.
pub async fn list_downloads(
    State(state): State<AppState>,
) -> Result<Json<Vec<JobStatusResponse>>, ApiError> {
    let jobs = state.store.list().await?;
    Ok(Json(jobs.into_iter().map(JobStatusResponse::from).collect()))
}

/// GET /api/v1/downloads/{job_id}: Status of one job.
pub async fn get_download(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = state
        .store
        .get(job_id)
        .await?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Download not found"))?;

    Ok(Json(job.into()))
}

/// GET /api/v1/downloads/{job_id}/files: Files of the job's transfer, live
/// from qBittorrent.
pub async fn get_download_files(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Vec<TransferFile>>, ApiError> {
    let job = state
        .store
        .get(job_id)
        .await?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Download not found"))?;

    let handle = job.transfer_handle.ok_or_else(|| {
        ApiError::new(StatusCode::CONFLICT, "Download has not been matched to a torrent yet")
    })?;

    Ok(Json(state.backend.list_files(&handle).await?))
}

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

pub mod downloads;
pub mod health;

/// Build the HTTP API. The Prometheus handle is optional so tests can skip
/// installing a global recorder.
pub fn router(state: AppState, prometheus: Option<Arc<PrometheusHandle>>) -> Router {
    let api = Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api/v1/downloads",
            get(downloads::list_downloads).post(downloads::submit_download),
        )
        .route("/api/v1/downloads/{job_id}", get(downloads::get_download))
        .route(
            "/api/v1/downloads/{job_id}/files",
            get(downloads::get_download_files),
        )
        .with_state(state);

    let app = match prometheus {
        Some(handle) => api.route("/metrics", get(prometheus_metrics).with_state(handle)),
        None => api,
    };

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// GET /metrics: Prometheus text exposition.
async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> String {
    handle.render()
}

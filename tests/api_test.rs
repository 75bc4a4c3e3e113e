//! Submission flow and the HTTP API over an in-memory store.

mod helpers;

use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use helpers::*;
use phono_intake::app_state::AppState;
use phono_intake::db::{JobStore, MemoryJobStore};
use phono_intake::models::job::JobStatus;
use phono_intake::routes;
use phono_intake::services::submission::{submit_download, SubmitError};

const MAGNET: &str = "magnet:?xt=urn:btih:0123456789abcdef";

async fn serve(store: Arc<MemoryJobStore>, backend: Arc<ScriptedBackend>) -> String {
    let state = AppState::new(store, backend, CATEGORY.to_string());
    let app = routes::router(state, None);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_submit_pre_resolves_titled_transfer() {
    let store = MemoryJobStore::new();
    let backend = ScriptedBackend::default();
    backend.set_transfers(vec![transfer("HASHA", "Album A", "metaDL", 0.0, 0)]);

    let job = submit_download(&store, &backend, CATEGORY, MAGNET, Some("  Album A "))
        .await
        .unwrap();

    assert_eq!(job.title.as_deref(), Some("Album A"));
    assert_eq!(job.status, JobStatus::Downloading);
    assert_eq!(job.transfer_handle.as_deref(), Some("HASHA"));
    assert_eq!(backend.added.lock().unwrap().clone(), vec![MAGNET.to_string()]);
    assert_eq!(store.get(job.id).await.unwrap().unwrap(), job);
}

#[tokio::test]
async fn test_submit_without_title_stays_queued() {
    let store = MemoryJobStore::new();
    let backend = ScriptedBackend::default();
    backend.set_transfers(vec![transfer("HASHA", "Album A", "downloading", 0.5, 3)]);

    let job = submit_download(&store, &backend, CATEGORY, MAGNET, None).await.unwrap();

    assert_eq!(job.status, JobStatus::Queued);
    assert!(job.transfer_handle.is_none());
    assert_eq!(backend.list_calls(), 0);
}

#[tokio::test]
async fn test_submit_backend_failure_stores_failed_job() {
    let store = MemoryJobStore::new();
    let backend = ScriptedBackend::default();
    *backend.fail_add.lock().unwrap() = true;

    let err = submit_download(&store, &backend, CATEGORY, MAGNET, Some("Album A"))
        .await
        .unwrap_err();

    let job = match err {
        SubmitError::Backend { job, .. } => job,
        other => panic!("expected backend error, got {:?}", other),
    };
    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.error_message.unwrap().contains("Fails."));
}

#[tokio::test]
async fn test_submit_blank_magnet_creates_nothing() {
    let store = MemoryJobStore::new();
    let backend = ScriptedBackend::default();

    let err = submit_download(&store, &backend, CATEGORY, "   ", None)
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::MissingMagnet));
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_post_then_get_download() {
    let base = serve(Arc::new(MemoryJobStore::new()), Arc::new(ScriptedBackend::default())).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/v1/downloads", base))
        .json(&json!({ "magnet_link": MAGNET }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 202);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "queued");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let res = client
        .get(format!("{}/api/v1/downloads/{}", base, job_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let job: Value = res.json().await.unwrap();
    assert_eq!(job["job_id"], job_id.as_str());
    assert_eq!(job["progress"], 0.0);
    assert!(job["error"].is_null());

    let list: Vec<Value> = client
        .get(format!("{}/api/v1/downloads", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 1);
}

#[tokio::test]
async fn test_post_rejects_non_magnet() {
    let base = serve(Arc::new(MemoryJobStore::new()), Arc::new(ScriptedBackend::default())).await;

    let res = reqwest::Client::new()
        .post(format!("{}/api/v1/downloads", base))
        .json(&json!({ "magnet_link": "https://example.com/a.torrent" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn test_post_backend_failure_is_bad_gateway() {
    let store = Arc::new(MemoryJobStore::new());
    let backend = Arc::new(ScriptedBackend::default());
    *backend.fail_add.lock().unwrap() = true;
    let base = serve(store.clone(), backend).await;

    let res = reqwest::Client::new()
        .post(format!("{}/api/v1/downloads", base))
        .json(&json!({ "magnet_link": MAGNET, "title": "Album A" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 502);
    let jobs = store.list().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Failed);
}

#[tokio::test]
async fn test_get_unknown_download_is_not_found() {
    let base = serve(Arc::new(MemoryJobStore::new()), Arc::new(ScriptedBackend::default())).await;

    let res = reqwest::get(format!("{}/api/v1/downloads/{}", base, Uuid::new_v4()))
        .await
        .unwrap();

    assert_eq!(res.status(), 404);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Download not found");
}

#[tokio::test]
async fn test_files_of_unmatched_job_conflict() {
    let store = Arc::new(MemoryJobStore::new());
    let backend = Arc::new(ScriptedBackend::default());
    let job = submit_download(store.as_ref(), backend.as_ref(), CATEGORY, MAGNET, None)
        .await
        .unwrap();
    let base = serve(store, backend).await;

    let res = reqwest::get(format!("{}/api/v1/downloads/{}/files", base, job.id))
        .await
        .unwrap();

    assert_eq!(res.status(), 409);
}

#[tokio::test]
async fn test_health_reports_components() {
    let base = serve(Arc::new(MemoryJobStore::new()), Arc::new(ScriptedBackend::default())).await;

    let res = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(res.status(), 200);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["database"]["status"], "ok");
    assert_eq!(body["checks"]["qbittorrent"]["status"], "ok");
}

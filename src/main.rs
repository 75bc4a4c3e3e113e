use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use phono_intake::app_state::{self, AppState};
use phono_intake::config::AppConfig;
use phono_intake::db::{self, PgJobStore};
use phono_intake::routes;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing phono-intake server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("downloads_jobs_submitted", "Download jobs submitted");
    metrics::describe_counter!("downloads_jobs_completed", "Download jobs imported successfully");
    metrics::describe_counter!("downloads_jobs_failed", "Download jobs that ended in failure");
    metrics::describe_counter!("downloads_reconcile_ticks", "Reconciliation passes run");
    metrics::describe_gauge!("downloads_active_jobs", "Jobs not yet completed or failed");

    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let qbit = app_state::qbit_client(&config).expect("Failed to initialize qBittorrent client");

    let state = AppState::new(
        Arc::new(PgJobStore::new(db_pool)),
        Arc::new(qbit),
        config.qbit_category.clone(),
    );

    let app = routes::router(state, Some(prometheus_handle));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
        })
        .await
        .expect("Server error");
}

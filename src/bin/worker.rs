use phono_intake::{
    app_state,
    config::AppConfig,
    db::{self, PgJobStore},
    services::reconciler::Reconciler,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting download reconciliation worker");

    let config = AppConfig::from_env().expect("Failed to load configuration");

    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let qbit = app_state::qbit_client(&config).expect("Failed to initialize qBittorrent client");
    let pipeline = app_state::file_pipeline(&config).expect("Failed to initialize file pipeline");

    tracing::info!(
        incoming = %config.incoming_path.display(),
        intake = %config.intake_dir.display(),
        "File pipeline ready"
    );

    let reconciler = Reconciler::new(
        Arc::new(PgJobStore::new(db_pool)),
        Arc::new(qbit),
        Arc::new(pipeline),
        app_state::reconciler_settings(&config),
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
                shutdown.cancel();
            }
        }
    });

    reconciler.run(shutdown).await;
}

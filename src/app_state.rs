use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::JobStore;
use crate::services::collaborators::{
    AudioCompressor, CatalogImporter, LoggingCatalogImporter, PassthroughCompressor,
    WebhookCatalogImporter,
};
use crate::services::paths::PathTranslator;
use crate::services::pipeline::FilePipeline;
use crate::services::qbit::{BackendError, QBitClient, QBitSettings, TorrentBackend};
use crate::services::reconciler::ReconcilerSettings;

/// Shared application state passed to all route handlers and the worker.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub backend: Arc<dyn TorrentBackend>,
    /// Category added torrents are tagged with.
    pub category: String,
}

impl AppState {
    pub fn new(store: Arc<dyn JobStore>, backend: Arc<dyn TorrentBackend>, category: String) -> Self {
        Self {
            store,
            backend,
            category,
        }
    }
}

pub fn qbit_client(config: &AppConfig) -> Result<QBitClient, BackendError> {
    QBitClient::new(QBitSettings {
        base_url: config.qbit_base_url.clone(),
        username: config.qbit_username.clone(),
        password: config.qbit_password.clone(),
        category: config.qbit_category.clone(),
        downloads_path: config.qbit_downloads_path.clone(),
        timeout: config.qbit_timeout(),
    })
}

/// File pipeline wired with the collaborators selected by configuration.
pub fn file_pipeline(config: &AppConfig) -> Result<FilePipeline, reqwest::Error> {
    let compressor: Arc<dyn AudioCompressor> = Arc::new(PassthroughCompressor);
    let catalog: Arc<dyn CatalogImporter> = match &config.catalog_import_url {
        Some(url) => Arc::new(WebhookCatalogImporter::new(url.clone(), config.qbit_timeout())?),
        None => Arc::new(LoggingCatalogImporter),
    };

    Ok(FilePipeline::new(
        PathTranslator::new(config.qbit_downloads_path.clone(), config.incoming_path.clone()),
        config.intake_dir.clone(),
        compressor,
        catalog,
    ))
}

pub fn reconciler_settings(config: &AppConfig) -> ReconcilerSettings {
    ReconcilerSettings {
        category: config.qbit_category.clone(),
        poll_interval: config.poll_interval(),
        stall_timeout: config.stall_timeout(),
    }
}

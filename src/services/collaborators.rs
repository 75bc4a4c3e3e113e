//! Downstream steps a finished audio file goes through after it lands in the
//! intake directory. Both take and return bare file names relative to the
//! intake directory.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("Compression failed for {file}: {reason}")]
    Compression { file: String, reason: String },

    #[error("Catalog import failed for {file}: {reason}")]
    Import { file: String, reason: String },
}

#[async_trait]
pub trait AudioCompressor: Send + Sync {
    /// Returns the name of the file to import, which may differ from the input.
    async fn compress(&self, file_name: &str) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait CatalogImporter: Send + Sync {
    async fn import(&self, file_name: &str) -> Result<(), CollaboratorError>;
}

/// Leaves files untouched.
#[derive(Debug, Default)]
pub struct PassthroughCompressor;

#[async_trait]
impl AudioCompressor for PassthroughCompressor {
    async fn compress(&self, file_name: &str) -> Result<String, CollaboratorError> {
        Ok(file_name.to_string())
    }
}

/// Records imports in the log only, for deployments without a catalog hook.
#[derive(Debug, Default)]
pub struct LoggingCatalogImporter;

#[async_trait]
impl CatalogImporter for LoggingCatalogImporter {
    async fn import(&self, file_name: &str) -> Result<(), CollaboratorError> {
        tracing::info!(file = %file_name, "File ready for catalog import");
        Ok(())
    }
}

#[derive(Serialize)]
struct ImportRequest<'a> {
    file_name: &'a str,
}

/// Notifies an HTTP endpoint of every imported file.
pub struct WebhookCatalogImporter {
    http: Client,
    url: String,
}

impl WebhookCatalogImporter {
    pub fn new(url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl CatalogImporter for WebhookCatalogImporter {
    async fn import(&self, file_name: &str) -> Result<(), CollaboratorError> {
        let import_error = |reason: String| CollaboratorError::Import {
            file: file_name.to_string(),
            reason,
        };

        self.http
            .post(&self.url)
            .json(&ImportRequest { file_name })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| import_error(e.to_string()))?;

        Ok(())
    }
}

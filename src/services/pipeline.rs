//! Post-download file handling: find the audio in a finished torrent, move it
//! into the intake directory and hand each file to compression and catalog
//! import.
//!
//! Destination names are resolved one file at a time, right before each move.
//! That is only collision-safe while a single pipeline runs at a time, which
//! the reconciler guarantees.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use super::collaborators::{AudioCompressor, CatalogImporter, CollaboratorError};
use super::paths::PathTranslator;

/// Extensions (lowercase, no dot) picked up from finished downloads.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac"];

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Download completed but content path was unavailable.")]
    ContentUnavailable,

    #[error("No supported audio files found in torrent.")]
    NoEligibleFiles,

    #[error("File discovery failed: {0}")]
    Discovery(String),

    #[error("Failed to move {} into intake: {source}", .path.display())]
    Move {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// One audio file that made it all the way through.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedFile {
    pub source: PathBuf,
    /// Name in the intake directory after the move.
    pub stored_as: String,
    /// Name handed to the catalog, after compression.
    pub imported_as: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineResult {
    pub files: Vec<ImportedFile>,
}

pub struct FilePipeline {
    translator: PathTranslator,
    intake_dir: PathBuf,
    compressor: Arc<dyn AudioCompressor>,
    catalog: Arc<dyn CatalogImporter>,
}

impl FilePipeline {
    pub fn new(
        translator: PathTranslator,
        intake_dir: PathBuf,
        compressor: Arc<dyn AudioCompressor>,
        catalog: Arc<dyn CatalogImporter>,
    ) -> Self {
        Self {
            translator,
            intake_dir,
            compressor,
            catalog,
        }
    }

    /// Run every eligible file under `backend_path` through the pipeline.
    ///
    /// All or nothing: the first failing file aborts the rest, and files
    /// already moved stay in the intake directory.
    pub async fn process(&self, backend_path: &str) -> Result<PipelineResult, PipelineError> {
        let content_path = self.translator.translate(backend_path);
        if content_path.as_os_str().is_empty() {
            return Err(PipelineError::ContentUnavailable);
        }

        let audio_files = tokio::task::spawn_blocking(move || discover_audio_files(&content_path))
            .await
            .map_err(|e| PipelineError::Discovery(e.to_string()))?;

        if audio_files.is_empty() {
            return Err(PipelineError::NoEligibleFiles);
        }

        tracing::debug!(count = audio_files.len(), "Discovered audio files");

        let mut result = PipelineResult::default();
        for source in audio_files {
            let stored_as = self.move_into_intake(&source).await?;
            let imported_as = self.compressor.compress(&stored_as).await?;
            self.catalog.import(&imported_as).await?;

            tracing::info!(
                source = %source.display(),
                stored_as = %stored_as,
                imported_as = %imported_as,
                "Audio file imported"
            );

            result.files.push(ImportedFile {
                source,
                stored_as,
                imported_as,
            });
        }

        Ok(result)
    }

    async fn move_into_intake(&self, source: &Path) -> Result<String, PipelineError> {
        let move_error = |source_err: std::io::Error| PipelineError::Move {
            path: source.to_path_buf(),
            source: source_err,
        };

        tokio::fs::create_dir_all(&self.intake_dir)
            .await
            .map_err(move_error)?;

        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| PipelineError::Discovery(format!("{} has no file name", source.display())))?;

        let target_name = unique_file_name(&self.intake_dir, &file_name)
            .await
            .map_err(move_error)?;
        let destination = self.intake_dir.join(&target_name);

        move_file(source, &destination).await.map_err(move_error)?;
        Ok(target_name)
    }
}

fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

/// A single file is eligible on its own; a directory is walked recursively.
/// Missing paths yield nothing.
pub fn discover_audio_files(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return if is_supported_audio(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    if !root.is_dir() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_supported_audio(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// `name.ext`, then `name_1.ext`, `name_2.ext`, ... until one is free in `dir`.
pub async fn unique_file_name(dir: &Path, file_name: &str) -> std::io::Result<String> {
    let original = Path::new(file_name);
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let extension = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut candidate = file_name.to_string();
    let mut counter = 1;
    while tokio::fs::try_exists(dir.join(&candidate)).await? {
        candidate = format!("{}_{}{}", stem, counter, extension);
        counter += 1;
    }

    Ok(candidate)
}

/// Rename, falling back to copy + delete when source and destination sit on
/// different filesystems.
async fn move_file(source: &Path, destination: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(source, destination).await {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            tracing::debug!(error = %rename_err, "Rename failed, copying instead");
            tokio::fs::copy(source, destination).await?;
            tokio::fs::remove_file(source).await
        }
    }
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::task::JoinError;

use crate::config::Config;
use crate::encoding::DocumentEncoder;
use crate::error::{AppError, AppResult};
use crate::middleware::RateLimiter;
use crate::models::{Manifest, ProcessedFile};
use crate::services::artifact_store::{artifact_name_for, manifest_name_for, ArtifactStore, FsArtifactStore};
use crate::services::pdf_extractor::{DocumentExtractor, LopdfExtractor};

#[derive(Debug, Clone)]
pub struct SubmissionResult {
    pub artifact_name: String,
    pub manifest_name: String,
    pub bit_length: usize,
    pub images: usize,
    pub texts: usize,
    pub pages: usize,
    pub processing_time_ms: u64,
}

/// Ties the encoder to an artifact store for one upload at a time.
///
/// Encoding runs on the blocking pool under a deadline and holds a limiter
/// permit until the blocking work ends, even when the caller has given up.
/// The store is written only after the whole bit-string exists, so a failed or
/// expired request leaves nothing behind.
pub struct EncodingService {
    encoder: DocumentEncoder,
    store: Arc<dyn ArtifactStore>,
    limiter: Arc<RateLimiter>,
    max_file_size_mb: usize,
    timeout: Duration,
}

fn join_error(err: JoinError) -> AppError {
    AppError::internal(format!("Encoding task failed: {}", err))
}

impl EncodingService {
    pub fn new(encoder: DocumentEncoder, store: Arc<dyn ArtifactStore>, config: &Config) -> Self {
        Self {
            encoder,
            store,
            limiter: Arc::new(RateLimiter::new(config.max_concurrent_requests)),
            max_file_size_mb: config.max_file_size_mb,
            timeout: Duration::from_secs(config.request_timeout_seconds),
        }
    }

    /// Filesystem store under `OUTPUT_DIR` and the lopdf extractor.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let extractor: Arc<dyn DocumentExtractor> = Arc::new(LopdfExtractor::new());
        let store: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(&config.output_dir)?);
        let encoder = DocumentEncoder::new(extractor, config.encoding_options());
        Ok(Self::new(encoder, store, config))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn encoder(&self) -> &DocumentEncoder {
        &self.encoder
    }

    fn validate(&self, file: &ProcessedFile) -> AppResult<()> {
        if file.content.is_empty() {
            return Err(AppError::InvalidFile {
                message: "File is empty".to_string(),
            });
        }
        if !file.is_pdf() {
            return Err(AppError::InvalidFile {
                message: "File is not a valid PDF document".to_string(),
            });
        }
        if file.size() > self.max_file_size_mb * 1024 * 1024 {
            return Err(AppError::FileTooLarge {
                size: file.size() / (1024 * 1024),
                limit: self.max_file_size_mb,
            });
        }
        Ok(())
    }

    pub async fn submit(&self, file: ProcessedFile) -> AppResult<SubmissionResult> {
        let start = Instant::now();
        self.validate(&file)?;

        // Derive names up front so an unusable upload name fails before any work
        let artifact_name = artifact_name_for(&file.name)?;
        let manifest_name = manifest_name_for(&file.name)?;

        tracing::info!(
            file_name = %file.name,
            file_size = file.size(),
            artifact = %artifact_name,
            "Encoding document"
        );

        let permit = self.limiter.try_acquire()?;
        let ProcessedFile { name: source_name, content, .. } = file;
        let encoder = self.encoder.clone();
        // The permit travels with the task and is only handed back once it finishes
        let task = tokio::task::spawn_blocking(move || (encoder.encode_document(&content), permit));
        let (encoded, _permit) = match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => {
                let (encoded, permit) = joined.map_err(join_error)?;
                (encoded?, permit)
            }
            Err(elapsed) => {
                tracing::warn!(
                    file_name = %source_name,
                    timeout_secs = self.timeout.as_secs(),
                    "Encoding deadline expired, discarding result"
                );
                return Err(elapsed.into());
            }
        };

        let manifest = Manifest::new(&source_name, &artifact_name, &encoded, self.encoder.options());
        let manifest_json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| AppError::internal(format!("Failed to serialize manifest: {}", e)))?;

        let result = SubmissionResult {
            artifact_name: artifact_name.clone(),
            manifest_name: manifest_name.clone(),
            bit_length: encoded.bits.len(),
            images: encoded.images,
            texts: encoded.texts,
            pages: encoded.info.pages,
            processing_time_ms: 0,
        };

        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || -> AppResult<()> {
            let saved = store.save(&source_name, &encoded.bits)?;
            debug_assert_eq!(saved, artifact_name);
            if let Err(err) = store.save_named(&manifest_name, &manifest_json) {
                // An artifact must never sit next to another submission's manifest
                if let Err(cleanup) = store.remove(&artifact_name) {
                    tracing::error!(artifact = %artifact_name, error = %cleanup, "Failed to remove orphaned artifact");
                }
                return Err(err);
            }
            Ok(())
        })
        .await
        .map_err(join_error)??;

        let processing_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            artifact = %result.artifact_name,
            bit_length = result.bit_length,
            images = result.images,
            texts = result.texts,
            processing_time_ms,
            "Artifact saved"
        );

        Ok(SubmissionResult {
            processing_time_ms,
            ..result
        })
    }

    pub async fn fetch(&self, name: &str) -> AppResult<Bytes> {
        let store = Arc::clone(&self.store);
        let name = name.to_string();
        tokio::task::spawn_blocking(move || store.load(&name))
            .await
            .map_err(join_error)?
    }

    pub fn is_ready(&self) -> bool {
        self.store.is_available()
    }
}

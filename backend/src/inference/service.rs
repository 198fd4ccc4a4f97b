use actix_web::web;
use std::path::PathBuf;

use super::prediction::PredictionResult;
use crate::error::ServeError;
use crate::model::ClassifierAdapter;
use crate::preprocessing;
use crate::storage::staging::Stager;

/// One uploaded file, as received.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    /// Client-supplied name. Only ever logged, never used as a path.
    pub filename: Option<String>,
}

/// Stage, normalize, score. Shared by every worker; holds no per-request
/// state.
#[derive(Clone)]
pub struct InferenceService {
    adapter: ClassifierAdapter,
    stager: Stager,
}

impl InferenceService {
    pub fn new(adapter: ClassifierAdapter, stager: Stager) -> Self {
        Self { adapter, stager }
    }

    pub async fn handle(&self, upload: UploadedImage) -> Result<PredictionResult, ServeError> {
        let UploadedImage { bytes, filename } = upload;
        let size = bytes.len();

        let staged = self.stager.stage(bytes).await.map_err(|e| {
            log::error!("Could not stage upload {:?}: {}", filename, e);
            ServeError::from(e)
        })?;
        let token = staged.token();
        log::debug!("Staged upload {:?} ({} bytes) as {}", filename, size, token);

        let outcome = self.classify_staged(staged.path().to_path_buf()).await;

        if let Err(e) = staged.remove().await {
            log::error!("{}", e);
        }

        match &outcome {
            Ok(result) => log::info!(
                "Upload {}: {} (score {:.4})",
                token,
                result.label(),
                result.confidence()
            ),
            Err(e @ ServeError::ClientInput(_)) => log::warn!("Upload {} rejected: {}", token, e),
            Err(e) => log::error!("Upload {} failed: {}", token, e),
        }
        outcome
    }

    async fn classify_staged(&self, path: PathBuf) -> Result<PredictionResult, ServeError> {
        let tensor = web::block(move || preprocessing::normalize_file(&path)).await??;

        let adapter = self.adapter.clone();
        let score = web::block(move || adapter.score(&tensor)).await??;

        Ok(PredictionResult::from_score(score))
    }
}

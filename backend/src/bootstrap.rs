use std::path::Path;
use std::sync::Arc;

use crate::config::{AppConfig, ConfigError};
use crate::inference::InferenceService;
use crate::model::{Classifier, ClassifierAdapter, InferenceError};
use crate::storage::staging::{Stager, StagingError};

/// Anything that stops the server from starting. None of these are
/// recoverable; the process exits before binding a port.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Staging(#[from] StagingError),
    #[error("Model not found at path: {0}")]
    ModelNotFound(String),
    #[error("Failed to load model {path}: {source}")]
    ModelLoad {
        path: String,
        source: InferenceError,
    },
    #[error("Model {path} failed the startup check: {source}")]
    Probe {
        path: String,
        source: InferenceError,
    },
    #[error("No model backend compiled in; rebuild with `--features torch`")]
    BackendUnavailable,
}

pub fn build_service(config: &AppConfig) -> Result<InferenceService, StartupError> {
    let stager = prepare_staging(&config.staging_dir)?;
    let classifier = open_classifier(&config.model_path)?;
    let adapter = verify_classifier(classifier, &config.model_path)?;
    Ok(InferenceService::new(adapter, stager))
}

/// Creates the staging directory and clears anything a crashed run left in
/// it.
pub fn prepare_staging(dir: &Path) -> Result<Stager, StartupError> {
    let stager = Stager::new(dir)?;
    let purged = stager.purge_stale()?;
    if purged > 0 {
        log::warn!(
            "Removed {} stale staged uploads from {}",
            purged,
            stager.dir().display()
        );
    }
    log::info!("Staging uploads in {}", stager.dir().display());
    Ok(stager)
}

pub fn open_classifier(model_path: &Path) -> Result<Arc<dyn Classifier>, StartupError> {
    if !model_path.is_file() {
        return Err(StartupError::ModelNotFound(model_path.display().to_string()));
    }
    open_backend(model_path)
}

/// Runs a blank image through the classifier. An artifact that cannot honour
/// the input/output contract is rejected here rather than on the first
/// request.
pub fn verify_classifier(
    classifier: Arc<dyn Classifier>,
    model_path: &Path,
) -> Result<ClassifierAdapter, StartupError> {
    let adapter = ClassifierAdapter::new(classifier);
    let score = adapter.probe().map_err(|source| StartupError::Probe {
        path: model_path.display().to_string(),
        source,
    })?;
    log::info!(
        "Model {} ready (blank image scores {:.4})",
        model_path.display(),
        score
    );
    Ok(adapter)
}

#[cfg(feature = "torch")]
fn open_backend(model_path: &Path) -> Result<Arc<dyn Classifier>, StartupError> {
    let classifier = crate::model::torch::TorchClassifier::load(model_path).map_err(|source| {
        StartupError::ModelLoad {
            path: model_path.display().to_string(),
            source,
        }
    })?;
    Ok(Arc::new(classifier))
}

#[cfg(not(feature = "torch"))]
fn open_backend(_model_path: &Path) -> Result<Arc<dyn Classifier>, StartupError> {
    Err(StartupError::BackendUnavailable)
}

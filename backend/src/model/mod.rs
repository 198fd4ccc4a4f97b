pub mod adapter;
#[cfg(feature = "torch")]
pub mod torch;

use ndarray::{Array2, ArrayView4};

pub use adapter::ClassifierAdapter;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Input shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Classifier returned invalid output: {0}")]
    InvalidOutput(String),
    #[error("{0}")]
    Backend(String),
    #[cfg(feature = "torch")]
    #[error("Torch error: {0}")]
    Torch(#[from] tch::TchError),
}

/// A loaded binary image classifier.
///
/// `predict` takes a batch of shape (N, 224, 224, 1) and returns (N, 1)
/// sigmoid outputs, the probability of pneumonia for each image.
/// Implementations are shared across request workers, so they must be safe
/// to call from several threads at once.
pub trait Classifier: Send + Sync {
    fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Array2<f32>, InferenceError>;
}

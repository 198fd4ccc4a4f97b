use std::sync::Arc;

use super::{Classifier, InferenceError};
use crate::preprocessing::{NormalizedTensor, INPUT_SHAPE};

/// Single-image view over a [`Classifier`].
#[derive(Clone)]
pub struct ClassifierAdapter {
    classifier: Arc<dyn Classifier>,
}

impl ClassifierAdapter {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Returns the raw pneumonia probability for one normalized image.
    pub fn score(&self, tensor: &NormalizedTensor) -> Result<f32, InferenceError> {
        if tensor.shape() != INPUT_SHAPE.as_slice() {
            return Err(InferenceError::ShapeMismatch {
                expected: INPUT_SHAPE.to_vec(),
                got: tensor.shape().to_vec(),
            });
        }

        let output = self.classifier.predict(tensor.view())?;
        if output.dim() != (1, 1) {
            return Err(InferenceError::InvalidOutput(format!(
                "expected shape [1, 1], got {:?}",
                output.shape()
            )));
        }

        let score = output[[0, 0]];
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(InferenceError::InvalidOutput(format!(
                "score {} is outside [0, 1]",
                score
            )));
        }
        Ok(score)
    }

    /// Scores a blank image. Used at startup to prove the artifact honours
    /// the input/output contract before any request is accepted.
    pub fn probe(&self) -> Result<f32, InferenceError> {
        self.score(&NormalizedTensor::zeros())
    }
}

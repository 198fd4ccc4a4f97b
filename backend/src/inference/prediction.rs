use shared::{Diagnosis, PredictionResponse};

/// Scores strictly above this are reported as pneumonia.
pub const PNEUMONIA_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    label: Diagnosis,
    score: f32,
}

impl PredictionResult {
    pub fn from_score(score: f32) -> Self {
        let label = if score > PNEUMONIA_THRESHOLD {
            Diagnosis::Pneumonia
        } else {
            Diagnosis::Normal
        };
        Self { label, score }
    }

    pub fn label(&self) -> Diagnosis {
        self.label
    }

    /// The classifier's pneumonia probability. This is what the HTTP API
    /// reports as `confidence`, for both labels.
    pub fn confidence(&self) -> f32 {
        self.score
    }

    /// Confidence in the returned label: `1 - p` when the image is normal.
    pub fn label_confidence(&self) -> f32 {
        match self.label {
            Diagnosis::Pneumonia => self.score,
            Diagnosis::Normal => 1.0 - self.score,
        }
    }
}

impl From<PredictionResult> for PredictionResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            prediction: result.label,
            confidence: result.score,
        }
    }
}

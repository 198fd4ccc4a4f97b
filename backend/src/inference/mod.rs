pub mod prediction;
pub mod service;

pub use prediction::{PredictionResult, PNEUMONIA_THRESHOLD};
pub use service::{InferenceService, UploadedImage};

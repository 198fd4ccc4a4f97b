use actix_web::{
    error::BlockingError,
    http::StatusCode,
    HttpResponse, ResponseError,
};
use shared::ErrorResponse;

use crate::model::InferenceError;
use crate::preprocessing::NormalizationError;
use crate::storage::staging::StagingError;

pub const INVALID_IMAGE_FORMAT: &str = "Invalid image format";

/// Everything that can end a prediction request early. Each kind maps to its
/// own status; the body is always `{"error": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("{0}")]
    ClientInput(String),
    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Resource(#[from] StagingError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServeError {
    pub fn invalid_image() -> Self {
        ServeError::ClientInput(INVALID_IMAGE_FORMAT.to_string())
    }

    /// Text placed in the response body. Storage and internal failures are
    /// logged in full but reported generically so paths never reach clients.
    pub fn client_message(&self) -> String {
        match self {
            ServeError::Resource(_) => "Failed to store upload".to_string(),
            ServeError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<NormalizationError> for ServeError {
    fn from(err: NormalizationError) -> Self {
        match err {
            NormalizationError::Decode(_) => ServeError::invalid_image(),
            NormalizationError::Io(e) => ServeError::Resource(StagingError::Read(e)),
            NormalizationError::Shape(e) => ServeError::Internal(e.to_string()),
        }
    }
}

impl From<BlockingError> for ServeError {
    fn from(err: BlockingError) -> Self {
        ServeError::Internal(err.to_string())
    }
}

impl ResponseError for ServeError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServeError::ClientInput(_) => StatusCode::BAD_REQUEST,
            ServeError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServeError::Inference(_) | ServeError::Resource(_) | ServeError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.client_message(),
        })
    }
}

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::{ErrorKind, ErrorResponse};

use crate::inference::model::InferenceError;
use crate::inference::preprocess::PreprocessError;

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("No file uploaded")]
    MissingFile,
    #[error("No selected file")]
    EmptyFilename,
    #[error("Malformed multipart upload: {0}")]
    InvalidUpload(String),
    #[error("Uploaded file exceeds {limit} bytes")]
    UploadTooLarge { limit: usize },
    #[error("Failed to stage upload: {0}")]
    Staging(#[source] std::io::Error),
    #[error("Uploaded file is not a valid image: {0}")]
    Decode(#[source] PreprocessError),
    #[error("Prediction failed: {0}")]
    Inference(#[from] InferenceError),
}

impl From<PreprocessError> for PredictionError {
    fn from(err: PreprocessError) -> Self {
        match err {
            // The file was just written by us, so failing to reopen it is a
            // server-side problem, not bad input.
            PreprocessError::Io(e) => PredictionError::Staging(e),
            decode => PredictionError::Decode(decode),
        }
    }
}

impl PredictionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictionError::MissingFile => ErrorKind::MissingFile,
            PredictionError::EmptyFilename => ErrorKind::EmptyFilename,
            PredictionError::InvalidUpload(_) => ErrorKind::InvalidUpload,
            PredictionError::UploadTooLarge { .. } => ErrorKind::UploadTooLarge,
            PredictionError::Staging(_) => ErrorKind::StagingError,
            PredictionError::Decode(_) => ErrorKind::DecodeError,
            PredictionError::Inference(_) => ErrorKind::InferenceError,
        }
    }

    /// Message safe to show to the client. Internal details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            PredictionError::MissingFile
            | PredictionError::EmptyFilename
            | PredictionError::UploadTooLarge { .. } => self.to_string(),
            PredictionError::InvalidUpload(_) => "Malformed multipart upload".to_string(),
            PredictionError::Staging(_) => "Failed to stage upload".to_string(),
            PredictionError::Decode(_) => "Uploaded file is not a valid image".to_string(),
            PredictionError::Inference(_) => "Prediction failed".to_string(),
        }
    }
}

impl ResponseError for PredictionError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictionError::MissingFile
            | PredictionError::EmptyFilename
            | PredictionError::InvalidUpload(_)
            | PredictionError::Decode(_) => StatusCode::BAD_REQUEST,
            PredictionError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            PredictionError::Staging(_) | PredictionError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.client_message(),
            kind: self.kind(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_400() {
        assert_eq!(PredictionError::MissingFile.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(PredictionError::EmptyFilename.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            PredictionError::UploadTooLarge { limit: 10 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn inference_details_are_not_exposed() {
        let err = PredictionError::from(InferenceError::Backend("cuda OOM at 0xdeadbeef".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "Prediction failed");
        assert_eq!(err.kind(), ErrorKind::InferenceError);
    }

    #[test]
    fn reopen_failure_is_a_staging_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = PredictionError::from(PreprocessError::Io(io));
        assert_eq!(err.kind(), ErrorKind::StagingError);
    }
}

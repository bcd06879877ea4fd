use std::path::PathBuf;
use std::sync::Arc;

use super::error::PredictionError;
use super::models::UploadedFile;
use crate::inference::classifier::{Classifier, PredictionResult};
use crate::inference::preprocess::load_image_tensor;
use crate::storage::scratch::ScratchFile;

#[derive(Clone)]
pub struct PredictionService {
    classifier: Arc<Classifier>,
    scratch_dir: PathBuf,
    max_upload_bytes: usize,
}

impl PredictionService {
    pub fn new(classifier: Arc<Classifier>, scratch_dir: PathBuf, max_upload_bytes: usize) -> Self {
        Self {
            classifier,
            scratch_dir,
            max_upload_bytes,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Checks that run before anything touches the filesystem.
    pub fn validate(&self, upload: Option<&UploadedFile>) -> Result<(), PredictionError> {
        let upload = upload.ok_or(PredictionError::MissingFile)?;
        if upload.filename.is_empty() {
            return Err(PredictionError::EmptyFilename);
        }
        if upload.bytes.len() > self.max_upload_bytes {
            return Err(PredictionError::UploadTooLarge {
                limit: self.max_upload_bytes,
            });
        }
        Ok(())
    }

    /// Blocking; call it from a blocking thread pool.
    pub fn predict(&self, upload: Option<UploadedFile>) -> Result<PredictionResult, PredictionError> {
        self.validate(upload.as_ref())?;
        let upload = upload.ok_or(PredictionError::MissingFile)?;

        let staged = ScratchFile::create(&self.scratch_dir, &upload.filename, &upload.bytes)
            .map_err(|e| {
                log::error!("Failed to write scratch file in {}: {}", self.scratch_dir.display(), e);
                PredictionError::Staging(e)
            })?;

        let outcome = self.classify_staged(&staged);

        if let Err(e) = staged.remove() {
            log::warn!("Failed to remove scratch file: {}", e);
        }

        match &outcome {
            Ok(result) => log::info!(
                "Predicted {:?} with confidence {:.4} for {:?}",
                result.label,
                result.confidence,
                upload.filename
            ),
            Err(PredictionError::Decode(e)) => {
                log::warn!("Rejected upload {:?}: {}", upload.filename, e)
            }
            Err(e) => log::error!(
                "Prediction for {:?} failed ({}): {}",
                upload.filename,
                e.kind(),
                e
            ),
        }
        outcome
    }

    fn classify_staged(&self, staged: &ScratchFile) -> Result<PredictionResult, PredictionError> {
        let tensor = load_image_tensor(staged.path(), self.classifier.input_shape())?;
        Ok(self.classifier.predict(&tensor)?)
    }
}

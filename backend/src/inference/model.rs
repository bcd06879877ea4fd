use super::preprocess::ImageTensor;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Input tensor shape {actual:?} does not match model input {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("Model returned no scores")]
    EmptyOutput,
    #[error("Model returned a non-finite score at index {0}")]
    NonFiniteScore(usize),
    #[error("Model produces {scores} scores but {labels} labels are loaded")]
    ClassCountMismatch { scores: usize, labels: usize },
    #[error("Predicted class index {index} has no label ({classes} labels loaded)")]
    UnknownClass { index: usize, classes: usize },
    #[error("Model backend error: {0}")]
    Backend(String),
}

/// Opaque trained scoring function: one normalized image in, one score per
/// class out.
pub trait ScoringModel: Send + Sync {
    fn score(&self, input: &ImageTensor) -> Result<Vec<f32>, InferenceError>;
}

#[cfg(feature = "torch")]
pub use torch::TorchModel;

#[cfg(feature = "torch")]
mod torch {
    use super::{InferenceError, ScoringModel};
    use crate::inference::preprocess::ImageTensor;
    use std::path::Path;
    use std::sync::Mutex;
    use tch::{CModule, Device, Kind, Tensor};

    impl From<tch::TchError> for InferenceError {
        fn from(err: tch::TchError) -> Self {
            InferenceError::Backend(err.to_string())
        }
    }

    /// TorchScript model. `CModule` is not `Sync`, so calls are serialized
    /// through a mutex.
    pub struct TorchModel {
        model: Mutex<CModule>,
        device: Device,
        apply_softmax: bool,
    }

    impl TorchModel {
        pub fn load(model_path: &Path, apply_softmax: bool) -> Result<Self, InferenceError> {
            let device = Device::cuda_if_available();
            let mut model = CModule::load_on_device(model_path, device)?;
            model.set_eval();
            log::info!(
                "Loaded TorchScript model from {} on {:?}",
                model_path.display(),
                device
            );
            Ok(Self {
                model: Mutex::new(model),
                device,
                apply_softmax,
            })
        }

        fn to_input(&self, input: &ImageTensor) -> Result<Tensor, InferenceError> {
            let batched = input.batched();
            let shape: Vec<i64> = batched.shape().iter().map(|d| *d as i64).collect();
            let values = input
                .as_slice()
                .ok_or_else(|| InferenceError::Backend("input tensor is not contiguous".into()))?;
            // NHWC -> NCHW
            Ok(Tensor::from_slice(values)
                .view(shape.as_slice())
                .permute([0, 3, 1, 2])
                .contiguous()
                .to_device(self.device))
        }
    }

    impl ScoringModel for TorchModel {
        fn score(&self, input: &ImageTensor) -> Result<Vec<f32>, InferenceError> {
            let tensor = self.to_input(input)?;
            let model = self
                .model
                .lock()
                .map_err(|_| InferenceError::Backend("model lock poisoned".into()))?;
            let output = tch::no_grad(|| model.forward_ts(&[tensor]))?;
            let output = if self.apply_softmax {
                output.softmax(-1, Kind::Float)
            } else {
                output
            };
            let output = output.to_kind(Kind::Float).view([-1]).to_device(Device::Cpu);
            Ok(Vec::<f32>::try_from(&output)?)
        }
    }
}

use super::labels::LabelTable;
use super::model::{InferenceError, ScoringModel};
use super::preprocess::{ImageTensor, InputShape};

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub label: String,
    pub confidence: f32,
}

impl From<PredictionResult> for shared::PredictionResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            prediction: result.label,
            confidence: result.confidence,
        }
    }
}

/// Index of the highest score. Ties resolve to the lowest index.
pub fn arg_max(scores: &[f32]) -> Result<(usize, f32), InferenceError> {
    if let Some(bad) = scores.iter().position(|s| !s.is_finite()) {
        return Err(InferenceError::NonFiniteScore(bad));
    }
    scores
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, s)| match best {
            Some((_, top)) if top >= s => best,
            _ => Some((i, s)),
        })
        .ok_or(InferenceError::EmptyOutput)
}

pub struct Classifier {
    model: Box<dyn ScoringModel>,
    labels: LabelTable,
    input_shape: InputShape,
}

impl Classifier {
    pub fn new(model: Box<dyn ScoringModel>, labels: LabelTable, input_shape: InputShape) -> Self {
        Self {
            model,
            labels,
            input_shape,
        }
    }

    /// Runs one blank input through the model and checks that it yields one
    /// score per label. A mismatch means the model and label table were not
    /// produced together.
    pub fn verify(&self) -> Result<(), InferenceError> {
        let scores = self.model.score(&ImageTensor::zeros(self.input_shape))?;
        if scores.len() != self.labels.len() {
            return Err(InferenceError::ClassCountMismatch {
                scores: scores.len(),
                labels: self.labels.len(),
            });
        }
        Ok(())
    }

    pub fn predict(&self, tensor: &ImageTensor) -> Result<PredictionResult, InferenceError> {
        if !tensor.matches(self.input_shape) {
            let (h, w, c) = self.input_shape.dims();
            return Err(InferenceError::ShapeMismatch {
                expected: vec![h, w, c],
                actual: tensor.shape().to_vec(),
            });
        }

        let scores = self.model.score(tensor)?;
        let (index, confidence) = arg_max(&scores)?;
        let label = self.labels.label(index).ok_or_else(|| {
            log::error!(
                "Model produced {} scores but only {} labels are loaded",
                scores.len(),
                self.labels.len()
            );
            InferenceError::UnknownClass {
                index,
                classes: self.labels.len(),
            }
        })?;

        Ok(PredictionResult {
            label: label.to_string(),
            confidence,
        })
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn input_shape(&self) -> InputShape {
        self.input_shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::model::tests::{BrightnessModel, FailingModel, FixedScores};
    use ndarray::Array3;

    fn labels(names: &[&str]) -> LabelTable {
        LabelTable::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    fn classifier(model: Box<dyn ScoringModel>, names: &[&str]) -> Classifier {
        Classifier::new(model, labels(names), InputShape::square(4))
    }

    #[test]
    fn arg_max_picks_highest_score() {
        assert_eq!(arg_max(&[0.1, 0.7, 0.2]).unwrap(), (1, 0.7));
    }

    #[test]
    fn arg_max_ties_resolve_to_first_index() {
        assert_eq!(arg_max(&[0.4, 0.4, 0.2]).unwrap(), (0, 0.4));
    }

    #[test]
    fn arg_max_rejects_empty_and_nan() {
        assert!(matches!(arg_max(&[]), Err(InferenceError::EmptyOutput)));
        assert!(matches!(
            arg_max(&[0.2, f32::NAN]),
            Err(InferenceError::NonFiniteScore(1))
        ));
    }

    #[test]
    fn low_confidence_is_not_rejected() {
        let c = classifier(Box::new(FixedScores(vec![0.30, 0.35, 0.35])), &["a", "b", "c"]);
        let result = c.predict(&ImageTensor::zeros(InputShape::square(4))).unwrap();
        assert_eq!(result.label, "b");
        assert_eq!(result.confidence, 0.35);
    }

    #[test]
    fn predicts_label_from_model_scores() {
        let c = classifier(Box::new(BrightnessModel), &["dark", "bright"]);
        let bright = ImageTensor::from_array(Array3::from_elem((4, 4, 1), 0.9));
        let result = c.predict(&bright).unwrap();
        assert_eq!(result.label, "bright");
        assert!((result.confidence - 0.9).abs() < 1e-6);

        let dark = ImageTensor::zeros(InputShape::square(4));
        assert_eq!(c.predict(&dark).unwrap().label, "dark");
    }

    #[test]
    fn rejects_wrong_input_shape() {
        let c = classifier(Box::new(BrightnessModel), &["dark", "bright"]);
        let err = c.predict(&ImageTensor::zeros(InputShape::square(8))).unwrap_err();
        assert!(matches!(err, InferenceError::ShapeMismatch { .. }));
    }

    #[test]
    fn output_wider_than_label_table_is_an_error() {
        let c = classifier(Box::new(FixedScores(vec![0.1, 0.2, 0.7])), &["a", "b"]);
        let err = c.predict(&ImageTensor::zeros(InputShape::square(4))).unwrap_err();
        assert!(matches!(err, InferenceError::UnknownClass { index: 2, classes: 2 }));
        assert!(matches!(
            c.verify(),
            Err(InferenceError::ClassCountMismatch { scores: 3, labels: 2 })
        ));
    }

    #[test]
    fn verify_accepts_matching_model() {
        let c = classifier(Box::new(BrightnessModel), &["dark", "bright"]);
        assert!(c.verify().is_ok());
    }

    #[test]
    fn backend_failure_propagates() {
        let c = classifier(Box::new(FailingModel), &["a"]);
        let err = c.predict(&ImageTensor::zeros(InputShape::square(4))).unwrap_err();
        assert!(matches!(err, InferenceError::Backend(_)));
    }
}

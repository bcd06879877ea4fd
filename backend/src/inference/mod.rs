pub mod classifier;
pub mod labels;
pub mod model;
pub mod preprocess;

use crate::config::{AppConfig, ConfigError};
use classifier::Classifier;
use labels::LabelTable;
use model::ScoringModel;
use preprocess::InputShape;

#[cfg(feature = "torch")]
fn load_model(config: &AppConfig) -> Result<Box<dyn ScoringModel>, ConfigError> {
    let model = model::TorchModel::load(&config.model_path, config.apply_softmax)?;
    Ok(Box::new(model))
}

#[cfg(not(feature = "torch"))]
fn load_model(config: &AppConfig) -> Result<Box<dyn ScoringModel>, ConfigError> {
    Err(ConfigError::BackendUnavailable(format!(
        "cannot load {}: built without the `torch` feature",
        config.model_path.display()
    )))
}

pub fn load_classifier(config: &AppConfig) -> Result<Classifier, ConfigError> {
    let labels = LabelTable::load(&config.labels_path)?;
    log::info!(
        "Loaded {} labels from {}",
        labels.len(),
        config.labels_path.display()
    );
    let model = load_model(config)?;
    build_classifier(model, labels, InputShape::square(config.image_size))
}

pub fn build_classifier(
    model: Box<dyn ScoringModel>,
    labels: LabelTable,
    input_shape: InputShape,
) -> Result<Classifier, ConfigError> {
    let classifier = Classifier::new(model, labels, input_shape);
    classifier.verify()?;
    Ok(classifier)
}

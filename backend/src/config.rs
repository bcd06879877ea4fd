use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::inference::labels::LabelError;
use crate::inference::model::InferenceError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
    #[error("Failed to load label table: {0}")]
    Labels(#[from] LabelError),
    #[error("Failed to load model: {0}")]
    Model(#[from] InferenceError),
    #[error("Model backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("Failed to prepare scratch directory: {0}")]
    ScratchDir(#[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    pub scratch_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Side length of the square grayscale model input.
    pub image_size: u32,
    /// Set for models that emit logits rather than probabilities.
    pub apply_softmax: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model/model.pt"),
            labels_path: PathBuf::from("model/class_indices.json"),
            scratch_dir: PathBuf::from("uploads"),
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_upload_bytes: 50 * 1024 * 1024,
            image_size: 128,
            apply_softmax: false,
        }
    }
}

impl AppConfig {
    /// Builds the config from the process environment. A YAML file named by
    /// `CONFIG_PATH` supplies the base values; individual variables win.
    pub fn load() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = match vars.get("CONFIG_PATH") {
            Some(path) => Self::from_yaml_file(PathBuf::from(path))?,
            None => Self::default(),
        };

        if let Some(v) = vars.get("MODEL_PATH") {
            config.model_path = PathBuf::from(v);
        }
        if let Some(v) = vars.get("LABELS_PATH") {
            config.labels_path = PathBuf::from(v);
        }
        if let Some(v) = vars.get("SCRATCH_DIR") {
            config.scratch_dir = PathBuf::from(v);
        }
        if let Some(v) = vars.get("HOST") {
            config.host = v.clone();
        }
        if let Some(v) = vars.get("PORT") {
            config.port = parse_var("PORT", v)?;
        }
        if let Some(v) = vars.get("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", v)?;
        }
        if let Some(v) = vars.get("IMAGE_SIZE") {
            config.image_size = parse_var("IMAGE_SIZE", v)?;
        }
        if let Some(v) = vars.get("APPLY_SOFTMAX") {
            config.apply_softmax = parse_var("APPLY_SOFTMAX", v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: PathBuf) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.image_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "image_size".into(),
                value: "0".into(),
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_upload_bytes".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = AppConfig::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = AppConfig::from_vars(&vars(&[
            ("MODEL_PATH", "/models/cnn.pt"),
            ("LABELS_PATH", "/models/labels.json"),
            ("SCRATCH_DIR", "/tmp/scratch"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8081"),
            ("IMAGE_SIZE", "64"),
            ("APPLY_SOFTMAX", "true"),
        ]))
        .unwrap();
        assert_eq!(config.model_path, PathBuf::from("/models/cnn.pt"));
        assert_eq!(config.labels_path, PathBuf::from("/models/labels.json"));
        assert_eq!(config.scratch_dir, PathBuf::from("/tmp/scratch"));
        assert_eq!(config.bind_address(), "127.0.0.1:8081");
        assert_eq!(config.image_size, 64);
        assert!(config.apply_softmax);
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = AppConfig::from_vars(&vars(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "PORT"));
        let err = AppConfig::from_vars(&vars(&[("IMAGE_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn yaml_file_is_overridden_by_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.yaml");
        std::fs::write(&path, "port: 9000\nscratch_dir: /var/scratch\nimage_size: 96\n").unwrap();
        let config = AppConfig::from_vars(&vars(&[
            ("CONFIG_PATH", path.to_str().unwrap()),
            ("PORT", "9100"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.scratch_dir, PathBuf::from("/var/scratch"));
        assert_eq!(config.image_size, 96);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn missing_yaml_file_is_reported() {
        let err = AppConfig::from_vars(&vars(&[("CONFIG_PATH", "/nonexistent/service.yaml")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("Failed to read label table: {0}")]
    Io(#[from] std::io::Error),
    #[error("Label table is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Label table must be a JSON object")]
    NotAnObject,
    #[error("Label table is empty")]
    Empty,
    #[error("Invalid label table entry {key:?}: {reason}")]
    InvalidEntry { key: String, reason: String },
    #[error("Class index {0} appears more than once")]
    DuplicateIndex(usize),
    #[error("Label {0:?} appears more than once")]
    DuplicateLabel(String),
    #[error("Class indices are not contiguous from 0: index {0} is missing")]
    MissingIndex(usize),
}

/// Immutable class index to label mapping.
///
/// Indices are contiguous and zero-based, so the table is stored as a plain
/// vector where position `i` holds the label for class `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Result<Self, LabelError> {
        if labels.is_empty() {
            return Err(LabelError::Empty);
        }
        let mut seen = HashSet::new();
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(LabelError::DuplicateLabel(label.clone()));
            }
        }
        Ok(Self { labels })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Parses either `{"label": index}` (the class indices emitted at training
    /// time) or the already reversed `{"index": "label"}` form.
    pub fn from_json_str(raw: &str) -> Result<Self, LabelError> {
        let value: Value = serde_json::from_str(raw)?;
        let object = value.as_object().ok_or(LabelError::NotAnObject)?;
        if object.is_empty() {
            return Err(LabelError::Empty);
        }

        let mut by_index: BTreeMap<usize, String> = BTreeMap::new();
        for (key, value) in object {
            let (index, label) = match value {
                Value::Number(n) => {
                    let index = n.as_u64().ok_or_else(|| LabelError::InvalidEntry {
                        key: key.clone(),
                        reason: format!("{} is not a non-negative integer", n),
                    })?;
                    (index as usize, key.clone())
                }
                Value::String(label) => {
                    let index = key.parse::<usize>().map_err(|_| LabelError::InvalidEntry {
                        key: key.clone(),
                        reason: "key is not a class index".to_string(),
                    })?;
                    (index, label.clone())
                }
                other => {
                    return Err(LabelError::InvalidEntry {
                        key: key.clone(),
                        reason: format!("unsupported value {}", other),
                    });
                }
            };
            if by_index.insert(index, label).is_some() {
                return Err(LabelError::DuplicateIndex(index));
            }
        }

        // BTreeMap iterates in index order, so a gap shows up as the first
        // position whose key differs from its ordinal.
        let mut labels = Vec::with_capacity(by_index.len());
        for (expected, (index, label)) in by_index.into_iter().enumerate() {
            if index != expected {
                return Err(LabelError::MissingIndex(expected));
            }
            labels.push(label);
        }
        Self::new(labels)
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

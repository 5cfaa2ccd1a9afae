use serde_json::Value;
use thiserror::Error;

use crate::feature::FeatureCollection;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("dataset is not a GeoJSON FeatureCollection")]
    NotAFeatureCollection,
    #[error("dataset has no `features` array")]
    MissingFeatures,
    #[error("feature #{index} is not a JSON object")]
    InvalidFeature { index: usize },
}

/// Parse a GeoJSON document, checking its structural shape only.
///
/// Missing properties are not errors; they surface as `None` on the feature.
pub fn load(raw: &str) -> Result<FeatureCollection, DatasetError> {
    load_slice(raw.as_bytes())
}

pub fn load_slice(raw: &[u8]) -> Result<FeatureCollection, DatasetError> {
    let document: Value = serde_json::from_slice(raw)?;
    let Some(object) = document.as_object() else {
        return Err(DatasetError::NotAFeatureCollection);
    };
    if object.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err(DatasetError::NotAFeatureCollection);
    }
    let Some(features) = object.get("features").and_then(Value::as_array) else {
        return Err(DatasetError::MissingFeatures);
    };
    if let Some(index) = features.iter().position(|feature| !feature.is_object()) {
        return Err(DatasetError::InvalidFeature { index });
    }

    Ok(serde_json::from_value(document)?)
}

/// Owner of the original collection for the whole session. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct DatasetStore {
    original: FeatureCollection,
}

impl DatasetStore {
    pub fn new(original: FeatureCollection) -> Self {
        Self { original }
    }

    pub fn from_json(raw: &str) -> Result<Self, DatasetError> {
        load(raw).map(Self::new)
    }

    pub fn original(&self) -> &FeatureCollection {
        &self.original
    }
}

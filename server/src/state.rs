use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use productividad_shared::dataset::load_slice;
use productividad_shared::vocabulary::extract;
use productividad_shared::{CropMatch, DatasetError, Vocabulary};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid dataset {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: DatasetError,
    },
}

/// The GeoJSON file as served, plus what was learned while validating it.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    /// Original bytes, served verbatim.
    pub bytes: Bytes,
    pub etag: String,
    pub features: usize,
    pub vocabulary: Vocabulary,
    pub loaded_at: DateTime<Utc>,
}

impl LoadedDataset {
    pub fn from_bytes(bytes: Bytes) -> Result<Self, DatasetError> {
        let collection = load_slice(&bytes)?;
        Ok(Self {
            etag: content_etag(&bytes),
            features: collection.len(),
            vocabulary: extract(&collection),
            loaded_at: Utc::now(),
            bytes,
        })
    }

    pub async fn from_path(path: &Path) -> Result<Self, LoadError> {
        let raw = tokio::fs::read(path).await.map_err(|source| LoadError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_bytes(Bytes::from(raw)).map_err(|source| LoadError::Invalid {
            path: path.to_owned(),
            source,
        })
    }
}

fn content_etag(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("\"dataset-{}\"", hex::encode(&digest[..12]))
}

#[derive(Clone)]
pub struct AppState {
    pub dataset: Arc<LoadedDataset>,
    pub crop_match: CropMatch,
    pub static_dir: PathBuf,
    pub observability: Arc<ObservabilityCounters>,
}

impl AppState {
    pub fn new(dataset: LoadedDataset, crop_match: CropMatch, static_dir: PathBuf) -> Self {
        Self {
            dataset: Arc::new(dataset),
            crop_match,
            static_dir,
            observability: Arc::new(ObservabilityCounters::default()),
        }
    }
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    dataset_requests_total: AtomicU64,
    dataset_not_modified_total: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct ObservabilitySnapshot {
    pub dataset_requests_total: u64,
    pub dataset_not_modified_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            dataset_requests_total: self.dataset_requests_total.load(Ordering::Relaxed),
            dataset_not_modified_total: self.dataset_not_modified_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_dataset_request(&self) {
        self.dataset_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dataset_not_modified(&self) {
        self.dataset_not_modified_total
            .fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "name": "productividad",
        "features": [
            {"type":"Feature","properties":{"dp_nomb":"ANTIOQUIA","mpio_cnmbr":"MEDELLÍN","AreaSembrada":1520.5,"Cultivos":"Café, Maíz"},
             "geometry":{"type":"Polygon","coordinates":[[[-75.7,6.1],[-75.4,6.1],[-75.4,6.4],[-75.7,6.1]]]}},
            {"type":"Feature","properties":{"dp_nomb":"CAUCA","mpio_cnmbr":"POPAYÁN","Cultivos":"Café"},
             "geometry":{"type":"Polygon","coordinates":[[[-76.7,2.3],[-76.4,2.3],[-76.4,2.6],[-76.7,2.3]]]}}
        ]
    }"#;

    pub(crate) fn sample_state() -> AppState {
        let dataset =
            LoadedDataset::from_bytes(Bytes::from_static(SAMPLE.as_bytes())).expect("sample parses");
        AppState::new(dataset, CropMatch::Substring, PathBuf::from("client/dist"))
    }

    #[test]
    fn loaded_dataset_summarises_collection() {
        let state = sample_state();
        assert_eq!(state.dataset.features, 2);
        assert_eq!(state.dataset.vocabulary.departments, ["ANTIOQUIA", "CAUCA"]);
        assert_eq!(state.dataset.vocabulary.crops, ["Café", "Maíz"]);
        assert_eq!(state.dataset.bytes, SAMPLE.as_bytes());
    }

    #[test]
    fn etag_is_stable_and_content_derived() {
        let a = content_etag(b"one");
        assert_eq!(a, content_etag(b"one"));
        assert_ne!(a, content_etag(b"two"));
        assert!(a.starts_with("\"dataset-") && a.ends_with('"'));
        assert_eq!(a.len(), "\"dataset-\"".len() + 24);
    }

    #[test]
    fn invalid_dataset_is_rejected() {
        let err = LoadedDataset::from_bytes(Bytes::from_static(br#"{"type":"Feature"}"#))
            .expect_err("not a collection");
        assert!(matches!(err, DatasetError::NotAFeatureCollection));
    }

    #[tokio::test]
    async fn missing_file_reports_path() {
        let err = LoadedDataset::from_path(Path::new("does/not/exist.geojson"))
            .await
            .expect_err("missing file");
        assert!(matches!(err, LoadError::Read { .. }));
        assert!(err.to_string().contains("does/not/exist.geojson"));
    }
}

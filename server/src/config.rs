use std::path::PathBuf;

use productividad_shared::CropMatch;

pub const DEFAULT_DATASET_PATH: &str = "data/productividad_colombia_final.geojson";
pub const DEFAULT_STATIC_DIR: &str = "client/dist";
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// The dataset never changes while the process runs; clients revalidate with the ETag.
pub const DATASET_CACHE_CONTROL: &str = "public, max-age=300";

pub fn dataset_path() -> PathBuf {
    non_empty_var("DATASET_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET_PATH))
}

pub fn static_dir() -> PathBuf {
    non_empty_var("STATIC_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR))
}

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

/// Crop filter semantics advertised to clients. Unknown values fall back to substring.
pub fn crop_match() -> CropMatch {
    std::env::var("CROP_MATCH")
        .ok()
        .and_then(|value| match value.parse::<CropMatch>() {
            Ok(mode) => Some(mode),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring CROP_MATCH");
                None
            }
        })
        .unwrap_or_default()
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

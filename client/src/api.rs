use productividad_shared::dataset::load;
use productividad_shared::{CropMatch, FeatureCollection};

pub const DATASET_URL: &str = "/api/dataset";
pub const HEALTH_URL: &str = "/api/health";

/// Fetch and parse the dataset. The only network round-trip the map needs.
pub async fn fetch_dataset() -> Result<FeatureCollection, String> {
    let resp = gloo_net::http::Request::get(DATASET_URL)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;

    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }

    let raw = resp
        .text()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;
    load(&raw).map_err(|e| format!("parse error: {e}"))
}

/// Crop matching mode advertised by the server. Falls back to the default when
/// the health endpoint is unreachable.
pub async fn fetch_crop_match() -> CropMatch {
    let Ok(resp) = gloo_net::http::Request::get(HEALTH_URL).send().await else {
        return CropMatch::default();
    };
    if !resp.ok() {
        return CropMatch::default();
    }
    let Ok(json) = resp.json::<serde_json::Value>().await else {
        return CropMatch::default();
    };
    crop_match_from_health(&json)
}

fn crop_match_from_health(health: &serde_json::Value) -> CropMatch {
    health
        .get("crop_match")
        .and_then(|v| v.as_str())
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

use std::fmt::Write as _;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::config::DATASET_CACHE_CONTROL;
use crate::state::{AppState, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const GEOJSON_CONTENT_TYPE: &str = "application/geo+json";

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let dataset = &state.dataset;
    let observability = state.observability.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "features": dataset.features,
        "departments": dataset.vocabulary.departments.len(),
        "municipalities": dataset.vocabulary.municipalities.len(),
        "crops": dataset.vocabulary.crops.len(),
        "crop_match": state.crop_match.as_str(),
        "dataset_etag": dataset.etag,
        "loaded_at": dataset.loaded_at.to_rfc3339(),
        "observability": {
            "dataset_requests_total": observability.dataset_requests_total,
            "dataset_not_modified_total": observability.dataset_not_modified_total,
        }
    }))
}

/// The dataset exactly as read at startup; never re-serialized.
pub async fn get_dataset(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state.observability.record_dataset_request();
    let etag = state.dataset.etag.as_str();

    if if_none_match_matches(&headers, etag) {
        state.observability.record_dataset_not_modified();
        return not_modified_response(DATASET_CACHE_CONTROL, Some(etag));
    }

    geojson_bytes_response(
        state.dataset.bytes.clone(),
        DATASET_CACHE_CONTROL,
        Some(etag),
    )
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = render_prometheus_metrics(
        state.dataset.features,
        state.dataset.bytes.len(),
        state.observability.snapshot(),
    );

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

fn render_prometheus_metrics(
    feature_count: usize,
    dataset_bytes: usize,
    observability: ObservabilitySnapshot,
) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        "# HELP productividad_features Number of features in the loaded dataset."
    );
    let _ = writeln!(body, "# TYPE productividad_features gauge");
    let _ = writeln!(body, "productividad_features {feature_count}");

    let _ = writeln!(
        body,
        "# HELP productividad_dataset_bytes Size of the served dataset in bytes."
    );
    let _ = writeln!(body, "# TYPE productividad_dataset_bytes gauge");
    let _ = writeln!(body, "productividad_dataset_bytes {dataset_bytes}");

    let _ = writeln!(
        body,
        "# HELP productividad_dataset_requests_total Total dataset requests received."
    );
    let _ = writeln!(body, "# TYPE productividad_dataset_requests_total counter");
    let _ = writeln!(
        body,
        "productividad_dataset_requests_total {}",
        observability.dataset_requests_total
    );

    let _ = writeln!(
        body,
        "# HELP productividad_dataset_not_modified_total Dataset requests answered with 304."
    );
    let _ = writeln!(body, "# TYPE productividad_dataset_not_modified_total counter");
    let _ = writeln!(
        body,
        "productividad_dataset_not_modified_total {}",
        observability.dataset_not_modified_total
    );

    body
}

fn geojson_bytes_response(body: Bytes, cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(GEOJSON_CONTENT_TYPE),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn not_modified_response(cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn normalize_etag(candidate: &str) -> &str {
    candidate.strip_prefix("W/").unwrap_or(candidate).trim()
}

fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Ok(raw) = value.to_str() else {
        return false;
    };

    raw.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || normalize_etag(candidate) == normalize_etag(etag)
    })
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::{if_none_match_matches, render_prometheus_metrics};
    use crate::state::tests::{SAMPLE, sample_state};
    use crate::state::{AppState, ObservabilitySnapshot};

    async fn spawn_test_server(state: AppState) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let app = crate::app::build_app(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve test app");
        });
        (addr, handle)
    }

    #[test]
    fn metrics_output_contains_prometheus_help_type_and_values() {
        let observability = ObservabilitySnapshot {
            dataset_requests_total: 12,
            dataset_not_modified_total: 4,
        };

        let metrics = render_prometheus_metrics(1122, 4096, observability);

        assert!(metrics.contains("# HELP productividad_features"));
        assert!(metrics.contains("# TYPE productividad_dataset_requests_total counter"));
        assert!(metrics.contains("productividad_features 1122"));
        assert!(metrics.contains("productividad_dataset_bytes 4096"));
        assert!(metrics.contains("productividad_dataset_requests_total 12"));
        assert!(metrics.contains("productividad_dataset_not_modified_total 4"));
    }

    #[test]
    fn if_none_match_supports_weak_and_multiple_etags() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            axum::http::header::IF_NONE_MATCH,
            axum::http::HeaderValue::from_static("W/\"other\", \"dataset-abc\""),
        );
        assert!(if_none_match_matches(&headers, "\"dataset-abc\""));
        assert!(!if_none_match_matches(&headers, "\"dataset-def\""));
        assert!(!if_none_match_matches(
            &axum::http::HeaderMap::new(),
            "\"dataset-abc\""
        ));
    }

    #[tokio::test]
    async fn dataset_endpoint_serves_raw_bytes_and_honours_etag() {
        let (addr, server_handle) = spawn_test_server(sample_state()).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();

        let first = client
            .get(format!("{base_url}/api/dataset"))
            .send()
            .await
            .expect("dataset request should succeed");
        assert_eq!(first.status(), reqwest::StatusCode::OK);
        assert_eq!(
            first
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("application/geo+json")
        );
        let etag = first
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .expect("etag header should be present");
        let body = first.text().await.expect("read dataset body");
        assert_eq!(body, SAMPLE);

        let second = client
            .get(format!("{base_url}/api/dataset"))
            .header(reqwest::header::IF_NONE_MATCH, etag.clone())
            .send()
            .await
            .expect("conditional dataset request should succeed");
        assert_eq!(second.status(), reqwest::StatusCode::NOT_MODIFIED);
        assert_eq!(
            second
                .headers()
                .get(reqwest::header::ETAG)
                .and_then(|value| value.to_str().ok()),
            Some(etag.as_str())
        );

        let metrics = client
            .get(format!("{base_url}/api/metrics"))
            .send()
            .await
            .expect("metrics request")
            .text()
            .await
            .expect("metrics text");
        assert!(metrics.contains("productividad_dataset_requests_total 2"));
        assert!(metrics.contains("productividad_dataset_not_modified_total 1"));

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn health_exposes_dataset_summary() {
        let (addr, server_handle) = spawn_test_server(sample_state()).await;

        let health = reqwest::Client::new()
            .get(format!("http://{addr}/api/health"))
            .send()
            .await
            .expect("health request")
            .error_for_status()
            .expect("health status")
            .json::<serde_json::Value>()
            .await
            .expect("parse health");

        assert_eq!(health["status"], "ok");
        assert_eq!(health["features"], 2);
        assert_eq!(health["departments"], 2);
        assert_eq!(health["municipalities"], 2);
        assert_eq!(health["crops"], 2);
        assert_eq!(health["crop_match"], "substring");
        assert_eq!(health["observability"]["dataset_requests_total"], 0);

        server_handle.abort();
        let _ = server_handle.await;
    }
}

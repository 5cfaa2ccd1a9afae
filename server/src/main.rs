mod app;
mod config;
mod routes;
mod state;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::state::{AppState, LoadedDataset};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let dataset_path = config::dataset_path();
    tracing::info!(path = %dataset_path.display(), "Loading dataset...");
    let dataset = match LoadedDataset::from_path(&dataset_path).await {
        Ok(dataset) => dataset,
        Err(e) => {
            tracing::error!(error = %e, "failed to load dataset");
            return;
        }
    };
    tracing::info!(
        features = dataset.features,
        departments = dataset.vocabulary.departments.len(),
        municipalities = dataset.vocabulary.municipalities.len(),
        crops = dataset.vocabulary.crops.len(),
        bytes = dataset.bytes.len(),
        "Dataset loaded"
    );
    if dataset.features == 0 {
        tracing::warn!("dataset has no features; the map will be empty");
    }

    let crop_match = config::crop_match();
    let static_dir = config::static_dir();
    if !static_dir.is_dir() {
        tracing::warn!(dir = %static_dir.display(), "static directory not found; only the API is served");
    }

    let state = AppState::new(dataset, crop_match, static_dir);
    let app = app::build_app(state);

    let addr = format!("0.0.0.0:{}", config::server_port());
    tracing::info!(crop_match = crop_match.as_str(), "Productividad map server listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    tracing::info!("Server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

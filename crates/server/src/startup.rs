use std::{net::SocketAddr, sync::Arc};

use axum::{extract::DefaultBodyLimit, Router};
use configs::AppConfig;
use service::{storage, KvService};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::errors::StartupError;
use crate::routes;

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Load configuration from `CONFIG_PATH`/`config.toml`, falling back to defaults.
pub fn load_config() -> Result<AppConfig, StartupError> {
    AppConfig::load_or_default().map_err(|e| StartupError::InvalidConfig(e.to_string()))
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("bad bind address: {e}")))
}

/// Build the configured backing store and wrap it in the application router.
pub async fn build_app(cfg: &AppConfig) -> Result<Router, StartupError> {
    let store = storage::connect(cfg).await?;
    let service = KvService::from_config("default", store, &cfg.store);
    if service.allow_nuke() {
        warn!("POST /v1/nuke is enabled");
    }
    Ok(routes::build_router(Arc::new(service), build_cors())
        .layer(DefaultBodyLimit::max(cfg.server.max_body_bytes)))
}

/// Serve on an already-bound listener until the future resolves or the server fails.
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), StartupError> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| StartupError::Any(e.into()))
}

/// Build the app from `cfg` and run the HTTP server until Ctrl+C.
pub async fn run_with_config(cfg: AppConfig) -> Result<(), StartupError> {
    let app = build_app(&cfg).await?;

    let addr = bind_addr(&cfg)?;
    info!(%addr, backend = ?cfg.store.backend, "starting key-value server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| StartupError::Any(e.into()))?;
    serve(listener, app, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("received Ctrl+C, shutting down");
    })
    .await
}

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::types::Health;
use service::KvService;

pub mod kv;

pub async fn health() -> Json<Health> {
    Json(Health::ok())
}

/// Routes for one service instance, without middleware.
pub fn kv_routes(service: Arc<KvService>) -> Router {
    Router::new()
        .route("/v1/all", get(kv::get_all))
        .route("/v1/nuke", post(kv::nuke))
        .route(
            "/v1/key/:key",
            put(kv::put_key).get(kv::get_key).delete(kv::delete_key),
        )
        // an empty path segment still gets a validation answer instead of a routing 404
        .route(
            "/v1/key/",
            put(kv::put_empty_key).get(kv::get_empty_key).delete(kv::delete_empty_key),
        )
        .with_state(service)
}

/// Build the full application router for a single instance.
pub fn build_router(service: Arc<KvService>, cors: CorsLayer) -> Router {
    with_layers(
        Router::new().route("/health", get(health)).merge(kv_routes(service)),
        cors,
    )
}

/// Mount several independent instances, each under its own prefix
/// (e.g. `/tenant-a/v1/key/...`).
pub fn nest_instances<I>(instances: I, cors: CorsLayer) -> Router
where
    I: IntoIterator<Item = (String, Arc<KvService>)>,
{
    let router = instances
        .into_iter()
        .fold(Router::new().route("/health", get(health)), |router, (prefix, svc)| {
            router.nest(&prefix, kv_routes(svc))
        });
    with_layers(router, cors)
}

fn with_layers(router: Router, cors: CorsLayer) -> Router {
    router.layer(cors).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
            // 5xx at ERROR
            .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
    )
}

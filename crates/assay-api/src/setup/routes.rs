//! Route configuration and setup

use crate::constants::{HTTP_CONCURRENCY_LIMIT, MULTIPART_OVERHEAD_BYTES};
use crate::handlers;
use crate::middleware::request_id_middleware;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use assay_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let body_limit = usize::try_from(config.max_upload_size_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let app = Router::new()
        .route("/", get(handlers::health::index))
        .route("/health", get(handlers::health::liveness_check))
        .route("/health/ready", get(handlers::health::readiness_check))
        .route(
            "/upload",
            post(handlers::uploads::upload_file).get(handlers::uploads::list_uploads),
        )
        .route(
            "/upload/{fileName}",
            get(handlers::uploads::get_upload).delete(handlers::uploads::delete_upload),
        )
        .route("/process/{fileName}", post(handlers::process::process_file))
        .route("/outputs", get(handlers::outputs::list_outputs))
        .route(
            "/outputs/{fileName}",
            get(handlers::outputs::download_output).delete(handlers::outputs::delete_output),
        )
        .with_state(state);

    // The multipart extractor has its own 2 MB default; the upload ceiling is
    // enforced by the body limit layer and again while streaming.
    let app = app
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit));

    let app = match config.request_timeout() {
        Some(timeout) => {
            tracing::info!(timeout_secs = timeout.as_secs(), "Request timeout enabled");
            app.layer(TimeoutLayer::new(timeout))
        }
        None => app,
    };

    let app = app
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware));

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {:?}: {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

pub mod health;

use axum::{
    http::{header, HeaderName, Method},
    routing::{any, get},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::applications::handlers as applications;
use crate::ingest::handlers as ingest;
use crate::state::AppState;

/// Preflight answers for browser callers of the hosted app.
/// Every `OPTIONS` request is answered here with an empty 200.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Ingestion trigger: any method starts a run
        .route("/api/v1/ingest/linkedin", any(ingest::handle_ingest))
        // Applications API
        .route(
            "/api/v1/applications",
            get(applications::handle_list_applications).post(applications::handle_apply),
        )
        .route(
            "/api/v1/applications/metrics",
            get(applications::handle_metrics),
        )
        .route("/api/v1/jobs", get(applications::handle_search_jobs))
        .layer(cors_layer())
        .with_state(state)
}

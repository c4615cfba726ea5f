pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod types;
pub mod utils;

use axum::{http::Method, middleware as axum_middleware, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Composes the audit trail routes with the shared layers
/// (request ids, tracing, CORS) and application state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::audit_events::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST])
                        .allow_headers(Any),
                )
                .layer(axum_middleware::from_fn(middleware::request_id::request_id)),
        )
        .with_state(state)
}

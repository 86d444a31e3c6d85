//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: the intent pipeline and per-request context
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower::limit::ConcurrencyLimitLayer;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Requests processed concurrently; each one may hold a completion call open.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 64;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    // Identity-scoped routes: require the caller headers.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::identity_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/v1", protected)
        .layer(ServiceBuilder::new().layer(ConcurrencyLimitLayer::new(DEFAULT_CONCURRENCY_LIMIT)))
}

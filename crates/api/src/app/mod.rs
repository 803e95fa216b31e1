//! HTTP application wiring.
//!
//! - `services.rs`: the event store and the workflow services built over it
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request bodies and response views
//! - `errors.rs`: error taxonomy to status code mapping

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router.
pub fn build_app(services: services::AppServices) -> Router {
    let services = Arc::new(services);

    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::actor_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::request_log)))
}

//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/engine selection and the resolver/filter they feed
//! - `routes/`: HTTP routes + handlers
//! - `errors.rs`: problem envelopes to HTTP responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router().layer(Extension(services)))
        .layer(ServiceBuilder::new())
}

use axum::Router;

pub mod licenses;
pub mod system;

/// Router for the license endpoints.
pub fn router() -> Router {
    Router::new().nest("/licenses", licenses::router())
}

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::get,
    Router,
};
use serde::Deserialize;

use licensehub_core::LicenseId;
use licensehub_licensing::{shape_license, shape_listing, Shaped};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_licenses))
        .route("/:license_id", get(get_license))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListLicensesQuery {
    /// Minimum number of distinct activating devices.
    pub devices: Option<String>,
}

/// Return the license of the purchase owning `license_id`, generating it on
/// first request. Linked from license status documents, so it is served as a
/// file download.
pub async fn get_license(
    Extension(services): Extension<Arc<AppServices>>,
    Path(license_id): Path<String>,
) -> axum::response::Response {
    let license_id = LicenseId::from(license_id);
    let shaped = shape_license(services.resolver.resolve(&license_id).await);

    errors::shaped_response(Shaped {
        problem: shaped.problem,
        body: shaped.body.map(|license| license.document),
    })
}

/// Licenses activated by at least `?devices=N` distinct devices (all when absent).
pub async fn list_licenses(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListLicensesQuery>,
) -> axum::response::Response {
    let outcome = services.filter.query(query.devices.as_deref()).await;
    errors::shaped_response(shape_listing(outcome))
}

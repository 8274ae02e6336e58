//! Collaborators the workflow depends on.
//!
//! Both are I/O bound and may block; the workflow awaits them and adds no
//! concurrency of its own.

use std::sync::Arc;

use licensehub_core::{LicenseId, StoreResult};

use crate::license::License;
use crate::purchase::Purchase;

/// Read access to purchase and license records.
#[async_trait::async_trait]
pub trait StoreFacade: Send + Sync {
    /// Find the purchase that owns `license_id`.
    ///
    /// Returns `StoreError::NotFound` when no purchase references the id.
    async fn purchase_by_license_id(&self, license_id: &LicenseId) -> StoreResult<Purchase>;

    /// Licenses activated by at least `min_devices` distinct devices.
    ///
    /// `min_devices` is the raw textual threshold; implementations parse it
    /// and report a malformed value as `StoreError::Backend`.
    async fn licenses_filtered(&self, min_devices: &str) -> StoreResult<Vec<License>>;
}

/// Produces the single canonical license for a purchase.
///
/// Implementations must be idempotent and concurrency safe: when a license
/// already exists for the purchase it is returned unchanged, otherwise one is
/// generated and persisted so that every concurrent caller for the same
/// purchase observes that same license.
#[async_trait::async_trait]
pub trait IssuanceEngine: Send + Sync {
    async fn issue_or_fetch(&self, purchase: &Purchase) -> StoreResult<License>;
}

#[async_trait::async_trait]
impl<S> StoreFacade for Arc<S>
where
    S: StoreFacade + ?Sized,
{
    async fn purchase_by_license_id(&self, license_id: &LicenseId) -> StoreResult<Purchase> {
        (**self).purchase_by_license_id(license_id).await
    }

    async fn licenses_filtered(&self, min_devices: &str) -> StoreResult<Vec<License>> {
        (**self).licenses_filtered(min_devices).await
    }
}

#[async_trait::async_trait]
impl<E> IssuanceEngine for Arc<E>
where
    E: IssuanceEngine + ?Sized,
{
    async fn issue_or_fetch(&self, purchase: &Purchase) -> StoreResult<License> {
        (**self).issue_or_fetch(purchase).await
    }
}

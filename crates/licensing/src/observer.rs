//! Injectable observability hook.
//!
//! The resolver and filter report what they did through a
//! `ResolutionObserver` handed to them at construction, never through a
//! process-wide logger.

use licensehub_core::LicenseId;

use crate::license::License;
use crate::problem::Failure;
use crate::purchase::Purchase;

pub trait ResolutionObserver: Send + Sync {
    /// A license was returned for `license_id`.
    fn license_resolved(&self, license_id: &LicenseId, purchase: &Purchase, license: &License);

    /// Resolution of `license_id` ended in `failure`.
    fn resolution_failed(&self, license_id: &LicenseId, failure: &Failure);

    /// A filtered listing was requested with the effective threshold.
    fn listing_requested(&self, min_devices: &str);

    /// A filtered listing failed.
    fn listing_failed(&self, min_devices: &str, failure: &Failure);
}

/// Emits structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ResolutionObserver for TracingObserver {
    fn license_resolved(&self, license_id: &LicenseId, purchase: &Purchase, license: &License) {
        tracing::info!(
            license_id = %license_id,
            purchase_id = %purchase.id,
            publication = %purchase.publication.title,
            issued = %license.issued,
            "license resolved"
        );
    }

    fn resolution_failed(&self, license_id: &LicenseId, failure: &Failure) {
        match failure {
            Failure::NotFound(detail) => {
                tracing::info!(license_id = %license_id, detail = %detail, "license not found")
            }
            Failure::Backend(detail) => {
                tracing::error!(license_id = %license_id, detail = %detail, "license resolution failed")
            }
        }
    }

    fn listing_requested(&self, min_devices: &str) {
        tracing::info!(min_devices = %min_devices, "listing licenses by device activations");
    }

    fn listing_failed(&self, min_devices: &str, failure: &Failure) {
        tracing::warn!(min_devices = %min_devices, error = %failure, "license listing failed");
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ResolutionObserver for NoopObserver {
    fn license_resolved(&self, _: &LicenseId, _: &Purchase, _: &License) {}
    fn resolution_failed(&self, _: &LicenseId, _: &Failure) {}
    fn listing_requested(&self, _: &str) {}
    fn listing_failed(&self, _: &str, _: &Failure) {}
}

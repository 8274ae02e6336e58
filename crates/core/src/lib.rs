//! `licensehub-core` — shared building blocks.
//!
//! Identifiers and the error type every storage/issuance adapter reports
//! through. No infrastructure concerns live here.

pub mod error;
pub mod id;

pub use error::{StoreError, StoreResult};
pub use id::{DeviceId, InvalidId, LicenseId, PublicationId, PurchaseId, UserId};

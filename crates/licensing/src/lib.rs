//! `licensehub-licensing` — license resolution and issuance workflow.
//!
//! - `purchase` / `license`: the records the workflow reads and returns
//! - `ports`: the store facade and issuance engine the workflow talks to
//! - `resolver`: get-or-create of the single license owned by a purchase
//! - `filter`: device-activation threshold listing
//! - `problem`: failure taxonomy and protocol-level response shaping
//! - `observer`: injectable structured logging hook

pub mod filter;
pub mod license;
pub mod observer;
pub mod ports;
pub mod problem;
pub mod purchase;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use filter::{ActivationFilter, DEFAULT_THRESHOLD, parse_threshold};
pub use license::{DeviceActivation, License, LicenseSummary, Rights};
pub use observer::{NoopObserver, ResolutionObserver, TracingObserver};
pub use ports::{IssuanceEngine, StoreFacade};
pub use problem::{
    Failure, Headers, LICENSE_CONTENT_TYPE, LICENSE_FILE_NAME, Problem, ProblemStatus, Shaped,
    shape_license, shape_listing,
};
pub use purchase::{Publication, Purchase, PurchaseKind, PurchaseStatus, User};
pub use resolver::LicenseResolver;

//! Device-activation filtered listing.

use std::sync::Arc;

use crate::license::License;
use crate::observer::{ResolutionObserver, TracingObserver};
use crate::ports::StoreFacade;
use crate::problem::Failure;

/// Threshold used when the caller gives none: every license qualifies.
pub const DEFAULT_THRESHOLD: &str = "0";

/// Effective device threshold for a raw query value.
///
/// Absent or empty input means no minimum. Anything else is passed through
/// as-is; numeric validation belongs to the store.
pub fn parse_threshold(raw: Option<&str>) -> String {
    match raw {
        None | Some("") => DEFAULT_THRESHOLD.to_string(),
        Some(value) => value.to_string(),
    }
}

pub struct ActivationFilter<S> {
    store: S,
    observer: Arc<dyn ResolutionObserver>,
}

impl<S> ActivationFilter<S>
where
    S: StoreFacade,
{
    pub fn new(store: S, observer: Arc<dyn ResolutionObserver>) -> Self {
        Self { store, observer }
    }

    pub fn with_tracing(store: S) -> Self {
        Self::new(store, Arc::new(TracingObserver))
    }

    /// Licenses activated by at least the requested number of devices.
    pub async fn query(&self, raw_threshold: Option<&str>) -> Result<Vec<License>, Failure> {
        let threshold = parse_threshold(raw_threshold);
        self.observer.listing_requested(&threshold);

        self.store
            .licenses_filtered(&threshold)
            .await
            .map_err(|e| {
                let failure = Failure::from(e);
                self.observer.listing_failed(&threshold, &failure);
                failure
            })
    }
}

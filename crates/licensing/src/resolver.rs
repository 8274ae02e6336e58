//! Single-license resolution.
//!
//! Looks up the purchase owning a license id, then asks the issuance engine
//! for that purchase's canonical license. At-most-one generation per purchase
//! is the engine's guarantee; the resolver adds no locking and never retries,
//! since a retry after an ambiguous engine error could race a concurrent
//! generation.

use std::sync::Arc;

use licensehub_core::LicenseId;

use crate::license::License;
use crate::observer::{ResolutionObserver, TracingObserver};
use crate::ports::{IssuanceEngine, StoreFacade};
use crate::problem::Failure;

pub struct LicenseResolver<S, E> {
    store: S,
    engine: E,
    observer: Arc<dyn ResolutionObserver>,
}

impl<S, E> LicenseResolver<S, E>
where
    S: StoreFacade,
    E: IssuanceEngine,
{
    pub fn new(store: S, engine: E, observer: Arc<dyn ResolutionObserver>) -> Self {
        Self {
            store,
            engine,
            observer,
        }
    }

    /// Resolver reporting through `tracing`.
    pub fn with_tracing(store: S, engine: E) -> Self {
        Self::new(store, engine, Arc::new(TracingObserver))
    }

    pub async fn resolve(&self, license_id: &LicenseId) -> Result<License, Failure> {
        let purchase = match self.store.purchase_by_license_id(license_id).await {
            Ok(p) => p,
            Err(e) => {
                let failure = Failure::from(e);
                self.observer.resolution_failed(license_id, &failure);
                return Err(failure);
            }
        };

        // Whatever the engine reports, a missing license at this point is a
        // server-side condition.
        let license = match self.engine.issue_or_fetch(&purchase).await {
            Ok(l) => l,
            Err(e) => {
                let failure = Failure::Backend(e.message().to_string());
                self.observer.resolution_failed(license_id, &failure);
                return Err(failure);
            }
        };

        self.observer.license_resolved(license_id, &purchase, &license);
        Ok(license)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use licensehub_core::StoreError;

    use crate::problem::{ProblemStatus, shape_license};
    use crate::testing::{CountingEngine, FakeStore, RecordingObserver, purchase};

    fn resolver(
        store: FakeStore,
    ) -> (
        LicenseResolver<Arc<FakeStore>, Arc<CountingEngine>>,
        Arc<CountingEngine>,
        Arc<RecordingObserver>,
    ) {
        let engine = Arc::new(CountingEngine::default());
        let observer = RecordingObserver::arc();
        let resolver = LicenseResolver::new(Arc::new(store), engine.clone(), observer.clone());
        (resolver, engine, observer)
    }

    fn store_with_abc123() -> FakeStore {
        FakeStore {
            purchases: vec![purchase("p1", "abc123")],
            ..FakeStore::default()
        }
    }

    #[tokio::test]
    async fn resolves_new_license_for_purchase() {
        let (resolver, engine, observer) = resolver(store_with_abc123());

        let license = resolver.resolve(&LicenseId::from("abc123")).await.unwrap();

        assert_eq!(license.id.as_str(), "abc123");
        assert_eq!(license.purchase_id.as_str(), "p1");
        assert_eq!(engine.generated(), 1);
        assert_eq!(observer.events(), vec!["resolved abc123 p1".to_string()]);

        let shaped = shape_license(Ok(license));
        assert_eq!(shaped.problem.status, ProblemStatus::Ok);
        assert!(shaped.problem.headers.contains("Content-Disposition"));
    }

    #[tokio::test]
    async fn sequential_resolution_is_idempotent() {
        let (resolver, engine, _) = resolver(store_with_abc123());
        let id = LicenseId::from("abc123");

        let first = resolver.resolve(&id).await.unwrap();
        let second = resolver.resolve(&id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.issued, second.issued);
        assert_eq!(engine.generated(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_resolution_creates_one_license() {
        let (resolver, engine, _) = resolver(store_with_abc123());
        let resolver = Arc::new(resolver);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve(&LicenseId::from("abc123")).await })
            })
            .collect();

        let mut issued_at = Vec::new();
        for h in handles {
            let license = h.await.unwrap().unwrap();
            issued_at.push(license.issued);
        }

        assert_eq!(engine.generated(), 1);
        assert!(issued_at.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn unknown_license_is_not_found() {
        let (resolver, engine, observer) = resolver(store_with_abc123());

        let err = resolver.resolve(&LicenseId::from("unknown")).await.unwrap_err();

        assert!(matches!(err, Failure::NotFound(_)));
        assert_eq!(engine.generated(), 0);
        assert_eq!(observer.events().len(), 1);
        assert_eq!(shape_license(Err(err)).problem.status, ProblemStatus::NotFound);
    }

    #[tokio::test]
    async fn store_backend_error_is_backend_failure() {
        let (resolver, _, _) = resolver(FakeStore {
            fail_with: Some(StoreError::backend("connection refused")),
            ..FakeStore::default()
        });

        let err = resolver.resolve(&LicenseId::from("abc123")).await.unwrap_err();
        assert_eq!(err, Failure::Backend("connection refused".to_string()));
    }

    #[tokio::test]
    async fn engine_errors_are_always_backend_failures() {
        let engine = Arc::new(CountingEngine::failing(StoreError::not_found(
            "content not found on license server",
        )));
        let resolver = LicenseResolver::new(
            Arc::new(store_with_abc123()),
            engine,
            Arc::new(crate::observer::NoopObserver),
        );

        let err = resolver.resolve(&LicenseId::from("abc123")).await.unwrap_err();
        assert_eq!(
            err,
            Failure::Backend("content not found on license server".to_string())
        );
        assert_eq!(
            shape_license(Err(err)).problem.status,
            ProblemStatus::InternalError
        );
    }
}

//! Collaborator selection and the workflow services handlers call into.

use std::sync::Arc;

use licensehub_infra::{AppConfig, InMemoryStore, PostgresStore};
use licensehub_licensing::{
    ActivationFilter, IssuanceEngine, LicenseResolver, ResolutionObserver, StoreFacade,
    TracingObserver,
};

pub type DynStore = Arc<dyn StoreFacade>;
pub type DynEngine = Arc<dyn IssuanceEngine>;

/// Resolver and filter shared by every request. Both are stateless.
pub struct AppServices {
    pub resolver: LicenseResolver<DynStore, DynEngine>,
    pub filter: ActivationFilter<DynStore>,
}

impl AppServices {
    pub fn new(store: DynStore, engine: DynEngine, observer: Arc<dyn ResolutionObserver>) -> Self {
        Self {
            resolver: LicenseResolver::new(store.clone(), engine, observer.clone()),
            filter: ActivationFilter::new(store, observer),
        }
    }

    /// Services over an in-memory store that is also the issuance engine.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self::new(store.clone(), store, Arc::new(TracingObserver))
    }
}

/// Pick store and engine from configuration.
///
/// Postgres when `DATABASE_URL` is set, in-memory otherwise. With the
/// `remote` feature and `LCP_SERVER_URL` set, issuance goes to the upstream
/// license server instead.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let (store, engine): (DynStore, DynEngine) = match &config.database_url {
        Some(url) => {
            let pg = Arc::new(PostgresStore::connect(url, &config.provider).await?);
            pg.migrate().await?;
            tracing::info!("using postgres store");
            (pg.clone() as DynStore, pg as DynEngine)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            let mem = InMemoryStore::arc(&config.provider);
            (mem.clone() as DynStore, mem as DynEngine)
        }
    };

    #[cfg(feature = "remote")]
    let engine: DynEngine = match &config.remote {
        Some(remote) => {
            tracing::info!(base_url = %remote.base_url, "issuing through upstream license server");
            let remote: DynEngine = Arc::new(licensehub_infra::issuer::RemoteIssuer::new(
                remote.clone(),
                &config.provider,
            ));
            remote
        }
        None => engine,
    };

    #[cfg(not(feature = "remote"))]
    if config.remote.is_some() {
        tracing::warn!("LCP_SERVER_URL ignored: built without the `remote` feature");
    }

    Ok(AppServices::new(store, engine, Arc::new(TracingObserver)))
}

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use licensehub_core::{LicenseId, PurchaseId, StoreError, StoreResult};
use licensehub_licensing::{DeviceActivation, IssuanceEngine, License, Purchase, StoreFacade};

use super::parse_min_devices;
use crate::issuer::draft_license;

#[derive(Debug, Default)]
struct Tables {
    purchases: HashMap<PurchaseId, Purchase>,
    /// Issued licenses keyed by owning purchase (at most one per purchase).
    licenses: HashMap<PurchaseId, License>,
}

/// In-memory store for tests/dev.
///
/// Doubles as a local issuance engine: the existence check and the insert of
/// a generated license happen under one write guard, so concurrent callers
/// for the same purchase all get the first generated license.
#[derive(Debug)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    provider: String,
}

impl InMemoryStore {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            provider: provider.into(),
        }
    }

    pub fn arc(provider: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(provider))
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::backend("in-memory store lock poisoned"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::backend("in-memory store lock poisoned"))
    }

    /// Record a purchase. Replaces any purchase with the same id.
    pub fn insert_purchase(&self, purchase: Purchase) -> StoreResult<()> {
        self.write()?.purchases.insert(purchase.id.clone(), purchase);
        Ok(())
    }

    /// Record an already-issued license for its purchase.
    pub fn insert_license(&self, license: License) -> StoreResult<()> {
        let mut tables = self.write()?;
        if tables.licenses.contains_key(&license.purchase_id) {
            return Err(StoreError::backend(format!(
                "purchase {} already has a license",
                license.purchase_id
            )));
        }
        tables.licenses.insert(license.purchase_id.clone(), license);
        Ok(())
    }

    /// Register a device activation on an issued license.
    pub fn activate(&self, license_id: &LicenseId, activation: DeviceActivation) -> StoreResult<()> {
        let mut tables = self.write()?;
        let license = tables
            .licenses
            .values_mut()
            .find(|l| &l.id == license_id)
            .ok_or_else(|| StoreError::not_found(format!("license {license_id} not found")))?;
        license.devices.push(activation);
        license.updated = Some(Utc::now());
        Ok(())
    }

    pub fn license_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.licenses.len())
    }
}

#[async_trait::async_trait]
impl StoreFacade for InMemoryStore {
    async fn purchase_by_license_id(&self, license_id: &LicenseId) -> StoreResult<Purchase> {
        self.read()?
            .purchases
            .values()
            .find(|p| p.license_id.as_ref() == Some(license_id))
            .cloned()
            .ok_or_else(|| StoreError::not_found("record not found"))
    }

    async fn licenses_filtered(&self, min_devices: &str) -> StoreResult<Vec<License>> {
        let min = parse_min_devices(min_devices)?;
        let mut found: Vec<License> = self
            .read()?
            .licenses
            .values()
            .filter(|l| l.meets_threshold(min))
            .cloned()
            .collect();
        found.sort_by_key(|l| l.issued);
        Ok(found)
    }
}

#[async_trait::async_trait]
impl IssuanceEngine for InMemoryStore {
    async fn issue_or_fetch(&self, purchase: &Purchase) -> StoreResult<License> {
        let mut tables = self.write()?;
        let license = tables
            .licenses
            .entry(purchase.id.clone())
            .or_insert_with(|| {
                let license = draft_license(purchase, &self.provider, Utc::now());
                tracing::debug!(purchase_id = %purchase.id, license_id = %license.id, "generated license");
                license
            });
        Ok(license.clone())
    }
}

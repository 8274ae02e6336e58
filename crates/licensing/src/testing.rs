//! In-crate fakes for the collaborator traits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use licensehub_core::{
    DeviceId, LicenseId, PublicationId, PurchaseId, StoreError, StoreResult, UserId,
};

use crate::license::{DeviceActivation, License, Rights};
use crate::observer::ResolutionObserver;
use crate::ports::{IssuanceEngine, StoreFacade};
use crate::problem::Failure;
use crate::purchase::{Publication, Purchase, User};

pub fn purchase(id: &str, license_id: &str) -> Purchase {
    Purchase::buy(
        id,
        license_id,
        Publication {
            id: PublicationId::from("pub-1"),
            content_id: "content-1".to_string(),
            title: "Moby Dick".to_string(),
        },
        User {
            id: UserId::from("u1"),
            email: "reader@example.com".to_string(),
            name: "Reader".to_string(),
        },
    )
}

pub fn license_with_devices(id: &str, devices: usize) -> License {
    License {
        id: LicenseId::from(id),
        purchase_id: PurchaseId::from(format!("purchase-{id}")),
        content_id: "content-1".to_string(),
        user_id: UserId::from("u1"),
        provider: "https://provider.test".to_string(),
        issued: Utc::now(),
        updated: None,
        rights: Rights::default(),
        devices: (0..devices)
            .map(|n| DeviceActivation {
                device_id: DeviceId::from(format!("device-{n}")),
                device_name: format!("reader {n}"),
                activated_at: Utc::now(),
            })
            .collect(),
        document: serde_json::Value::Null,
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub purchases: Vec<Purchase>,
    pub licenses: Vec<License>,
    pub fail_with: Option<StoreError>,
    pub last_threshold: Mutex<Option<String>>,
}

#[async_trait::async_trait]
impl StoreFacade for FakeStore {
    async fn purchase_by_license_id(&self, license_id: &LicenseId) -> StoreResult<Purchase> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        self.purchases
            .iter()
            .find(|p| p.license_id.as_ref() == Some(license_id))
            .cloned()
            .ok_or_else(|| StoreError::not_found("record not found"))
    }

    async fn licenses_filtered(&self, min_devices: &str) -> StoreResult<Vec<License>> {
        *self.last_threshold.lock().unwrap() = Some(min_devices.to_string());
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        let min: u32 = min_devices
            .parse()
            .map_err(|e| StoreError::backend(format!("invalid device filter: {e}")))?;
        Ok(self
            .licenses
            .iter()
            .filter(|l| l.meets_threshold(min))
            .cloned()
            .collect())
    }
}

/// Get-or-create engine that counts how many licenses it generated.
#[derive(Default)]
pub struct CountingEngine {
    issued: Mutex<HashMap<PurchaseId, License>>,
    pub generated: AtomicUsize,
    pub fail_with: Option<StoreError>,
}

impl CountingEngine {
    /// Engine that reports `err` for every purchase.
    pub fn failing(err: StoreError) -> Self {
        Self {
            fail_with: Some(err),
            ..Self::default()
        }
    }

    pub fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IssuanceEngine for CountingEngine {
    async fn issue_or_fetch(&self, purchase: &Purchase) -> StoreResult<License> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        tokio::task::yield_now().await;
        let mut issued = self.issued.lock().unwrap();
        let license = issued.entry(purchase.id.clone()).or_insert_with(|| {
            self.generated.fetch_add(1, Ordering::SeqCst);
            let id = purchase.license_id.clone().unwrap_or_default();
            let mut license = license_with_devices(id.as_str(), 0);
            license.purchase_id = purchase.id.clone();
            license
        });
        Ok(license.clone())
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ResolutionObserver for RecordingObserver {
    fn license_resolved(&self, license_id: &LicenseId, purchase: &Purchase, _: &License) {
        self.events
            .lock()
            .unwrap()
            .push(format!("resolved {license_id} {}", purchase.id));
    }

    fn resolution_failed(&self, license_id: &LicenseId, failure: &Failure) {
        self.events
            .lock()
            .unwrap()
            .push(format!("failed {license_id} {failure:?}"));
    }

    fn listing_requested(&self, min_devices: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("listing {min_devices}"));
    }

    fn listing_failed(&self, min_devices: &str, failure: &Failure) {
        self.events
            .lock()
            .unwrap()
            .push(format!("listing failed {min_devices} {failure:?}"));
    }
}

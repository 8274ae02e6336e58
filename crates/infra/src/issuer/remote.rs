//! Issuance through an upstream LCP license server.
//!
//! The upstream server owns generation and signing. The purchase's reserved
//! license id is the only link between the purchase and the upstream
//! license, so it is required: we first ask the server for that license and,
//! if it has never been generated, request generation under that id. A
//! server that answers with a different id would leave the purchase pointing
//! at nothing and make the next call generate again, so such an answer is an
//! error. Calls for the same purchase are serialised so two requests cannot
//! both observe "missing" and generate twice.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::{Value as JsonValue, json};
use tokio::sync::Mutex;

use licensehub_core::{LicenseId, PurchaseId, StoreError, StoreResult};
use licensehub_licensing::{IssuanceEngine, License, Purchase, Rights};

use crate::config::RemoteConfig;

pub struct RemoteIssuer {
    client: reqwest::Client,
    config: RemoteConfig,
    provider: String,
    in_flight: Mutex<HashMap<PurchaseId, Arc<Mutex<()>>>>,
}

impl RemoteIssuer {
    pub fn new(config: RemoteConfig, provider: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            provider: provider.into(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    async fn purchase_lock(&self, purchase_id: &PurchaseId) -> Arc<Mutex<()>> {
        let mut locks = self.in_flight.lock().await;
        locks.entry(purchase_id.clone()).or_default().clone()
    }

    async fn release(&self, purchase_id: &PurchaseId) {
        let mut locks = self.in_flight.lock().await;
        // Only the map still holds it: nobody is waiting.
        if locks.get(purchase_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(purchase_id);
        }
    }

    /// The partial license the server completes: user, provider and rights.
    fn partial_license(&self, purchase: &Purchase, id: &LicenseId) -> JsonValue {
        let mut rights = serde_json::Map::new();
        if purchase.is_loan() {
            if let Some(start) = purchase.start_date {
                rights.insert("start".into(), json!(start));
            }
            if let Some(end) = purchase.end_date {
                rights.insert("end".into(), json!(end));
            }
        }
        json!({
            "id": id,
            "provider": self.provider,
            "user": {
                "id": purchase.user.id,
                "email": purchase.user.email,
                "name": purchase.user.name,
            },
            "rights": rights,
        })
    }

    async fn post(&self, url: String, body: &JsonValue) -> StoreResult<Option<JsonValue>> {
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::backend(format!("license server unreachable: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => response
                .json::<JsonValue>()
                .await
                .map(Some)
                .map_err(|e| StoreError::backend(format!("invalid license from server: {e}"))),
            s => Err(StoreError::backend(format!(
                "license server answered {s} for {url}"
            ))),
        }
    }

    async fn fetch_or_generate(&self, purchase: &Purchase) -> StoreResult<License> {
        let base = self.config.base_url.trim_end_matches('/');
        let id = purchase.license_id.clone().ok_or_else(|| {
            StoreError::backend(format!(
                "purchase {} has no reserved license id",
                purchase.id
            ))
        })?;
        let partial = self.partial_license(purchase, &id);

        if let Some(doc) = self.post(format!("{base}/licenses/{id}"), &partial).await? {
            return license_from_document(purchase, doc);
        }

        let url = format!(
            "{base}/contents/{}/license",
            purchase.publication.content_id
        );
        let Some(doc) = self.post(url, &partial).await? else {
            return Err(StoreError::backend(format!(
                "content {} unknown to the license server",
                purchase.publication.content_id
            )));
        };

        let license = license_from_document(purchase, doc)?;
        if license.id != id {
            return Err(StoreError::backend(format!(
                "license server generated {} instead of reserved license {id}",
                license.id
            )));
        }
        tracing::info!(purchase_id = %purchase.id, license_id = %id, "license generated upstream");
        Ok(license)
    }
}

#[async_trait::async_trait]
impl IssuanceEngine for RemoteIssuer {
    async fn issue_or_fetch(&self, purchase: &Purchase) -> StoreResult<License> {
        let lock = self.purchase_lock(&purchase.id).await;
        let result = {
            let _guard = lock.lock().await;
            self.fetch_or_generate(purchase).await
        };
        drop(lock);
        self.release(&purchase.id).await;
        result
    }
}

/// Wrap a server-issued document as a `License` for `purchase`.
fn license_from_document(purchase: &Purchase, document: JsonValue) -> StoreResult<License> {
    let id = document
        .get("id")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| StoreError::backend("license document has no id"))?;
    let issued = document
        .get("issued")
        .and_then(JsonValue::as_str)
        .map(|s| s.parse::<DateTime<Utc>>())
        .transpose()
        .map_err(|e| StoreError::backend(format!("license document has a bad issued date: {e}")))?
        .unwrap_or_else(Utc::now);
    let updated = document
        .get("updated")
        .and_then(JsonValue::as_str)
        .and_then(|s| s.parse::<DateTime<Utc>>().ok());
    let provider = document
        .get("provider")
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .to_string();
    let rights = document
        .get("rights")
        .cloned()
        .map(serde_json::from_value::<Rights>)
        .transpose()
        .map_err(|e| StoreError::backend(format!("license document has bad rights: {e}")))?
        .unwrap_or_default();

    Ok(License {
        id: LicenseId::from(id),
        purchase_id: purchase.id.clone(),
        content_id: purchase.publication.content_id.clone(),
        user_id: purchase.user.id.clone(),
        provider,
        issued,
        updated,
        rights,
        devices: Vec::new(),
        document,
    })
}

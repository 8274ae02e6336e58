use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use licensehub_core::{DeviceId, LicenseId, PurchaseId, UserId};

/// A device registering use of a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceActivation {
    pub device_id: DeviceId,
    pub device_name: String,
    pub activated_at: DateTime<Utc>,
}

/// Usage rights granted by a license.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rights {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub print: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copy: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

/// The issued, protected artifact granting access to a publication.
///
/// Created by an issuance engine exactly once per purchase. `document` is the
/// protected payload as produced by the engine; its format is opaque here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub id: LicenseId,
    pub purchase_id: PurchaseId,
    pub content_id: String,
    pub user_id: UserId,
    pub provider: String,
    pub issued: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rights: Rights,
    #[serde(default)]
    pub devices: Vec<DeviceActivation>,
    #[serde(default)]
    pub document: serde_json::Value,
}

impl License {
    /// Number of distinct devices that activated this license.
    pub fn activation_count(&self) -> usize {
        self.devices
            .iter()
            .map(|d| &d.device_id)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Whether at least `min_devices` distinct devices activated this license.
    pub fn meets_threshold(&self, min_devices: u32) -> bool {
        self.activation_count() >= min_devices as usize
    }

    pub fn summary(&self) -> LicenseSummary {
        LicenseSummary {
            id: self.id.clone(),
            purchase_id: self.purchase_id.clone(),
            content_id: self.content_id.clone(),
            user_id: self.user_id.clone(),
            issued: self.issued,
            device_count: self.activation_count(),
        }
    }
}

/// Listing representation of a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseSummary {
    pub id: LicenseId,
    pub purchase_id: PurchaseId,
    pub content_id: String,
    pub user_id: UserId,
    pub issued: DateTime<Utc>,
    pub device_count: usize,
}

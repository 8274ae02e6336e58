//! Issuance engines and the local license draft they share.

#[cfg(feature = "remote")]
pub mod remote;

#[cfg(feature = "remote")]
pub use remote::RemoteIssuer;

use chrono::{DateTime, Utc};
use serde_json::json;

use licensehub_core::LicenseId;
use licensehub_licensing::{License, Purchase, Rights};

/// Build the license a purchase is entitled to, issued at `now`.
///
/// The id is the one reserved on the purchase; a purchase recorded without
/// one gets a freshly minted id. Loans carry their start/end dates as rights.
pub fn draft_license(purchase: &Purchase, provider: &str, now: DateTime<Utc>) -> License {
    let id = purchase.license_id.clone().unwrap_or_else(LicenseId::new);
    let rights = if purchase.is_loan() {
        Rights {
            start: purchase.start_date,
            end: purchase.end_date,
            ..Rights::default()
        }
    } else {
        Rights::default()
    };

    let document = json!({
        "id": id,
        "provider": provider,
        "issued": now,
        "user": { "id": purchase.user.id, "email": purchase.user.email },
        "rights": rights,
        "publication": {
            "content_id": purchase.publication.content_id,
            "title": purchase.publication.title,
        },
    });

    License {
        id,
        purchase_id: purchase.id.clone(),
        content_id: purchase.publication.content_id.clone(),
        user_id: purchase.user.id.clone(),
        provider: provider.to_string(),
        issued: now,
        updated: None,
        rights,
        devices: Vec::new(),
        document,
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use licensehub_core::{LicenseId, PublicationId, PurchaseId, UserId};

/// Whether the purchase is a permanent buy or a time-limited loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseKind {
    Buy,
    Loan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Ok,
    Error,
}

/// Publication a purchase entitles the user to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub id: PublicationId,
    /// Identifier of the encrypted content on the license server.
    pub content_id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
}

/// A commercial transaction entitling a user to a publication.
///
/// Owned by the persistence layer; the workflow only reads it.
/// `license_id` is assigned when the purchase is recorded, before any
/// license has actually been issued under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub license_id: Option<LicenseId>,
    pub publication: Publication,
    pub user: User,
    pub kind: PurchaseKind,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub transaction_date: DateTime<Utc>,
    pub status: PurchaseStatus,
}

impl Purchase {
    /// A completed buy with the given ids; handy for seeding stores.
    pub fn buy(
        id: impl Into<PurchaseId>,
        license_id: impl Into<LicenseId>,
        publication: Publication,
        user: User,
    ) -> Self {
        Self {
            id: id.into(),
            license_id: Some(license_id.into()),
            publication,
            user,
            kind: PurchaseKind::Buy,
            start_date: None,
            end_date: None,
            transaction_date: Utc::now(),
            status: PurchaseStatus::Ok,
        }
    }

    pub fn is_loan(&self) -> bool {
        self.kind == PurchaseKind::Loan
    }
}

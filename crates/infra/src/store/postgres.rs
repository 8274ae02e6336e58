//! Postgres-backed store and issuance engine.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError | Scenario |
//! |------------|------------|----------|
//! | RowNotFound | `NotFound` | no purchase owns the license id |
//! | Database (any code) | `Backend` | constraint violations, bad SQL |
//! | PoolClosed / Io / other | `Backend` | connection failures |
//!
//! ## Get-or-create
//!
//! `issue_or_fetch` inserts the drafted license with
//! `ON CONFLICT (purchase_id) DO NOTHING` and then reads the row back by
//! purchase. The unique constraint on `license.purchase_id` decides which of
//! several concurrent inserts wins; every caller reads the winner.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use licensehub_core::{LicenseId, PublicationId, PurchaseId, StoreError, StoreResult, UserId};
use licensehub_licensing::{
    DeviceActivation, IssuanceEngine, License, Publication, Purchase, PurchaseKind, PurchaseStatus,
    Rights, StoreFacade, User,
};

use super::parse_min_devices;
use crate::issuer::draft_license;

/// Tables used by the store. Applied by `PostgresStore::migrate`.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS purchase (
    id               TEXT PRIMARY KEY,
    license_id       TEXT UNIQUE,
    publication_id   TEXT NOT NULL,
    content_id       TEXT NOT NULL,
    title            TEXT NOT NULL,
    user_id          TEXT NOT NULL,
    user_email       TEXT NOT NULL,
    user_name        TEXT NOT NULL,
    kind             TEXT NOT NULL CHECK (kind IN ('buy', 'loan')),
    start_date       TIMESTAMPTZ,
    end_date         TIMESTAMPTZ,
    transaction_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    status           TEXT NOT NULL DEFAULT 'ok'
);

CREATE TABLE IF NOT EXISTS license (
    id          TEXT PRIMARY KEY,
    purchase_id TEXT NOT NULL UNIQUE REFERENCES purchase (id),
    content_id  TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    provider    TEXT NOT NULL,
    issued      TIMESTAMPTZ NOT NULL,
    updated     TIMESTAMPTZ,
    rights      JSONB NOT NULL DEFAULT '{}'::jsonb,
    document    JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS license_device (
    license_id   TEXT NOT NULL REFERENCES license (id),
    device_id    TEXT NOT NULL,
    device_name  TEXT NOT NULL,
    activated_at TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (license_id, device_id)
);
"#;

const LICENSE_SELECT: &str = r#"
SELECT
    l.id, l.purchase_id, l.content_id, l.user_id, l.provider,
    l.issued, l.updated, l.rights, l.document,
    COALESCE(
        jsonb_agg(
            jsonb_build_object(
                'device_id', d.device_id,
                'device_name', d.device_name,
                'activated_at', d.activated_at
            )
        ) FILTER (WHERE d.device_id IS NOT NULL),
        '[]'::jsonb
    ) AS devices
FROM license l
LEFT JOIN license_device d ON d.license_id = l.id
"#;

/// Postgres-backed store facade and issuance engine.
///
/// `Send + Sync`; the SQLx pool handles connection sharing.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
    provider: String,
}

impl PostgresStore {
    pub fn new(pool: PgPool, provider: impl Into<String>) -> Self {
        Self {
            pool: Arc::new(pool),
            provider: provider.into(),
        }
    }

    /// Connect to `database_url`.
    pub async fn connect(database_url: &str, provider: impl Into<String>) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, provider))
    }

    /// Create the tables if they do not exist.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    #[instrument(skip(self, purchase), fields(purchase_id = %purchase.id))]
    pub async fn insert_purchase(&self, purchase: &Purchase) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO purchase (
                id, license_id, publication_id, content_id, title,
                user_id, user_email, user_name, kind,
                start_date, end_date, transaction_date, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(purchase.id.as_str())
        .bind(purchase.license_id.as_ref().map(LicenseId::as_str))
        .bind(purchase.publication.id.as_str())
        .bind(&purchase.publication.content_id)
        .bind(&purchase.publication.title)
        .bind(purchase.user.id.as_str())
        .bind(&purchase.user.email)
        .bind(&purchase.user.name)
        .bind(kind_to_str(purchase.kind))
        .bind(purchase.start_date)
        .bind(purchase.end_date)
        .bind(purchase.transaction_date)
        .bind(status_to_str(purchase.status))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_purchase", e))?;
        Ok(())
    }

    #[instrument(skip(self, activation), fields(device_id = %activation.device_id))]
    pub async fn activate(
        &self,
        license_id: &LicenseId,
        activation: &DeviceActivation,
    ) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("activate", e))?;

        let updated = sqlx::query("UPDATE license SET updated = NOW() WHERE id = $1")
            .bind(license_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("activate", e))?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("license {license_id} not found")));
        }

        sqlx::query(
            r#"
            INSERT INTO license_device (license_id, device_id, device_name, activated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (license_id, device_id) DO NOTHING
            "#,
        )
        .bind(license_id.as_str())
        .bind(activation.device_id.as_str())
        .bind(&activation.device_name)
        .bind(activation.activated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("activate", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("activate", e))
    }

    async fn license_by_purchase(&self, purchase_id: &PurchaseId) -> StoreResult<License> {
        let sql = format!("{LICENSE_SELECT} WHERE l.purchase_id = $1 GROUP BY l.id");
        let row = sqlx::query(&sql)
            .bind(purchase_id.as_str())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("license_by_purchase", e))?;
        license_from_row(&row)
    }
}

#[async_trait::async_trait]
impl StoreFacade for PostgresStore {
    #[instrument(skip(self, license_id), fields(license_id = %license_id))]
    async fn purchase_by_license_id(&self, license_id: &LicenseId) -> StoreResult<Purchase> {
        let row = sqlx::query(
            r#"
            SELECT
                id, license_id, publication_id, content_id, title,
                user_id, user_email, user_name, kind,
                start_date, end_date, transaction_date, status
            FROM purchase
            WHERE license_id = $1
            "#,
        )
        .bind(license_id.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("purchase_by_license_id", e))?;

        purchase_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn licenses_filtered(&self, min_devices: &str) -> StoreResult<Vec<License>> {
        let min = parse_min_devices(min_devices)?;
        let sql = format!(
            "{LICENSE_SELECT} GROUP BY l.id HAVING COUNT(DISTINCT d.device_id) >= $1 ORDER BY l.issued"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(min))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("licenses_filtered", e))?;

        rows.iter().map(license_from_row).collect()
    }
}

#[async_trait::async_trait]
impl IssuanceEngine for PostgresStore {
    #[instrument(skip(self, purchase), fields(purchase_id = %purchase.id))]
    async fn issue_or_fetch(&self, purchase: &Purchase) -> StoreResult<License> {
        let draft = draft_license(purchase, &self.provider, Utc::now());
        let rights = serde_json::to_value(&draft.rights)
            .map_err(|e| StoreError::backend(format!("failed to encode rights: {e}")))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO license (
                id, purchase_id, content_id, user_id, provider, issued, rights, document
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (purchase_id) DO NOTHING
            "#,
        )
        .bind(draft.id.as_str())
        .bind(draft.purchase_id.as_str())
        .bind(&draft.content_id)
        .bind(draft.user_id.as_str())
        .bind(&draft.provider)
        .bind(draft.issued)
        .bind(rights)
        .bind(&draft.document)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("issue_or_fetch", e))?;

        if inserted.rows_affected() == 1 {
            tracing::info!(license_id = %draft.id, "generated license");
        }

        // Either ours or the one a concurrent caller inserted first.
        self.license_by_purchase(&purchase.id).await.map_err(|e| {
            if e.is_not_found() {
                StoreError::backend(format!(
                    "license for purchase {} vanished after insert",
                    purchase.id
                ))
            } else {
                e
            }
        })
    }
}

fn purchase_from_row(row: &PgRow) -> StoreResult<Purchase> {
    let get_str = |col: &str| -> StoreResult<String> {
        row.try_get::<String, _>(col)
            .map_err(|e| map_sqlx_error("decode purchase", e))
    };
    let get_ts = |col: &str| -> StoreResult<Option<DateTime<Utc>>> {
        row.try_get::<Option<DateTime<Utc>>, _>(col)
            .map_err(|e| map_sqlx_error("decode purchase", e))
    };

    let license_id: Option<String> = row
        .try_get("license_id")
        .map_err(|e| map_sqlx_error("decode purchase", e))?;
    let transaction_date: DateTime<Utc> = row
        .try_get("transaction_date")
        .map_err(|e| map_sqlx_error("decode purchase", e))?;

    Ok(Purchase {
        id: PurchaseId::from(get_str("id")?),
        license_id: license_id.map(LicenseId::from),
        publication: Publication {
            id: PublicationId::from(get_str("publication_id")?),
            content_id: get_str("content_id")?,
            title: get_str("title")?,
        },
        user: User {
            id: UserId::from(get_str("user_id")?),
            email: get_str("user_email")?,
            name: get_str("user_name")?,
        },
        kind: kind_from_str(&get_str("kind")?)?,
        start_date: get_ts("start_date")?,
        end_date: get_ts("end_date")?,
        transaction_date,
        status: status_from_str(&get_str("status")?),
    })
}

fn license_from_row(row: &PgRow) -> StoreResult<License> {
    let decode = |e| map_sqlx_error("decode license", e);

    let rights: serde_json::Value = row.try_get("rights").map_err(decode)?;
    let devices: serde_json::Value = row.try_get("devices").map_err(decode)?;

    Ok(License {
        id: LicenseId::from(row.try_get::<String, _>("id").map_err(decode)?),
        purchase_id: PurchaseId::from(row.try_get::<String, _>("purchase_id").map_err(decode)?),
        content_id: row.try_get("content_id").map_err(decode)?,
        user_id: UserId::from(row.try_get::<String, _>("user_id").map_err(decode)?),
        provider: row.try_get("provider").map_err(decode)?,
        issued: row.try_get("issued").map_err(decode)?,
        updated: row.try_get("updated").map_err(decode)?,
        rights: serde_json::from_value::<Rights>(rights)
            .map_err(|e| StoreError::backend(format!("invalid rights column: {e}")))?,
        devices: serde_json::from_value::<Vec<DeviceActivation>>(devices)
            .map_err(|e| StoreError::backend(format!("invalid device rows: {e}")))?,
        document: row.try_get("document").map_err(decode)?,
    })
}

fn kind_to_str(kind: PurchaseKind) -> &'static str {
    match kind {
        PurchaseKind::Buy => "buy",
        PurchaseKind::Loan => "loan",
    }
}

fn kind_from_str(s: &str) -> StoreResult<PurchaseKind> {
    match s {
        "buy" => Ok(PurchaseKind::Buy),
        "loan" => Ok(PurchaseKind::Loan),
        other => Err(StoreError::backend(format!("unknown purchase kind {other:?}"))),
    }
}

fn status_to_str(status: PurchaseStatus) -> &'static str {
    match status {
        PurchaseStatus::Ok => "ok",
        PurchaseStatus::Error => "error",
    }
}

fn status_from_str(s: &str) -> PurchaseStatus {
    match s {
        "ok" => PurchaseStatus::Ok,
        _ => PurchaseStatus::Error,
    }
}

/// Classify a SQLx error. Only a missing row is `NotFound`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::not_found("record not found"),
        sqlx::Error::Database(db_err) => StoreError::backend(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            StoreError::backend(format!("connection pool closed in {}", operation))
        }
        other => StoreError::backend(format!("{} failed: {}", operation, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_is_not_found() {
        assert_eq!(
            map_sqlx_error("purchase_by_license_id", sqlx::Error::RowNotFound),
            StoreError::not_found("record not found")
        );
    }

    #[test]
    fn other_sqlx_errors_are_backend() {
        let err = map_sqlx_error("licenses_filtered", sqlx::Error::PoolClosed);
        assert_eq!(
            err,
            StoreError::backend("connection pool closed in licenses_filtered")
        );
        let err = map_sqlx_error("x", sqlx::Error::ColumnNotFound("devices".into()));
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn purchase_kind_round_trips_through_column_text() {
        for kind in [PurchaseKind::Buy, PurchaseKind::Loan] {
            assert_eq!(kind_from_str(kind_to_str(kind)).unwrap(), kind);
        }
        assert!(kind_from_str("rent").is_err());
    }

    #[test]
    fn device_threshold_query_groups_before_having() {
        let sql = format!("{LICENSE_SELECT} GROUP BY l.id HAVING COUNT(DISTINCT d.device_id) >= $1");
        assert!(sql.contains("LEFT JOIN license_device"));
        assert!(sql.find("GROUP BY").unwrap() < sql.find("HAVING").unwrap());
    }
}

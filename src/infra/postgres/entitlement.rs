//! PostgreSQL entitlement store.
//!
//! Tokens are resolved and spent with single statements so that two
//! concurrent consumers of the same token can never both succeed: the
//! consume update matches `status = 'completed'` and the loser sees zero
//! rows affected.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::domain::PurchaseSnapshot;
use crate::infra::{EntitlementStore, Result};

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    purchase_id: Uuid,
    product_id: Uuid,
    product_name: String,
    file_url: String,
    file_type: String,
    one_time_download: bool,
}

/// PostgreSQL-backed entitlement store.
pub struct PgEntitlementStore {
    pool: PgPool,
}

impl PgEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_snapshot(row: SnapshotRow) -> PurchaseSnapshot {
        PurchaseSnapshot {
            purchase_id: row.purchase_id,
            product_id: row.product_id,
            product_name: row.product_name,
            file_url: row.file_url,
            file_type: row.file_type,
            one_time_download: row.one_time_download,
        }
    }
}

#[async_trait]
impl EntitlementStore for PgEntitlementStore {
    async fn validate(&self, token: &str) -> Result<Option<PurchaseSnapshot>> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT
                p.id AS purchase_id,
                p.product_id,
                pr.name AS product_name,
                pr.file_url,
                pr.file_type,
                pr.one_time_download
            FROM purchases p
            JOIN products pr ON pr.id = p.product_id
            WHERE p.download_token = $1 AND p.status = 'completed'
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::row_to_snapshot))
    }

    async fn consume(&self, token: &str) -> Result<Option<PurchaseSnapshot>> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            r#"
            WITH consumed AS (
                UPDATE purchases
                SET status = 'downloaded', download_token = NULL, updated_at = NOW()
                WHERE download_token = $1 AND status = 'completed'
                RETURNING id, product_id
            )
            SELECT
                c.id AS purchase_id,
                c.product_id,
                pr.name AS product_name,
                pr.file_url,
                pr.file_type,
                pr.one_time_download
            FROM consumed c
            JOIN products pr ON pr.id = c.product_id
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(r) = &row {
            debug!(purchase_id = %r.purchase_id, "download token consumed");
        }

        Ok(row.map(Self::row_to_snapshot))
    }
}

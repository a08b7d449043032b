//! The purchase ledger: atomic stock reservation + purchase creation.
//!
//! `record_purchase` is the only writer of the stock counter. It runs a
//! single transaction per attempt:
//!
//! 1. `SELECT ... FOR UPDATE` the product row (linearizes per product,
//!    including across service instances).
//! 2. Abort with `StockExhausted` if a finite count is already zero.
//! 3. Decrement finite stock.
//! 4. Insert the purchase row with status `completed` and a freshly
//!    minted download token.
//! 5. Commit.
//!
//! Transient commit failures (serialization, deadlock, connection drops)
//! are retried a bounded number of times, then surfaced as
//! `LedgerConflict`. No row is ever written without the stock decrement
//! committing in the same transaction.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{mint_download_token, Purchase, PurchaseStatus, StockPolicy};
use crate::infra::retry::{is_retryable_db_error, retry_with_predicate, RetryConfig};
use crate::infra::{CommerceError, Result};

#[derive(sqlx::FromRow)]
struct PurchaseRow {
    id: Uuid,
    product_id: Uuid,
    buyer_address: String,
    transaction_signature: String,
    amount_lamports: i64,
    status: String,
    download_token: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct StockRow {
    unlimited_stock: bool,
    stock_quantity: Option<i32>,
}

/// PostgreSQL-backed purchase ledger.
pub struct PgPurchaseLedger {
    pool: PgPool,
    retry: RetryConfig,
}

impl PgPurchaseLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            retry: RetryConfig::ledger(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Record a purchase for a confirmed payment.
    ///
    /// Idempotent per transfer: if the signature has already been recorded,
    /// the existing purchase is returned and no state changes.
    #[instrument(skip(self, signature), fields(product_id = %product_id))]
    pub async fn record_purchase(
        &self,
        product_id: Uuid,
        buyer_address: &str,
        signature: &str,
        amount_lamports: u64,
    ) -> Result<Purchase> {
        if let Some(existing) = self.get_by_signature(signature).await? {
            info!(purchase_id = %existing.id, "transfer already recorded, returning existing purchase");
            return Ok(existing);
        }

        let result = retry_with_predicate(
            &self.retry,
            "record_purchase",
            || self.try_record(product_id, buyer_address, signature, amount_lamports),
            |e| matches!(e, CommerceError::Database(db) if is_retryable_db_error(db)),
        )
        .await;

        match result {
            Ok(purchase) => {
                info!(
                    purchase_id = %purchase.id,
                    buyer = %buyer_address,
                    "purchase recorded"
                );
                Ok(purchase)
            }
            // Another instance recorded the same transfer between our
            // idempotency check and the insert.
            Err(CommerceError::Database(e)) if is_unique_signature_violation(&e) => self
                .get_by_signature(signature)
                .await?
                .ok_or(CommerceError::Database(e)),
            Err(CommerceError::Database(e)) if is_retryable_db_error(&e) => {
                Err(CommerceError::LedgerConflict {
                    product_id,
                    attempts: self.retry.max_retries + 1,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Look up a purchase by its transfer signature.
    pub async fn get_by_signature(&self, signature: &str) -> Result<Option<Purchase>> {
        let row: Option<PurchaseRow> = sqlx::query_as(
            r#"
            SELECT * FROM purchases WHERE transaction_signature = $1
            "#,
        )
        .bind(signature)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_purchase).transpose()
    }

    /// Count recorded purchases for a product.
    pub async fn purchase_count(&self, product_id: Uuid) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM purchases WHERE product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn try_record(
        &self,
        product_id: Uuid,
        buyer_address: &str,
        signature: &str,
        amount_lamports: u64,
    ) -> Result<Purchase> {
        let mut tx = self.pool.begin().await?;

        // Row lock: concurrent reservations for the same product queue here.
        let row: Option<StockRow> = sqlx::query_as(
            r#"
            SELECT unlimited_stock, stock_quantity
            FROM products
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(stock_row) = row else {
            return Err(CommerceError::ProductNotFound(product_id));
        };

        let stock = StockPolicy::from_columns(stock_row.unlimited_stock, stock_row.stock_quantity);
        if !stock.available() {
            // Dropping the transaction rolls it back; nothing was written.
            return Err(CommerceError::StockExhausted(product_id));
        }

        if matches!(stock, StockPolicy::Finite(_)) {
            sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity - 1, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        }

        let now = Utc::now();
        let purchase = Purchase {
            id: Uuid::new_v4(),
            product_id,
            buyer_address: buyer_address.to_string(),
            transaction_signature: signature.to_string(),
            amount_lamports,
            status: PurchaseStatus::Completed,
            download_token: Some(mint_download_token()),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, product_id, buyer_address, transaction_signature,
                amount_lamports, status, download_token,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4,
                $5, $6, $7,
                $8, $9
            )
            "#,
        )
        .bind(purchase.id)
        .bind(purchase.product_id)
        .bind(&purchase.buyer_address)
        .bind(&purchase.transaction_signature)
        .bind(purchase.amount_lamports as i64)
        .bind(purchase.status.as_str())
        .bind(&purchase.download_token)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(purchase)
    }

    fn row_to_purchase(row: PurchaseRow) -> Result<Purchase> {
        let status = PurchaseStatus::parse(&row.status).ok_or_else(|| {
            CommerceError::Internal(format!("unknown purchase status: {}", row.status))
        })?;

        Ok(Purchase {
            id: row.id,
            product_id: row.product_id,
            buyer_address: row.buyer_address,
            transaction_signature: row.transaction_signature,
            amount_lamports: row.amount_lamports as u64,
            status,
            download_token: row.download_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn is_unique_signature_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().unwrap_or_default() == "23505"
                && db_err
                    .constraint()
                    .is_some_and(|c| c == "purchases_signature_key")
        }
        _ => false,
    }
}

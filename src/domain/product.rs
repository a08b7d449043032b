//! Product entity and stock policy.
//!
//! Catalog CRUD is owned by an external service; this crate only reads
//! products and mutates the stock counter inside the purchase-ledger
//! transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stock policy for a product: either unlimited availability or a finite,
/// decrementing unit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockPolicy {
    /// Never sells out.
    Unlimited,
    /// Remaining units; decremented by one per completed purchase.
    Finite(u32),
}

impl StockPolicy {
    /// Whether at least one unit can still be sold.
    pub fn available(&self) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Finite(n) => *n > 0,
        }
    }

    /// Reconstruct from the `unlimited_stock` / `stock_quantity` columns.
    pub fn from_columns(unlimited: bool, quantity: Option<i32>) -> Self {
        if unlimited {
            Self::Unlimited
        } else {
            Self::Finite(quantity.unwrap_or(0).max(0) as u32)
        }
    }

    /// The `(unlimited_stock, stock_quantity)` column pair.
    pub fn to_columns(&self) -> (bool, Option<i32>) {
        match self {
            Self::Unlimited => (true, None),
            Self::Finite(n) => (false, Some(*n as i32)),
        }
    }
}

/// A digital product listed by a creator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: Uuid,

    /// Creator's wallet address; payments are made to this recipient.
    pub creator_address: String,

    /// Display name, also used as the download file name.
    pub name: String,

    /// Optional listing description.
    pub description: Option<String>,

    /// Price in marketplace currency units (USD).
    pub price: Decimal,

    /// Storage location of the file. Never exposed to buyers; the download
    /// gateway resolves it internally.
    pub file_url: String,

    /// File extension / type tag (e.g. "pdf", "zip").
    pub file_type: String,

    /// Stock policy.
    pub stock: StockPolicy,

    /// If set, the download token is invalidated after the first
    /// successful stream.
    pub one_time_download: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The subset of product fields returned to a buyer alongside a purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    pub file_type: String,
    pub price: Decimal,
    pub one_time_download: bool,
}

impl From<&Product> for ProductSnapshot {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            file_type: product.file_type.clone(),
            price: product.price,
            one_time_download: product.one_time_download,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_policy_availability() {
        assert!(StockPolicy::Unlimited.available());
        assert!(StockPolicy::Finite(1).available());
        assert!(!StockPolicy::Finite(0).available());
    }

    #[test]
    fn stock_policy_column_round_trip() {
        assert_eq!(
            StockPolicy::from_columns(true, None),
            StockPolicy::Unlimited
        );
        assert_eq!(
            StockPolicy::from_columns(false, Some(7)),
            StockPolicy::Finite(7)
        );
        // A finite product with no quantity recorded is sold out.
        assert_eq!(
            StockPolicy::from_columns(false, None),
            StockPolicy::Finite(0)
        );

        assert_eq!(StockPolicy::Unlimited.to_columns(), (true, None));
        assert_eq!(StockPolicy::Finite(3).to_columns(), (false, Some(3)));
    }
}

//! Error types for the commerce infrastructure.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur across the purchase and entitlement subsystem.
#[derive(Error, Debug)]
pub enum CommerceError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Product not found
    #[error("product not found: {0}")]
    ProductNotFound(Uuid),

    /// No purchase matches the presented download token
    #[error("download token not found or already consumed")]
    TokenNotFound,

    /// Finite stock reached zero before the reservation could commit
    #[error("product out of stock: {0}")]
    StockExhausted(Uuid),

    /// Lost a concurrency race after exhausting internal retries
    #[error("ledger conflict for product {product_id} after {attempts} attempts")]
    LedgerConflict { product_id: Uuid, attempts: u32 },

    /// Payment verification exhausted its retry budget
    #[error("payment not confirmed within the verification window")]
    PaymentUnconfirmed,

    /// The chain reported the transfer as failed
    #[error("payment failed: {0}")]
    PaymentFailed(String),

    /// Chain-query collaborator failure
    #[error("chain client error: {0}")]
    Chain(String),

    /// File-storage collaborator failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Malformed or missing request data
    #[error("validation error: {0}")]
    Validation(String),

    /// No buyer identity on the request
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for commerce operations
pub type Result<T> = std::result::Result<T, CommerceError>;

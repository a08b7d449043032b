//! Structured API error responses with stable error codes.
//!
//! Machine-readable codes with numeric ranges so clients can distinguish
//! "try again" from "this is final" without parsing messages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::infra::CommerceError;

// ============================================================================
// Error Codes
// ============================================================================

/// Stable error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication (1xxx)
    /// No buyer identity on the request
    AuthRequired,

    // Validation (2xxx)
    /// Request body is malformed
    InvalidRequestBody,
    /// Required field is missing
    MissingRequiredField,
    /// Field value is invalid
    InvalidFieldValue,

    // Resources (3xxx)
    /// Product not found
    ProductNotFound,
    /// Download token invalid, expired, or already consumed
    TokenNotFound,

    // Purchase conflicts (4xxx)
    /// Finite stock is exhausted
    StockExhausted,
    /// Lost a concurrency race after internal retries
    LedgerConflict,

    // Payment (5xxx)
    /// Verification window elapsed without confirmation; safe to retry
    PaymentUnconfirmed,
    /// The chain reported the transfer as failed
    PaymentFailed,

    // Upstream (6xxx)
    /// Chain-query collaborator unavailable
    ChainUnavailable,
    /// File-storage collaborator unavailable
    StorageUnavailable,

    // Internal (9xxx)
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Numeric code for easy categorization.
    pub fn numeric_code(&self) -> u32 {
        match self {
            ErrorCode::AuthRequired => 1001,

            ErrorCode::InvalidRequestBody => 2001,
            ErrorCode::MissingRequiredField => 2002,
            ErrorCode::InvalidFieldValue => 2003,

            ErrorCode::ProductNotFound => 3001,
            ErrorCode::TokenNotFound => 3002,

            ErrorCode::StockExhausted => 4001,
            ErrorCode::LedgerConflict => 4002,

            ErrorCode::PaymentUnconfirmed => 5001,
            ErrorCode::PaymentFailed => 5002,

            ErrorCode::ChainUnavailable => 6001,
            ErrorCode::StorageUnavailable => 6002,

            ErrorCode::InternalError => 9999,
        }
    }

    /// HTTP status for this code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::AuthRequired => StatusCode::UNAUTHORIZED,

            ErrorCode::InvalidRequestBody
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue => StatusCode::BAD_REQUEST,

            ErrorCode::ProductNotFound | ErrorCode::TokenNotFound => StatusCode::NOT_FOUND,

            ErrorCode::StockExhausted | ErrorCode::LedgerConflict => StatusCode::CONFLICT,

            ErrorCode::PaymentUnconfirmed => StatusCode::PAYMENT_REQUIRED,
            ErrorCode::PaymentFailed => StatusCode::BAD_REQUEST,

            ErrorCode::ChainUnavailable | ErrorCode::StorageUnavailable => StatusCode::BAD_GATEWAY,

            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code_str = match self {
            ErrorCode::AuthRequired => "AUTH_REQUIRED",
            ErrorCode::InvalidRequestBody => "INVALID_REQUEST_BODY",
            ErrorCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ErrorCode::InvalidFieldValue => "INVALID_FIELD_VALUE",
            ErrorCode::ProductNotFound => "PRODUCT_NOT_FOUND",
            ErrorCode::TokenNotFound => "TOKEN_NOT_FOUND",
            ErrorCode::StockExhausted => "STOCK_EXHAUSTED",
            ErrorCode::LedgerConflict => "LEDGER_CONFLICT",
            ErrorCode::PaymentUnconfirmed => "PAYMENT_UNCONFIRMED",
            ErrorCode::PaymentFailed => "PAYMENT_FAILED",
            ErrorCode::ChainUnavailable => "CHAIN_UNAVAILABLE",
            ErrorCode::StorageUnavailable => "STORAGE_UNAVAILABLE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", code_str)
    }
}

// ============================================================================
// Structured Error Response
// ============================================================================

/// Structured error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ErrorDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code
    pub numeric_code: u32,

    /// Human-readable message
    pub message: String,

    /// Related resource ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetails {
                code,
                numeric_code: code.numeric_code(),
                message: message.into(),
                resource_id: None,
                details: None,
            },
        }
    }

    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.error.resource_id = Some(id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.error.code.http_status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code_str = self.error.code.to_string();
        let mut response = (status, Json(self)).into_response();

        if let Ok(code_value) = axum::http::HeaderValue::from_str(&code_str) {
            response.headers_mut().insert(
                axum::http::header::HeaderName::from_static("x-error-code"),
                code_value,
            );
        }

        response
    }
}

// ============================================================================
// Conversion from CommerceError
// ============================================================================

impl From<CommerceError> for ApiError {
    fn from(err: CommerceError) -> Self {
        match err {
            CommerceError::Database(e) => {
                tracing::error!(error = %e, "database error");
                ApiError::new(ErrorCode::InternalError, "Internal error")
            }
            CommerceError::ProductNotFound(id) => {
                ApiError::new(ErrorCode::ProductNotFound, format!("Product not found: {id}"))
                    .with_resource_id(id.to_string())
            }
            CommerceError::TokenNotFound => ApiError::new(
                ErrorCode::TokenNotFound,
                "Invalid or expired download token",
            ),
            CommerceError::StockExhausted(id) => {
                ApiError::new(ErrorCode::StockExhausted, "Product out of stock")
                    .with_resource_id(id.to_string())
            }
            CommerceError::LedgerConflict {
                product_id,
                attempts,
            } => ApiError::new(
                ErrorCode::LedgerConflict,
                "Purchase could not be recorded, please retry",
            )
            .with_resource_id(product_id.to_string())
            .with_details(serde_json::json!({ "attempts": attempts })),
            CommerceError::PaymentUnconfirmed => ApiError::new(
                ErrorCode::PaymentUnconfirmed,
                "Payment not confirmed within the verification window",
            ),
            CommerceError::PaymentFailed(reason) => {
                ApiError::new(ErrorCode::PaymentFailed, format!("Payment failed: {reason}"))
            }
            CommerceError::Chain(e) => {
                // Upstream detail stays in the logs.
                tracing::error!(error = %e, "chain client error");
                ApiError::new(ErrorCode::ChainUnavailable, "Chain query failed")
            }
            CommerceError::Storage(e) => {
                tracing::error!(error = %e, "storage error");
                ApiError::new(ErrorCode::StorageUnavailable, "File retrieval failed")
            }
            CommerceError::Validation(msg) => ApiError::new(ErrorCode::InvalidFieldValue, msg),
            CommerceError::Unauthorized(msg) => ApiError::new(ErrorCode::AuthRequired, msg),
            CommerceError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                ApiError::new(ErrorCode::InternalError, "Internal error")
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

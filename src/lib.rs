//! Nect Commerce Library
//!
//! Purchase and entitlement service for a digital goods marketplace with
//! on-chain (Solana) settlement: payment descriptors, settlement
//! verification, the atomic stock-reservation purchase ledger, and the
//! single-use download-token lifecycle.
//!
//! ## Modules
//!
//! - [`domain`] - Core domain types (products, purchases, payment values)
//! - [`payment`] - Payment descriptors and settlement verification
//! - [`infra`] - Infrastructure implementations (PostgreSQL stores, retry)
//! - [`storage`] - File-storage collaborator
//! - [`gateway`] - Token-gated download gateway
//! - [`auth`] - Buyer-identity extraction
//! - [`api`] - REST API routes
//! - [`telemetry`] - Log configuration

pub mod api;
pub mod auth;
pub mod domain;
pub mod gateway;
pub mod infra;
pub mod migrations;
pub mod payment;
pub mod server;
pub mod storage;
pub mod telemetry;

// Re-export commonly used types
pub use domain::{
    PaymentDescriptor, PaymentOutcome, PaymentReference, Product, ProductSnapshot, Purchase,
    PurchaseSnapshot, PurchaseStatus, StockPolicy,
};

pub use infra::{
    CommerceError, EntitlementStore, PgEntitlementStore, PgProductStore, PgPurchaseLedger, Result,
};

pub use payment::{
    ChainClient, PaymentDescriptorBuilder, PaymentVerification, ReferenceVerification,
    RpcChainClient, SignatureVerification, TransferStatus, VerifierConfig,
};

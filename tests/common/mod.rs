//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use nect_commerce::domain::{PaymentReference, Product, StockPolicy};
use nect_commerce::gateway::DownloadGateway;
use nect_commerce::infra::{PgEntitlementStore, PgProductStore, PgPurchaseLedger};
use nect_commerce::payment::{ChainClient, ReferenceTransfer, TransferStatus, VerifierConfig};
use nect_commerce::server::AppState;
use nect_commerce::storage::{FileObject, FileStorage};
use nect_commerce::{CommerceError, Result};

pub async fn connect_db() -> Option<sqlx::PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .connect(&url)
        .await
        .ok()?;
    Some(pool)
}

/// Test buyer wallet address
pub fn test_buyer() -> String {
    "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".to_string()
}

/// Test creator wallet address
pub fn test_creator() -> String {
    "FvmBqiCWENvxEAeJWfCdQHgEjidxHLF9zTMVpdsmHzLz".to_string()
}

/// Unique transfer signature per call
pub fn random_signature() -> String {
    format!("sig-{}", Uuid::new_v4())
}

/// Build a product with the given stock policy.
pub fn product(stock: StockPolicy, one_time_download: bool) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4(),
        creator_address: test_creator(),
        name: format!("Sample Pack {}", &Uuid::new_v4().to_string()[..8]),
        description: Some("Integration test product".to_string()),
        price: Decimal::new(1999, 2),
        file_url: "https://files.example/obj/abc123".to_string(),
        file_type: "zip".to_string(),
        stock,
        one_time_download,
        created_at: now,
        updated_at: now,
    }
}

// ============================================================================
// Fake collaborators
// ============================================================================

/// Chain client scripted per test: every signature reports `status`, and
/// `find_reference` reports the transfer after `reference_delay` misses.
pub struct FakeChain {
    pub status: TransferStatus,
    pub reference_signature: String,
    pub reference_delay: AtomicU32,
}

impl FakeChain {
    pub fn confirmed() -> Self {
        Self {
            status: TransferStatus::Confirmed,
            reference_signature: random_signature(),
            reference_delay: AtomicU32::new(0),
        }
    }

    pub fn pending() -> Self {
        Self {
            status: TransferStatus::Pending,
            reference_signature: random_signature(),
            reference_delay: AtomicU32::new(u32::MAX),
        }
    }

    pub fn with_reference_delay(status: TransferStatus, misses: u32) -> Self {
        Self {
            status,
            reference_signature: random_signature(),
            reference_delay: AtomicU32::new(misses),
        }
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn signature_status(&self, _signature: &str) -> Result<TransferStatus> {
        Ok(self.status.clone())
    }

    async fn find_reference(
        &self,
        _reference: &PaymentReference,
    ) -> Result<Option<ReferenceTransfer>> {
        let remaining = self.reference_delay.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.reference_delay.store(remaining - 1, Ordering::SeqCst);
            }
            return Ok(None);
        }

        Ok(Some(ReferenceTransfer {
            signature: self.reference_signature.clone(),
            status: self.status.clone(),
        }))
    }
}

/// In-memory file storage: serves fixed bytes, or fails on demand.
pub struct FakeStorage {
    pub fail: bool,
}

impl FakeStorage {
    pub fn serving() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl FileStorage for FakeStorage {
    async fn fetch(&self, _file_url: &str) -> Result<FileObject> {
        if self.fail {
            return Err(CommerceError::Storage("upstream 503".to_string()));
        }

        Ok(FileObject {
            content_type: "application/zip".to_string(),
            body: Box::pin(tokio_stream::once(Ok(Bytes::from_static(
                b"file contents",
            )))),
        })
    }
}

// ============================================================================
// Test state assembly
// ============================================================================

/// Build an AppState over a real pool with scripted chain and storage.
pub fn test_state(
    pool: sqlx::PgPool,
    chain: Arc<dyn ChainClient>,
    storage: Arc<dyn FileStorage>,
) -> AppState {
    let products = Arc::new(PgProductStore::new(pool.clone()));
    let ledger = Arc::new(PgPurchaseLedger::new(pool.clone()));
    let entitlements = Arc::new(PgEntitlementStore::new(pool.clone()));
    let gateway = Arc::new(DownloadGateway::new(entitlements, storage));

    AppState {
        products,
        ledger,
        gateway,
        chain,
        marketplace_label: "Nect".to_string(),
        native_rate: Decimal::from(100),
        // Fast verification in tests: two attempts, no sleeping.
        verifier_config: VerifierConfig {
            max_attempts: 2,
            poll_interval: std::time::Duration::ZERO,
        },
        pool,
    }
}

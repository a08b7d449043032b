//! Download gateway: token-gated metadata and file streaming.
//!
//! The gateway is the only component that sees storage locations. Buyers
//! present a bearer token; the gateway validates it, fetches the bytes from
//! the storage collaborator, and (for one-time products) spends the token
//! only once the storage response is confirmed obtainable. A storage
//! failure therefore never costs the buyer their entitlement.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::infra::{CommerceError, EntitlementStore, Result};
use crate::storage::{ByteStream, FileStorage};

/// Buyer-visible file metadata. Deliberately excludes the storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadMetadata {
    pub file_name: String,
    pub file_type: String,
}

/// A ready-to-serve download.
pub struct DownloadStream {
    /// Full attachment filename (`<name>.<type>`).
    pub file_name: String,
    pub content_type: String,
    pub body: ByteStream,
}

/// Resolves download tokens to metadata and byte streams.
pub struct DownloadGateway {
    entitlements: Arc<dyn EntitlementStore>,
    storage: Arc<dyn FileStorage>,
}

impl DownloadGateway {
    pub fn new(entitlements: Arc<dyn EntitlementStore>, storage: Arc<dyn FileStorage>) -> Self {
        Self {
            entitlements,
            storage,
        }
    }

    /// Resolve a token to display metadata without touching the entitlement.
    #[instrument(skip(self, token))]
    pub async fn resolve_metadata(&self, token: &str) -> Result<DownloadMetadata> {
        let snapshot = self
            .entitlements
            .validate(token)
            .await?
            .ok_or(CommerceError::TokenNotFound)?;

        Ok(DownloadMetadata {
            file_name: snapshot.product_name,
            file_type: snapshot.file_type,
        })
    }

    /// Stream the purchased file.
    ///
    /// For one-time products the token is consumed between the storage
    /// fetch and the response: a duplicate request either loses the
    /// conditional update and gets `TokenNotFound`, or never validates in
    /// the first place.
    #[instrument(skip(self, token))]
    pub async fn stream(&self, token: &str) -> Result<DownloadStream> {
        let snapshot = self
            .entitlements
            .validate(token)
            .await?
            .ok_or(CommerceError::TokenNotFound)?;

        // Storage first: only a confirmed-obtainable stream may spend the
        // token.
        let object = self.storage.fetch(&snapshot.file_url).await?;

        if snapshot.one_time_download {
            if self.entitlements.consume(token).await?.is_none() {
                warn!(
                    purchase_id = %snapshot.purchase_id,
                    "lost consume race after storage fetch"
                );
                return Err(CommerceError::TokenNotFound);
            }
            info!(
                purchase_id = %snapshot.purchase_id,
                product_id = %snapshot.product_id,
                "one-time download token spent"
            );
        }

        Ok(DownloadStream {
            file_name: format!("{}.{}", snapshot.product_name, snapshot.file_type),
            content_type: object.content_type,
            body: object.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PurchaseSnapshot;
    use crate::infra::MockEntitlementStore;
    use crate::storage::{FileObject, MockFileStorage};
    use axum::body::Bytes;
    use uuid::Uuid;

    fn snapshot(one_time: bool) -> PurchaseSnapshot {
        PurchaseSnapshot {
            purchase_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Synth Pack".to_string(),
            file_url: "https://files.example/abc123".to_string(),
            file_type: "zip".to_string(),
            one_time_download: one_time,
        }
    }

    fn file_object() -> FileObject {
        FileObject {
            content_type: "application/zip".to_string(),
            body: Box::pin(tokio_stream::once(Ok(Bytes::from_static(b"bytes")))),
        }
    }

    #[tokio::test]
    async fn resolve_metadata_hides_storage_url() {
        let mut entitlements = MockEntitlementStore::new();
        let snap = snapshot(false);
        entitlements
            .expect_validate()
            .returning(move |_| Ok(Some(snap.clone())));

        let gateway = DownloadGateway::new(
            Arc::new(entitlements),
            Arc::new(MockFileStorage::new()),
        );

        let metadata = gateway.resolve_metadata("tok").await.unwrap();
        assert_eq!(metadata.file_name, "Synth Pack");
        assert_eq!(metadata.file_type, "zip");
    }

    #[tokio::test]
    async fn resolve_metadata_unknown_token_is_not_found() {
        let mut entitlements = MockEntitlementStore::new();
        entitlements.expect_validate().returning(|_| Ok(None));

        let gateway = DownloadGateway::new(
            Arc::new(entitlements),
            Arc::new(MockFileStorage::new()),
        );

        assert!(matches!(
            gateway.resolve_metadata("nope").await,
            Err(CommerceError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn one_time_stream_consumes_after_fetch() {
        let snap = snapshot(true);

        let mut entitlements = MockEntitlementStore::new();
        {
            let snap = snap.clone();
            entitlements
                .expect_validate()
                .times(1)
                .returning(move |_| Ok(Some(snap.clone())));
        }
        {
            let snap = snap.clone();
            entitlements
                .expect_consume()
                .times(1)
                .returning(move |_| Ok(Some(snap.clone())));
        }

        let mut storage = MockFileStorage::new();
        storage
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(file_object()));

        let gateway = DownloadGateway::new(Arc::new(entitlements), Arc::new(storage));

        let download = gateway.stream("tok").await.unwrap();
        assert_eq!(download.file_name, "Synth Pack.zip");
        assert_eq!(download.content_type, "application/zip");
    }

    #[tokio::test]
    async fn storage_failure_leaves_token_unconsumed() {
        let snap = snapshot(true);

        let mut entitlements = MockEntitlementStore::new();
        entitlements
            .expect_validate()
            .returning(move |_| Ok(Some(snap.clone())));
        // No consume expectation: a consume call here fails the test.

        let mut storage = MockFileStorage::new();
        storage
            .expect_fetch()
            .returning(|_| Err(CommerceError::Storage("upstream 503".to_string())));

        let gateway = DownloadGateway::new(Arc::new(entitlements), Arc::new(storage));

        assert!(matches!(
            gateway.stream("tok").await,
            Err(CommerceError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn lost_consume_race_is_not_found() {
        let snap = snapshot(true);

        let mut entitlements = MockEntitlementStore::new();
        entitlements
            .expect_validate()
            .returning(move |_| Ok(Some(snap.clone())));
        entitlements.expect_consume().returning(|_| Ok(None));

        let mut storage = MockFileStorage::new();
        storage.expect_fetch().returning(|_| Ok(file_object()));

        let gateway = DownloadGateway::new(Arc::new(entitlements), Arc::new(storage));

        assert!(matches!(
            gateway.stream("tok").await,
            Err(CommerceError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn reusable_tokens_are_never_consumed() {
        let snap = snapshot(false);

        let mut entitlements = MockEntitlementStore::new();
        entitlements
            .expect_validate()
            .times(2)
            .returning(move |_| Ok(Some(snap.clone())));
        // No consume expectation.

        let mut storage = MockFileStorage::new();
        storage
            .expect_fetch()
            .times(2)
            .returning(|_| Ok(file_object()));

        let gateway = DownloadGateway::new(Arc::new(entitlements), Arc::new(storage));

        assert!(gateway.stream("tok").await.is_ok());
        assert!(gateway.stream("tok").await.is_ok());
    }
}

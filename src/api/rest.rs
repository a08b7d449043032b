//! REST API endpoints for the purchase and entitlement flow.
//!
//! # Endpoints
//!
//! - `POST /api/v1/payments/descriptor` - Build a payment URL for a product
//! - `POST /api/v1/purchases` - Verify a direct-signature payment and record the purchase
//! - `GET  /api/v1/purchases/reference/:reference` - QR-flow poll: check a reference, record on match
//! - `GET  /api/v1/downloads/:token` - Resolve download metadata
//! - `GET  /api/v1/downloads/:token/stream` - Stream the purchased file
//!
//! # Flow
//!
//! 1. Buyer requests a descriptor and pays in an external wallet
//! 2. Buyer (or the wallet flow) presents proof: a signature or a reference
//! 3. Verification confirms the transfer on-chain
//! 4. The ledger reserves stock and mints the download token atomically
//! 5. The token is redeemed against the download endpoints

use axum::body::Body;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api::error::{ApiError, ErrorCode};
use crate::auth::{require_identity, WalletIdentity};
use crate::domain::{
    PaymentDescriptor, PaymentOutcome, PaymentReference, Product, ProductSnapshot, Purchase,
};
use crate::infra::CommerceError;
use crate::payment::{
    PaymentDescriptorBuilder, PaymentVerification, ReferenceVerification, SignatureVerification,
    VerifierConfig,
};
use crate::server::AppState;

/// Build the `/api` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/payments/descriptor", post(create_payment_descriptor))
        .route("/v1/purchases", post(create_purchase))
        .route(
            "/v1/purchases/reference/:reference",
            get(check_reference_payment),
        )
        .route("/v1/downloads/:token", get(resolve_download_metadata))
        .route("/v1/downloads/:token/stream", get(stream_download))
}

// ============================================================================
// Payment descriptor
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptorRequest {
    product_id: Uuid,
}

#[instrument(skip(state))]
async fn create_payment_descriptor(
    State(state): State<AppState>,
    Json(request): Json<DescriptorRequest>,
) -> Result<Json<PaymentDescriptor>, ApiError> {
    let product = load_product(&state, request.product_id).await?;

    let descriptor = PaymentDescriptorBuilder::new(&product.creator_address, &state.marketplace_label)
        .build(
            product.price,
            state.native_rate,
            format!("Purchase product {}", product.id),
        )?;

    info!(
        product_id = %product.id,
        reference = %descriptor.reference,
        amount_lamports = descriptor.amount_lamports,
        "payment descriptor issued"
    );

    Ok(Json(descriptor))
}

// ============================================================================
// Purchases
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePurchaseRequest {
    product_id: Uuid,
    /// Signature of the wallet-submitted transfer.
    signature: String,
    /// Paid amount in lamports.
    amount: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PurchaseResponse {
    purchase_id: Uuid,
    download_token: Option<String>,
    product: ProductSnapshot,
}

impl PurchaseResponse {
    fn new(purchase: &Purchase, product: &Product) -> Self {
        Self {
            purchase_id: purchase.id,
            download_token: purchase.download_token.clone(),
            product: product.into(),
        }
    }
}

#[instrument(skip(state, identity, request), fields(product_id = %request.product_id))]
async fn create_purchase(
    State(state): State<AppState>,
    identity: Option<Extension<WalletIdentity>>,
    Json(request): Json<CreatePurchaseRequest>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let buyer = require_identity(identity.as_ref().map(|e| &e.0))?.clone();

    if request.signature.trim().is_empty() {
        return Err(ApiError::new(
            ErrorCode::MissingRequiredField,
            "signature must not be empty",
        ));
    }
    if request.amount == 0 {
        return Err(ApiError::new(
            ErrorCode::InvalidFieldValue,
            "amount must be positive",
        ));
    }

    let product = load_product(&state, request.product_id).await?;

    let verifier = SignatureVerification::new(state.chain.clone(), request.signature.clone())
        .with_config(state.verifier_config.clone());

    let purchase = settle_and_record(&state, &product, &buyer, verifier, request.amount).await?;

    Ok(Json(PurchaseResponse::new(&purchase, &product)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferenceQuery {
    product_id: Uuid,
    /// Paid amount in lamports, from the issued descriptor.
    amount: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReferenceCheckResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    purchase: Option<PurchaseResponse>,
}

/// QR-flow status check. The wallet app pays against the descriptor's
/// reference; the buyer's browser polls this endpoint until the transfer
/// lands. Each call performs a single chain query; the client is the
/// pacing loop.
#[instrument(skip(state, identity), fields(reference = %reference))]
async fn check_reference_payment(
    State(state): State<AppState>,
    identity: Option<Extension<WalletIdentity>>,
    Path(reference): Path<String>,
    Query(query): Query<ReferenceQuery>,
) -> Result<Json<ReferenceCheckResponse>, ApiError> {
    let buyer = require_identity(identity.as_ref().map(|e| &e.0))?.clone();

    let Some(reference) = PaymentReference::from_base58(&reference) else {
        return Err(ApiError::new(
            ErrorCode::InvalidFieldValue,
            "reference must be a base58-encoded 32-byte key",
        ));
    };

    let product = load_product(&state, query.product_id).await?;

    let verifier = ReferenceVerification::new(state.chain.clone(), reference)
        .with_config(VerifierConfig::single_attempt());

    match verifier.verify().await.map_err(ApiError::from)? {
        PaymentOutcome::Confirmed { signature } => {
            let purchase = state
                .ledger
                .record_purchase(product.id, &buyer.0, &signature, query.amount)
                .await?;

            Ok(Json(ReferenceCheckResponse {
                status: "complete",
                purchase: Some(PurchaseResponse::new(&purchase, &product)),
            }))
        }
        PaymentOutcome::Unconfirmed => Ok(Json(ReferenceCheckResponse {
            status: "pending",
            purchase: None,
        })),
        PaymentOutcome::Failed { reason } => Err(CommerceError::PaymentFailed(reason).into()),
    }
}

// ============================================================================
// Downloads
// ============================================================================

#[instrument(skip(state, token))]
async fn resolve_download_metadata(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<crate::gateway::DownloadMetadata>, ApiError> {
    let metadata = state.gateway.resolve_metadata(&token).await?;
    Ok(Json(metadata))
}

#[instrument(skip(state, token))]
async fn stream_download(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let download = state.gateway.stream(&token).await?;

    let content_type = HeaderValue::from_str(&download.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.file_name.replace(['"', '\r', '\n'], "")
    );
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|_| ApiError::new(ErrorCode::InternalError, "Invalid file name"))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(download.body),
    )
        .into_response())
}

// ============================================================================
// Helpers
// ============================================================================

async fn load_product(state: &AppState, product_id: Uuid) -> Result<Product, ApiError> {
    state
        .products
        .get(product_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| {
            ApiError::new(
                ErrorCode::ProductNotFound,
                format!("Product not found: {product_id}"),
            )
            .with_resource_id(product_id.to_string())
        })
}

async fn settle_and_record(
    state: &AppState,
    product: &Product,
    buyer: &WalletIdentity,
    verifier: impl PaymentVerification,
    amount_lamports: u64,
) -> Result<Purchase, ApiError> {
    match verifier.verify().await.map_err(ApiError::from)? {
        PaymentOutcome::Confirmed { signature } => {
            let purchase = state
                .ledger
                .record_purchase(product.id, &buyer.0, &signature, amount_lamports)
                .await?;
            Ok(purchase)
        }
        PaymentOutcome::Unconfirmed => Err(CommerceError::PaymentUnconfirmed.into()),
        PaymentOutcome::Failed { reason } => Err(CommerceError::PaymentFailed(reason).into()),
    }
}

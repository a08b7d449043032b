//! Chain-query collaborator.
//!
//! [`ChainClient`] is the narrow interface the verifier needs from the
//! chain: the status of a known signature, and the most recent transfer
//! tagged with a reference key. [`RpcChainClient`] implements it over
//! Solana JSON-RPC (`getSignatureStatuses`, `getSignaturesForAddress`).

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::{json, Value};

use crate::domain::PaymentReference;
use crate::infra::{CommerceError, Result};

/// Default request timeout for RPC calls.
const RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Observed state of an on-chain transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferStatus {
    /// Reached `confirmed` or `finalized` commitment.
    Confirmed,
    /// Known to the chain but not yet confirmed, or not found yet.
    Pending,
    /// The chain reports the transaction as failed.
    Failed(String),
}

/// A transfer located through its reference key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceTransfer {
    pub signature: String,
    pub status: TransferStatus,
}

/// Read-only chain queries used by payment verification.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Status of a transaction signature.
    async fn signature_status(&self, signature: &str) -> Result<TransferStatus>;

    /// The most recent transaction that includes the reference key as an
    /// account, if any.
    async fn find_reference(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<ReferenceTransfer>>;
}

/// Solana JSON-RPC chain client.
pub struct RpcChainClient {
    http: reqwest::Client,
    rpc_url: String,
}

impl RpcChainClient {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .expect("default reqwest client");

        Self {
            http,
            rpc_url: rpc_url.into(),
        }
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CommerceError::Chain(format!("{method}: {e}")))?;

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| CommerceError::Chain(format!("{method}: invalid response: {e}")))?;

        if let Some(err) = envelope.get("error") {
            return Err(CommerceError::Chain(format!("{method}: {err}")));
        }

        Ok(envelope.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn signature_status(&self, signature: &str) -> Result<TransferStatus> {
        let result = self
            .rpc_call(
                "getSignatureStatuses",
                json!([[signature], { "searchTransactionHistory": true }]),
            )
            .await?;

        Ok(parse_signature_status(&result))
    }

    async fn find_reference(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<ReferenceTransfer>> {
        let result = self
            .rpc_call(
                "getSignaturesForAddress",
                json!([reference.to_base58(), { "limit": 1 }]),
            )
            .await?;

        Ok(parse_reference_result(&result))
    }
}

/// Parse a `getSignatureStatuses` result into a transfer status.
fn parse_signature_status(result: &Value) -> TransferStatus {
    let entry = &result["value"][0];
    if entry.is_null() {
        return TransferStatus::Pending;
    }
    status_from_entry(entry)
}

/// Parse a `getSignaturesForAddress` result into the newest tagged transfer.
fn parse_reference_result(result: &Value) -> Option<ReferenceTransfer> {
    let entry = result.as_array()?.first()?;
    let signature = entry["signature"].as_str()?.to_string();

    Some(ReferenceTransfer {
        signature,
        status: status_from_entry(entry),
    })
}

fn status_from_entry(entry: &Value) -> TransferStatus {
    if !entry["err"].is_null() {
        return TransferStatus::Failed(entry["err"].to_string());
    }

    match entry["confirmationStatus"].as_str() {
        Some("confirmed") | Some("finalized") => TransferStatus::Confirmed,
        _ => TransferStatus::Pending,
    }
}

//! Purchase entity and download-token lifecycle.
//!
//! A purchase row is created only inside a committed ledger transaction,
//! after a payment has been verified as confirmed. The only mutation after
//! creation is the `Completed -> Downloaded` transition performed by the
//! entitlement store's consume-once update on one-time products.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of the raw download token in bytes (hex-encoded on the wire).
pub const DOWNLOAD_TOKEN_BYTES: usize = 32;

/// Status of a purchase.
///
/// `Downloaded` is terminal and reachable only for one-time-download
/// products; every other purchase stays `Completed` forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Payment verified, stock reserved, entitlement live.
    Completed,
    /// One-time entitlement has been spent.
    Downloaded,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Downloaded => "downloaded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "downloaded" => Some(Self::Downloaded),
            _ => None,
        }
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    /// Purchase ID.
    pub id: Uuid,

    /// The purchased product (reference, not ownership).
    pub product_id: Uuid,

    /// Opaque buyer identity supplied by the identity collaborator.
    pub buyer_address: String,

    /// Signature of the settled on-chain transfer.
    pub transaction_signature: String,

    /// Paid amount in lamports.
    pub amount_lamports: u64,

    /// Current status.
    pub status: PurchaseStatus,

    /// Bearer download credential. `None` once consumed; never reassigned.
    pub download_token: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entitlement view of a purchase, resolved from a download token.
///
/// Carries the storage location so the download gateway can fetch the file
/// internally; it is never serialized to buyers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseSnapshot {
    pub purchase_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub file_url: String,
    pub file_type: String,
    pub one_time_download: bool,
}

/// Mint a fresh download token: 32 bytes of CSPRNG output, hex-encoded.
pub fn mint_download_token() -> String {
    let mut bytes = [0u8; DOWNLOAD_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        assert_eq!(PurchaseStatus::parse("completed"), Some(PurchaseStatus::Completed));
        assert_eq!(PurchaseStatus::parse("downloaded"), Some(PurchaseStatus::Downloaded));
        assert_eq!(PurchaseStatus::parse("refunded"), None);
        assert_eq!(PurchaseStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn minted_tokens_are_distinct_and_opaque() {
        let a = mint_download_token();
        let b = mint_download_token();
        assert_eq!(a.len(), DOWNLOAD_TOKEN_BYTES * 2);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

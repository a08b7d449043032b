//! Payment-side domain values: references, descriptors, outcomes.
//!
//! A payment reference is an ephemeral 32-byte correlation key. It is
//! embedded in the Solana Pay URL as an extra read-only account key on the
//! transfer, which lets the verifier find the settled transaction later.
//! References are never persisted; they live only as lookup keys while a
//! QR payment attempt is being polled.

use rand::rngs::OsRng;
use rand::RngCore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lamports per SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Length of a payment reference in bytes (a Solana public-key-shaped value).
pub const REFERENCE_BYTES: usize = 32;

/// An ephemeral correlation key for a QR-flow payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentReference([u8; REFERENCE_BYTES]);

impl PaymentReference {
    /// Generate a fresh reference from the CSPRNG.
    ///
    /// 32 random bytes make collisions negligible; no uniqueness check is
    /// performed anywhere.
    pub fn generate() -> Self {
        let mut bytes = [0u8; REFERENCE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; REFERENCE_BYTES]) -> Self {
        Self(bytes)
    }

    /// Parse the base58 form used on the wire.
    pub fn from_base58(s: &str) -> Option<Self> {
        let decoded = bs58::decode(s).into_vec().ok()?;
        let bytes: [u8; REFERENCE_BYTES] = decoded.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; REFERENCE_BYTES] {
        &self.0
    }

    /// Base58 encoding, as it appears in the payment URL and in RPC queries.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl std::fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base58())
    }
}

/// A payment target handed to an external wallet.
///
/// `url` follows the Solana Pay deep-link convention
/// (`solana:<recipient>?amount=..&reference=..&label=..&message=..`), so any
/// existing wallet can construct and submit the transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDescriptor {
    /// Recipient wallet address (the product creator).
    pub recipient: String,

    /// Amount in SOL.
    pub amount: Decimal,

    /// Amount in lamports, rounded.
    pub amount_lamports: u64,

    /// Base58 correlation reference, unique per descriptor.
    pub reference: String,

    /// Short display label for the wallet UI.
    pub label: String,

    /// Human-readable payment message.
    pub message: String,

    /// The encoded payment URL.
    pub url: String,
}

/// Result of a payment-verification attempt.
///
/// Exactly one of these is reported by every verification path. Only
/// `Confirmed` permits the purchase ledger to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// A matching transfer reached a confirmed state.
    Confirmed {
        /// Signature of the confirmed transfer.
        signature: String,
    },
    /// The retry budget was exhausted without observing confirmation.
    /// The caller may re-initiate; no state was mutated.
    Unconfirmed,
    /// The chain reported the transfer as failed.
    Failed { reason: String },
}

impl PaymentOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

//! Payment descriptor generation.
//!
//! Produces the Solana Pay deep link an external wallet consumes:
//! `solana:<recipient>?amount=..&reference=..&label=..&message=..`.
//! Each descriptor carries a fresh 32-byte reference key so the eventual
//! transfer can be matched back to the purchase attempt.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use url::Url;

use crate::domain::{PaymentDescriptor, PaymentReference, LAMPORTS_PER_SOL};
use crate::infra::{CommerceError, Result};

/// URL scheme of the Solana payment-URL standard.
const PAYMENT_URL_SCHEME: &str = "solana";

/// Decimal places carried on SOL amounts (lamport resolution).
const SOL_SCALE: u32 = 9;

/// Builds payment descriptors for a merchant recipient.
pub struct PaymentDescriptorBuilder {
    recipient: String,
    label: String,
}

impl PaymentDescriptorBuilder {
    /// `recipient` is the creator's wallet address; `label` is the short
    /// marketplace name shown in wallet UIs.
    pub fn new(recipient: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            label: label.into(),
        }
    }

    /// Build a descriptor for a price in marketplace currency units, using
    /// the conversion rate supplied by the price-oracle collaborator
    /// (`rate` = currency units per SOL).
    pub fn build(
        &self,
        price: Decimal,
        rate: Decimal,
        message: impl Into<String>,
    ) -> Result<PaymentDescriptor> {
        if rate <= Decimal::ZERO {
            return Err(CommerceError::Validation(format!(
                "non-positive conversion rate: {rate}"
            )));
        }
        if price < Decimal::ZERO {
            return Err(CommerceError::Validation(format!(
                "negative price: {price}"
            )));
        }

        let amount = (price / rate).round_dp(SOL_SCALE).normalize();
        let amount_lamports = lamports_from_sol(amount)?;
        let reference = PaymentReference::generate();
        let message = message.into();

        let url = encode_url(
            &self.recipient,
            amount,
            &reference.to_base58(),
            &self.label,
            &message,
        )?;

        Ok(PaymentDescriptor {
            recipient: self.recipient.clone(),
            amount,
            amount_lamports,
            reference: reference.to_base58(),
            label: self.label.clone(),
            message,
            url,
        })
    }
}

/// Convert a SOL amount to lamports, rounded to the nearest unit.
pub fn lamports_from_sol(amount: Decimal) -> Result<u64> {
    (amount * Decimal::from(LAMPORTS_PER_SOL))
        .round()
        .to_u64()
        .ok_or_else(|| CommerceError::Validation(format!("amount out of range: {amount} SOL")))
}

fn encode_url(
    recipient: &str,
    amount: Decimal,
    reference: &str,
    label: &str,
    message: &str,
) -> Result<String> {
    let mut url = Url::parse(&format!("{PAYMENT_URL_SCHEME}:{recipient}"))
        .map_err(|e| CommerceError::Validation(format!("invalid recipient address: {e}")))?;

    url.query_pairs_mut()
        .append_pair("amount", &amount.to_string())
        .append_pair("reference", reference)
        .append_pair("label", label)
        .append_pair("message", message);

    Ok(url.into())
}

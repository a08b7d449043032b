//! Payment verification.
//!
//! One capability, two confirmation paths:
//!
//! - [`SignatureVerification`]: the buyer's wallet already submitted the
//!   transfer and handed us its signature; poll the signature's status.
//! - [`ReferenceVerification`]: the QR flow; poll for a transfer tagged
//!   with the descriptor's reference key and extract its signature.
//!
//! Both paths run the same bounded polling discipline and report exactly
//! one of Confirmed / Unconfirmed / Failed. The wait is a plain
//! `tokio::time::sleep` loop, so dropping the request future (caller
//! disconnect) cancels it between attempts. No state is mutated here;
//! the ledger only runs after a Confirmed outcome.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{PaymentOutcome, PaymentReference};
use crate::infra::Result;
use crate::payment::chain::{ChainClient, TransferStatus};

/// Polling bounds for a verification run.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Total number of chain queries before giving up.
    pub max_attempts: u32,
    /// Sleep between queries.
    pub poll_interval: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl VerifierConfig {
    /// One query, no sleeping. Used by endpoints whose caller is itself
    /// the polling loop (the QR status check).
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            poll_interval: Duration::ZERO,
        }
    }
}

/// A payment-confirmation capability.
///
/// New confirmation mechanisms implement this trait; the purchase flow is
/// written against it and never branches on the mechanism.
#[async_trait]
pub trait PaymentVerification: Send + Sync {
    async fn verify(&self) -> Result<PaymentOutcome>;
}

/// Direct-signature confirmation path.
pub struct SignatureVerification {
    chain: Arc<dyn ChainClient>,
    signature: String,
    config: VerifierConfig,
}

impl SignatureVerification {
    pub fn new(chain: Arc<dyn ChainClient>, signature: impl Into<String>) -> Self {
        Self {
            chain,
            signature: signature.into(),
            config: VerifierConfig::default(),
        }
    }

    pub fn with_config(mut self, config: VerifierConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl PaymentVerification for SignatureVerification {
    async fn verify(&self) -> Result<PaymentOutcome> {
        for attempt in 1..=self.config.max_attempts {
            match self.chain.signature_status(&self.signature).await? {
                TransferStatus::Confirmed => {
                    debug!(signature = %self.signature, attempt, "transfer confirmed");
                    return Ok(PaymentOutcome::Confirmed {
                        signature: self.signature.clone(),
                    });
                }
                TransferStatus::Failed(reason) => {
                    return Ok(PaymentOutcome::Failed { reason });
                }
                TransferStatus::Pending => {
                    debug!(
                        signature = %self.signature,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        "transfer not yet confirmed"
                    );
                }
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }

        Ok(PaymentOutcome::Unconfirmed)
    }
}

/// Reference (QR-flow) confirmation path.
pub struct ReferenceVerification {
    chain: Arc<dyn ChainClient>,
    reference: PaymentReference,
    config: VerifierConfig,
}

impl ReferenceVerification {
    pub fn new(chain: Arc<dyn ChainClient>, reference: PaymentReference) -> Self {
        Self {
            chain,
            reference,
            config: VerifierConfig::default(),
        }
    }

    pub fn with_config(mut self, config: VerifierConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl PaymentVerification for ReferenceVerification {
    async fn verify(&self) -> Result<PaymentOutcome> {
        for attempt in 1..=self.config.max_attempts {
            match self.chain.find_reference(&self.reference).await? {
                Some(transfer) => match transfer.status {
                    TransferStatus::Confirmed => {
                        debug!(
                            reference = %self.reference,
                            signature = %transfer.signature,
                            "reference transfer confirmed"
                        );
                        return Ok(PaymentOutcome::Confirmed {
                            signature: transfer.signature,
                        });
                    }
                    TransferStatus::Failed(reason) => {
                        return Ok(PaymentOutcome::Failed { reason });
                    }
                    TransferStatus::Pending => {
                        debug!(reference = %self.reference, attempt, "reference transfer pending");
                    }
                },
                None => {
                    debug!(
                        reference = %self.reference,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        "no transfer for reference yet"
                    );
                }
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }

        Ok(PaymentOutcome::Unconfirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::chain::{MockChainClient, ReferenceTransfer};

    fn confirmed_after(polls_before: usize) -> MockChainClient {
        let mut chain = MockChainClient::new();
        let mut remaining = polls_before;
        chain.expect_signature_status().returning(move |_| {
            if remaining > 0 {
                remaining -= 1;
                Ok(TransferStatus::Pending)
            } else {
                Ok(TransferStatus::Confirmed)
            }
        });
        chain
    }

    #[tokio::test(start_paused = true)]
    async fn signature_confirms_after_polling() {
        let verifier =
            SignatureVerification::new(Arc::new(confirmed_after(3)), "sig-1");

        let outcome = verifier.verify().await.unwrap();
        assert_eq!(
            outcome,
            PaymentOutcome::Confirmed {
                signature: "sig-1".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn signature_unconfirmed_after_budget_exhausted() {
        let mut chain = MockChainClient::new();
        chain
            .expect_signature_status()
            .times(30)
            .returning(|_| Ok(TransferStatus::Pending));

        let verifier = SignatureVerification::new(Arc::new(chain), "sig-stuck");

        let outcome = verifier.verify().await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Unconfirmed);
    }

    #[tokio::test]
    async fn signature_failure_reported_immediately() {
        let mut chain = MockChainClient::new();
        chain
            .expect_signature_status()
            .times(1)
            .returning(|_| Ok(TransferStatus::Failed("InstructionError".to_string())));

        let verifier = SignatureVerification::new(Arc::new(chain), "sig-bad");

        let outcome = verifier.verify().await.unwrap();
        assert!(matches!(outcome, PaymentOutcome::Failed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn reference_extracts_signature_on_match() {
        let mut chain = MockChainClient::new();
        let mut empty_polls = 2;
        chain.expect_find_reference().returning(move |_| {
            if empty_polls > 0 {
                empty_polls -= 1;
                Ok(None)
            } else {
                Ok(Some(ReferenceTransfer {
                    signature: "sig-from-reference".to_string(),
                    status: TransferStatus::Confirmed,
                }))
            }
        });

        let verifier =
            ReferenceVerification::new(Arc::new(chain), PaymentReference::generate());

        let outcome = verifier.verify().await.unwrap();
        assert_eq!(
            outcome,
            PaymentOutcome::Confirmed {
                signature: "sig-from-reference".to_string()
            }
        );
    }

    #[tokio::test]
    async fn single_attempt_reports_unconfirmed_without_sleeping() {
        let mut chain = MockChainClient::new();
        chain
            .expect_find_reference()
            .times(1)
            .returning(|_| Ok(None));

        let verifier = ReferenceVerification::new(Arc::new(chain), PaymentReference::generate())
            .with_config(VerifierConfig::single_attempt());

        let outcome = verifier.verify().await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Unconfirmed);
    }

    #[tokio::test]
    async fn chain_errors_surface_to_the_caller() {
        let mut chain = MockChainClient::new();
        chain
            .expect_signature_status()
            .times(1)
            .returning(|_| Err(crate::infra::CommerceError::Chain("rpc down".to_string())));

        let verifier = SignatureVerification::new(Arc::new(chain), "sig-x");
        assert!(verifier.verify().await.is_err());
    }
}

//! Payment plane: descriptor generation and settlement verification.
//!
//! The chain itself is an external collaborator reached through
//! [`chain::ChainClient`]; nothing here mutates service state.

pub mod chain;
pub mod descriptor;
pub mod verifier;

pub use chain::{ChainClient, ReferenceTransfer, RpcChainClient, TransferStatus};
pub use descriptor::{lamports_from_sol, PaymentDescriptorBuilder};
pub use verifier::{
    PaymentVerification, ReferenceVerification, SignatureVerification, VerifierConfig,
};

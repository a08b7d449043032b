//! Core domain types for the Nect commerce service.
//!
//! Everything here is a plain data type: products and their stock policy,
//! purchases and the download-token lifecycle, and the payment-side values
//! (references, descriptors, verification outcomes) exchanged with the
//! chain collaborators.

pub mod payment;
pub mod product;
pub mod purchase;

pub use payment::{
    PaymentDescriptor, PaymentOutcome, PaymentReference, LAMPORTS_PER_SOL, REFERENCE_BYTES,
};
pub use product::{Product, ProductSnapshot, StockPolicy};
pub use purchase::{mint_download_token, Purchase, PurchaseSnapshot, PurchaseStatus};

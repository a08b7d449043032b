//! Trait definitions for the entitlement core.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::PurchaseSnapshot;

use super::Result;

/// Store of download entitlements, keyed by opaque bearer token.
///
/// Invariant: consume is at-most-once per token. A consumed token never
/// validates again and is never reassigned.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Resolve a token to its purchase, if the entitlement is still live.
    async fn validate(&self, token: &str) -> Result<Option<PurchaseSnapshot>>;

    /// Atomically spend a token: flips the purchase to `downloaded` and
    /// nulls the token in one conditional update. Returns `None` when the
    /// token does not match a live entitlement (including when a concurrent
    /// consume won the race).
    async fn consume(&self, token: &str) -> Result<Option<PurchaseSnapshot>>;
}

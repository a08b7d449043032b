//! PostgreSQL-backed stores.

mod entitlement;
mod ledger;
mod product_store;

pub use entitlement::PgEntitlementStore;
pub use ledger::PgPurchaseLedger;
pub use product_store::PgProductStore;

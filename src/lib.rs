//! Billchain Backend Library
//!
//! Reconciliation engine for shared bills recorded on append-only,
//! hash-linked ledger chains. Exposes the full module tree for the
//! `billchain` binary and for tests.

pub mod bill;
pub mod chain;
pub mod error;
pub mod integrity;
pub mod metrics;
pub mod models;
pub mod pairing;
pub mod report;
pub mod roster;
pub mod store;

pub use error::LedgerError;
pub use report::Reconciler;

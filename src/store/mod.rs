//! Storage collaborator for raw block records.
//!
//! The core never writes through this interface; blocks are produced by an
//! external ledger writer. One read-only connection is opened per process
//! run and passed explicitly to the reconciliation pass.

pub mod sqlite;

pub use sqlite::SqliteBlockStore;

use crate::models::Block;
use anyhow::Result;

/// Read access to stored block records.
///
/// Implementations are responsible for excluding malformed rows; the core
/// assumes every returned block maps cleanly onto the data model. Returned
/// order is storage order and carries no guarantee; the chain assembler
/// re-sorts by `sequence_index`.
pub trait BlockStore {
    /// Fetch every block recorded for a position.
    fn fetch_blocks(&self, position_id: &str) -> Result<Vec<Block>>;
}

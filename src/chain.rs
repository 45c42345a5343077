//! Chain assembly: unordered stored records into ordered, validated chains.
//!
//! Storage order carries no guarantee, so every fetch is re-sorted by
//! `sequence_index` before use. Hash-linkage continuity is NOT checked here;
//! that is the optional [`crate::integrity`] pass.

use crate::error::LedgerError;
use crate::models::Block;
use crate::store::BlockStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Ordered sequence of blocks sharing a position, ascending by
/// `sequence_index`. Non-empty by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub position_id: String,
    pub blocks: Vec<Block>,
}

impl Chain {
    /// Blocks carrying data, with the origin marker excluded.
    pub fn value_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| !b.is_origin())
    }

    /// Last non-origin block, if any revision was ever recorded.
    pub fn last_value_block(&self) -> Option<&Block> {
        self.value_blocks().last()
    }

    /// Blocks recording a completed payment.
    pub fn paid_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.is_paid_marker())
    }

    /// Most recent completed payment by timestamp.
    pub fn last_paid_block(&self) -> Option<&Block> {
        self.paid_blocks()
            .max_by_key(|b| (b.timestamp_ms, b.sequence_index))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Fetch and order the chain for a position.
///
/// Fails with [`LedgerError::EmptyChain`] when the position has no recorded
/// blocks; callers treat that as a skippable condition for the affected
/// bill or payee section, not a fatal error for the run.
pub fn assemble(store: &dyn BlockStore, position_id: &str) -> Result<Chain> {
    let mut blocks = store.fetch_blocks(position_id)?;

    if blocks.is_empty() {
        return Err(LedgerError::EmptyChain {
            position: position_id.to_string(),
        }
        .into());
    }

    blocks.sort_by_key(|b| b.sequence_index);

    Ok(Chain {
        position_id: position_id.to_string(),
        blocks,
    })
}

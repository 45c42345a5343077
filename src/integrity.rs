//! Hash-linkage verification for assembled chains.
//!
//! Each non-origin block records the content hash of its predecessor in
//! `link_hash`. Verification recomputes every predecessor hash and compares;
//! the origin block's own link (the literal "0") is not checked. This pass
//! is optional and advisory, the metrics never depend on it.

use crate::chain::Chain;
use crate::models::Block;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 content hash of a block, hex-encoded.
///
/// The preimage is the concatenation of the writer's canonical field order;
/// changing any recorded field changes the hash.
pub fn block_hash(block: &Block) -> String {
    let mut hasher = Sha256::new();
    hasher.update(block.sequence_index.to_string());
    hasher.update(&block.position_id);
    hasher.update(block.mint_count.to_string());
    hasher.update(&block.owner_id);
    hasher.update(block.kind.code().to_string());
    hasher.update(block.timestamp_ms.to_string());
    hasher.update(&block.link_hash);
    hasher.update(&block.payload);
    hasher.update(block.nonce.to_string());
    hex::encode(hasher.finalize())
}

/// Outcome of a chain linkage check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LinkCheck {
    Intact,
    Broken {
        /// Sequence index of the block whose recorded link is wrong.
        sequence_index: i64,
        expected: String,
        recorded: String,
    },
}

impl LinkCheck {
    pub fn is_intact(&self) -> bool {
        matches!(self, LinkCheck::Intact)
    }
}

/// Verify that every block's `link_hash` matches the recomputed hash of its
/// predecessor. Stops at the first break.
pub fn verify_chain(chain: &Chain) -> LinkCheck {
    for pair in chain.blocks.windows(2) {
        let expected = block_hash(&pair[0]);
        if pair[1].link_hash != expected {
            return LinkCheck::Broken {
                sequence_index: pair[1].sequence_index,
                expected,
                recorded: pair[1].link_hash.clone(),
            };
        }
    }
    LinkCheck::Intact
}

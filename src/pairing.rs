//! Temporal pairing of payment blocks to value revisions.
//!
//! A payment records that a bill was settled, but not how much it was for;
//! the amount lives on the bill's value chain. Each payment is paired with
//! the most recent value revision recorded strictly before it, so a value
//! appended at the same instant as a payment applies to the NEXT payment,
//! not this one.

use crate::chain::Chain;
use crate::models::Block;
use serde::Serialize;

/// The value revision attributed to a payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PairedValue {
    /// A value revision strictly preceding the payment was found.
    Preceding(Block),
    /// No strictly-preceding revision exists; the value was carried over
    /// from the nearest pairing that did resolve.
    Carried(Block),
    /// The value chain holds no revisions at all.
    Unavailable,
}

impl PairedValue {
    /// The underlying value block, when one was attributed.
    pub fn block(&self) -> Option<&Block> {
        match self {
            PairedValue::Preceding(b) | PairedValue::Carried(b) => Some(b),
            PairedValue::Unavailable => None,
        }
    }
}

/// One payment and its attributed value revision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pairing {
    pub payment: Block,
    pub value: PairedValue,
}

/// Pair every payment block with a value revision from `value_chain`.
///
/// For each payment the candidate set is every non-origin value block with
/// `timestamp_ms` strictly below the payment's; the latest such block wins,
/// with equal timestamps broken toward the higher `sequence_index`.
///
/// Payments recorded before the first value revision cannot resolve a
/// preceding value. Those fall under the prior-pairing fallback policy: each
/// borrows the nearest resolved attribution (forward-fill, then leading
/// back-fill from the first resolved pairing), marked
/// [`PairedValue::Carried`] so reports can show the attribution is
/// approximate. If no payment resolves at all, every pairing is
/// [`PairedValue::Unavailable`]. The fallback keeps the output aligned with
/// the payment sequence; it is a padding convention, not a claim that the
/// value existed at payment time.
pub fn pair_payments(value_chain: &Chain, payments: &[Block]) -> Vec<Pairing> {
    let values: Vec<&Block> = value_chain.value_blocks().collect();

    let mut pairings: Vec<Pairing> = payments
        .iter()
        .map(|payment| {
            let preceding = values
                .iter()
                .filter(|v| v.timestamp_ms < payment.timestamp_ms)
                .max_by_key(|v| (v.timestamp_ms, v.sequence_index));
            Pairing {
                payment: payment.clone(),
                value: match preceding {
                    Some(block) => PairedValue::Preceding((*block).clone()),
                    None => PairedValue::Unavailable,
                },
            }
        })
        .collect();

    // Forward-fill: a payment that found nothing inherits the most recent
    // resolved attribution before it.
    let mut carried: Option<Block> = None;
    for pairing in pairings.iter_mut() {
        match &pairing.value {
            PairedValue::Preceding(block) => carried = Some(block.clone()),
            PairedValue::Unavailable => {
                if let Some(block) = &carried {
                    pairing.value = PairedValue::Carried(block.clone());
                }
            }
            PairedValue::Carried(_) => {}
        }
    }

    // Back-fill the leading edge from the first resolved pairing.
    let first_resolved = pairings.iter().find_map(|p| match &p.value {
        PairedValue::Preceding(block) => Some(block.clone()),
        _ => None,
    });
    if let Some(block) = first_resolved {
        for pairing in pairings.iter_mut() {
            if pairing.value == PairedValue::Unavailable {
                pairing.value = PairedValue::Carried(block.clone());
            }
        }
    }

    pairings
}

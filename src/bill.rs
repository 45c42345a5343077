//! Bill aggregates: one value chain grouped with its payment-status chains.

use crate::chain::{self, Chain};
use crate::error::LedgerError;
use crate::models::Frequency;
use crate::roster::{BillSpec, PayeeDirectory};
use crate::store::BlockStore;
use anyhow::Result;
use tracing::warn;

/// A payment-status chain attributed to its responsible payee.
#[derive(Debug, Clone)]
pub struct PaymentChain {
    pub payee: String,
    pub chain: Chain,
}

/// One bill: label, frequency, the monetary-value chain, and one payment
/// chain per responsible party. Rebuilt from storage on every pass.
#[derive(Debug, Clone)]
pub struct BillAggregate {
    pub label: String,
    pub frequency: Frequency,
    pub value_chain: Chain,
    pub payment_chains: Vec<PaymentChain>,
    /// Responsible payees, one per configured payment position. A payee
    /// stays responsible even while their position has no blocks yet.
    pub responsible: Vec<String>,
}

impl BillAggregate {
    /// Assemble the bill's chains from the store.
    ///
    /// An empty value chain is fatal for the bill (nothing to derive). An
    /// empty payment chain only skips that payee's section with a warning;
    /// the rest of the bill still reconciles.
    pub fn build(
        store: &dyn BlockStore,
        spec: &BillSpec,
        payees: &PayeeDirectory,
    ) -> Result<Self> {
        let frequency = Frequency::from_name(&spec.frequency)?;
        let value_chain = chain::assemble(store, &spec.value_position)?;

        let responsible: Vec<String> = spec
            .payment_positions
            .iter()
            .map(|position| payees.resolve(position).to_string())
            .collect();

        let mut payment_chains = Vec::with_capacity(spec.payment_positions.len());
        for position in &spec.payment_positions {
            match chain::assemble(store, position) {
                Ok(chain) => payment_chains.push(PaymentChain {
                    payee: payees.resolve(position).to_string(),
                    chain,
                }),
                Err(err) => {
                    warn!(
                        "bill {:?}: skipping payment chain {}: {}",
                        spec.label, position, err
                    );
                }
            }
        }

        Ok(Self {
            label: spec.label.clone(),
            frequency,
            value_chain,
            payment_chains,
            responsible,
        })
    }

    /// Number of responsible parties (one per configured payment position).
    pub fn responsible_count(&self) -> usize {
        self.responsible.len()
    }

    /// Responsible payee names, in configured position order.
    pub fn responsible_names(&self) -> Vec<&str> {
        self.responsible.iter().map(|s| s.as_str()).collect()
    }

    /// Most recent recorded cost, if any revision exists beyond the origin.
    pub fn last_value(&self) -> Result<Option<f64>, LedgerError> {
        match self.value_chain.last_value_block() {
            Some(block) => Ok(Some(block.amount()?)),
            None => Ok(None),
        }
    }
}

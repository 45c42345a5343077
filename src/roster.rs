//! Static configuration: the bill roster and payee directory.
//!
//! The roster is a TOML file naming each bill's value-chain position, its
//! payment-chain positions, label, and frequency, plus a payee→positions
//! table. The payee table is inverted once per load into a position→payee
//! map so per-position lookups are O(1) instead of a scan per call.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

fn default_frequency() -> String {
    "Monthly".to_string()
}

/// One bill's static wiring.
#[derive(Debug, Clone, Deserialize)]
pub struct BillSpec {
    pub label: String,
    /// Frequency name; validated against the known set when the bill
    /// aggregate is built, so a typo only fails that bill.
    #[serde(default = "default_frequency")]
    pub frequency: String,
    /// Position of the monetary-value chain.
    pub value_position: String,
    /// Positions of the per-responsible-party payment-status chains.
    pub payment_positions: Vec<String>,
}

/// Full roster file.
#[derive(Debug, Clone, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub bills: Vec<BillSpec>,
    /// Payee name → positions that payee is responsible for.
    #[serde(default)]
    pub payees: BTreeMap<String, Vec<String>>,
}

impl Roster {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read roster at {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Failed to parse roster at {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let roster: Roster = toml::from_str(raw)?;
        Ok(roster)
    }

    /// Build the inverted position→payee directory.
    pub fn payee_directory(&self) -> PayeeDirectory {
        PayeeDirectory::from_payees(&self.payees)
    }

    /// Find a bill by label.
    pub fn bill(&self, label: &str) -> Option<&BillSpec> {
        self.bills.iter().find(|b| b.label == label)
    }
}

/// Precomputed reverse lookup from position to responsible payee.
#[derive(Debug, Clone, Default)]
pub struct PayeeDirectory {
    by_position: HashMap<String, String>,
}

impl PayeeDirectory {
    /// Invert the payee→positions table. On duplicate positions the first
    /// insertion wins; iteration over the name-ordered table makes the
    /// winner deterministic.
    pub fn from_payees(payees: &BTreeMap<String, Vec<String>>) -> Self {
        let mut by_position = HashMap::new();
        for (payee, positions) in payees {
            for position in positions {
                by_position
                    .entry(position.clone())
                    .or_insert_with(|| payee.clone());
            }
        }
        Self { by_position }
    }

    /// Responsible payee for a position; unmapped positions resolve to the
    /// "Unknown" sentinel.
    pub fn resolve(&self, position_id: &str) -> &str {
        self.by_position
            .get(position_id)
            .map(|s| s.as_str())
            .unwrap_or("Unknown")
    }
}

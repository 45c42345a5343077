//! Core data model: ledger blocks, billing frequencies, payment status.

use crate::error::LedgerError;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Semantic role of a ledger block.
///
/// The integer codes match the `kind` column written by the external ledger
/// writer; code 1 is the chain origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Genesis,
    Mint,
    Transfer,
    Acquire,
    Lock,
    Obfuscate,
}

impl BlockKind {
    /// Integer code as stored in the `kind` column.
    pub fn code(self) -> i64 {
        match self {
            BlockKind::Genesis => 1,
            BlockKind::Mint => 2,
            BlockKind::Transfer => 3,
            BlockKind::Acquire => 4,
            BlockKind::Lock => 5,
            BlockKind::Obfuscate => 6,
        }
    }

    /// Decode a stored kind code. Unknown codes are the storage layer's
    /// problem to exclude, so this returns `None` rather than panicking.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(BlockKind::Genesis),
            2 => Some(BlockKind::Mint),
            3 => Some(BlockKind::Transfer),
            4 => Some(BlockKind::Acquire),
            5 => Some(BlockKind::Lock),
            6 => Some(BlockKind::Obfuscate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BlockKind::Genesis => "genesis",
            BlockKind::Mint => "mint",
            BlockKind::Transfer => "transfer",
            BlockKind::Acquire => "acquire",
            BlockKind::Lock => "lock",
            BlockKind::Obfuscate => "obfuscate",
        }
    }
}

/// One immutable ledger entry.
///
/// Blocks are created by an external writer and never mutated here; the core
/// only reads, reorders, and derives. `sequence_index` defines canonical
/// chain order, `timestamp_ms` defines temporal order, and the two are
/// independent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Unique within a chain; assigned monotonically by the writer.
    pub sequence_index: i64,
    /// Identifier of the chain this block belongs to.
    pub position_id: String,
    /// Owning party; a placeholder for non-ownership blocks.
    pub owner_id: String,
    pub kind: BlockKind,
    /// Numeric-string cost for value chains, status token for payment
    /// chains, or the literal origin marker.
    pub payload: String,
    /// Content hash of the preceding block. Integrity record only; verified
    /// exclusively by the optional [`crate::integrity`] pass.
    pub link_hash: String,
    /// Retained for provenance/display; not used by core arithmetic.
    pub mint_count: i64,
    /// Retained for provenance/display; not used by core arithmetic.
    pub nonce: i64,
    /// Milliseconds since epoch.
    pub timestamp_ms: i64,
    /// Identifier of the real-world bill/object the block concerns.
    pub object_id: String,
}

impl Block {
    /// Whether this is the chain's origin block. The writer marks origins
    /// with the literal "Genesis" in the payload; substring match keeps us
    /// compatible with decorated markers ("Genesis Message").
    pub fn is_origin(&self) -> bool {
        self.payload.contains("Genesis")
    }

    /// Whether this payment block records a completed payment.
    pub fn is_paid_marker(&self) -> bool {
        self.payload.to_lowercase().contains("ok")
    }

    /// Parse the payload as a monetary amount.
    pub fn amount(&self) -> Result<f64, LedgerError> {
        self.payload
            .trim()
            .parse::<f64>()
            .map_err(|_| LedgerError::NonNumericPayload {
                position: self.position_id.clone(),
                sequence_index: self.sequence_index,
                payload: self.payload.clone(),
            })
    }

    /// Block timestamp as a UTC datetime, if representable.
    pub fn datetime(&self) -> Option<DateTime<chrono::Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }

    /// Block timestamp formatted as `YYYY-MM-DD` for report rows.
    pub fn date_string(&self) -> String {
        match self.datetime() {
            Some(dt) => dt.format("%Y-%m-%d").to_string(),
            None => format!("@{}", self.timestamp_ms),
        }
    }
}

/// Billing frequency of a bill, with its months-per-period factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
    Bimonthly,
}

impl Frequency {
    /// Fraction of a month covered by one billing period.
    pub fn months_per_period(self) -> f64 {
        match self {
            Frequency::Weekly => 0.25,
            Frequency::Biweekly => 0.5,
            Frequency::Monthly => 1.0,
            Frequency::Bimonthly => 2.0,
        }
    }

    /// Parse a roster frequency string. Anything outside the configured set
    /// is a per-bill configuration error.
    pub fn from_name(name: &str) -> Result<Self, LedgerError> {
        match name {
            "Weekly" => Ok(Frequency::Weekly),
            "Biweekly" => Ok(Frequency::Biweekly),
            "Monthly" => Ok(Frequency::Monthly),
            "Bi-monthly" => Ok(Frequency::Bimonthly),
            other => Err(LedgerError::UnknownFrequency {
                name: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Frequency::Weekly => "Weekly",
            Frequency::Biweekly => "Biweekly",
            Frequency::Monthly => "Monthly",
            Frequency::Bimonthly => "Bi-monthly",
        }
    }

    /// All frequencies, in descending months-per-period order.
    pub fn all() -> [Frequency; 4] {
        [
            Frequency::Bimonthly,
            Frequency::Monthly,
            Frequency::Biweekly,
            Frequency::Weekly,
        ]
    }
}

/// Payment state of a bill, recomputed fresh on every reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Due,
    Received,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Due => "Due",
            PaymentStatus::Received => "Received",
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub roster_path: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./billchain.db".to_string());

        let roster_path =
            std::env::var("ROSTER_PATH").unwrap_or_else(|_| "./roster.toml".to_string());

        Ok(Self {
            database_path,
            roster_path,
        })
    }
}

//! Error kinds for the reconciliation core.
//!
//! Every variant is scoped to a single bill or position. The reconciliation
//! pass logs a warning for the affected bill and continues with the rest;
//! nothing here aborts a whole run.

/// Errors produced while assembling chains or deriving metrics.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// No blocks exist for a position. Recoverable: the bill or payee
    /// section is skipped with a warning.
    EmptyChain { position: String },

    /// A non-origin value block carried a payload that does not parse as a
    /// decimal number. Fatal for that bill's metrics.
    NonNumericPayload {
        position: String,
        sequence_index: i64,
        payload: String,
    },

    /// A bill's configured frequency is not in the known set.
    UnknownFrequency { name: String },

    /// A bill resolved to zero responsible parties.
    DivisionByZero { label: String },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyChain { position } => {
                write!(f, "no blocks found for position {}", position)
            }
            Self::NonNumericPayload {
                position,
                sequence_index,
                payload,
            } => {
                write!(
                    f,
                    "non-numeric payload {:?} in value block {} of position {}",
                    payload, sequence_index, position
                )
            }
            Self::UnknownFrequency { name } => {
                write!(f, "unknown billing frequency {:?}", name)
            }
            Self::DivisionByZero { label } => {
                write!(f, "bill {:?} has zero responsible parties", label)
            }
        }
    }
}

impl std::error::Error for LedgerError {}

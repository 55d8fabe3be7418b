//! Transaction classification status.

use std::fmt;

/// Consensus classification of a transaction.
///
/// `Undefined` is the initial sentinel; it is never a terminal outcome.
/// Every `TxState` holds `Valid` or `Invalid` from construction onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TxStatus {
    /// Initial sentinel, never a terminal outcome.
    #[default]
    Undefined,
    /// The transaction failed verification or lost the vote.
    Invalid,
    /// The transaction verified and won the vote.
    Valid,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxStatus::Undefined => "undefined",
            TxStatus::Invalid => "invalid",
            TxStatus::Valid => "valid",
        };
        f.write_str(s)
    }
}

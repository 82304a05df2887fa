//! Error types for the allocation and scanning pipelines.

use thiserror::Error;

/// Errors that can occur while allocating tasks or scanning blocks.
///
/// Running out of combinations is not represented here; the allocator
/// reports it through [`crate::types::Allocation::Exhausted`].
#[derive(Debug, Error)]
pub enum SweepError {
    /// The requested block range is malformed or beyond the chain head.
    #[error("Invalid block range [{from}, {to}]: {reason}")]
    InvalidRange { from: u64, to: u64, reason: String },

    /// The word list could not be loaded or is unusable.
    #[error("Vocabulary error: {0}")]
    Vocabulary(String),

    /// A configuration value is missing or out of bounds.
    #[error("Config error: {0}")]
    Config(String),

    /// A chain-node call failed.
    #[error("RPC error from {endpoint}: {message}")]
    Rpc { endpoint: String, message: String },

    /// The endpoint pool has no clients to choose from.
    #[error("No RPC endpoints configured")]
    NoEndpoints,

    /// The persistence adapter failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Fetching a block failed after all retries.
    #[error("Failed to fetch block {block}: {source}")]
    BlockFetch {
        block: u64,
        #[source]
        source: Box<SweepError>,
    },

    /// Looking up a balance failed after all retries.
    #[error("Failed to look up balance of {address}: {source}")]
    BalanceLookup {
        address: String,
        #[source]
        source: Box<SweepError>,
    },

    /// Shutdown was requested while work was in flight.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl SweepError {
    /// Returns `true` for errors raised before any I/O was attempted.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidRange { .. } | Self::Vocabulary(_) | Self::Config(_)
        )
    }

    /// Returns `true` if this error (or the error it wraps) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::BlockFetch { source, .. } | Self::BalanceLookup { source, .. } => {
                source.is_cancelled()
            }
            _ => false,
        }
    }

    pub(crate) fn invalid_range(from: u64, to: u64, reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            from,
            to,
            reason: reason.into(),
        }
    }
}

//! Error types for helmsman

use thiserror::Error;

/// Result type for leadership and reconciliation operations
pub type LeaderResult<T> = Result<T, LeaderError>;

/// Main error type for helmsman operations
#[derive(Error, Debug)]
pub enum LeaderError {
    /// Errors reported by the consensus engine
    #[error("Consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    /// Invalid configuration values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by a consensus engine.
///
/// `KnownPeer` and `UnknownPeer` are the idempotency signals for peer-set
/// mutations; callers treat them as successful no-ops.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// The address is already a voting peer
    #[error("peer is already known")]
    KnownPeer,

    /// The address is not a voting peer
    #[error("peer is unknown")]
    UnknownPeer,

    /// This node is not the leader
    #[error("node is not the leader")]
    NotLeader,

    /// The engine is shutting down
    #[error("consensus engine is shutdown")]
    Shutdown,

    /// The operation did not complete in time
    #[error("timed out enqueuing operation")]
    Timeout,

    /// The barrier could not be applied
    #[error("barrier failed: {0}")]
    Barrier(String),

    /// The engine rejected the request for another reason
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ConsensusError {
    /// Whether this error only signals that the requested peer-set change
    /// is already in effect.
    pub fn is_idempotent(&self) -> bool {
        matches!(self, ConsensusError::KnownPeer | ConsensusError::UnknownPeer)
    }
}

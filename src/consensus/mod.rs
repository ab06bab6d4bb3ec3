//! Consensus engine collaborator
//!
//! The leader components only need three operations from the replicated
//! log: a consistency barrier and voting-peer add/remove. Leadership
//! notifications are delivered separately as an `mpsc::Receiver<bool>`.

pub mod memory;

pub use memory::{InMemoryConsensus, PeerCall};

use std::net::SocketAddr;
use async_trait::async_trait;

use crate::error::ConsensusError;

/// Operations consumed from the consensus engine
#[async_trait]
pub trait ConsensusEngine: Send + Sync {
    /// Wait until every previously committed entry is applied locally
    async fn barrier(&self) -> Result<(), ConsensusError>;

    /// Add a voting peer. Fails with `ConsensusError::KnownPeer` if the
    /// address is already a peer.
    async fn add_peer(&self, addr: SocketAddr) -> Result<(), ConsensusError>;

    /// Remove a voting peer. Fails with `ConsensusError::UnknownPeer` if
    /// the address is not a peer.
    async fn remove_peer(&self, addr: SocketAddr) -> Result<(), ConsensusError>;
}

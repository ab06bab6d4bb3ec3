//! Voting-peer set mutations
//!
//! All changes to the consensus peer set made by the leader go through
//! [`PeerSetManager`]. Idempotency errors from the engine are absorbed, and
//! bootstrap-mode servers are only admitted when no other bootstrap server
//! is visible in gossip.

use super::LeaderContext;
use crate::error::LeaderResult;
use crate::types::{Member, ServerIdentity};

/// Result of a peer-set mutation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerChange {
    /// The address became a voting peer
    Added,
    /// The address already was a voting peer
    AlreadyPeer,
    /// The add was refused because another bootstrap server is present
    BootstrapConflict {
        /// Name of the other bootstrap-mode server
        conflicting: String,
    },
    /// The address stopped being a voting peer
    Removed,
    /// The address was not a voting peer
    NotPeer,
}

/// Mutates the consensus engine's voting-peer set
#[derive(Debug, Clone)]
pub struct PeerSetManager {
    ctx: LeaderContext,
}

impl PeerSetManager {
    pub fn new(ctx: LeaderContext) -> Self {
        Self { ctx }
    }

    /// Find another bootstrap-mode server in the current gossip snapshot.
    ///
    /// Only meaningful when `candidate` itself is in bootstrap mode.
    pub fn bootstrap_conflict(&self, candidate: &Member) -> Option<Member> {
        self.ctx.membership.members().into_iter().find(|member| {
            member.name != candidate.name
                && ServerIdentity::from_member(member).is_some_and(|p| p.bootstrap)
        })
    }

    /// Add a server as a voting peer
    pub async fn add(&self, member: &Member, identity: &ServerIdentity) -> LeaderResult<PeerChange> {
        if identity.bootstrap {
            if let Some(other) = self.bootstrap_conflict(member) {
                tracing::error!(
                    member = %member.name,
                    other = %other.name,
                    "'{}' and '{}' are both in bootstrap mode. Only one node should be in bootstrap mode, not adding peer.",
                    member.name,
                    other.name,
                );
                self.ctx.metrics.incr_bootstrap_conflicts();
                return Ok(PeerChange::BootstrapConflict { conflicting: other.name });
            }
        }

        match self.ctx.consensus.add_peer(identity.addr).await {
            Ok(()) => {
                tracing::info!(peer = %identity, "added consensus peer");
                self.ctx.metrics.incr_peers_added();
                Ok(PeerChange::Added)
            }
            Err(e) if e.is_idempotent() => Ok(PeerChange::AlreadyPeer),
            Err(e) => {
                tracing::error!(peer = %identity, error = %e, "failed to add consensus peer");
                Err(e.into())
            }
        }
    }

    /// Remove a server from the voting peers
    pub async fn remove(&self, member: &Member, identity: &ServerIdentity) -> LeaderResult<PeerChange> {
        match self.ctx.consensus.remove_peer(identity.addr).await {
            Ok(()) => {
                tracing::info!(member = %member.name, addr = %identity.addr, "removed server as peer");
                self.ctx.metrics.incr_peers_removed();
                Ok(PeerChange::Removed)
            }
            Err(e) if e.is_idempotent() => Ok(PeerChange::NotPeer),
            Err(e) => {
                tracing::error!(peer = %identity, error = %e, "failed to remove consensus peer");
                Err(e.into())
            }
        }
    }
}

//! Gossip membership to consensus peer reconciliation

use super::{LeaderContext, PeerChange, PeerSetManager};
use crate::error::LeaderResult;
use crate::metrics;
use crate::types::{Member, MemberStatus, ServerIdentity};

/// What reconciling one member did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Not an orchestrator server of the local region
    Ignored,
    /// The member is this server
    LocalNode,
    /// The member's status does not call for a peer change
    Unchanged(MemberStatus),
    /// An add was requested
    Add(PeerChange),
    /// A removal was requested
    Remove(PeerChange),
}

/// Decides and applies the peer action for gossip members
#[derive(Debug, Clone)]
pub struct MembershipReconciler {
    ctx: LeaderContext,
    peers: PeerSetManager,
}

impl MembershipReconciler {
    pub fn new(ctx: LeaderContext) -> Self {
        let peers = PeerSetManager::new(ctx.clone());
        Self { ctx, peers }
    }

    /// Reconcile every member of the current gossip snapshot.
    ///
    /// Stops at the first member that fails; the remaining members are
    /// picked up by the next pass or by their own events.
    pub async fn reconcile(&self) -> LeaderResult<()> {
        let _timer = self.ctx.metrics.measure(metrics::RECONCILE);
        for member in self.ctx.membership.members() {
            self.reconcile_member(&member).await?;
        }
        Ok(())
    }

    /// Reconcile a single gossip member
    pub async fn reconcile_member(&self, member: &Member) -> LeaderResult<ReconcileOutcome> {
        let identity = match ServerIdentity::from_member(member) {
            Some(identity) if identity.region == self.ctx.config.region => identity,
            _ => return Ok(ReconcileOutcome::Ignored),
        };
        let _timer = self.ctx.metrics.measure(metrics::RECONCILE_MEMBER);

        if self.ctx.is_local(member) {
            return Ok(ReconcileOutcome::LocalNode);
        }

        let result = match member.status {
            MemberStatus::Alive => self.peers.add(member, &identity).await.map(ReconcileOutcome::Add),
            status if status.is_departed() => {
                self.peers.remove(member, &identity).await.map(ReconcileOutcome::Remove)
            }
            status => Ok(ReconcileOutcome::Unchanged(status)),
        };

        if let Err(e) = &result {
            tracing::error!(
                member = %member.name,
                addr = %member.addr,
                status = %member.status,
                error = %e,
                "failed to reconcile member",
            );
        }
        result
    }
}

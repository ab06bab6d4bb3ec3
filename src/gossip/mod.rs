//! Gossip membership collaborator
//!
//! The leader reads full snapshots through [`MembershipView`] and receives
//! single-member changes on the reconcile channel fed by
//! [`ReconcileQueue`].

pub mod memory;

pub use memory::StaticMembership;

use std::fmt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::types::Member;

/// Read-only access to the gossip membership
pub trait MembershipView: Send + Sync {
    /// Current full membership, in gossip order
    fn members(&self) -> Vec<Member>;
}

/// Kind of membership change reported by the gossip layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberEventKind {
    Join,
    Leave,
    Failed,
    Update,
    Reap,
}

impl fmt::Display for MemberEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemberEventKind::Join => "member-join",
            MemberEventKind::Leave => "member-leave",
            MemberEventKind::Failed => "member-failed",
            MemberEventKind::Update => "member-update",
            MemberEventKind::Reap => "member-reap",
        };
        f.write_str(s)
    }
}

/// A batch of members affected by one gossip event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEvent {
    pub kind: MemberEventKind,
    pub members: Vec<Member>,
}

impl MemberEvent {
    pub fn new(kind: MemberEventKind, members: Vec<Member>) -> Self {
        Self { kind, members }
    }
}

/// Feeds gossip member events to the leader's reconcile channel.
///
/// Events are only forwarded while this server is the leader, and never
/// block the gossip layer: when the channel is full the member is dropped
/// and left to the next periodic full reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcileQueue {
    tx: mpsc::Sender<Member>,
}

impl ReconcileQueue {
    /// Create a queue and the receiving end consumed by the leader loop
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Member>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Offer every member of `event` to the leader. Returns how many were
    /// queued.
    pub fn offer(&self, event: &MemberEvent, is_leader: bool) -> usize {
        if !is_leader {
            return 0;
        }

        let mut queued = 0;
        for member in &event.members {
            match self.tx.try_send(member.clone()) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(m)) => {
                    tracing::debug!(member = %m.name, event = %event.kind, "reconcile queue full, dropping member");
                }
                Err(TrySendError::Closed(_)) => break,
            }
        }
        queued
    }
}

//! Leadership management and membership reconciliation
//!
//! The [`LeadershipMonitor`] runs for the lifetime of the server and starts
//! one [`LeaderLoop`] per leadership term. The loop keeps the consensus
//! peer set aligned with gossip membership through the
//! [`MembershipReconciler`], which mutates peers via the
//! [`PeerSetManager`].

pub mod peers;
pub mod reconcile;
pub mod leader_loop;
pub mod monitor;

pub use peers::{PeerChange, PeerSetManager};
pub use reconcile::{MembershipReconciler, ReconcileOutcome};
pub use leader_loop::{LeaderLoop, LoopState};
pub use monitor::{LeadershipMonitor, LeadershipTerm};

use std::fmt;
use std::sync::Arc;

use crate::config::LeaderConfig;
use crate::consensus::ConsensusEngine;
use crate::gossip::MembershipView;
use crate::metrics::LeaderMetrics;
use crate::types::Member;

/// Server state shared by the leadership components
#[derive(Clone)]
pub struct LeaderContext {
    /// Local server configuration
    pub config: Arc<LeaderConfig>,
    /// Consensus engine owning the peer set
    pub consensus: Arc<dyn ConsensusEngine>,
    /// Gossip membership snapshot source
    pub membership: Arc<dyn MembershipView>,
    /// Timing and counter sink
    pub metrics: Arc<LeaderMetrics>,
}

impl LeaderContext {
    pub fn new(
        config: LeaderConfig,
        consensus: Arc<dyn ConsensusEngine>,
        membership: Arc<dyn MembershipView>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            consensus,
            membership,
            metrics: Arc::new(LeaderMetrics::new()),
        }
    }

    /// Whether `member` is this server
    pub fn is_local(&self, member: &Member) -> bool {
        member.name == self.config.local_member_name()
    }
}

impl fmt::Debug for LeaderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaderContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

//! # helmsman
//!
//! Leadership management and cluster reconciliation for orchestrator
//! servers. While a server is the elected leader of its consensus group it
//! keeps the consensus voting-peer set aligned with the gossip membership
//! view: servers that join gossip are added as peers, servers that leave or
//! are reaped are removed, and two bootstrap-mode servers are never both
//! admitted.
//!
//! ```text
//! LeadershipMonitor ──(per term)──> LeaderLoop ──> MembershipReconciler ──> PeerSetManager
//!        ^                              ^                   ^                     │
//!   leadership bool             member events        gossip snapshot        consensus engine
//! ```
//!
//! The consensus engine and the gossip layer are external collaborators,
//! consumed through [`ConsensusEngine`] and [`MembershipView`].

#![warn(clippy::all)]

pub mod types;
pub mod error;
pub mod config;
pub mod metrics;
pub mod consensus;
pub mod gossip;
pub mod leader;
/// Command-line interface and argument parsing
pub mod cli;
/// Command execution
pub mod commands;

// Re-export main types
pub use types::{Member, MemberStatus, ServerIdentity};
pub use error::{ConsensusError, LeaderError, LeaderResult};
pub use config::LeaderConfig;
pub use metrics::{LeaderMetrics, MetricsSnapshot};
pub use consensus::{ConsensusEngine, InMemoryConsensus};
pub use gossip::{MemberEvent, MemberEventKind, MembershipView, ReconcileQueue, StaticMembership};
pub use leader::{
    LeaderContext, LeaderLoop, LeadershipMonitor, LeadershipTerm, MembershipReconciler, PeerChange,
    PeerSetManager, ReconcileOutcome,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

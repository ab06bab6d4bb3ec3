//! In-memory consensus engine
//!
//! Holds a peer set and a call log, and lets callers inject barrier and
//! peer-mutation failures. Leadership changes are pushed through the
//! notification channel handed out by `new`.

use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::ConsensusEngine;
use crate::error::ConsensusError;

/// A call observed by the in-memory engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerCall {
    Barrier,
    Add(SocketAddr),
    Remove(SocketAddr),
}

#[derive(Debug, Default)]
struct EngineState {
    peers: BTreeSet<SocketAddr>,
    calls: Vec<PeerCall>,
    barrier_failures: u32,
    barrier_delay: Duration,
    peer_failures: HashMap<SocketAddr, ConsensusError>,
}

/// Consensus engine backed by a local peer set
#[derive(Debug)]
pub struct InMemoryConsensus {
    state: Mutex<EngineState>,
    leader_tx: mpsc::Sender<bool>,
}

impl InMemoryConsensus {
    /// Create an engine with the given initial peers. The receiver yields
    /// the leadership notifications sent through `set_leader`.
    pub fn new(peers: impl IntoIterator<Item = SocketAddr>) -> (Self, mpsc::Receiver<bool>) {
        let (leader_tx, leader_rx) = mpsc::channel(16);
        let engine = Self {
            state: Mutex::new(EngineState {
                peers: peers.into_iter().collect(),
                ..EngineState::default()
            }),
            leader_tx,
        };
        (engine, leader_rx)
    }

    /// Publish a leadership change
    pub async fn set_leader(&self, is_leader: bool) -> Result<(), ConsensusError> {
        self.leader_tx
            .send(is_leader)
            .await
            .map_err(|_| ConsensusError::Shutdown)
    }

    /// Current voting peers
    pub fn peers(&self) -> BTreeSet<SocketAddr> {
        self.state.lock().peers.clone()
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<PeerCall> {
        self.state.lock().calls.clone()
    }

    /// Calls that attempted a peer-set mutation
    pub fn mutations(&self) -> Vec<PeerCall> {
        self.state
            .lock()
            .calls
            .iter()
            .copied()
            .filter(|c| !matches!(c, PeerCall::Barrier))
            .collect()
    }

    /// Make the next `n` barriers fail
    pub fn fail_barriers(&self, n: u32) {
        self.state.lock().barrier_failures = n;
    }

    /// Make every barrier take `delay` before completing
    pub fn delay_barriers(&self, delay: Duration) {
        self.state.lock().barrier_delay = delay;
    }

    /// Make every add/remove of `addr` fail with `err` until cleared
    pub fn fail_peer(&self, addr: SocketAddr, err: ConsensusError) {
        self.state.lock().peer_failures.insert(addr, err);
    }

    pub fn clear_peer_failure(&self, addr: SocketAddr) {
        self.state.lock().peer_failures.remove(&addr);
    }
}

#[async_trait]
impl ConsensusEngine for InMemoryConsensus {
    async fn barrier(&self) -> Result<(), ConsensusError> {
        let delay = self.state.lock().barrier_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        state.calls.push(PeerCall::Barrier);
        if state.barrier_failures > 0 {
            state.barrier_failures -= 1;
            return Err(ConsensusError::Barrier("injected barrier failure".to_string()));
        }
        Ok(())
    }

    async fn add_peer(&self, addr: SocketAddr) -> Result<(), ConsensusError> {
        let mut state = self.state.lock();
        state.calls.push(PeerCall::Add(addr));
        if let Some(err) = state.peer_failures.get(&addr) {
            return Err(err.clone());
        }
        if !state.peers.insert(addr) {
            return Err(ConsensusError::KnownPeer);
        }
        Ok(())
    }

    async fn remove_peer(&self, addr: SocketAddr) -> Result<(), ConsensusError> {
        let mut state = self.state.lock();
        state.calls.push(PeerCall::Remove(addr));
        if let Some(err) = state.peer_failures.get(&addr) {
            return Err(err.clone());
        }
        if !state.peers.remove(&addr) {
            return Err(ConsensusError::UnknownPeer);
        }
        Ok(())
    }
}

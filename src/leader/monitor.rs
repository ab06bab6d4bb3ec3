//! Leadership monitor
//!
//! Turns the consensus engine's leadership notifications into exactly one
//! running [`LeaderLoop`] per leadership term.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{LeaderContext, LeaderLoop};
use crate::types::Member;

/// A leadership term and the token that ends it
#[derive(Debug, Clone)]
pub struct LeadershipTerm {
    /// Local sequence number of the term, starting at 1
    pub number: u64,
    /// Cancelled when leadership is lost
    pub stop: CancellationToken,
}

impl LeadershipTerm {
    pub fn new(number: u64) -> Self {
        Self {
            number,
            stop: CancellationToken::new(),
        }
    }
}

struct ActiveTerm {
    term: LeadershipTerm,
    handle: JoinHandle<()>,
}

/// Starts and stops the leader loop as leadership changes
pub struct LeadershipMonitor {
    ctx: LeaderContext,
    events: Arc<Mutex<mpsc::Receiver<Member>>>,
    shutdown: CancellationToken,
}

impl LeadershipMonitor {
    /// `events` is the reconcile channel fed by the gossip layer; it is
    /// handed from one term's loop to the next.
    pub fn new(ctx: LeaderContext, events: mpsc::Receiver<Member>, shutdown: CancellationToken) -> Self {
        Self {
            ctx,
            events: Arc::new(Mutex::new(events)),
            shutdown,
        }
    }

    /// Run the monitor on its own task
    pub fn spawn(self, leader_rx: mpsc::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(leader_rx))
    }

    /// Process leadership notifications until shutdown.
    ///
    /// Shutdown returns immediately; a running leader loop observes the
    /// same shutdown token on its own.
    pub async fn run(self, mut leader_rx: mpsc::Receiver<bool>) {
        let mut active: Option<ActiveTerm> = None;
        let mut draining: Option<JoinHandle<()>> = None;
        let mut next_term = 1u64;

        loop {
            let is_leader = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return,
                notification = leader_rx.recv() => match notification {
                    Some(is_leader) => is_leader,
                    None => {
                        tracing::debug!("leadership notification channel closed");
                        return;
                    }
                },
            };

            if is_leader {
                if let Some(stale) = active.take() {
                    tracing::warn!(term = stale.term.number, "leadership re-acquired without loss, restarting leader loop");
                    stale.term.stop.cancel();
                    draining = Some(stale.handle);
                }

                // The previous loop must have exited before a new term starts.
                if let Some(handle) = draining.take() {
                    tokio::select! {
                        biased;
                        () = self.shutdown.cancelled() => return,
                        result = handle => {
                            if let Err(e) = result {
                                tracing::error!(error = %e, "leader loop terminated abnormally");
                            }
                        }
                    }
                }

                let term = LeadershipTerm::new(next_term);
                next_term += 1;
                let leader = LeaderLoop::new(
                    self.ctx.clone(),
                    term.clone(),
                    self.shutdown.clone(),
                    self.events.clone(),
                );
                let handle = tokio::spawn(leader.run());
                self.ctx.metrics.incr_terms_started();
                tracing::info!(term = term.number, "cluster leadership acquired");
                active = Some(ActiveTerm { term, handle });
            } else if let Some(current) = active.take() {
                current.term.stop.cancel();
                draining = Some(current.handle);
                tracing::info!(term = current.term.number, "cluster leadership lost");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::config::LeaderConfig;
    use crate::consensus::{InMemoryConsensus, PeerCall};
    use crate::gossip::StaticMembership;

    fn setup() -> (LeadershipMonitor, Arc<InMemoryConsensus>, mpsc::Receiver<bool>, CancellationToken) {
        let (engine, leader_rx) = InMemoryConsensus::new([]);
        let engine = Arc::new(engine);
        let ctx = LeaderContext::new(
            LeaderConfig::new("n0", "r1"),
            engine.clone(),
            Arc::new(StaticMembership::default()),
        );
        let (_events_tx, events_rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let monitor = LeadershipMonitor::new(ctx, events_rx, shutdown.clone());
        (monitor, engine, leader_rx, shutdown)
    }

    #[tokio::test(start_paused = true)]
    async fn test_loss_without_leadership_is_noop() {
        let (monitor, engine, leader_rx, shutdown) = setup();
        let metrics = monitor.ctx.metrics.clone();
        let handle = monitor.spawn(leader_rx);

        engine.set_leader(false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(metrics.snapshot().terms_started, 0);
        assert!(engine.calls().is_empty());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_loop_per_term() {
        let (monitor, engine, leader_rx, shutdown) = setup();
        let metrics = monitor.ctx.metrics.clone();
        let handle = monitor.spawn(leader_rx);

        engine.set_leader(true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(metrics.active_loops(), 1);
        assert_eq!(engine.calls(), vec![PeerCall::Barrier]);

        engine.set_leader(false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(metrics.active_loops(), 0);

        engine.set_leader(true).await.unwrap();
        engine.set_leader(true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(metrics.active_loops(), 1);
        assert_eq!(metrics.max_active_loops(), 1);
        assert_eq!(metrics.snapshot().terms_started, 3);

        shutdown.cancel();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(metrics.active_loops(), 0);
    }
}

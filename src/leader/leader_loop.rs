//! Per-term leader loop
//!
//! The loop alternates between two states. `Reconcile` arms the next
//! interval deadline, applies a consensus barrier and runs a full
//! reconciliation pass. `Wait` sleeps until the deadline, reconciling
//! membership events one at a time in the meantime, but only when the
//! barrier and the full pass of the current cycle both succeeded.
//!
//! Term cancellation and process shutdown are checked first at every wait
//! point; an in-flight consensus call is allowed to finish.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use super::{LeaderContext, LeadershipTerm, MembershipReconciler};
use crate::metrics;
use crate::types::Member;

/// Leader loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Barrier plus full reconciliation
    Reconcile,
    /// Waiting for the next deadline, cancellation or membership event
    Wait {
        /// When the next `Reconcile` starts
        deadline: Instant,
        /// Whether membership events are processed while waiting
        incremental: bool,
    },
}

/// Keeps the consensus peer set aligned with gossip for one term
pub struct LeaderLoop {
    ctx: LeaderContext,
    reconciler: MembershipReconciler,
    term: LeadershipTerm,
    shutdown: CancellationToken,
    events: Arc<Mutex<mpsc::Receiver<Member>>>,
}

impl LeaderLoop {
    pub fn new(
        ctx: LeaderContext,
        term: LeadershipTerm,
        shutdown: CancellationToken,
        events: Arc<Mutex<mpsc::Receiver<Member>>>,
    ) -> Self {
        let reconciler = MembershipReconciler::new(ctx.clone());
        Self {
            ctx,
            reconciler,
            term,
            shutdown,
            events,
        }
    }

    /// Run until the term is cancelled or the server shuts down
    pub async fn run(self) {
        let _active = self.ctx.metrics.loop_started();

        // The event receiver outlives terms; a previous term's loop may
        // still hold it while finishing an in-flight call.
        let mut events = tokio::select! {
            biased;
            () = self.term.stop.cancelled() => return,
            () = self.shutdown.cancelled() => return,
            guard = self.events.clone().lock_owned() => guard,
        };

        let mut state = LoopState::Reconcile;
        loop {
            state = match state {
                LoopState::Reconcile => self.reconcile_cycle().await,
                LoopState::Wait { deadline, incremental } => {
                    match self.wait(&mut events, deadline, incremental).await {
                        Some(next) => next,
                        None => break,
                    }
                }
            };
        }

        tracing::debug!(term = self.term.number, "leader loop stopped");
    }

    async fn reconcile_cycle(&self) -> LoopState {
        let deadline = Instant::now() + self.ctx.config.reconcile_interval;

        let start = std::time::Instant::now();
        if let Err(e) = self.ctx.consensus.barrier().await {
            tracing::error!(term = self.term.number, error = %e, "failed to wait for barrier");
            self.ctx.metrics.incr_barrier_failures();
            return LoopState::Wait { deadline, incremental: false };
        }
        self.ctx.metrics.measure_since(metrics::BARRIER, start);

        if let Err(e) = self.reconciler.reconcile().await {
            tracing::error!(term = self.term.number, error = %e, "failed to reconcile");
            self.ctx.metrics.incr_reconcile_failures();
            return LoopState::Wait { deadline, incremental: false };
        }

        // An overrunning pass would leave no window for membership events.
        let now = Instant::now();
        let deadline = if deadline <= now {
            tracing::warn!(
                term = self.term.number,
                interval = ?self.ctx.config.reconcile_interval,
                "reconciliation overran the interval, postponing the next pass"
            );
            now + self.ctx.config.reconcile_interval
        } else {
            deadline
        };

        LoopState::Wait { deadline, incremental: true }
    }

    /// Wait for the next trigger. Returns `None` once the loop must stop.
    async fn wait(
        &self,
        events: &mut OwnedMutexGuard<mpsc::Receiver<Member>>,
        deadline: Instant,
        incremental: bool,
    ) -> Option<LoopState> {
        tokio::select! {
            biased;
            () = self.term.stop.cancelled() => None,
            () = self.shutdown.cancelled() => None,
            () = sleep_until(deadline) => Some(LoopState::Reconcile),
            Some(member) = events.recv(), if incremental => {
                if self.reconciler.reconcile_member(&member).await.is_err() {
                    self.ctx.metrics.incr_reconcile_failures();
                }
                Some(LoopState::Wait { deadline, incremental })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;
    use crate::config::LeaderConfig;
    use crate::consensus::{InMemoryConsensus, PeerCall};
    use crate::error::ConsensusError;
    use crate::gossip::StaticMembership;
    use crate::types::{tags, MemberStatus, SERVER_ROLE};

    fn server(name: &str, last_octet: u8, status: MemberStatus) -> Member {
        Member::new(name, SocketAddr::from(([10, 0, 0, last_octet], 4648)), status)
            .with_tag(tags::ROLE, SERVER_ROLE)
            .with_tag(tags::REGION, "r1")
            .with_tag(tags::DATACENTER, "dc1")
            .with_tag(tags::PORT, "4647")
            .with_tag(tags::VERSION, "1")
    }

    fn rpc_addr(last_octet: u8) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, last_octet], 4647))
    }

    struct Harness {
        engine: Arc<InMemoryConsensus>,
        ctx: LeaderContext,
        events_tx: mpsc::Sender<Member>,
        events: Arc<Mutex<mpsc::Receiver<Member>>>,
    }

    fn harness(members: Vec<Member>) -> Harness {
        let (engine, _rx) = InMemoryConsensus::new([]);
        let engine = Arc::new(engine);
        let config = LeaderConfig::new("n0", "r1").with_reconcile_interval(Duration::from_secs(60));
        let ctx = LeaderContext::new(config, engine.clone(), Arc::new(StaticMembership::new(members)));
        let (events_tx, events_rx) = mpsc::channel(16);
        Harness {
            engine,
            ctx,
            events_tx,
            events: Arc::new(Mutex::new(events_rx)),
        }
    }

    fn spawn_loop(h: &Harness, number: u64) -> (CancellationToken, tokio::task::JoinHandle<()>) {
        let term = LeadershipTerm::new(number);
        let stop = term.stop.clone();
        let leader = LeaderLoop::new(h.ctx.clone(), term, CancellationToken::new(), h.events.clone());
        (stop, tokio::spawn(leader.run()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_reconcile_then_events() {
        let h = harness(vec![server("n1.r1", 1, MemberStatus::Alive)]);
        let (stop, handle) = spawn_loop(&h, 1);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.engine.calls(), vec![PeerCall::Barrier, PeerCall::Add(rpc_addr(1))]);

        h.events_tx.send(server("n2.r1", 2, MemberStatus::Alive)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.engine.peers().contains(&rpc_addr(2)));

        stop.cancel();
        handle.await.unwrap();
        assert_eq!(h.ctx.metrics.active_loops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_barrier_failure_disables_events_until_next_tick() {
        let h = harness(vec![server("n1.r1", 1, MemberStatus::Alive)]);
        h.engine.fail_barriers(1);
        let (stop, handle) = spawn_loop(&h, 1);

        h.events_tx.send(server("n2.r1", 2, MemberStatus::Alive)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.engine.calls(), vec![PeerCall::Barrier]);
        assert!(h.engine.mutations().is_empty());

        // The next interval reconciles and then drains the queued event.
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(
            h.engine.calls(),
            vec![
                PeerCall::Barrier,
                PeerCall::Barrier,
                PeerCall::Add(rpc_addr(1)),
                PeerCall::Add(rpc_addr(2)),
            ]
        );
        assert_eq!(h.ctx.metrics.snapshot().barrier_failures, 1);

        stop.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_event_is_counted_and_loop_continues() {
        let h = harness(vec![]);
        h.engine.fail_peer(rpc_addr(1), ConsensusError::Timeout);
        let (stop, handle) = spawn_loop(&h, 1);
        tokio::time::sleep(Duration::from_millis(10)).await;

        h.events_tx.send(server("n1.r1", 1, MemberStatus::Alive)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.ctx.metrics.snapshot().reconcile_failures, 1);

        h.events_tx.send(server("n2.r1", 2, MemberStatus::Alive)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.engine.peers().contains(&rpc_addr(2)));

        stop.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_pass_still_processes_events() {
        let h = harness(vec![server("n1.r1", 1, MemberStatus::Alive)]);
        // Longer than the 60s interval.
        h.engine.delay_barriers(Duration::from_secs(90));
        let (stop, handle) = spawn_loop(&h, 1);

        tokio::time::sleep(Duration::from_secs(91)).await;
        assert!(h.engine.peers().contains(&rpc_addr(1)));

        h.events_tx.send(server("n2.r1", 2, MemberStatus::Alive)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(h.engine.peers().contains(&rpc_addr(2)));
        assert_eq!(
            h.engine.calls().iter().filter(|c| **c == PeerCall::Barrier).count(),
            1
        );

        stop.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_wins_over_pending_event() {
        let h = harness(vec![]);
        let (stop, handle) = spawn_loop(&h, 1);
        tokio::time::sleep(Duration::from_millis(10)).await;

        stop.cancel();
        h.events_tx.send(server("n1.r1", 1, MemberStatus::Alive)).await.unwrap();
        handle.await.unwrap();

        assert_eq!(h.engine.calls(), vec![PeerCall::Barrier]);
        // The unprocessed event stays queued for the next term.
        assert_eq!(h.events.lock().await.try_recv().unwrap().name, "n1.r1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop() {
        let h = harness(vec![]);
        let shutdown = CancellationToken::new();
        let leader = LeaderLoop::new(h.ctx.clone(), LeadershipTerm::new(1), shutdown.clone(), h.events.clone());
        let handle = tokio::spawn(leader.run());

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(h.ctx.metrics.active_loops(), 0);
    }
}

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::cli::Commands;
use crate::config::LeaderConfig;
use crate::consensus::InMemoryConsensus;
use crate::gossip::{ReconcileQueue, StaticMembership};
use crate::leader::{LeaderContext, LeadershipMonitor};
use crate::metrics::MetricsSnapshot;
use crate::types::Member;

pub async fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::CheckConfig { config } => execute_check_config(&config),
        Commands::Simulate { config, members, settle_ms } => {
            let config = LeaderConfig::load(&config)
                .with_context(|| format!("failed to load {}", config.display()))?;
            let scenario = Scenario::load(&members)?;
            let report = simulate(config, scenario, Duration::from_millis(settle_ms)).await?;

            println!("peers:");
            for peer in &report.peers {
                println!("  {}", peer);
            }
            println!("{}", serde_json::to_string_pretty(&report.metrics)?);
            Ok(())
        }
    }
}

fn execute_check_config(path: &Path) -> Result<()> {
    let config = LeaderConfig::load(path).with_context(|| format!("invalid config {}", path.display()))?;
    println!(
        "{}: ok (member {}, reconcile every {:?})",
        path.display(),
        config.local_member_name(),
        config.reconcile_interval
    );
    Ok(())
}

/// Membership script for a simulated leadership term
#[derive(Debug, Default, Deserialize)]
pub struct Scenario {
    /// Gossip membership when leadership is acquired
    #[serde(default)]
    pub members: Vec<Member>,
    /// Member updates delivered one by one while leading
    #[serde(default)]
    pub events: Vec<Member>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// Outcome of a simulated leadership term
#[derive(Debug)]
pub struct SimulationReport {
    pub peers: BTreeSet<SocketAddr>,
    pub metrics: MetricsSnapshot,
}

/// Acquire leadership, replay the scenario's events, then step down
pub async fn simulate(config: LeaderConfig, scenario: Scenario, settle: Duration) -> Result<SimulationReport> {
    config.validate()?;

    let (engine, leader_rx) = InMemoryConsensus::new([]);
    let engine = Arc::new(engine);
    let membership = Arc::new(StaticMembership::new(scenario.members));
    let (queue, events_rx) = ReconcileQueue::new(config.event_buffer);

    let ctx = LeaderContext::new(config, engine.clone(), membership.clone());
    let metrics = ctx.metrics.clone();
    let shutdown = CancellationToken::new();
    let monitor = LeadershipMonitor::new(ctx, events_rx, shutdown.clone()).spawn(leader_rx);

    engine.set_leader(true).await?;
    tokio::time::sleep(settle).await;

    for member in scenario.events {
        let event = membership.upsert(member);
        queue.offer(&event, true);
        tokio::time::sleep(settle).await;
    }

    engine.set_leader(false).await?;
    tokio::time::sleep(settle).await;
    shutdown.cancel();
    monitor.await.context("leadership monitor panicked")?;

    Ok(SimulationReport {
        peers: engine.peers(),
        metrics: metrics.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCENARIO: &str = r#"
        [[members]]
        name = "n1.r1"
        addr = "10.0.0.1:4648"
        status = "alive"
        [members.tags]
        role = "helmsman"
        region = "r1"
        dc = "dc1"
        port = "4647"
        vsn = "1"

        [[events]]
        name = "n1.r1"
        addr = "10.0.0.1:4648"
        status = "left"
        [events.tags]
        role = "helmsman"
        region = "r1"
        dc = "dc1"
        port = "4647"
        vsn = "1"
    "#;

    #[test]
    fn test_scenario_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCENARIO.as_bytes()).unwrap();
        let scenario = Scenario::load(file.path()).unwrap();
        assert_eq!(scenario.members.len(), 1);
        assert_eq!(scenario.events.len(), 1);
        assert_eq!(scenario.members[0].server_identity().unwrap().region, "r1");
    }

    #[tokio::test]
    async fn test_simulate_join_then_leave() {
        let scenario: Scenario = toml::from_str(SCENARIO).unwrap();
        let report = simulate(LeaderConfig::new("n0", "r1"), scenario, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(report.peers.is_empty());
        assert_eq!(report.metrics.peers_added, 1);
        assert_eq!(report.metrics.peers_removed, 1);
        assert_eq!(report.metrics.terms_started, 1);
    }

    #[tokio::test]
    async fn test_demo_scenario() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");
        let config = LeaderConfig::load(dir.join("server.toml")).unwrap();
        let scenario = Scenario::load(&dir.join("members.toml")).unwrap();

        let report = simulate(config, scenario, Duration::from_millis(20)).await.unwrap();
        let peers: Vec<String> = report.peers.iter().map(|p| p.to_string()).collect();
        assert_eq!(peers, vec!["10.0.0.12:4647"]);
    }
}

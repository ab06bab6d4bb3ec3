//! Server configuration consumed by the leadership components

use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{LeaderError, LeaderResult};

fn default_region() -> String {
    "global".to_string()
}

fn default_datacenter() -> String {
    "dc1".to_string()
}

fn default_reconcile_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_event_buffer() -> usize {
    256
}

/// Leadership and reconciliation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderConfig {
    /// Local node name, without the region suffix
    pub node_name: String,

    /// Region this server belongs to
    #[serde(default = "default_region")]
    pub region: String,

    /// Datacenter this server runs in
    #[serde(default = "default_datacenter")]
    pub datacenter: String,

    /// Period of the full reconciliation pass
    #[serde(default = "default_reconcile_interval")]
    #[serde(with = "humantime_serde")]
    pub reconcile_interval: Duration,

    /// Capacity of the membership event channel feeding the leader loop
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            node_name: "server-1".to_string(),
            region: default_region(),
            datacenter: default_datacenter(),
            reconcile_interval: default_reconcile_interval(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl LeaderConfig {
    /// Create a configuration for the given node and region
    pub fn new(node_name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            region: region.into(),
            ..Self::default()
        }
    }

    pub fn with_reconcile_interval(mut self, interval: Duration) -> Self {
        self.reconcile_interval = interval;
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> LeaderResult<Self> {
        let config: LeaderConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> LeaderResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check value constraints that serde cannot express
    pub fn validate(&self) -> LeaderResult<()> {
        if self.node_name.is_empty() {
            return Err(LeaderError::Config("node_name must not be empty".to_string()));
        }
        if self.region.is_empty() {
            return Err(LeaderError::Config("region must not be empty".to_string()));
        }
        // The region is the suffix of every server's gossip name.
        if self.region.contains('.') {
            return Err(LeaderError::Config(format!(
                "region '{}' must not contain '.'",
                self.region
            )));
        }
        if self.reconcile_interval.is_zero() {
            return Err(LeaderError::Config("reconcile_interval must be non-zero".to_string()));
        }
        if self.event_buffer == 0 {
            return Err(LeaderError::Config("event_buffer must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Gossip name of the local server
    pub fn local_member_name(&self) -> String {
        format!("{}.{}", self.node_name, self.region)
    }
}

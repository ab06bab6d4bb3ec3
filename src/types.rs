//! Core types shared by the leadership and reconciliation components
//!
//! Gossip members are snapshots handed to us by the membership layer; the
//! server identity is a parsed view over a member's tags and is recomputed
//! every time it is needed.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use serde::{Deserialize, Serialize};

/// Tag keys published by orchestrator servers through gossip
pub mod tags {
    /// Role of the participant
    pub const ROLE: &str = "role";
    /// Region the server belongs to
    pub const REGION: &str = "region";
    /// Datacenter the server runs in
    pub const DATACENTER: &str = "dc";
    /// RPC port, combined with the member address
    pub const PORT: &str = "port";
    /// Present when the server may bootstrap a new consensus group
    pub const BOOTSTRAP: &str = "bootstrap";
    /// Expected number of servers when bootstrapping
    pub const EXPECT: &str = "expect";
    /// Server protocol version
    pub const VERSION: &str = "vsn";
    /// Consensus protocol version
    pub const RAFT_VERSION: &str = "raft_vsn";
    /// Build identifier
    pub const BUILD: &str = "build";
}

/// Value of the `role` tag carried by orchestrator servers
pub const SERVER_ROLE: &str = "helmsman";

/// Gossip status of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    /// No status known yet
    None,
    /// Member is reachable
    Alive,
    /// Member announced that it is leaving
    Leaving,
    /// Member left gracefully
    Left,
    /// Failure detector suspects the member
    Failed,
    /// Member was reaped after staying failed or left for too long
    Reaped,
}

impl MemberStatus {
    /// Whether the status is final enough to drop the member from the peer set
    pub fn is_departed(&self) -> bool {
        matches!(self, MemberStatus::Left | MemberStatus::Reaped)
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemberStatus::None => "none",
            MemberStatus::Alive => "alive",
            MemberStatus::Leaving => "leaving",
            MemberStatus::Left => "left",
            MemberStatus::Failed => "failed",
            MemberStatus::Reaped => "reaped",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a gossip participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Gossip name, `<node>.<region>` for servers
    pub name: String,
    /// Gossip address of the member
    pub addr: SocketAddr,
    /// Current gossip status
    pub status: MemberStatus,
    /// Opaque tags published by the member
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Member {
    pub fn new(name: impl Into<String>, addr: SocketAddr, status: MemberStatus) -> Self {
        Self {
            name: name.into(),
            addr,
            status,
            tags: BTreeMap::new(),
        }
    }

    /// Builder-style tag setter
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Same member with a different status
    pub fn with_status(mut self, status: MemberStatus) -> Self {
        self.status = status;
        self
    }

    /// Parse the server identity, if this member is an orchestrator server
    pub fn server_identity(&self) -> Option<ServerIdentity> {
        ServerIdentity::from_member(self)
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.addr, self.status)
    }
}

/// Parsed view of an orchestrator server's gossip tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIdentity {
    /// Gossip name of the server
    pub name: String,
    /// Region the server belongs to
    pub region: String,
    /// Datacenter the server runs in
    pub datacenter: String,
    /// RPC port
    pub port: u16,
    /// Whether the server is allowed to bootstrap a new group
    pub bootstrap: bool,
    /// Expected server count for bootstrap, zero when unset
    pub expect: u32,
    /// Server protocol version
    pub protocol_version: u8,
    /// Consensus protocol version
    pub raft_version: u8,
    /// Build identifier, empty when unset
    pub build: String,
    /// RPC address used as the consensus peer address
    pub addr: SocketAddr,
}

impl ServerIdentity {
    /// Parse a member's tags. Returns `None` when the member is not an
    /// orchestrator server or any mandatory tag is missing or malformed.
    pub fn from_member(member: &Member) -> Option<Self> {
        if member.tags.get(tags::ROLE).map(String::as_str) != Some(SERVER_ROLE) {
            return None;
        }

        let region = member.tags.get(tags::REGION)?.clone();
        let datacenter = member.tags.get(tags::DATACENTER)?.clone();
        let port: u16 = member.tags.get(tags::PORT)?.parse().ok()?;
        let protocol_version: u8 = member.tags.get(tags::VERSION)?.parse().ok()?;

        let raft_version = match member.tags.get(tags::RAFT_VERSION) {
            Some(v) => v.parse().ok()?,
            None => 1,
        };
        let expect = match member.tags.get(tags::EXPECT) {
            Some(v) => v.parse().ok()?,
            None => 0,
        };

        Some(Self {
            name: member.name.clone(),
            region,
            datacenter,
            port,
            bootstrap: member.tags.contains_key(tags::BOOTSTRAP),
            expect,
            protocol_version,
            raft_version,
            build: member.tags.get(tags::BUILD).cloned().unwrap_or_default(),
            addr: SocketAddr::new(member.addr.ip(), port),
        })
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Addr: {}) (DC: {})", self.name, self.addr, self.datacenter)
    }
}

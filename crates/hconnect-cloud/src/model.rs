//! Provider-side resources as seen by the synchronizers

use std::net::{Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

/// A compute node (server)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: u64,
    pub name: String,
    pub public_ipv4: Option<Ipv4Addr>,
    /// First address of the server's public IPv6 network
    pub public_ipv6: Option<Ipv6Addr>,
}

/// Something a firewall is applied to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FirewallResource {
    Server { id: u64 },
    LabelSelector { selector: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleDirection {
    In,
    Out,
}

impl std::fmt::Display for RuleDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleDirection::In => write!(f, "in"),
            RuleDirection::Out => write!(f, "out"),
        }
    }
}

/// A single firewall rule.
///
/// `source_ips` only matters for inbound rules, `destination_ips` only for
/// outbound ones; both are carried through unchanged otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub direction: RuleDirection,
    pub protocol: String,
    pub port: Option<String>,
    #[serde(default)]
    pub source_ips: Vec<IpNet>,
    #[serde(default)]
    pub destination_ips: Vec<IpNet>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firewall {
    pub id: u64,
    pub name: String,
    pub rules: Vec<FirewallRule>,
    pub applied_to: Vec<FirewallResource>,
}

impl Firewall {
    /// Whether the server is directly attached (label selectors do not count).
    pub fn has_server(&self, server_id: u64) -> bool {
        self.applied_to
            .iter()
            .any(|r| matches!(r, FirewallResource::Server { id } if *id == server_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerTarget {
    /// Set for `server` targets, `None` for label selector and IP targets
    pub server_id: Option<u64>,
    pub use_private_ip: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub id: u64,
    pub name: String,
    pub targets: Vec<LoadBalancerTarget>,
}

impl LoadBalancer {
    pub fn has_server_target(&self, server_id: u64) -> bool {
        self.targets.iter().any(|t| t.server_id == Some(server_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Running,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionError {
    pub code: String,
    pub message: String,
}

/// Handle to an asynchronous provider-side operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: u64,
    pub command: String,
    pub status: ActionStatus,
    pub progress: u8,
    pub error: Option<ActionError>,
}

impl Action {
    pub fn is_finished(&self) -> bool {
        self.status != ActionStatus::Running
    }
}

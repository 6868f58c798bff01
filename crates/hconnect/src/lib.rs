//! hcloud-connect
//!
//! Registers a node with a Hetzner Cloud load balancer and firewalls when it
//! starts, and removes it again when it receives a termination signal.
//!
//! - [`load_balancer::LoadBalancerSync`] adds the node as a server target.
//! - [`firewall::FirewallSync`] attaches the node to firewalls (resource mode)
//!   and/or writes its addresses into their rules (target mode).
//! - [`lifecycle::Lifecycle`] runs both around the shutdown signal.

pub mod cidr;
pub mod config;
pub mod error;
pub mod firewall;
pub mod lifecycle;
pub mod load_balancer;
pub mod signal;

#[cfg(test)]
pub mod testing;

pub use config::Config;
pub use error::{ConnectError, Result, TeardownFailure, TeardownReport};
pub use firewall::{FirewallSettings, FirewallSync};
pub use lifecycle::{Lifecycle, Phase};
pub use load_balancer::LoadBalancerSync;

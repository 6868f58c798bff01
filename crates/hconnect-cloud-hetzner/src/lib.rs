//! Hetzner Cloud client for hcloud-connect
//!
//! This crate implements the `CloudApi` trait against the Hetzner Cloud REST
//! API, covering servers, firewalls, load balancers and actions.
//!
//! # Requirements
//!
//! - An API token with read/write access (exactly 64 characters)
//!
//! # Example
//!
//! ```ignore
//! use hconnect_cloud::{CloudApi, CancellationToken, wait_for_actions};
//! use hconnect_cloud_hetzner::{HetznerClient, HetznerConfig};
//!
//! let client = HetznerClient::new(HetznerConfig::new(token)?)?;
//! client.check_connection().await?;
//!
//! let actions = client.apply_firewall_to_server(38, 42).await?;
//! wait_for_actions(&client, &actions, &CancellationToken::new()).await?;
//! ```

pub mod client;
pub mod error;
pub mod provider;
mod schema;

#[cfg(test)]
mod stub;

pub use client::{DEFAULT_ENDPOINT, HetznerClient, HetznerConfig};
pub use error::{HetznerError, Result};

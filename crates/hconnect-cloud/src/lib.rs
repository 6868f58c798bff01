//! hcloud-connect cloud abstraction
//!
//! This crate defines what the node synchronizers need from a cloud provider,
//! independent of how the provider is reached.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 hcloud-connect                   │
//! │      (register on start, deregister on stop)     │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                hconnect-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          trait CloudApi { ... }           │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────────────┐     │
//! │  │ retry_on_    │  │  wait_for_action     │     │
//! │  │ contention   │  │  (push, cancellable) │     │
//! │  └──────────────┘  └──────────────────────┘     │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼──────────────┐
//! │ hconnect-cloud-      │
//! │ hetzner (reqwest)    │
//! └──────────────────────┘
//! ```

pub mod action;
pub mod error;
pub mod model;
pub mod provider;
pub mod retry;

// Re-exports
pub use action::{action_outcome, wait_for_action, wait_for_actions};
pub use error::{CloudError, ErrorCode, Result};
pub use model::{
    Action, ActionError, ActionStatus, Firewall, FirewallResource, FirewallRule, LoadBalancer,
    LoadBalancerTarget, RuleDirection, Server,
};
pub use provider::{ActionReporter, ActionWatch, CloudApi};
pub use retry::{ATTACH_DELAY, DETACH_DELAY, RetryPolicy, retry_on_contention};

/// Cancellation handle accepted by every blocking operation
pub use tokio_util::sync::CancellationToken;

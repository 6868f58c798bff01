//! Synchronizer error types and the teardown report

use std::fmt;

use hconnect_cloud::CloudError;
use hconnect_cloud_hetzner::HetznerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Instance {0} not found")]
    NodeNotFound(String),

    #[error("Firewall {0} not found")]
    FirewallNotFound(String),

    #[error("Load Balancer {0} not found")]
    LoadBalancerNotFound(String),

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Hetzner(#[from] HetznerError),
}

impl ConnectError {
    pub fn is_target_already_defined(&self) -> bool {
        matches!(self, ConnectError::Cloud(e) if e.is_target_already_defined())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConnectError::Cloud(e) if e.is_cancelled())
    }
}

pub type Result<T> = std::result::Result<T, ConnectError>;

/// A resource that could not be cleaned up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    /// e.g. `firewall 38 (resource)` or `load balancer 4711`
    pub resource: String,
    pub error: String,
}

/// Outcome of a best-effort deregistration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, resource: impl Into<String>) {
        self.succeeded.push(resource.into());
    }

    pub fn add_skipped(&mut self, resource: impl Into<String>) {
        self.skipped.push(resource.into());
    }

    pub fn add_failure(&mut self, resource: impl Into<String>, error: &dyn std::error::Error) {
        self.failed.push(TeardownFailure {
            resource: resource.into(),
            error: error.to_string(),
        });
    }

    pub fn merge(&mut self, other: TeardownReport) {
        self.succeeded.extend(other.succeeded);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }
}

impl fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cleaned up, {} skipped, {} failed",
            self.succeeded.len(),
            self.skipped.len(),
            self.failed.len()
        )?;
        for failure in &self.failed {
            write!(f, "; {}: {}", failure.resource, failure.error)?;
        }
        Ok(())
    }
}

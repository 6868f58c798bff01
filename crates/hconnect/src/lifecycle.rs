//! Lifecycle orchestration
//!
//! ```text
//! Starting ──register ok──▶ Running ──signal──▶ Terminating ──▶ exit
//!    │                                              ▲
//!    └──────────────signal (registration cancelled)─┘
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use hconnect_cloud::{CancellationToken, CloudApi, Server};
use tracing::{debug, info, warn};

use crate::error::{ConnectError, Result, TeardownReport};
use crate::firewall::FirewallSync;
use crate::load_balancer::LoadBalancerSync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Running,
    Terminating,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Starting => write!(f, "starting"),
            Phase::Running => write!(f, "running"),
            Phase::Terminating => write!(f, "terminating"),
        }
    }
}

/// Registers the node on start and deregisters it on shutdown
pub struct Lifecycle {
    api: Arc<dyn CloudApi>,
    node_name: String,
    load_balancer: LoadBalancerSync,
    firewall: FirewallSync,
    phase: Phase,
    /// Resolved once during startup, reused for teardown
    node: Option<Server>,
}

impl Lifecycle {
    pub fn new(
        api: Arc<dyn CloudApi>,
        node_name: impl Into<String>,
        load_balancer: LoadBalancerSync,
        firewall: FirewallSync,
    ) -> Self {
        Self {
            api,
            node_name: node_name.into(),
            load_balancer,
            firewall,
            phase: Phase::Starting,
            node: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn node(&self) -> Option<&Server> {
        self.node.as_ref()
    }

    async fn resolve_node(&self) -> Result<Server> {
        let node = self
            .api
            .server_by_name(&self.node_name)
            .await
            .map_err(|e| e.in_op("server/get"))?
            .ok_or_else(|| ConnectError::NodeNotFound(self.node_name.clone()))?;

        debug!(
            node = %node.name,
            id = node.id,
            ipv4 = ?node.public_ipv4,
            ipv6 = ?node.public_ipv6,
            "resolved node"
        );
        Ok(node)
    }

    /// Register the node with the load balancer, then the firewalls.
    ///
    /// The node being a load balancer target already counts as success.
    pub async fn start(&mut self, cancel: &CancellationToken) -> Result<()> {
        let node = self.resolve_node().await?;
        self.node = Some(node.clone());
        let api = self.api.as_ref();

        match self.load_balancer.register(api, &node, cancel).await {
            Err(err) if err.is_target_already_defined() => {
                debug!(node = %node.name, "node is already a load balancer target");
            }
            result => result?,
        }

        self.firewall.register(api, &node, cancel).await?;

        self.phase = Phase::Running;
        info!(phase = %self.phase, node = %node.name, "node registered");
        Ok(())
    }

    /// Best-effort deregistration under its own, never-cancelled token.
    ///
    /// Only a failed node lookup is an error; everything else is collected
    /// in the report.
    pub async fn shutdown(&mut self) -> Result<TeardownReport> {
        self.phase = Phase::Terminating;
        info!(phase = %self.phase, node = %self.node_name, "deregistering node");

        let node = match &self.node {
            Some(node) => node.clone(),
            None => self.resolve_node().await?,
        };
        let api = self.api.as_ref();
        let cancel = CancellationToken::new();

        let mut report = self.firewall.deregister(api, &node, &cancel).await;
        report.merge(self.load_balancer.deregister(api, &node, &cancel).await);

        if report.is_success() {
            info!(%report, "cleanup complete");
        } else {
            warn!(%report, "cleanup incomplete");
        }
        Ok(report)
    }

    /// Register, wait for `shutdown`, deregister.
    ///
    /// A shutdown signal that arrives while registering cancels it and
    /// goes straight to teardown. A registration error is returned without
    /// any teardown.
    pub async fn run<S>(&mut self, shutdown: S) -> Result<TeardownReport>
    where
        S: Future<Output = ()>,
    {
        let cancel = CancellationToken::new();
        tokio::pin!(shutdown);

        let signalled = {
            let start = self.start(&cancel);
            tokio::pin!(start);

            let finished = tokio::select! {
                result = &mut start => Some(result),
                _ = &mut shutdown => None,
            };

            match finished {
                Some(result) => {
                    result?;
                    false
                }
                None => {
                    info!("shutdown signal received during startup, cancelling registration");
                    cancel.cancel();
                    if let Err(err) = start.await {
                        warn!(error = %err, "registration interrupted");
                    }
                    true
                }
            }
        };

        if !signalled {
            shutdown.await;
            info!("shutdown signal received");
        }

        self.shutdown().await
    }
}

//! Load balancer synchronizer

use hconnect_cloud::{
    CancellationToken, CloudApi, LoadBalancer, RetryPolicy, Server, retry_on_contention,
    wait_for_action,
};
use tracing::{debug, error, info, warn};

use crate::error::{ConnectError, Result, TeardownReport};

/// Adds the node as a server target of at most one load balancer
#[derive(Debug, Clone)]
pub struct LoadBalancerSync {
    id: Option<u64>,
    use_private_ip: bool,
    attach_policy: RetryPolicy,
    detach_policy: RetryPolicy,
}

impl LoadBalancerSync {
    pub fn new(id: Option<u64>, use_private_ip: bool) -> Self {
        Self {
            id,
            use_private_ip,
            attach_policy: RetryPolicy::attach(),
            detach_policy: RetryPolicy::detach(),
        }
    }

    /// A synchronizer that does nothing
    pub fn disabled() -> Self {
        Self::new(None, false)
    }

    /// Resolve a load balancer name or numeric id.
    pub async fn resolve(
        api: &dyn CloudApi,
        selector: Option<&str>,
        use_private_ip: bool,
    ) -> Result<Self> {
        let Some(selector) = selector else {
            info!("no load balancer configured");
            return Ok(Self::disabled());
        };

        // An empty name filter would list every load balancer
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(ConnectError::LoadBalancerNotFound(String::new()));
        }

        let found = match selector.parse::<u64>() {
            Ok(id) => api.load_balancer_by_id(id).await,
            Err(_) => api.load_balancer_by_name(selector).await,
        }
        .map_err(|e| e.in_op("load_balancer/resolve"))?;

        let load_balancer =
            found.ok_or_else(|| ConnectError::LoadBalancerNotFound(selector.to_string()))?;
        info!(
            load_balancer = load_balancer.id,
            name = %load_balancer.name,
            private_ip = use_private_ip,
            "resolved load balancer"
        );

        Ok(Self::new(Some(load_balancer.id), use_private_ip))
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.attach_policy = self.attach_policy.with_max_attempts(max_attempts);
        self.detach_policy = self.detach_policy.with_max_attempts(max_attempts);
        self
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.id.is_some()
    }

    /// Add the node as a target.
    ///
    /// A target that already exists is reported as the provider's
    /// `target_already_defined` error; callers decide whether that matters.
    pub async fn register(
        &self,
        api: &dyn CloudApi,
        node: &Server,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(id) = self.id else {
            return Ok(());
        };
        self.fetch(api, id).await?;

        let op = format!("load_balancer/add_target/{id}");
        let action = retry_on_contention(&op, self.attach_policy, cancel, || {
            api.add_server_target(id, node.id, self.use_private_ip)
        })
        .await?;
        wait_for_action(api, &action, cancel)
            .await
            .map_err(|e| e.in_op(&op))?;

        info!(
            load_balancer = id,
            node = %node.name,
            private_ip = self.use_private_ip,
            "added node to load balancer"
        );
        Ok(())
    }

    /// Remove the node as a target. Never fails; the outcome is in the report.
    pub async fn deregister(
        &self,
        api: &dyn CloudApi,
        node: &Server,
        cancel: &CancellationToken,
    ) -> TeardownReport {
        let mut report = TeardownReport::new();
        let Some(id) = self.id else {
            return report;
        };
        let resource = format!("load balancer {id}");

        let load_balancer = match self.fetch(api, id).await {
            Ok(lb) => lb,
            Err(ConnectError::LoadBalancerNotFound(_)) => {
                warn!(load_balancer = id, "load balancer not found, skipping");
                report.add_skipped(resource);
                return report;
            }
            Err(err) => {
                error!(load_balancer = id, error = %err, "failed to fetch load balancer, skipping");
                report.add_failure(resource, &err);
                return report;
            }
        };

        if !load_balancer.has_server_target(node.id) {
            debug!(
                load_balancer = id,
                node = %node.name,
                "node is not a target, nothing to remove"
            );
            report.add_skipped(resource);
            return report;
        }

        let op = format!("load_balancer/remove_target/{id}");
        let removed = async {
            let action = retry_on_contention(&op, self.detach_policy, cancel, || {
                api.remove_server_target(id, node.id)
            })
            .await?;
            wait_for_action(api, &action, cancel)
                .await
                .map_err(|e| e.in_op(&op))
        }
        .await;

        match removed {
            Ok(()) => {
                info!(load_balancer = id, node = %node.name, "removed node from load balancer");
                report.add_success(resource);
            }
            Err(err) => {
                error!(
                    load_balancer = id,
                    error = %err,
                    "failed to remove node from load balancer"
                );
                report.add_failure(resource, &err);
            }
        }
        report
    }

    async fn fetch(&self, api: &dyn CloudApi, id: u64) -> Result<LoadBalancer> {
        api.load_balancer_by_id(id)
            .await
            .map_err(|e| e.in_op("load_balancer/get"))?
            .ok_or_else(|| ConnectError::LoadBalancerNotFound(id.to_string()))
    }
}

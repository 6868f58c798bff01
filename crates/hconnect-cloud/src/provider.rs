//! Cloud API trait definition

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};

use crate::error::Result;
use crate::model::{Action, Firewall, FirewallRule, LoadBalancer, Server};

/// Cloud API abstraction trait
///
/// Every mutating call returns the provider action(s) it started; completion is
/// observed through [`CloudApi::watch_action`].
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Returns the provider name (e.g., "hetzner")
    fn name(&self) -> &str;

    /// Look up a server by its exact name. `Ok(None)` when absent.
    async fn server_by_name(&self, name: &str) -> Result<Option<Server>>;

    /// The complete firewall catalog
    async fn all_firewalls(&self) -> Result<Vec<Firewall>>;

    async fn load_balancer_by_id(&self, id: u64) -> Result<Option<LoadBalancer>>;

    async fn load_balancer_by_name(&self, name: &str) -> Result<Option<LoadBalancer>>;

    /// Attach a server to a firewall as a resource
    async fn apply_firewall_to_server(&self, firewall_id: u64, server_id: u64)
    -> Result<Vec<Action>>;

    /// Detach a server resource from a firewall
    async fn remove_firewall_from_server(
        &self,
        firewall_id: u64,
        server_id: u64,
    ) -> Result<Vec<Action>>;

    /// Replace the complete rule set of a firewall
    async fn set_firewall_rules(
        &self,
        firewall_id: u64,
        rules: Vec<FirewallRule>,
    ) -> Result<Vec<Action>>;

    async fn add_server_target(
        &self,
        load_balancer_id: u64,
        server_id: u64,
        use_private_ip: bool,
    ) -> Result<Action>;

    async fn remove_server_target(&self, load_balancer_id: u64, server_id: u64) -> Result<Action>;

    /// Subscribe to an action's progress. The returned watch resolves once the
    /// provider reports a terminal status.
    fn watch_action(&self, action: &Action) -> ActionWatch;
}

/// Receiving side of an action subscription
#[derive(Debug)]
pub struct ActionWatch {
    pub action_id: u64,
    pub progress: watch::Receiver<u8>,
    pub done: oneshot::Receiver<Result<()>>,
}

/// Sending side of an action subscription, held by whoever tracks the action
#[derive(Debug)]
pub struct ActionReporter {
    progress: watch::Sender<u8>,
    done: oneshot::Sender<Result<()>>,
}

impl ActionWatch {
    pub fn channel(action_id: u64) -> (ActionReporter, ActionWatch) {
        let (progress_tx, progress_rx) = watch::channel(0);
        let (done_tx, done_rx) = oneshot::channel();
        (
            ActionReporter {
                progress: progress_tx,
                done: done_tx,
            },
            ActionWatch {
                action_id,
                progress: progress_rx,
                done: done_rx,
            },
        )
    }

    /// A watch that is already complete
    pub fn finished(action_id: u64, result: Result<()>) -> Self {
        let (reporter, watch) = Self::channel(action_id);
        reporter.finish(result);
        watch
    }
}

impl ActionReporter {
    pub fn progress(&self, percent: u8) {
        self.progress.send_replace(percent.min(100));
    }

    /// Whether the subscriber has gone away
    pub fn is_closed(&self) -> bool {
        self.done.is_closed()
    }

    pub fn finish(self, result: Result<()>) {
        if result.is_ok() {
            self.progress.send_replace(100);
        }
        // Subscriber may have been cancelled already
        let _ = self.done.send(result);
    }
}

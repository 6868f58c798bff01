//! In-memory cloud used by the synchronizer tests

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Mutex;

use async_trait::async_trait;
use hconnect_cloud::{
    Action, ActionStatus, ActionWatch, CloudApi, CloudError, ErrorCode, Firewall,
    FirewallResource, FirewallRule, LoadBalancer, LoadBalancerTarget, Result, RuleDirection,
    Server,
};

pub fn server(id: u64, name: &str, ipv4: Option<&str>, ipv6: Option<&str>) -> Server {
    Server {
        id,
        name: name.to_string(),
        public_ipv4: ipv4.map(|s| s.parse::<Ipv4Addr>().unwrap()),
        public_ipv6: ipv6.map(|s| s.parse::<Ipv6Addr>().unwrap()),
    }
}

pub fn firewall(id: u64, name: &str, rules: Vec<FirewallRule>) -> Firewall {
    Firewall {
        id,
        name: name.to_string(),
        rules,
        applied_to: vec![],
    }
}

pub fn rule(direction: RuleDirection, source: &[&str], destination: &[&str]) -> FirewallRule {
    FirewallRule {
        direction,
        protocol: "tcp".to_string(),
        port: Some("443".to_string()),
        source_ips: source.iter().map(|s| s.parse().unwrap()).collect(),
        destination_ips: destination.iter().map(|s| s.parse().unwrap()).collect(),
        description: None,
    }
}

pub fn load_balancer(id: u64, name: &str) -> LoadBalancer {
    LoadBalancer {
        id,
        name: name.to_string(),
        targets: vec![],
    }
}

#[derive(Default)]
struct State {
    servers: Vec<Server>,
    firewalls: Vec<Firewall>,
    load_balancers: Vec<LoadBalancer>,
    /// Scripted failures per call name, consumed front to back
    failures: HashMap<String, Vec<ErrorCode>>,
    calls: Vec<String>,
    next_action: u64,
}

/// Fake provider that applies mutations to its own state.
///
/// Mutating calls return `running` actions that the watch immediately reports
/// as successful.
#[derive(Default)]
pub struct FakeCloud {
    state: Mutex<State>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(self, server: Server) -> Self {
        self.state.lock().unwrap().servers.push(server);
        self
    }

    pub fn with_firewall(self, firewall: Firewall) -> Self {
        self.state.lock().unwrap().firewalls.push(firewall);
        self
    }

    pub fn with_load_balancer(self, load_balancer: LoadBalancer) -> Self {
        self.state.lock().unwrap().load_balancers.push(load_balancer);
        self
    }

    /// Make the next `times` calls of `call` fail with `code`
    pub fn fail_times(&self, call: &str, code: ErrorCode, times: usize) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(call.to_string())
            .or_default()
            .extend(std::iter::repeat_n(code, times));
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| *c == call)
            .count()
    }

    pub fn firewall(&self, id: u64) -> Firewall {
        self.state
            .lock()
            .unwrap()
            .firewalls
            .iter()
            .find(|fw| fw.id == id)
            .cloned()
            .unwrap()
    }

    pub fn load_balancer(&self, id: u64) -> LoadBalancer {
        self.state
            .lock()
            .unwrap()
            .load_balancers
            .iter()
            .find(|lb| lb.id == id)
            .cloned()
            .unwrap()
    }

    /// Record the call and pop a scripted failure if one is queued
    fn enter(&self, call: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.to_string());
        match state.failures.get_mut(call) {
            Some(queue) if !queue.is_empty() => {
                let code = queue.remove(0);
                Err(CloudError::Api {
                    message: format!("scripted {code}"),
                    code,
                })
            }
            _ => Ok(()),
        }
    }

    fn action(&self, command: &str) -> Action {
        let mut state = self.state.lock().unwrap();
        state.next_action += 1;
        Action {
            id: state.next_action,
            command: command.to_string(),
            status: ActionStatus::Running,
            progress: 0,
            error: None,
        }
    }

    fn with_firewall_mut<T>(&self, id: u64, f: impl FnOnce(&mut Firewall) -> T) -> Result<T> {
        let mut state = self.state.lock().unwrap();
        let firewall = state
            .firewalls
            .iter_mut()
            .find(|fw| fw.id == id)
            .ok_or_else(|| not_found(format!("firewall {id}")))?;
        Ok(f(firewall))
    }

    fn with_load_balancer_mut<T>(
        &self,
        id: u64,
        f: impl FnOnce(&mut LoadBalancer) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.state.lock().unwrap();
        let load_balancer = state
            .load_balancers
            .iter_mut()
            .find(|lb| lb.id == id)
            .ok_or_else(|| not_found(format!("load balancer {id}")))?;
        f(load_balancer)
    }
}

fn not_found(message: String) -> CloudError {
    CloudError::Api {
        code: ErrorCode::NotFound,
        message,
    }
}

#[async_trait]
impl CloudApi for FakeCloud {
    fn name(&self) -> &str {
        "fake"
    }

    async fn server_by_name(&self, name: &str) -> Result<Option<Server>> {
        self.enter("server_by_name")?;
        let state = self.state.lock().unwrap();
        Ok(state.servers.iter().find(|s| s.name == name).cloned())
    }

    async fn all_firewalls(&self) -> Result<Vec<Firewall>> {
        self.enter("all_firewalls")?;
        Ok(self.state.lock().unwrap().firewalls.clone())
    }

    async fn load_balancer_by_id(&self, id: u64) -> Result<Option<LoadBalancer>> {
        self.enter("load_balancer_by_id")?;
        let state = self.state.lock().unwrap();
        Ok(state.load_balancers.iter().find(|lb| lb.id == id).cloned())
    }

    async fn load_balancer_by_name(&self, name: &str) -> Result<Option<LoadBalancer>> {
        self.enter("load_balancer_by_name")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .load_balancers
            .iter()
            .find(|lb| lb.name == name)
            .cloned())
    }

    async fn apply_firewall_to_server(
        &self,
        firewall_id: u64,
        server_id: u64,
    ) -> Result<Vec<Action>> {
        self.enter("apply_firewall_to_server")?;
        self.with_firewall_mut(firewall_id, |fw| {
            if !fw.has_server(server_id) {
                fw.applied_to.push(FirewallResource::Server { id: server_id });
            }
        })?;
        Ok(vec![self.action("apply_firewall")])
    }

    async fn remove_firewall_from_server(
        &self,
        firewall_id: u64,
        server_id: u64,
    ) -> Result<Vec<Action>> {
        self.enter("remove_firewall_from_server")?;
        self.with_firewall_mut(firewall_id, |fw| {
            fw.applied_to
                .retain(|r| !matches!(r, FirewallResource::Server { id } if *id == server_id));
        })?;
        Ok(vec![self.action("remove_firewall")])
    }

    async fn set_firewall_rules(
        &self,
        firewall_id: u64,
        rules: Vec<FirewallRule>,
    ) -> Result<Vec<Action>> {
        self.enter("set_firewall_rules")?;
        self.with_firewall_mut(firewall_id, |fw| fw.rules = rules)?;
        Ok(vec![self.action("set_firewall_rules")])
    }

    async fn add_server_target(
        &self,
        load_balancer_id: u64,
        server_id: u64,
        use_private_ip: bool,
    ) -> Result<Action> {
        self.enter("add_server_target")?;
        self.with_load_balancer_mut(load_balancer_id, |lb| {
            if lb.has_server_target(server_id) {
                return Err(CloudError::Api {
                    code: ErrorCode::TargetAlreadyDefined,
                    message: "target already defined".to_string(),
                });
            }
            lb.targets.push(LoadBalancerTarget {
                server_id: Some(server_id),
                use_private_ip,
            });
            Ok(())
        })?;
        Ok(self.action("add_target"))
    }

    async fn remove_server_target(&self, load_balancer_id: u64, server_id: u64) -> Result<Action> {
        self.enter("remove_server_target")?;
        self.with_load_balancer_mut(load_balancer_id, |lb| {
            if !lb.has_server_target(server_id) {
                return Err(CloudError::Api {
                    code: ErrorCode::Other("load_balancer_target_not_found".to_string()),
                    message: "target not found".to_string(),
                });
            }
            lb.targets.retain(|t| t.server_id != Some(server_id));
            Ok(())
        })?;
        Ok(self.action("remove_target"))
    }

    fn watch_action(&self, action: &Action) -> ActionWatch {
        ActionWatch::finished(action.id, Ok(()))
    }
}

//! Firewall synchronizer
//!
//! Two independent modes, each enabled by its own selector:
//!
//! - **resource mode** attaches the node to the firewall, changing which
//!   servers the firewall protects.
//! - **target mode** writes the node's addresses into the address list of
//!   every existing rule: the source list of inbound rules and the destination
//!   list of outbound rules.
//!
//! The provider has no partial rule update, so target mode always reads the
//! full rule set and submits a complete replacement.

use std::collections::HashMap;
use std::net::IpAddr;

use hconnect_cloud::{
    CancellationToken, CloudApi, Firewall, FirewallRule, RetryPolicy, RuleDirection, Server,
    retry_on_contention, wait_for_actions,
};
use ipnet::IpNet;
use tracing::{debug, error, info, warn};

use crate::cidr::{address_covered_by, node_network, remove_exact_network};
use crate::error::{ConnectError, Result, TeardownReport};

/// Raw firewall selection as read from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirewallSettings {
    /// Comma separated names/ids for resource mode
    pub resources: Option<String>,
    /// Comma separated names/ids for target mode
    pub targets: Option<String>,
    /// Also inject the node's IPv6 network in target mode
    pub inject_ipv6: bool,
}

/// One node address together with the network written into rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAddress {
    pub addr: IpAddr,
    pub net: IpNet,
}

impl NodeAddress {
    pub fn new(addr: IpAddr) -> Self {
        Self {
            addr,
            net: node_network(addr),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FirewallSync {
    /// Firewalls the node is attached to as a resource
    resource_ids: Option<Vec<u64>>,
    /// Firewalls whose rules receive the node's addresses
    target_ids: Option<Vec<u64>>,
    inject_ipv6: bool,
    attach_policy: RetryPolicy,
    detach_policy: RetryPolicy,
}

impl FirewallSync {
    pub fn new(
        resource_ids: Option<Vec<u64>>,
        target_ids: Option<Vec<u64>>,
        inject_ipv6: bool,
    ) -> Self {
        Self {
            resource_ids,
            target_ids,
            inject_ipv6,
            attach_policy: RetryPolicy::attach(),
            detach_policy: RetryPolicy::detach(),
        }
    }

    /// Resolve the configured selectors against the live firewall catalog.
    /// Fails on the first entry that matches no firewall.
    pub async fn resolve(api: &dyn CloudApi, settings: &FirewallSettings) -> Result<Self> {
        if settings.resources.is_none() && settings.targets.is_none() {
            info!("no firewalls configured");
            return Ok(Self::new(None, None, false));
        }

        let catalog = api
            .all_firewalls()
            .await
            .map_err(|e| e.in_op("firewall/resolve"))?;

        let resource_ids = settings
            .resources
            .as_deref()
            .map(|input| resolve_firewall_selector(input, &catalog))
            .transpose()?;
        let target_ids = settings
            .targets
            .as_deref()
            .map(|input| resolve_firewall_selector(input, &catalog))
            .transpose()?;

        info!(
            resources = ?resource_ids,
            targets = ?target_ids,
            ipv6 = settings.inject_ipv6,
            "resolved firewalls"
        );

        Ok(Self::new(resource_ids, target_ids, settings.inject_ipv6))
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.attach_policy = self.attach_policy.with_max_attempts(max_attempts);
        self.detach_policy = self.detach_policy.with_max_attempts(max_attempts);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.resource_ids.is_some() || self.target_ids.is_some()
    }

    pub fn resource_ids(&self) -> Option<&[u64]> {
        self.resource_ids.as_deref()
    }

    pub fn target_ids(&self) -> Option<&[u64]> {
        self.target_ids.as_deref()
    }

    /// Addresses written into rules for this node
    pub fn node_addresses(&self, node: &Server) -> Vec<NodeAddress> {
        let mut addresses = Vec::with_capacity(2);
        if let Some(v4) = node.public_ipv4 {
            addresses.push(NodeAddress::new(IpAddr::V4(v4)));
        }
        if self.inject_ipv6 {
            if let Some(v6) = node.public_ipv6 {
                addresses.push(NodeAddress::new(IpAddr::V6(v6)));
            }
        }
        addresses
    }

    /// Attach the node and inject its addresses. Stops at the first error.
    pub async fn register(
        &self,
        api: &dyn CloudApi,
        node: &Server,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        // The catalog may have changed since the selectors were resolved
        let catalog = fetch_catalog(api).await?;

        if let Some(ids) = &self.resource_ids {
            for id in ids {
                let firewall = catalog
                    .get(id)
                    .ok_or_else(|| ConnectError::FirewallNotFound(id.to_string()))?;
                self.attach_resource(api, node, firewall, cancel).await?;
            }
        }

        if let Some(ids) = &self.target_ids {
            let addresses = self.target_addresses(node);
            for id in ids {
                let firewall = catalog
                    .get(id)
                    .ok_or_else(|| ConnectError::FirewallNotFound(id.to_string()))?;
                let rules = inject_addresses(&firewall.rules, &addresses);
                self.replace_rules(api, firewall, rules, self.attach_policy, cancel)
                    .await?;
                info!(firewall = firewall.id, node = %node.name, "added node to firewall rules");
            }
        }

        Ok(())
    }

    /// Undo [`FirewallSync::register`]. Every firewall is handled on its own;
    /// failures are collected and never stop the remaining cleanup.
    pub async fn deregister(
        &self,
        api: &dyn CloudApi,
        node: &Server,
        cancel: &CancellationToken,
    ) -> TeardownReport {
        let mut report = TeardownReport::new();
        if !self.is_enabled() {
            return report;
        }

        let catalog = match fetch_catalog(api).await {
            Ok(catalog) => catalog,
            Err(err) => {
                error!(error = %err, "could not fetch firewalls, skipping firewall cleanup");
                report.add_failure("firewall catalog", &err);
                return report;
            }
        };

        for id in self.resource_ids.iter().flatten() {
            let resource = format!("firewall {id} (resource)");
            let Some(firewall) = catalog.get(id) else {
                warn!(firewall = id, "firewall not found, skipping");
                report.add_skipped(resource);
                continue;
            };
            if !firewall.has_server(node.id) {
                debug!(firewall = id, "node is not attached, nothing to detach");
                report.add_skipped(resource);
                continue;
            }

            match self.detach_resource(api, node, firewall, cancel).await {
                Ok(()) => report.add_success(resource),
                Err(err) => {
                    error!(firewall = id, error = %err, "failed to detach node, skipping");
                    report.add_failure(resource, &err);
                }
            }
        }

        let addresses = self.target_addresses(node);
        for id in self.target_ids.iter().flatten() {
            let resource = format!("firewall {id} (rules)");
            let Some(firewall) = catalog.get(id) else {
                warn!(firewall = id, "firewall not found, skipping");
                report.add_skipped(resource);
                continue;
            };

            let rules = withdraw_addresses(&firewall.rules, &addresses);
            match self
                .replace_rules(api, firewall, rules, self.detach_policy, cancel)
                .await
            {
                Ok(()) => {
                    info!(firewall = id, node = %node.name, "removed node from firewall rules");
                    report.add_success(resource);
                }
                Err(err) => {
                    error!(
                        firewall = id,
                        error = %err,
                        "failed to update firewall rules, skipping"
                    );
                    report.add_failure(resource, &err);
                }
            }
        }

        report
    }

    fn target_addresses(&self, node: &Server) -> Vec<NodeAddress> {
        let addresses = self.node_addresses(node);
        if addresses.is_empty() {
            warn!(node = %node.name, "node has no public address to write into firewall rules");
        }
        addresses
    }

    async fn attach_resource(
        &self,
        api: &dyn CloudApi,
        node: &Server,
        firewall: &Firewall,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if firewall.has_server(node.id) {
            debug!(firewall = firewall.id, node = %node.name, "node already attached");
            return Ok(());
        }

        let op = format!("firewall/attach_resource/{}", firewall.id);
        let actions = retry_on_contention(&op, self.attach_policy, cancel, || {
            api.apply_firewall_to_server(firewall.id, node.id)
        })
        .await?;
        wait_for_actions(api, &actions, cancel)
            .await
            .map_err(|e| e.in_op(&op))?;

        info!(firewall = firewall.id, node = %node.name, "attached node to firewall");
        Ok(())
    }

    async fn detach_resource(
        &self,
        api: &dyn CloudApi,
        node: &Server,
        firewall: &Firewall,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let op = format!("firewall/detach_resource/{}", firewall.id);
        let actions = retry_on_contention(&op, self.detach_policy, cancel, || {
            api.remove_firewall_from_server(firewall.id, node.id)
        })
        .await?;
        wait_for_actions(api, &actions, cancel)
            .await
            .map_err(|e| e.in_op(&op))?;

        info!(firewall = firewall.id, node = %node.name, "detached node from firewall");
        Ok(())
    }

    async fn replace_rules(
        &self,
        api: &dyn CloudApi,
        firewall: &Firewall,
        rules: Vec<FirewallRule>,
        policy: RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let op = format!("firewall/set_rules/{}", firewall.id);
        let actions = retry_on_contention(&op, policy, cancel, || {
            api.set_firewall_rules(firewall.id, rules.clone())
        })
        .await?;
        wait_for_actions(api, &actions, cancel)
            .await
            .map_err(|e| e.in_op(&op))?;
        Ok(())
    }
}

async fn fetch_catalog(api: &dyn CloudApi) -> Result<HashMap<u64, Firewall>> {
    let firewalls = api
        .all_firewalls()
        .await
        .map_err(|e| e.in_op("firewall/list"))?;
    Ok(firewalls.into_iter().map(|fw| (fw.id, fw)).collect())
}

/// Turn `"name-or-id,name-or-id"` into firewall ids.
///
/// Names match case-insensitively, ids match exactly. Ids resolved twice are
/// kept once, in order of first appearance.
pub fn resolve_firewall_selector(input: &str, catalog: &[Firewall]) -> Result<Vec<u64>> {
    let mut ids = Vec::new();

    for token in input.split(',') {
        let token = token.trim().to_lowercase();
        let firewall = catalog
            .iter()
            .find(|fw| fw.name.to_lowercase() == token || fw.id.to_string() == token)
            .ok_or_else(|| ConnectError::FirewallNotFound(token.clone()))?;

        if !ids.contains(&firewall.id) {
            ids.push(firewall.id);
        }
    }

    Ok(ids)
}

fn address_list(rule: &mut FirewallRule) -> &mut Vec<IpNet> {
    match rule.direction {
        RuleDirection::In => &mut rule.source_ips,
        RuleDirection::Out => &mut rule.destination_ips,
    }
}

/// New rule set with every address present in each rule's directional list.
///
/// An address already covered by any existing entry, however broad, is not
/// added again.
pub fn inject_addresses(rules: &[FirewallRule], addresses: &[NodeAddress]) -> Vec<FirewallRule> {
    rules
        .iter()
        .cloned()
        .map(|mut rule| {
            let list = address_list(&mut rule);
            for address in addresses {
                if !address_covered_by(list, address.addr) {
                    list.push(address.net);
                }
            }
            rule
        })
        .collect()
}

/// New rule set with the node's exact networks removed.
///
/// Only entries that equal the node network are dropped. A node covered by a
/// broader entry stays covered.
// FIXME: presence is checked by containment but removal by exact match, so an
// address that was "already present" through a wider entry is never withdrawn.
pub fn withdraw_addresses(rules: &[FirewallRule], addresses: &[NodeAddress]) -> Vec<FirewallRule> {
    rules
        .iter()
        .cloned()
        .map(|mut rule| {
            let list = address_list(&mut rule);
            for address in addresses {
                if address_covered_by(list, address.addr) {
                    *list = remove_exact_network(std::mem::take(list), &address.net);
                }
            }
            rule
        })
        .collect()
}

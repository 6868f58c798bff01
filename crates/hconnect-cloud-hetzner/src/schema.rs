//! Hetzner Cloud API request and response documents
//!
//! Firewall rules and actions share their wire shape with the model types
//! and are (de)serialized directly; everything else is converted here.

use std::net::Ipv4Addr;

use hconnect_cloud::{
    Action, Firewall, FirewallResource, FirewallRule, LoadBalancer, LoadBalancerTarget, Server,
};
use ipnet::Ipv6Net;
use serde::{Deserialize, Serialize};

use crate::error::{HetznerError, Result};

// ============ Responses ============

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServersResponse {
    pub servers: Vec<ApiServer>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiServer {
    pub id: u64,
    pub name: String,
    pub public_net: ApiPublicNet,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiPublicNet {
    pub ipv4: Option<ApiIp>,
    pub ipv6: Option<ApiIp>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiIp {
    pub ip: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FirewallsResponse {
    pub firewalls: Vec<ApiFirewall>,
    #[serde(default)]
    pub meta: Option<ApiMeta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiMeta {
    pub pagination: ApiPagination,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiPagination {
    pub next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiFirewall {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub rules: Vec<FirewallRule>,
    #[serde(default)]
    pub applied_to: Vec<ApiResource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResource {
    #[serde(rename = "type")]
    pub kind: String,
    pub server: Option<ServerRef>,
    pub label_selector: Option<ApiLabelSelector>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiLabelSelector {
    pub selector: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoadBalancerResponse {
    pub load_balancer: ApiLoadBalancer,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoadBalancersResponse {
    pub load_balancers: Vec<ApiLoadBalancer>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiLoadBalancer {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub targets: Vec<ApiTarget>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiTarget {
    #[serde(rename = "type")]
    pub kind: String,
    pub server: Option<ServerRef>,
    #[serde(default)]
    pub use_private_ip: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActionResponse {
    pub action: Action,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActionsResponse {
    pub actions: Vec<Action>,
}

// ============ Requests ============

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct ServerRef {
    pub id: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ServerResource {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub server: ServerRef,
}

impl ServerResource {
    pub fn new(server_id: u64) -> Self {
        Self {
            kind: "server",
            server: ServerRef { id: server_id },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ApplyToResourcesRequest {
    pub apply_to: Vec<ServerResource>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RemoveFromResourcesRequest {
    pub remove_from: Vec<ServerResource>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SetRulesRequest {
    pub rules: Vec<FirewallRule>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddTargetRequest {
    #[serde(flatten)]
    pub target: ServerResource,
    pub use_private_ip: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct RemoveTargetRequest {
    #[serde(flatten)]
    pub target: ServerResource,
}

// ============ Conversions ============

impl TryFrom<ApiServer> for Server {
    type Error = HetznerError;

    fn try_from(s: ApiServer) -> Result<Self> {
        let public_ipv4 = s
            .public_net
            .ipv4
            .map(|ip| {
                ip.ip
                    .parse::<Ipv4Addr>()
                    .map_err(|_| HetznerError::InvalidAddress(ip.ip))
            })
            .transpose()?;

        // The API reports the assigned /64 network, not a single address
        let public_ipv6 = s
            .public_net
            .ipv6
            .map(|ip| {
                ip.ip
                    .parse::<Ipv6Net>()
                    .map(|net| net.network())
                    .map_err(|_| HetznerError::InvalidAddress(ip.ip))
            })
            .transpose()?;

        Ok(Server {
            id: s.id,
            name: s.name,
            public_ipv4,
            public_ipv6,
        })
    }
}

impl From<ApiFirewall> for Firewall {
    fn from(fw: ApiFirewall) -> Self {
        let applied_to = fw
            .applied_to
            .into_iter()
            .filter_map(|r| match (r.kind.as_str(), r.server, r.label_selector) {
                ("server", Some(server), _) => Some(FirewallResource::Server { id: server.id }),
                ("label_selector", _, Some(ls)) => Some(FirewallResource::LabelSelector {
                    selector: ls.selector,
                }),
                _ => {
                    tracing::debug!(
                        kind = %r.kind,
                        firewall = fw.id,
                        "ignoring unknown firewall resource"
                    );
                    None
                }
            })
            .collect();

        Firewall {
            id: fw.id,
            name: fw.name,
            rules: fw.rules,
            applied_to,
        }
    }
}

impl From<ApiLoadBalancer> for LoadBalancer {
    fn from(lb: ApiLoadBalancer) -> Self {
        LoadBalancer {
            id: lb.id,
            name: lb.name,
            targets: lb
                .targets
                .into_iter()
                .map(|t| LoadBalancerTarget {
                    server_id: if t.kind == "server" {
                        t.server.map(|s| s.id)
                    } else {
                        None
                    },
                    use_private_ip: t.use_private_ip,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hconnect_cloud::{ActionStatus, RuleDirection};
    use serde_json::json;

    #[test]
    fn test_server_conversion() {
        let api: ServersResponse = serde_json::from_value(json!({
            "servers": [{
                "id": 42,
                "name": "web-1",
                "status": "running",
                "public_net": {
                    "ipv4": { "ip": "203.0.113.7", "blocked": false },
                    "ipv6": { "ip": "2001:db8:1234::/64", "blocked": false },
                    "floating_ips": []
                }
            }]
        }))
        .unwrap();

        let server = Server::try_from(api.servers.into_iter().next().unwrap()).unwrap();
        assert_eq!(server.id, 42);
        assert_eq!(server.public_ipv4, Some("203.0.113.7".parse().unwrap()));
        assert_eq!(server.public_ipv6, Some("2001:db8:1234::".parse().unwrap()));
    }

    #[test]
    fn test_server_without_public_ipv4() {
        let api: ApiServer = serde_json::from_value(json!({
            "id": 1,
            "name": "private-1",
            "public_net": { "ipv4": null, "ipv6": null }
        }))
        .unwrap();

        let server = Server::try_from(api).unwrap();
        assert_eq!(server.public_ipv4, None);
        assert_eq!(server.public_ipv6, None);
    }

    #[test]
    fn test_server_with_bad_address() {
        let api: ApiServer = serde_json::from_value(json!({
            "id": 1,
            "name": "broken",
            "public_net": { "ipv4": { "ip": "not-an-ip" } }
        }))
        .unwrap();

        assert!(matches!(
            Server::try_from(api),
            Err(HetznerError::InvalidAddress(ip)) if ip == "not-an-ip"
        ));
    }

    #[test]
    fn test_firewall_conversion() {
        let api: FirewallsResponse = serde_json::from_value(json!({
            "firewalls": [{
                "id": 38,
                "name": "k8s-nodes",
                "labels": {},
                "rules": [{
                    "direction": "in",
                    "protocol": "tcp",
                    "port": "6443",
                    "source_ips": ["28.239.13.1/32", "2001:db8::/64"],
                    "destination_ips": [],
                    "description": "kube-apiserver"
                }, {
                    "direction": "out",
                    "protocol": "icmp",
                    "port": null,
                    "source_ips": [],
                    "destination_ips": ["0.0.0.0/0"],
                    "description": null
                }],
                "applied_to": [
                    { "type": "server", "server": { "id": 42 } },
                    { "type": "label_selector", "label_selector": { "selector": "role=node" },
                      "applied_to_resources": [] }
                ]
            }],
            "meta": { "pagination": { "page": 1, "per_page": 50, "next_page": null } }
        }))
        .unwrap();

        assert_eq!(api.meta.unwrap().pagination.next_page, None);

        let fw = Firewall::from(api.firewalls.into_iter().next().unwrap());
        assert_eq!(fw.name, "k8s-nodes");
        assert!(fw.has_server(42));
        assert_eq!(fw.rules.len(), 2);
        assert_eq!(fw.rules[0].direction, RuleDirection::In);
        assert_eq!(fw.rules[0].source_ips.len(), 2);
        assert_eq!(fw.rules[1].direction, RuleDirection::Out);
        assert_eq!(fw.rules[1].port, None);
        assert_eq!(
            fw.applied_to[1],
            FirewallResource::LabelSelector {
                selector: "role=node".to_string()
            }
        );
    }

    #[test]
    fn test_load_balancer_conversion() {
        let api: LoadBalancerResponse = serde_json::from_value(json!({
            "load_balancer": {
                "id": 4711,
                "name": "ingress",
                "targets": [
                    { "type": "server", "server": { "id": 42 }, "use_private_ip": true },
                    { "type": "label_selector", "label_selector": { "selector": "x" } }
                ]
            }
        }))
        .unwrap();

        let lb = LoadBalancer::from(api.load_balancer);
        assert!(lb.has_server_target(42));
        assert!(lb.targets[0].use_private_ip);
        assert_eq!(lb.targets[1].server_id, None);
    }

    #[test]
    fn test_action_response() {
        let api: ActionsResponse = serde_json::from_value(json!({
            "actions": [{
                "id": 13,
                "command": "set_firewall_rules",
                "status": "error",
                "progress": 100,
                "started": "2016-01-30T23:55:00+00:00",
                "finished": "2016-01-30T23:56:00+00:00",
                "resources": [{ "id": 38, "type": "firewall" }],
                "error": { "code": "action_failed", "message": "Action failed" }
            }]
        }))
        .unwrap();

        let action = &api.actions[0];
        assert_eq!(action.status, ActionStatus::Error);
        assert_eq!(action.error.as_ref().unwrap().code, "action_failed");
    }

    #[test]
    fn test_request_bodies() {
        let add = serde_json::to_value(AddTargetRequest {
            target: ServerResource::new(42),
            use_private_ip: true,
        })
        .unwrap();
        assert_eq!(
            add,
            json!({ "type": "server", "server": { "id": 42 }, "use_private_ip": true })
        );

        let apply = serde_json::to_value(ApplyToResourcesRequest {
            apply_to: vec![ServerResource::new(42)],
        })
        .unwrap();
        assert_eq!(
            apply,
            json!({ "apply_to": [{ "type": "server", "server": { "id": 42 } }] })
        );

        let rules = serde_json::to_value(SetRulesRequest {
            rules: vec![FirewallRule {
                direction: RuleDirection::In,
                protocol: "tcp".to_string(),
                port: Some("80".to_string()),
                source_ips: vec!["203.0.113.7/32".parse().unwrap()],
                destination_ips: Vec::new(),
                description: None,
            }],
        })
        .unwrap();
        assert_eq!(rules["rules"][0]["source_ips"], json!(["203.0.113.7/32"]));
        assert_eq!(rules["rules"][0]["direction"], json!("in"));
    }
}

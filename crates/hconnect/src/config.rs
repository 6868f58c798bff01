//! Configuration from the process environment
//!
//! Every setting is an environment variable; each can also be passed as a
//! long flag, which is handy when running outside a container.

use clap::Parser;
use hconnect_cloud_hetzner::{DEFAULT_ENDPOINT, HetznerConfig};

use crate::error::{ConnectError, Result};
use crate::firewall::FirewallSettings;

#[derive(Parser, Debug, Clone)]
#[command(name = "hcloud-connect")]
#[command(version, about = "Keeps a node registered with Hetzner Cloud load balancers and firewalls while it runs", long_about = None)]
pub struct Config {
    /// API token (64 characters)
    #[arg(long, env = "HCLOUD_TOKEN", hide_env_values = true)]
    pub token: String,

    /// API base URL
    #[arg(long, env = "HCLOUD_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Log API requests and responses ("true" to enable)
    #[arg(long, env = "HCLOUD_DEBUG")]
    pub debug: Option<String>,

    /// Provider name of this node
    #[arg(long, env = "NODE_NAME")]
    pub node_name: String,

    /// Load balancer name or id
    #[arg(long, env = "HCLOUD_LOAD_BALANCER")]
    pub load_balancer: Option<String>,

    /// Connect the load balancer to the node over the private network
    #[arg(long, env = "HCLOUD_USE_PRIVATE_NETWORK")]
    pub use_private_network: Option<String>,

    /// Firewalls to attach the node to (comma separated names or ids)
    #[arg(long, env = "HCLOUD_FIREWALL_RESOURCE")]
    pub firewall_resource: Option<String>,

    /// Firewalls whose rules receive the node's addresses (comma separated names or ids)
    #[arg(long, env = "HCLOUD_FIREWALL_TARGETS")]
    pub firewall_targets: Option<String>,

    /// Also write the node's IPv6 network into firewall rules
    #[arg(long, env = "HCLOUD_FIREWALL_TARGETS_IPV6")]
    pub firewall_targets_ipv6: Option<String>,

    /// Give up on a locked or conflicting resource after this many attempts
    #[arg(long, env = "HCLOUD_RETRY_MAX_ATTEMPTS")]
    pub retry_max_attempts: Option<u32>,
}

/// Blank values count as unset for switches
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn flag_set(value: &Option<String>) -> bool {
    non_blank(value).is_some()
}

impl Config {
    /// Reject missing required settings before anything talks to the API
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(ConnectError::InvalidConfig(
                "HCLOUD_TOKEN is required".to_string(),
            ));
        }
        if self.node_name.trim().is_empty() {
            return Err(ConnectError::InvalidConfig(
                "NODE_NAME is required".to_string(),
            ));
        }
        if self.retry_max_attempts == Some(0) {
            return Err(ConnectError::InvalidConfig(
                "HCLOUD_RETRY_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn debug(&self) -> bool {
        non_blank(&self.debug).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn hetzner_config(&self) -> Result<HetznerConfig> {
        let config = HetznerConfig::new(self.token.trim())?
            .with_endpoint(self.endpoint.trim())?
            .with_debug(self.debug());
        Ok(config)
    }

    pub fn node_name(&self) -> &str {
        self.node_name.trim()
    }

    /// Set but blank still counts as configured and fails to resolve
    pub fn load_balancer(&self) -> Option<&str> {
        self.load_balancer.as_deref()
    }

    pub fn use_private_network(&self) -> bool {
        flag_set(&self.use_private_network)
    }

    /// Selectors are passed on as given; a blank one is not the same as unset
    pub fn firewall_settings(&self) -> FirewallSettings {
        FirewallSettings {
            resources: self.firewall_resource.clone(),
            targets: self.firewall_targets.clone(),
            inject_ipv6: self.firewall_targets.is_some()
                && flag_set(&self.firewall_targets_ipv6),
        }
    }
}

//! hcloud-connect daemon

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hconnect::signal::shutdown_signal;
use hconnect::{Config, FirewallSync, Lifecycle, LoadBalancerSync};
use hconnect_cloud::CloudApi;
use hconnect_cloud_hetzner::HetznerClient;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hconnect=debug")),
        )
        .init();

    let config = Config::parse();

    match run(config).await {
        Ok(true) => info!("hcloud-connect stopped"),
        Ok(false) => {
            error!("hcloud-connect stopped with resources left behind");
            std::process::exit(1);
        }
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether teardown cleaned up everything
async fn run(config: Config) -> anyhow::Result<bool> {
    config.validate()?;

    let client = HetznerClient::new(config.hetzner_config()?)?;
    client
        .check_connection()
        .await
        .context("failed to reach the Hetzner Cloud API")?;
    info!(
        endpoint = client.endpoint(),
        node = config.node_name(),
        version = env!("CARGO_PKG_VERSION"),
        "hcloud-connect starting"
    );

    let api: Arc<dyn CloudApi> = Arc::new(client);
    let max_attempts = config.retry_max_attempts;

    let load_balancer = LoadBalancerSync::resolve(
        api.as_ref(),
        config.load_balancer(),
        config.use_private_network(),
    )
    .await?
    .with_max_attempts(max_attempts);
    let firewall = FirewallSync::resolve(api.as_ref(), &config.firewall_settings())
        .await?
        .with_max_attempts(max_attempts);

    let mut lifecycle = Lifecycle::new(api, config.node_name(), load_balancer, firewall);
    let report = lifecycle.run(shutdown_signal()).await?;

    Ok(report.is_success())
}

use anyhow::Context;
use clusterflow_cloud::{Action, ActionType, CloudApis, HandlerRegistry, WaitConfig};
use clusterflow_cloud_scaleway::ScalewayClient;
use clusterflow_config::{ConfigOverrides, ScalewayConfig};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Resolve the Scaleway settings and build the handler registry
pub fn build_registry(
    overrides: &ConfigOverrides,
    dns_zone: Option<&str>,
    wait: WaitConfig,
    cancel: &CancellationToken,
) -> anyhow::Result<HandlerRegistry> {
    let config = ScalewayConfig::load(overrides).context("failed to resolve Scaleway settings")?;
    println!(
        "Scaleway: project {} in {} ({})",
        config.project_id.cyan(),
        config.zone.cyan(),
        config.region
    );

    debug!(api_url = %config.api_url, dns_zone = ?dns_zone, "building handler registry");

    let client = ScalewayClient::new(config).context("failed to create Scaleway client")?;
    let apis = CloudApis::from_client(Arc::new(client));
    Ok(HandlerRegistry::standard_with_cancel(
        &apis,
        dns_zone,
        wait,
        Some(cancel.clone()),
    ))
}

/// A token that is cancelled once `timeout_secs` have passed, if given
pub fn deadline_token(timeout_secs: Option<u64>, what: &'static str) -> CancellationToken {
    let token = CancellationToken::new();
    if let Some(secs) = timeout_secs {
        let deadline = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            if !deadline.is_cancelled() {
                warn!(timeout_secs = secs, "deadline reached, cancelling {}", what);
                deadline.cancel();
            }
        });
    }
    token
}

pub fn print_action(action: &Action) {
    let marker = match action.action_type {
        ActionType::Create => "+".green(),
        ActionType::Update => "~".yellow(),
        ActionType::Delete => "-".red(),
        ActionType::NoOp => "=".dimmed(),
    };
    println!("  {} {} {}", marker, action.id.cyan(), action.description);
}

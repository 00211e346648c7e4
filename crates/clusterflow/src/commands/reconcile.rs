use crate::utils;
use anyhow::Context;
use clusterflow_cloud::{ClusterReconciler, DesiredSet, WaitConfig};
use clusterflow_config::ConfigOverrides;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

pub struct ReconcileOptions {
    pub file: PathBuf,
    pub dry_run: bool,
    pub wait_timeout_secs: u64,
    pub timeout_secs: Option<u64>,
}

pub async fn handle(options: ReconcileOptions, overrides: &ConfigOverrides) -> anyhow::Result<()> {
    let file = options.file.as_path();
    let set = DesiredSet::from_file(file)
        .with_context(|| format!("failed to load cluster file {}", file.display()))?;

    println!("{}", "Reconciling cluster...".yellow());
    println!("Cluster: {}", set.cluster.cyan());
    println!(
        "{}",
        format!("Resources ({}):", set.resources.len()).bold()
    );
    for desired in set.in_creation_order() {
        println!("  • {}", desired.key().cyan());
    }
    println!();

    let dns_zone = set.dns_zone();
    let wait = WaitConfig::with_timeout(Duration::from_secs(options.wait_timeout_secs));
    let token = utils::deadline_token(options.timeout_secs, "reconcile");
    let registry = utils::build_registry(overrides, dns_zone.as_deref(), wait, &token)?;
    let reconciler = ClusterReconciler::new(registry).with_cancel(token.clone());

    if options.dry_run {
        let plan = reconciler.plan_cluster(&set).await;
        token.cancel();
        let plan = plan?;
        println!();
        println!("{}", "Plan:".bold());
        for action in &plan.actions {
            utils::print_action(action);
        }
        println!();
        println!("{}", plan.summary());
        if !plan.has_changes {
            println!("{}", "✓ Cluster is up to date".green());
        }
        return Ok(());
    }

    let report = reconciler.reconcile_cluster(&set).await;
    token.cancel();

    println!();
    for done in &report.resources {
        let changed = if done.changed.is_empty() {
            String::new()
        } else {
            format!(" ({})", done.changed.join(", "))
        };
        println!("  ✓ {} {}{}", done.key.cyan(), done.action, changed);
        for address in done.addresses() {
            println!("      {}", address.green());
        }
    }

    if let Some(err) = report.error {
        for failed in &report.applied.failed {
            println!("  ✗ {}", failed.action_id.red());
        }
        return Err(anyhow::Error::new(err).context("reconcile failed"));
    }

    println!();
    println!(
        "{}",
        format!(
            "✓ {} resources reconciled in {} ms",
            report.applied.succeeded.len(),
            report.applied.duration_ms
        )
        .green()
        .bold()
    );
    Ok(())
}

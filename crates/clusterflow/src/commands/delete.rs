use crate::utils;
use clusterflow_cloud::handlers::dns;
use clusterflow_cloud::{
    CloudError, InventoryBuilder, TeardownConfig, TeardownReport, TeardownScheduler, WaitConfig,
};
use clusterflow_config::ConfigOverrides;
use colored::Colorize;

pub struct DeleteOptions {
    pub cluster: String,
    pub yes: bool,
    pub timeout_secs: Option<u64>,
    pub dns_zone: Option<String>,
    pub concurrency: usize,
}

pub async fn handle(options: DeleteOptions, overrides: &ConfigOverrides) -> anyhow::Result<()> {
    println!("{}", "Collecting cluster resources...".yellow());
    println!("Cluster: {}", options.cluster.cyan());

    let dns_zone = options
        .dns_zone
        .clone()
        .or_else(|| dns::default_zone(&options.cluster));
    let token = utils::deadline_token(options.timeout_secs, "teardown");
    let registry = utils::build_registry(
        overrides,
        dns_zone.as_deref(),
        WaitConfig::default(),
        &token,
    )?;

    let inventory = InventoryBuilder::new(&registry)
        .build(&options.cluster)
        .await?;
    if inventory.is_empty() {
        println!("{}", "✓ Nothing to delete".green());
        return Ok(());
    }

    println!();
    println!(
        "{}",
        format!("Resources ({}):", inventory.len()).bold()
    );
    for descriptor in inventory.iter() {
        println!("  • {} {}", descriptor.key().cyan(), descriptor.name);
    }

    let scheduler = TeardownScheduler::new(
        registry,
        TeardownConfig {
            concurrency: options.concurrency,
            dry_run: !options.yes,
        },
    );

    let result = scheduler.run(inventory, Some(&token)).await;
    token.cancel();

    match result {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(CloudError::TeardownStuck(stuck)) => {
            println!();
            println!("{}", "✗ Some resources cannot be deleted:".red().bold());
            for resource in &stuck.remaining {
                println!(
                    "  • {}:{} {} (waiting for {})",
                    resource.resource_type,
                    resource.id,
                    resource.name,
                    resource
                        .unresolved
                        .iter()
                        .map(|t| t.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            Err(anyhow::anyhow!(
                "teardown of {} stuck with {} resources left",
                options.cluster,
                stuck.remaining.len()
            ))
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("teardown of {} failed", options.cluster))),
    }
}

fn print_report(report: &TeardownReport) {
    println!();
    for (i, pass) in report.passes.iter().enumerate() {
        println!("{}", format!("Pass {}:", i + 1).bold());
        for deleted in pass {
            let marker = if report.dry_run { "-" } else { "✓" };
            println!(
                "  {} {}:{} {}",
                marker,
                deleted.resource_type,
                deleted.id.cyan(),
                deleted.name
            );
        }
    }

    println!();
    if report.dry_run {
        println!(
            "{}",
            format!(
                "{} resources would be deleted. Re-run with --yes to delete them.",
                report.deleted_count()
            )
            .yellow()
        );
    } else {
        println!(
            "{}",
            format!("✓ {} resources deleted", report.deleted_count())
                .green()
                .bold()
        );
    }
}

mod commands;
mod utils;

use clap::{Args, Parser, Subcommand};
use clusterflow_config::ConfigOverrides;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cflow")]
#[command(about = "Reconcile Kubernetes cluster infrastructure on Scaleway", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    scaleway: ScalewayArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Scaleway account settings, layered over the profile file
#[derive(Args)]
struct ScalewayArgs {
    /// Profile of the Scaleway config file
    #[arg(long, env = "SCW_PROFILE", global = true)]
    profile: Option<String>,

    #[arg(long, env = "SCW_ACCESS_KEY", global = true, hide_env_values = true)]
    access_key: Option<String>,

    #[arg(long, env = "SCW_SECRET_KEY", global = true, hide_env_values = true)]
    secret_key: Option<String>,

    #[arg(long, env = "SCW_DEFAULT_PROJECT_ID", global = true)]
    project_id: Option<String>,

    /// Region for load balancers; derived from the zone when omitted
    #[arg(long, env = "SCW_DEFAULT_REGION", global = true)]
    region: Option<String>,

    /// Zone for instances, volumes and networks (e.g. fr-par-1)
    #[arg(long, env = "SCW_DEFAULT_ZONE", global = true)]
    zone: Option<String>,

    #[arg(long, env = "SCW_API_URL", global = true)]
    api_url: Option<String>,
}

impl From<ScalewayArgs> for ConfigOverrides {
    fn from(args: ScalewayArgs) -> Self {
        ConfigOverrides {
            profile: args.profile,
            access_key: args.access_key,
            secret_key: args.secret_key,
            project_id: args.project_id,
            region: args.region,
            zone: args.zone,
            api_url: args.api_url,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the resources of a cluster file
    Reconcile {
        /// Cluster file (YAML)
        #[arg(short, long, default_value = "cluster.yaml")]
        file: PathBuf,
        /// Show what would change without touching anything
        #[arg(long)]
        dry_run: bool,
        /// Seconds to wait for a resource to reach its target state
        #[arg(long, default_value = "600")]
        wait_timeout_secs: u64,
        /// Give up once this many seconds have passed
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Delete every resource owned by a cluster
    Delete {
        /// Cluster name (e.g. demo.example.com)
        #[arg(short, long)]
        cluster: String,
        /// Actually delete; without it only the deletion passes are shown
        #[arg(short, long)]
        yes: bool,
        /// Give up once this many seconds have passed
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// DNS zone holding the cluster records
        #[arg(long)]
        dns_zone: Option<String>,
        /// Deletions running at once within a pass
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },
    /// Show version information
    Version,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let overrides = ConfigOverrides::from(cli.scaleway);

    match cli.command {
        Commands::Reconcile {
            file,
            dry_run,
            wait_timeout_secs,
            timeout_secs,
        } => {
            let options = commands::reconcile::ReconcileOptions {
                file,
                dry_run,
                wait_timeout_secs,
                timeout_secs,
            };
            commands::reconcile::handle(options, &overrides).await
        }
        Commands::Delete {
            cluster,
            yes,
            timeout_secs,
            dns_zone,
            concurrency,
        } => {
            let options = commands::delete::DeleteOptions {
                cluster,
                yes,
                timeout_secs,
                dns_zone,
                concurrency,
            };
            commands::delete::handle(options, &overrides).await
        }
        Commands::Version => {
            println!("clusterflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

//! kubectl plugin for DocumentDB fleet operations
//!
//! `kubectl documentdb promote` makes a member the primary of a replicated
//! DocumentDB through the fleet hub, then waits until both the hub and the
//! target member report the change.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use documentdb_operator::promotion::{
    ControlPlane, KubeControlPlane, PromotionOutcome, PromotionRequest, WaitConfig,
    parse_duration, promote,
};

#[derive(Parser, Debug)]
#[command(name = "kubectl-documentdb", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Promote a member cluster to primary
    Promote(PromoteArgs),
}

#[derive(Args, Debug)]
struct PromoteArgs {
    /// Name of the DocumentDB resource
    #[arg(long)]
    documentdb: String,

    #[arg(long, short = 'n', default_value = "default")]
    namespace: String,

    /// Kubeconfig context of the fleet hub
    #[arg(long, env = "DOCUMENTDB_HUB_CONTEXT")]
    hub_context: String,

    /// Member cluster to promote
    #[arg(long)]
    target_cluster: String,

    /// Kubeconfig context used to verify the promotion (defaults to the target cluster name)
    #[arg(long)]
    cluster_context: Option<String>,

    /// Return once the change is submitted
    #[arg(long)]
    skip_wait: bool,

    /// Remove the current primary from the member list
    #[arg(long)]
    failover: bool,

    /// Maximum time to wait for convergence
    #[arg(long, default_value = "10m", value_parser = duration_arg)]
    wait_timeout: Duration,

    /// Delay between convergence checks
    #[arg(long, default_value = "10s", value_parser = duration_arg)]
    poll_interval: Duration,
}

fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).ok_or_else(|| format!("invalid duration {s:?}, expected e.g. 30s, 10m, 1h"))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("documentdb_operator=info")),
        )
        .with_target(false)
        .init();

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        error!("Failed to install rustls crypto provider");
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Promote(args) => run_promote(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_promote(args: PromoteArgs) -> Result<(), Box<dyn std::error::Error>> {
    let hub = KubeControlPlane::from_context(&args.hub_context).await?;

    let cluster_context = args
        .cluster_context
        .clone()
        .unwrap_or_else(|| args.target_cluster.clone());
    let secondary = if args.skip_wait {
        None
    } else {
        Some(KubeControlPlane::from_context(&cluster_context).await?)
    };

    let request = PromotionRequest {
        name: args.documentdb,
        namespace: args.namespace,
        target_primary: args.target_cluster,
        skip_wait: args.skip_wait,
        is_failover: args.failover,
        wait: WaitConfig {
            timeout: args.wait_timeout,
            poll_interval: args.poll_interval,
        },
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let outcome = promote(
        &request,
        &hub,
        secondary.as_ref().map(|s| s as &dyn ControlPlane),
        &cancel,
    )
    .await
    .inspect_err(|e| {
        if e.is_retryable() {
            warn!("Promotion is recomputed from a fresh copy on every run; rerunning is safe");
        }
    })?;

    let patch = outcome.patch();
    match &outcome {
        PromotionOutcome::Submitted { .. } => info!(
            previous = %patch.previous_primary,
            primary = %patch.primary,
            "Promotion submitted"
        ),
        PromotionOutcome::Converged { convergence, .. } => info!(
            previous = %patch.previous_primary,
            primary = %patch.primary,
            elapsed = ?convergence.elapsed,
            "Promotion complete"
        ),
    }
    if let Some(members) = patch.cluster_list.as_ref() {
        let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
        info!(members = ?names, "Removed {} from the member list", patch.previous_primary);
    }

    Ok(())
}

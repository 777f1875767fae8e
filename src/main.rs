use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kube::Client;
use kube_leader_election::{LeaseLock, LeaseLockParams};
use tokio::signal;
use tracing::{error, info, warn};

use documentdb_operator::config::OperatorConfig;
use documentdb_operator::health::{HealthState, run_health_server};
use documentdb_operator::run_controller_scoped;
use documentdb_operator::webhooks::{WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, run_webhook_server};

const LEASE_TTL_SECS: u64 = 15;
const LEASE_RENEW_INTERVAL_SECS: u64 = 5;

/// Grace period for in-flight reconciliations to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Must happen before any TLS use; a provider may already be installed
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err("Failed to install rustls crypto provider and no provider is available".into());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("documentdb_operator=info".parse()?)
                .add_directive("kube=info".parse()?)
                .add_directive("kube_leader_election=info".parse()?),
        )
        .init();

    let config = OperatorConfig::parse();
    info!(
        member = %config.member_cluster_name,
        gateway_sidecar = config.gateway_sidecar,
        "Starting documentdb-operator"
    );
    if config.member_cluster_name.is_empty() {
        warn!("MEMBER_CLUSTER_NAME not set, replicated DocumentDBs will be treated as replicas");
    }

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let pod_name = std::env::var("POD_NAME").unwrap_or_else(|_| {
        warn!("POD_NAME not set, using hostname");
        hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    });

    let health_state = Arc::new(HealthState::new());

    // Probes must answer even while not leading
    let health_handle = {
        let health_state = health_state.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state).await {
                error!("Health server error: {}", e);
            }
        })
    };

    // Admission requests are served by every replica
    let webhook_handle =
        if Path::new(WEBHOOK_CERT_PATH).exists() && Path::new(WEBHOOK_KEY_PATH).exists() {
            info!("TLS certificates found, starting webhook server");
            Some(tokio::spawn(async move {
                if let Err(e) = run_webhook_server(WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH).await {
                    error!("Webhook server error: {}", e);
                }
            }))
        } else {
            info!(
                "TLS certificates not found at {} and {}, webhook server disabled",
                WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH
            );
            None
        };

    let lease_params = || LeaseLockParams {
        holder_id: pod_name.clone(),
        lease_name: config.lease_name.clone(),
        lease_ttl: Duration::from_secs(LEASE_TTL_SECS),
    };
    let lease_lock = LeaseLock::new(client.clone(), &config.lease_namespace, lease_params());

    info!(
        lease = %config.lease_name,
        namespace = %config.lease_namespace,
        "Waiting to acquire leadership..."
    );
    loop {
        match lease_lock.try_acquire_or_renew().await {
            Ok(result) if result.acquired_lease => {
                info!("Acquired leadership");
                break;
            }
            Ok(_) => info!("Another instance is leader, waiting..."),
            Err(e) => warn!("Failed to acquire lease: {}, retrying...", e),
        }
        tokio::time::sleep(Duration::from_secs(LEASE_RENEW_INTERVAL_SECS)).await;
    }

    let lease_renewal_handle = {
        let lease_lock = LeaseLock::new(client.clone(), &config.lease_namespace, lease_params());

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(LEASE_RENEW_INTERVAL_SECS)).await;

                match lease_lock.try_acquire_or_renew().await {
                    Ok(result) if result.acquired_lease => {}
                    Ok(_) => {
                        error!("Lost leadership! Shutting down...");
                        // Kubernetes restarts the pod and it re-enters election
                        std::process::exit(1);
                    }
                    Err(e) => {
                        error!("Failed to renew lease: {}. Shutting down...", e);
                        std::process::exit(1);
                    }
                }
            }
        })
    };

    info!("Watching DocumentDB resources (apiVersion: documentdb.io/preview)");

    let controller_handle = {
        let health_state = health_state.clone();
        let controller_client = client.clone();
        let config = config.clone();
        tokio::spawn(async move {
            let namespace = config.watch_namespace.clone();
            run_controller_scoped(
                controller_client,
                config,
                Some(health_state),
                namespace.as_deref(),
            )
            .await;
        })
    };

    let webhook_future = async {
        if let Some(handle) = webhook_handle {
            if let Err(e) = handle.await {
                error!("Webhook server task panicked: {}", e);
            }
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = controller_handle => {
            if let Err(e) = result {
                error!("Controller task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        _ = webhook_future => {}
        // Renewal only returns by panicking
        Err(e) = lease_renewal_handle => {
            error!("Lease renewal task panicked: {}", e);
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            health_state.set_ready(false).await;

            info!(
                "Waiting {}s for in-flight reconciliations to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;
        }
    }

    info!("Operator stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

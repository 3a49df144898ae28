//! stateful-workload-operator - A Kubernetes operator for StatefulWorkload resources.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads configuration from the environment
//! - Creates the Kubernetes client
//! - Starts the controller and the health server

use std::sync::Arc;
use std::time::Duration;

use envconfig::Envconfig;
use kube::Client;
use tokio::signal;
use tracing::{error, info};

use stateful_workload_operator::health::{HealthState, run_health_server};
use stateful_workload_operator::{OperatorConfig, run_controller};

/// Grace period for in-flight reconciliations to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stateful_workload_operator=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!("Starting stateful-workload-operator");

    let config = OperatorConfig::init_from_env()?;
    info!(
        namespace = config.watch_namespace.as_deref().unwrap_or("cluster-wide"),
        health_port = config.health_port,
        "Loaded configuration"
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let health_state = Arc::new(HealthState::new());

    // Probes should answer before the controller starts
    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let controller_handle = {
        let health_state = health_state.clone();
        let config = config.clone();
        tokio::spawn(async move {
            run_controller(client, Some(health_state), &config).await;
        })
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
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            health_state.set_ready(false).await;
            info!("Marked operator as not ready");

            info!(
                "Waiting {}s for in-flight reconciliations to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("Operator stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Signal handler setup failures are fatal, the operator cannot shut down
/// gracefully without them.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

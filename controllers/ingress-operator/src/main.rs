//! Ingress Operator entry point

use anyhow::Context;
use ingress_operator::health::{self, HealthState, Metrics};
use ingress_operator::{Operator, OperatorConfig, scheme};
use kube::Client;
use kube_store::{KubeStore, ObjectStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Ingress Operator");

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    let config = OperatorConfig::from_env()?;
    config.log();

    let registry = Arc::new(scheme::operator_registry().context("failed to build type registry")?);
    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;
    let store: Arc<dyn ObjectStore> = Arc::new(
        KubeStore::new(client, Arc::clone(&registry))
            .await
            .context("failed to resolve API resources")?,
    );

    let metrics = Arc::new(Metrics::new()?);
    let operator = Operator::from_config(&config, store, registry, Some(Arc::clone(&metrics)))?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));
    let health = tokio::spawn(health::serve(
        config.health_addr,
        HealthState::new(operator.phase(), metrics),
        cancel.clone(),
    ));

    let result = operator.start(cancel.clone()).await;
    cancel.cancel();

    match health.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Health server exited with error"),
        Err(e) => warn!(error = %e, "Health server task failed"),
    }

    result.context("operator exited with error")?;
    info!("Ingress Operator stopped");
    Ok(())
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
    cancel.cancel();
}

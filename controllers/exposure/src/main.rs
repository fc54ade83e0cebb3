//! Exposure Controller
//!
//! Watches `ServiceExposure` resources and makes their endpoints reachable:
//! - one ClusterIP Service and one Route per endpoint (admin, internal, public)
//! - endpoint URLs derived from the admitted route hostnames, reported in the status
//! - an optional ConfigMap rendered from templates once every endpoint has a URL
//!
//! Configuration comes from environment variables, see [`config::Config`].

mod backoff;
mod config;
mod controller;
mod error;
mod metrics;
mod reconciler;
mod watcher;

use crate::config::Config;
use crate::controller::Controller;
use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install the ring crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting exposure controller");

    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Templates: {}", config.templates.display());
    info!("  Field manager: {}", config.field_manager);
    info!("  Requeue after: {:?}", config.requeue_after);
    info!("  Metrics address: {}", config.metrics_addr);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}

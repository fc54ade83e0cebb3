//! Main controller implementation.
//!
//! Wires the Kubernetes client, the exposure client, the template renderer and
//! the metrics server together and runs the ServiceExposure watcher.

use crate::config::Config;
use crate::error::ControllerError;
use crate::metrics::{self, Metrics};
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use crds::ServiceExposure;
use endpoint::KubeExposureClient;
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use std::sync::Arc;
use template_util::TemplateRenderer;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Main controller for ServiceExposure resources.
pub struct Controller {
    exposure_watcher: JoinHandle<Result<(), ControllerError>>,
    metrics_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing exposure controller");

        let kube_client = Client::try_default().await?;

        if !config.templates.is_dir() {
            warn!(
                "Template directory {} does not exist, only additional templates and custom data can be rendered",
                config.templates.display()
            );
        }

        let metrics = Metrics::new()?;
        let exposure_client = KubeExposureClient::new(kube_client.clone(), config.field_manager.clone());
        let renderer = TemplateRenderer::new(config.templates.clone());

        let (exposure_api, service_api): (Api<ServiceExposure>, Api<Service>) = match config.namespace.as_deref() {
            Some(ns) => (Api::namespaced(kube_client.clone(), ns), Api::namespaced(kube_client.clone(), ns)),
            None => (Api::all(kube_client.clone()), Api::all(kube_client.clone())),
        };

        let metrics_addr = config.metrics_addr;
        let reconciler = Arc::new(Reconciler::new(
            kube_client,
            Arc::new(exposure_client),
            renderer,
            config,
            metrics.clone(),
        ));

        let watcher = Watcher::new(reconciler, exposure_api, service_api);
        let exposure_watcher = tokio::spawn(async move { watcher.watch_service_exposures().await });
        let metrics_server = tokio::spawn(metrics::serve(metrics_addr, metrics.clone()));

        metrics.set_ready();
        info!("Exposure controller initialized");

        Ok(Self {
            exposure_watcher,
            metrics_server,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Exposure controller running");

        tokio::select! {
            result = &mut self.exposure_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("ServiceExposure watcher panicked: {}", e)))??;
            }
            result = &mut self.metrics_server => {
                result.map_err(|e| ControllerError::Watch(format!("Metrics server panicked: {}", e)))??;
                return Err(ControllerError::Watch("Metrics server exited".to_string()));
            }
        }

        self.metrics_server.abort();
        Ok(())
    }
}

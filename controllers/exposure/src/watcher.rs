//! Kubernetes resource watcher.
//!
//! Runs a `kube_runtime::Controller` over ServiceExposure resources. Services
//! created for an exposure carry its owner reference, so a Service change
//! (e.g. a cluster IP being assigned) re-triggers the owning exposure.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::ServiceExposure;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use kube::Api;
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Wait after the last event before reconciling, batching status updates
const DEBOUNCE: Duration = Duration::from_secs(1);

/// Maximum concurrent reconciliations
const CONCURRENCY: u16 = 3;

/// Watches ServiceExposure resources and the Services they own.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    exposure_api: Api<ServiceExposure>,
    service_api: Api<Service>,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(reconciler: Arc<Reconciler>, exposure_api: Api<ServiceExposure>, service_api: Api<Service>) -> Self {
        Self {
            reconciler,
            exposure_api,
            service_api,
        }
    }

    /// Starts watching ServiceExposure resources. Runs until the watch stream ends.
    pub async fn watch_service_exposures(&self) -> Result<(), ControllerError> {
        info!("Starting ServiceExposure watcher");

        let error_policy = |obj: Arc<ServiceExposure>, error: &ControllerError, ctx: Arc<Reconciler>| {
            let delay = ctx.error_backoff(&obj);
            error!(
                "Reconciliation error for ServiceExposure {}/{}: {}, retrying in {:?}",
                obj.metadata.namespace.as_deref().unwrap_or("default"),
                obj.metadata.name.as_deref().unwrap_or_default(),
                error,
                delay
            );
            Action::requeue(delay)
        };

        let reconcile = |obj: Arc<ServiceExposure>, ctx: Arc<Reconciler>| async move {
            debug!(
                "Reconciling ServiceExposure {:?} generation {:?}",
                obj.metadata.name, obj.metadata.generation
            );
            ctx.reconcile_service_exposure(&obj).await
        };

        let controller_config = ControllerConfig::default()
            .debounce(DEBOUNCE)
            .concurrency(CONCURRENCY);

        Controller::new(self.exposure_api.clone(), watcher::Config::default())
            .owns(self.service_api.clone(), watcher::Config::default())
            .with_config(controller_config)
            .shutdown_on_signal()
            .run(reconcile, error_policy, Arc::clone(&self.reconciler))
            .for_each(|res| async move {
                match res {
                    Ok((obj, _action)) => debug!("Reconciled ServiceExposure {}", obj.name),
                    Err(e) => error!("Controller error for ServiceExposure: {}", e),
                }
            })
            .await;

        info!("ServiceExposure watcher stopped");
        Ok(())
    }
}

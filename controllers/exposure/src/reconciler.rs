//! ServiceExposure reconciler
//!
//! One pass: expose every declared endpoint, render the config data once all
//! endpoints have URLs, then record the outcome in the status subresource.

use crate::backoff::ErrorBackoffs;
use crate::config::Config;
use crate::error::ControllerError;
use crate::metrics::{Metrics, ReconcileOutcome};
use crds::{ExposureState, ServiceExposure, ServiceExposureSpec, ServiceExposureStatus, TemplateKind, TemplateSpec};
use endpoint::{
    expose_endpoints, Convergence, Endpoint, EndpointData, ExposeContext, ExposeOutcome, ExposureClientTrait,
    OwnerTag,
};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, Resource};
use kube_runtime::controller::Action;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use template_util::{ParamValue, Template, TemplateParams, TemplateRenderer, TemplateType};
use tracing::{debug, error, info, warn};

/// Upper bound of the error backoff
const MAX_ERROR_BACKOFF_SECONDS: u64 = 300;

/// Suffix of the rendered ConfigMap name
const CONFIG_DATA_SUFFIX: &str = "config-data";

/// Reconciles ServiceExposure resources.
pub struct Reconciler {
    client: Client,
    exposure: Arc<dyn ExposureClientTrait>,
    renderer: TemplateRenderer,
    config: Config,
    metrics: Metrics,
    backoffs: ErrorBackoffs,
}

impl Reconciler {
    /// Creates a new reconciler.
    pub fn new(
        client: Client,
        exposure: Arc<dyn ExposureClientTrait>,
        renderer: TemplateRenderer,
        config: Config,
        metrics: Metrics,
    ) -> Self {
        let backoffs = ErrorBackoffs::new(config.requeue_after.as_secs(), MAX_ERROR_BACKOFF_SECONDS);
        Self {
            client,
            exposure,
            renderer,
            config,
            metrics,
            backoffs,
        }
    }

    /// Reconcile one ServiceExposure and decide when to look at it again.
    pub async fn reconcile_service_exposure(&self, exposure: &ServiceExposure) -> Result<Action, ControllerError> {
        let name = exposure
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| ControllerError::InvalidConfig("ServiceExposure missing name".to_string()))?;
        let namespace = exposure.metadata.namespace.as_deref().unwrap_or("default");
        let key = resource_key(namespace, name);

        info!("Reconciling ServiceExposure {}", key);

        match self.reconcile_pass(exposure, namespace, name).await {
            Ok(outcome) => {
                self.backoffs.reset(&key);
                self.metrics.record(outcome);
                Ok(next_action(outcome, self.config.requeue_after))
            }
            Err(e) => {
                self.metrics.record(ReconcileOutcome::Error);
                Err(e)
            }
        }
    }

    /// Delay before retrying a failed resource, growing with each consecutive failure.
    pub fn error_backoff(&self, exposure: &ServiceExposure) -> Duration {
        let name = exposure.metadata.name.as_deref().unwrap_or_default();
        let namespace = exposure.metadata.namespace.as_deref().unwrap_or("default");
        self.backoffs.next(&resource_key(namespace, name))
    }

    async fn reconcile_pass(
        &self,
        exposure: &ServiceExposure,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let generation = exposure.metadata.generation;

        let endpoints = match parse_endpoints(&exposure.spec) {
            Ok(endpoints) => endpoints,
            Err(e) => {
                error!("Invalid endpoints in ServiceExposure {}/{}: {}", namespace, name, e);
                let status = failed_status(BTreeMap::new(), &e, generation);
                self.update_status(exposure, namespace, name, status).await?;
                return Err(e);
            }
        };

        let owner = if exposure.spec.skip_set_owner {
            None
        } else {
            Some(OwnerTag::from_resource(exposure)?)
        };
        let mut ctx = ExposeContext::new(namespace);
        if let Some(owner) = owner.clone() {
            ctx = ctx.with_owner(owner);
        }

        let service_name = exposure.service_name();
        let outcome = expose_endpoints(
            self.exposure.as_ref(),
            &ctx,
            &service_name,
            &exposure.spec.selector,
            &endpoints,
        )
        .await;

        let ExposeOutcome { endpoints: urls, result } = outcome;
        let result = result.map_err(ControllerError::from);
        let mut status = exposure_status(urls.clone(), &result, generation);
        match result {
            Ok(Convergence::Complete) => {
                if let Some(templates) = &exposure.spec.templates {
                    match self
                        .ensure_config_data(exposure, namespace, name, templates, &urls, owner.as_ref())
                        .await
                    {
                        Ok(config_map) => status.config_map = Some(config_map),
                        Err(e) => {
                            error!("Failed to render config data for ServiceExposure {}/{}: {}", namespace, name, e);
                            let status = failed_status(urls, &e, generation);
                            self.update_status(exposure, namespace, name, status).await?;
                            return Err(e);
                        }
                    }
                }
                info!("All {} endpoints of ServiceExposure {}/{} exposed", status.endpoints.len(), namespace, name);
                self.update_status(exposure, namespace, name, status).await?;
                Ok(ReconcileOutcome::Complete)
            }
            Ok(Convergence::Requeue(_)) => {
                debug!(
                    "ServiceExposure {}/{} still converging ({} of {} endpoints), requeue in {:?}",
                    namespace,
                    name,
                    urls.len(),
                    endpoints.len(),
                    self.config.requeue_after
                );
                self.update_status(exposure, namespace, name, status).await?;
                Ok(ReconcileOutcome::Requeue)
            }
            Err(e) => {
                warn!("Exposing ServiceExposure {}/{} failed: {}", namespace, name, e);
                self.update_status(exposure, namespace, name, status).await?;
                Err(e)
            }
        }
    }

    /// Render the templates and apply the `<name>-config-data` ConfigMap. Returns its name.
    async fn ensure_config_data(
        &self,
        exposure: &ServiceExposure,
        namespace: &str,
        name: &str,
        templates: &TemplateSpec,
        endpoints: &BTreeMap<String, String>,
        owner: Option<&OwnerTag>,
    ) -> Result<String, ControllerError> {
        let template = build_template(exposure, namespace, name, templates, endpoints);
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);

        if template.template_type == TemplateType::Custom && api.get_opt(&template.name).await?.is_some() {
            debug!("Custom ConfigMap {}/{} exists, leaving it untouched", namespace, template.name);
            return Ok(template.name);
        }

        let data = self.renderer.render(&template)?;
        let config_map = build_config_map(&template, data, owner);

        let params = PatchParams::apply(&self.config.field_manager).force();
        api.patch(&template.name, &params, &Patch::Apply(&config_map)).await?;
        info!("Applied ConfigMap {}/{}", namespace, template.name);

        Ok(template.name)
    }

    /// Apply the status subresource when it differs from the observed one.
    async fn update_status(
        &self,
        exposure: &ServiceExposure,
        namespace: &str,
        name: &str,
        status: ServiceExposureStatus,
    ) -> Result<(), ControllerError> {
        if !status_changed(exposure.status.as_ref(), &status) {
            debug!("ServiceExposure {}/{} status unchanged", namespace, name);
            return Ok(());
        }

        // Server-side apply so endpoints removed from the map are also removed from the status
        let status_patch = serde_json::json!({
            "apiVersion": ServiceExposure::api_version(&()),
            "kind": ServiceExposure::kind(&()),
            "status": status,
        });

        let api: Api<ServiceExposure> = Api::namespaced(self.client.clone(), namespace);
        let params = PatchParams::apply(&self.config.field_manager).force();
        api.patch_status(name, &params, &Patch::Apply(&status_patch)).await?;

        debug!("Updated ServiceExposure {}/{} status to {:?}", namespace, name, status.state);
        Ok(())
    }
}

fn resource_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

/// Parse the endpoint keys of a spec into typed endpoints.
pub(crate) fn parse_endpoints(
    spec: &ServiceExposureSpec,
) -> Result<BTreeMap<Endpoint, EndpointData>, ControllerError> {
    spec.endpoints
        .iter()
        .map(|(key, port)| {
            let endpoint = key
                .parse::<Endpoint>()
                .map_err(|e| ControllerError::InvalidConfig(e.to_string()))?;
            Ok((endpoint, EndpointData::new(port.port, port.path.clone())))
        })
        .collect()
}

pub(crate) fn ready_status(endpoints: BTreeMap<String, String>, generation: Option<i64>) -> ServiceExposureStatus {
    ServiceExposureStatus {
        state: ExposureState::Ready,
        endpoints,
        config_map: None,
        error: None,
        observed_generation: generation,
    }
}

pub(crate) fn progressing_status(
    endpoints: BTreeMap<String, String>,
    generation: Option<i64>,
) -> ServiceExposureStatus {
    ServiceExposureStatus {
        state: ExposureState::Progressing,
        endpoints,
        config_map: None,
        error: None,
        observed_generation: generation,
    }
}

pub(crate) fn failed_status(
    endpoints: BTreeMap<String, String>,
    error: &ControllerError,
    generation: Option<i64>,
) -> ServiceExposureStatus {
    ServiceExposureStatus {
        state: ExposureState::Failed,
        endpoints,
        config_map: None,
        error: Some(error.to_string()),
        observed_generation: generation,
    }
}

/// Status recording the result of exposing the endpoints.
///
/// Endpoints that got a URL before the pass stopped are always kept.
pub(crate) fn exposure_status(
    endpoints: BTreeMap<String, String>,
    result: &Result<Convergence, ControllerError>,
    generation: Option<i64>,
) -> ServiceExposureStatus {
    match result {
        Ok(Convergence::Complete) => ready_status(endpoints, generation),
        Ok(Convergence::Requeue(_)) => progressing_status(endpoints, generation),
        Err(e) => failed_status(endpoints, e, generation),
    }
}

/// When to reconcile again after a pass that did not fail.
pub(crate) fn next_action(outcome: ReconcileOutcome, requeue_after: Duration) -> Action {
    match outcome {
        ReconcileOutcome::Requeue => Action::requeue(requeue_after),
        ReconcileOutcome::Complete | ReconcileOutcome::Error => Action::await_change(),
    }
}

pub(crate) fn status_changed(current: Option<&ServiceExposureStatus>, desired: &ServiceExposureStatus) -> bool {
    current != Some(desired)
}

pub(crate) fn template_type(kind: TemplateKind) -> TemplateType {
    match kind {
        TemplateKind::Scripts => TemplateType::Scripts,
        TemplateKind::Config => TemplateType::Config,
        TemplateKind::Custom => TemplateType::Custom,
        TemplateKind::None => TemplateType::None,
    }
}

/// Template description for the config data of an exposure.
///
/// Parameters are the template options plus `endpoints`, the endpoint name to URL
/// map. `endpoints` replaces an option of the same name.
pub(crate) fn build_template(
    exposure: &ServiceExposure,
    namespace: &str,
    name: &str,
    spec: &TemplateSpec,
    endpoints: &BTreeMap<String, String>,
) -> Template {
    let instance_type = spec
        .instance_type
        .clone()
        .unwrap_or_else(|| ServiceExposure::kind(&()).into_owned());

    let mut template = Template::new(
        format!("{}-{}", name, CONFIG_DATA_SUFFIX),
        namespace,
        template_type(spec.template_type),
        instance_type,
    );
    template.version = spec.version.clone();
    template.additional_templates = spec.additional_templates.clone();
    template.custom_data = spec.custom_data.clone();
    template.labels = exposure.spec.selector.clone();
    template.skip_set_owner = exposure.spec.skip_set_owner;

    let mut options: TemplateParams = spec
        .options
        .iter()
        .filter_map(|(k, v)| ParamValue::from_json(v.clone()).map(|v| (k.clone(), v)))
        .collect();
    options.insert("endpoints".to_string(), ParamValue::from(endpoints.clone()));
    template.options = options;

    template
}

/// Desired ConfigMap holding rendered template data.
pub(crate) fn build_config_map(
    template: &Template,
    data: BTreeMap<String, String>,
    owner: Option<&OwnerTag>,
) -> ConfigMap {
    let owner_references = owner
        .filter(|_| !template.skip_set_owner)
        .map(|owner| vec![owner.owner_reference()]);

    ConfigMap {
        metadata: ObjectMeta {
            name: Some(template.name.clone()),
            namespace: Some(template.namespace.clone()),
            labels: Some(template.labels.clone()),
            annotations: (!template.annotations.is_empty()).then(|| template.annotations.clone()),
            owner_references,
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

//! Endpoint exposure reconciliation.
//!
//! For each endpoint, in name order:
//! 1. Ensure the Service `<service>-<endpoint>` with one named port
//! 2. Ensure the Route of the same name targeting that port
//! 3. Compose the URL from the route hostname and the endpoint path
//!
//! The first endpoint that is not converged or fails stops the pass. Endpoints
//! after it are not touched; the caller re-runs the whole pass later and progress
//! is re-derived from the already-converged objects.

use crate::endpoint::{Endpoint, EndpointData};
use crate::endpoint_url::compose_url;
use crate::error::EndpointError;
use crate::exposure_trait::{ExposureClientTrait, Readiness, RouteRequest, ServiceRequest};
use crate::labels::{endpoint_labels, ExposeContext};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Protocol of every exposed Service port
pub const SERVICE_PROTOCOL: &str = "TCP";

/// A dependency is still converging; run the pass again later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetrySignal;

/// How far a pass that did not fail got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// Every endpoint has a URL
    Complete,
    /// Stopped at an endpoint that is not ready yet
    Requeue(RetrySignal),
}

/// Result of one exposure pass.
///
/// `endpoints` holds the URLs of every endpoint completed in this pass, also when
/// `result` is a requeue or an error. It is authoritative only when `result` is
/// `Ok(Convergence::Complete)`.
#[derive(Debug)]
pub struct ExposeOutcome {
    /// Endpoint name to URL
    pub endpoints: BTreeMap<String, String>,
    /// Convergence, or the error that stopped the pass
    pub result: Result<Convergence, EndpointError>,
}

impl ExposeOutcome {
    fn complete(endpoints: BTreeMap<String, String>) -> Self {
        Self {
            endpoints,
            result: Ok(Convergence::Complete),
        }
    }

    fn requeue(endpoints: BTreeMap<String, String>) -> Self {
        Self {
            endpoints,
            result: Ok(Convergence::Requeue(RetrySignal)),
        }
    }

    fn failed(endpoints: BTreeMap<String, String>, error: EndpointError) -> Self {
        Self {
            endpoints,
            result: Err(error),
        }
    }

    /// All endpoints exposed, no retry and no error
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.result, Ok(Convergence::Complete))
    }

    /// The pass stopped on a dependency that is not ready yet
    #[must_use]
    pub fn needs_requeue(&self) -> bool {
        matches!(self.result, Ok(Convergence::Requeue(_)))
    }
}

/// Expose every endpoint and collect their URLs.
///
/// Safe to call any number of times against partially created state. See the
/// module docs for the per-endpoint steps.
pub async fn expose_endpoints<C>(
    client: &C,
    ctx: &ExposeContext,
    service_name: &str,
    selector: &BTreeMap<String, String>,
    endpoints: &BTreeMap<Endpoint, EndpointData>,
) -> ExposeOutcome
where
    C: ExposureClientTrait + ?Sized,
{
    let mut endpoint_map = BTreeMap::new();

    for (endpoint, data) in endpoints {
        if let Err(e) = data.validate(*endpoint) {
            return ExposeOutcome::failed(endpoint_map, e);
        }
    }

    for (endpoint, data) in endpoints {
        match expose_endpoint(client, ctx, service_name, selector, *endpoint, data).await {
            Ok(Some(url)) => {
                endpoint_map.insert(endpoint.to_string(), url);
            }
            Ok(None) => return ExposeOutcome::requeue(endpoint_map),
            Err(e) => return ExposeOutcome::failed(endpoint_map, e),
        }
    }

    ExposeOutcome::complete(endpoint_map)
}

/// Ensure one endpoint. `Ok(None)` means not converged yet.
async fn expose_endpoint<C>(
    client: &C,
    ctx: &ExposeContext,
    service_name: &str,
    selector: &BTreeMap<String, String>,
    endpoint: Endpoint,
    data: &EndpointData,
) -> Result<Option<String>, EndpointError>
where
    C: ExposureClientTrait + ?Sized,
{
    let endpoint_name = endpoint.resource_name(service_name);
    let export_labels = endpoint_labels(selector, endpoint);

    let service = ServiceRequest {
        name: endpoint_name.clone(),
        namespace: ctx.namespace.clone(),
        labels: export_labels.clone(),
        selector: selector.clone(),
        port_name: endpoint_name.clone(),
        port: data.port,
        protocol: SERVICE_PROTOCOL.to_string(),
        owner: ctx.owner.clone(),
    };

    debug!("Ensuring Service {}/{} on port {}", ctx.namespace, endpoint_name, data.port);
    let readiness = client
        .ensure_service(&service)
        .await
        .map_err(|source| EndpointError::Service {
            name: endpoint_name.clone(),
            source,
        })?;
    if readiness == Readiness::Pending {
        warn!("Service {}/{} not ready yet, will requeue", ctx.namespace, endpoint_name);
        return Ok(None);
    }

    // TODO: TLS termination once routes carry certificates
    let route = RouteRequest {
        name: endpoint_name.clone(),
        namespace: ctx.namespace.clone(),
        labels: export_labels,
        service_name: endpoint_name.clone(),
        target_port_name: endpoint_name.clone(),
        owner: ctx.owner.clone(),
    };

    debug!("Ensuring Route {}/{}", ctx.namespace, endpoint_name);
    let route_state = client
        .ensure_route(&route)
        .await
        .map_err(|source| EndpointError::Route {
            name: endpoint_name.clone(),
            source,
        })?;
    if route_state.readiness == Readiness::Pending {
        warn!("Route {}/{} not ready yet, will requeue", ctx.namespace, endpoint_name);
        return Ok(None);
    }

    let Some(hostname) = route_state.hostname.filter(|h| !h.is_empty()) else {
        warn!("Route {}/{} has no hostname assigned yet, will requeue", ctx.namespace, endpoint_name);
        return Ok(None);
    };

    let url = compose_url(&hostname, &data.path).map_err(|source| EndpointError::Url {
        endpoint: endpoint.to_string(),
        hostname: hostname.clone(),
        source,
    })?;

    info!("Exposed {} endpoint {}/{} at {}", endpoint, ctx.namespace, endpoint_name, url);
    Ok(Some(url))
}

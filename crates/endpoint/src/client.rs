//! Kubernetes-backed create-or-patch for Services and Routes.
//!
//! Objects are written with server-side apply under a fixed field manager.
//! Re-applying an unchanged object is a no-op on the API server, which is what
//! makes repeated exposure passes write-free once converged.

use crate::error::ClientError;
use crate::exposure_trait::{ExposureClientTrait, Readiness, RouteRequest, RouteState, ServiceRequest};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{Api, ApiResource, DynamicObject, Patch, PatchParams};
use kube::core::GroupVersionKind;
use kube::Client;
use serde_json::{json, Value};
use tracing::debug;

/// API group of OpenShift routes
pub const ROUTE_GROUP: &str = "route.openshift.io";
/// API version of OpenShift routes
pub const ROUTE_VERSION: &str = "v1";
/// Kind of OpenShift routes
pub const ROUTE_KIND: &str = "Route";

/// Exposure client talking to the Kubernetes API server.
#[derive(Clone)]
pub struct KubeExposureClient {
    client: Client,
    field_manager: String,
}

impl std::fmt::Debug for KubeExposureClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeExposureClient")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl KubeExposureClient {
    /// Create a client applying objects as `field_manager`
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    /// API resource description of the Route kind
    #[must_use]
    pub fn route_resource() -> ApiResource {
        ApiResource::from_gvk(&GroupVersionKind::gvk(ROUTE_GROUP, ROUTE_VERSION, ROUTE_KIND))
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams::apply(&self.field_manager).force()
    }
}

/// Desired Service object for a request
pub(crate) fn build_service(request: &ServiceRequest) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(request.name.clone()),
            namespace: Some(request.namespace.clone()),
            labels: Some(request.labels.clone()),
            owner_references: request.owner.as_ref().map(|o| vec![o.owner_reference()]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(request.selector.clone()),
            ports: Some(vec![ServicePort {
                name: Some(request.port_name.clone()),
                port: request.port,
                protocol: Some(request.protocol.clone()),
                target_port: Some(IntOrString::Int(request.port)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A ClusterIP Service is usable once the API server allocated its address.
pub(crate) fn service_readiness(service: &Service) -> Readiness {
    let allocated = service
        .spec
        .as_ref()
        .and_then(|spec| spec.cluster_ip.as_deref())
        .is_some_and(|ip| !ip.is_empty());
    if allocated {
        Readiness::Ready
    } else {
        Readiness::Pending
    }
}

/// Desired Route object for a request
pub(crate) fn build_route(request: &RouteRequest) -> DynamicObject {
    let mut route = DynamicObject::new(&request.name, &KubeExposureClient::route_resource())
        .within(&request.namespace)
        .data(json!({
            "spec": {
                "to": {
                    "kind": "Service",
                    "name": request.service_name,
                },
                "port": {
                    "targetPort": request.target_port_name,
                },
            }
        }));
    route.metadata.labels = Some(request.labels.clone());
    route.metadata.owner_references = request.owner.as_ref().map(|o| vec![o.owner_reference()]);
    route
}

fn condition_is(ingress: &Value, condition_type: &str, status: &str) -> bool {
    ingress
        .get("conditions")
        .and_then(Value::as_array)
        .is_some_and(|conditions| {
            conditions.iter().any(|c| {
                c.get("type").and_then(Value::as_str) == Some(condition_type)
                    && c.get("status").and_then(Value::as_str) == Some(status)
            })
        })
}

/// Read the hostname of an applied Route.
///
/// Prefers the host of the first router that admitted the route and falls back
/// to `spec.host`. A route rejected by every router is a conflict.
pub(crate) fn route_state(route: &DynamicObject) -> Result<RouteState, ClientError> {
    let ingresses = route
        .data
        .pointer("/status/ingress")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let admitted_host = ingresses
        .iter()
        .find(|ingress| condition_is(ingress, "Admitted", "True"))
        .and_then(|ingress| ingress.get("host"))
        .and_then(Value::as_str);

    if admitted_host.is_none()
        && !ingresses.is_empty()
        && ingresses.iter().all(|ingress| condition_is(ingress, "Admitted", "False"))
    {
        let name = route.metadata.name.as_deref().unwrap_or_default();
        return Err(ClientError::Conflict(format!("Route {} was rejected by all routers", name)));
    }

    let hostname = admitted_host
        .or_else(|| route.data.pointer("/spec/host").and_then(Value::as_str))
        .filter(|host| !host.is_empty())
        .map(str::to_string);

    let readiness = if hostname.is_some() {
        Readiness::Ready
    } else {
        Readiness::Pending
    };
    Ok(RouteState { readiness, hostname })
}

#[async_trait]
impl ExposureClientTrait for KubeExposureClient {
    async fn ensure_service(&self, request: &ServiceRequest) -> Result<Readiness, ClientError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), &request.namespace);
        let desired = build_service(request);

        let applied = api
            .patch(&request.name, &self.patch_params(), &Patch::Apply(&desired))
            .await?;
        debug!(
            "Applied Service {}/{} (resourceVersion {:?})",
            request.namespace, request.name, applied.metadata.resource_version
        );
        Ok(service_readiness(&applied))
    }

    async fn ensure_route(&self, request: &RouteRequest) -> Result<RouteState, ClientError> {
        let ar = Self::route_resource();
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), &request.namespace, &ar);
        let desired = build_route(request);

        let applied = api
            .patch(&request.name, &self.patch_params(), &Patch::Apply(&desired))
            .await?;
        debug!(
            "Applied Route {}/{} (resourceVersion {:?})",
            request.namespace, request.name, applied.metadata.resource_version
        );
        route_state(&applied)
    }
}

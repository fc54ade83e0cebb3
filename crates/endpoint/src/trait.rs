//! ExposureClient trait for mocking
//!
//! This trait abstracts the create-or-patch primitives for Services and Routes.
//! `KubeExposureClient` implements it against the API server, tests use
//! `MockExposureClient`.

use crate::error::ClientError;
use crate::labels::OwnerTag;
use std::collections::BTreeMap;

/// Whether a written object has converged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Written and converged
    Ready,
    /// Written, still converging; ask again later
    Pending,
}

/// Desired state of an endpoint's Service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRequest {
    /// Service name
    pub name: String,
    /// Namespace
    pub namespace: String,
    /// Labels on the Service object
    pub labels: BTreeMap<String, String>,
    /// Pod selector
    pub selector: BTreeMap<String, String>,
    /// Name of the single Service port
    pub port_name: String,
    /// Port number
    pub port: i32,
    /// Port protocol, e.g. `TCP`
    pub protocol: String,
    /// Owner for cascading deletion
    pub owner: Option<OwnerTag>,
}

/// Desired state of an endpoint's Route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequest {
    /// Route name
    pub name: String,
    /// Namespace
    pub namespace: String,
    /// Labels on the Route object
    pub labels: BTreeMap<String, String>,
    /// Service the route sends traffic to
    pub service_name: String,
    /// Named Service port the route targets
    pub target_port_name: String,
    /// Owner for cascading deletion
    pub owner: Option<OwnerTag>,
}

/// Observed state of a Route after it was ensured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteState {
    /// Convergence of the route object itself
    pub readiness: Readiness,
    /// Hostname assigned by the router, if any yet
    pub hostname: Option<String>,
}

/// Trait for Service/Route create-or-patch operations
///
/// Both calls must be idempotent: repeating them with the same request against
/// converged state performs no writes.
#[async_trait::async_trait]
pub trait ExposureClientTrait: Send + Sync {
    /// Create the Service, or patch it if its spec drifted
    async fn ensure_service(&self, request: &ServiceRequest) -> Result<Readiness, ClientError>;

    /// Create the Route, or patch it if its spec drifted
    async fn ensure_route(&self, request: &RouteRequest) -> Result<RouteState, ClientError>;
}

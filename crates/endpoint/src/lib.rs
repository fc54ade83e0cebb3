//! Endpoint exposure
//!
//! Makes a workload's endpoints (admin, internal, public) reachable from
//! outside the cluster and derives a stable external URL for each one.
//!
//! For every declared endpoint a `Service` and a `Route` named
//! `<service>-<endpoint>` are ensured, then the route's hostname is turned
//! into a URL. The operation is level-triggered: call it again until it
//! reports [`Convergence::Complete`].
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use endpoint::{expose_endpoints, Convergence, Endpoint, EndpointData, ExposeContext, KubeExposureClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeExposureClient::new(kube::Client::try_default().await?, "my-operator");
//! let ctx = ExposeContext::new("openstack");
//!
//! let selector = BTreeMap::from([("service".to_string(), "keystone".to_string())]);
//! let endpoints = BTreeMap::from([
//!     (Endpoint::Admin, EndpointData::new(35357, "")),
//!     (Endpoint::Public, EndpointData::new(5000, "/v3")),
//! ]);
//!
//! let outcome = expose_endpoints(&client, &ctx, "keystone", &selector, &endpoints).await;
//! match outcome.result {
//!     Ok(Convergence::Complete) => println!("endpoints: {:?}", outcome.endpoints),
//!     Ok(Convergence::Requeue(_)) => println!("not converged yet, try again later"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Deterministic order**: endpoints are processed sorted by name
//! - **Partial results**: endpoints completed before an error or requeue are returned
//! - **Server-side apply**: the kube client writes Services and Routes idempotently
//! - **Mocking**: `MockExposureClient` behind the `test-util` feature

pub mod client;
pub mod endpoint;
pub mod error;
pub mod expose;
pub mod labels;
#[path = "trait.rs"]
pub mod exposure_trait;
pub mod endpoint_url;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::KubeExposureClient;
pub use endpoint::{Endpoint, EndpointData};
pub use error::{ClientError, EndpointError};
pub use expose::{expose_endpoints, Convergence, ExposeOutcome, RetrySignal};
pub use exposure_trait::{ExposureClientTrait, Readiness, RouteRequest, RouteState, ServiceRequest};
pub use labels::{endpoint_labels, merge_string_maps, ExposeContext, OwnerTag};
pub use endpoint_url::compose_url;
#[cfg(feature = "test-util")]
pub use mock::MockExposureClient;

//! Controller-specific error types.
//!
//! Wraps the errors of the exposure, templating and Kubernetes layers so the
//! reconciler can return a single type to `kube_runtime`.

use endpoint::EndpointError;
use kube::Error as KubeError;
use template_util::TemplateError;
use thiserror::Error;

/// Errors that can occur in the exposure controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Exposing an endpoint failed
    #[error("Endpoint exposure failed: {0}")]
    Endpoint(#[from] EndpointError),

    /// Rendering config templates failed
    #[error("Template rendering failed: {0}")]
    Template(#[from] TemplateError),

    /// Invalid configuration, in the environment or in a resource spec
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Health and metrics server failed
    #[error("Health server error: {0}")]
    Server(#[from] std::io::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

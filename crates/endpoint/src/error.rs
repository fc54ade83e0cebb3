//! Endpoint exposure errors

use thiserror::Error;

/// Errors returned by an [`ExposureClientTrait`](crate::ExposureClientTrait) implementation
/// when a Service or Route could not be written.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The existing object conflicts with the desired spec and cannot be patched
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Errors that abort an exposure pass.
///
/// A "not ready yet" dependency is never an error; it is reported through
/// [`Convergence::Requeue`](crate::Convergence::Requeue).
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Unknown endpoint name
    #[error("Unknown endpoint type: {0}")]
    UnknownEndpoint(String),

    /// Port outside 1-65535
    #[error("Invalid port {port} for {endpoint} endpoint")]
    InvalidPort {
        /// Endpoint the port was declared for
        endpoint: String,
        /// Offending port
        port: i32,
    },

    /// Owner resource is missing the metadata needed for an owner reference
    #[error("Invalid owner: {0}")]
    InvalidOwner(String),

    /// Creating or patching the Service failed
    #[error("Failed to ensure Service {name}: {source}")]
    Service {
        /// Service name
        name: String,
        /// Underlying client error
        #[source]
        source: ClientError,
    },

    /// Creating or patching the Route failed
    #[error("Failed to ensure Route {name}: {source}")]
    Route {
        /// Route name
        name: String,
        /// Underlying client error
        #[source]
        source: ClientError,
    },

    /// The route hostname does not form a valid URL
    #[error("Invalid URL for {endpoint} endpoint from hostname '{hostname}': {source}")]
    Url {
        /// Endpoint being composed
        endpoint: String,
        /// Hostname reported by the route
        hostname: String,
        /// Parser error
        #[source]
        source: url::ParseError,
    },
}

//! Endpoint types and per-endpoint exposure data

use crate::error::EndpointError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Named flavour of external access to a workload.
///
/// The value only namespaces resource names and result keys; it says nothing
/// about protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// Admin endpoint
    Admin,
    /// Internal endpoint
    Internal,
    /// Public endpoint
    Public,
}

impl Endpoint {
    /// All known endpoint types, in name order
    pub const ALL: [Endpoint; 3] = [Endpoint::Admin, Endpoint::Internal, Endpoint::Public];

    /// Lowercase name used in labels, resource names and result keys
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Admin => "admin",
            Endpoint::Internal => "internal",
            Endpoint::Public => "public",
        }
    }

    /// Name of the Service/Route pair for this endpoint: `<prefix>-<endpoint>`
    #[must_use]
    pub fn resource_name(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.as_str())
    }
}

// Ordered by name so maps keyed by Endpoint iterate deterministically.
impl Ord for Endpoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for Endpoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EndpointError::UnknownEndpoint(s.to_string()))
    }
}

/// Port and optional path suffix for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointData {
    /// Port exposed by the Service
    pub port: i32,

    /// Suffix appended to the route URL as-is. May contain placeholders such as
    /// `%(project_id)s` and is never escaped.
    #[serde(default)]
    pub path: String,
}

impl EndpointData {
    /// Create endpoint data from a port and path suffix
    pub fn new(port: i32, path: impl Into<String>) -> Self {
        Self {
            port,
            path: path.into(),
        }
    }

    /// Check that the port is usable as a Service port
    pub fn validate(&self, endpoint: Endpoint) -> Result<(), EndpointError> {
        if (1..=65535).contains(&self.port) {
            Ok(())
        } else {
            Err(EndpointError::InvalidPort {
                endpoint: endpoint.to_string(),
                port: self.port,
            })
        }
    }
}

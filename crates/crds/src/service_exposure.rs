//! ServiceExposure CRD
//!
//! Declares the named network endpoints (admin, internal, public) of a
//! workload. The controller creates one Service and one Route per endpoint
//! and reports the resulting URLs in the status.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Desired endpoints of a workload and the config data rendered from their URLs
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "endpoints.microscaler.io",
    version = "v1alpha1",
    kind = "ServiceExposure",
    namespaced,
    status = "ServiceExposureStatus",
    shortname = "sexp",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExposureSpec {
    /// Base name for the generated Services and Routes (`<serviceName>-<endpoint>`).
    /// Defaults to the resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    /// Pod selector, also used as the base label set of every generated object
    #[serde(default)]
    pub selector: BTreeMap<String, String>,

    /// Endpoints to expose, keyed by endpoint name (`admin`, `internal`, `public`)
    pub endpoints: BTreeMap<String, EndpointPort>,

    /// Do not set an owner reference on generated objects
    #[serde(default)]
    pub skip_set_owner: bool,

    /// Config files rendered once all endpoints are exposed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates: Option<TemplateSpec>,
}

/// Port and URL path of one endpoint
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointPort {
    /// Service port, also used as the target port
    pub port: i32,

    /// Path appended verbatim to the endpoint URL, e.g. `/v3`
    #[serde(default)]
    pub path: String,
}

/// Templates rendered into the `<name>-config-data` ConfigMap
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSpec {
    /// Template directory type
    #[serde(default)]
    pub template_type: TemplateKind,

    /// Kind whose template directory is rendered. Defaults to `ServiceExposure`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,

    /// Version subdirectory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// File name to template path relative to the template base directory.
    /// Paths leaving the base directory are rejected.
    #[serde(default)]
    pub additional_templates: BTreeMap<String, String>,

    /// File name to literal content
    #[serde(default)]
    pub custom_data: BTreeMap<String, String>,

    /// Extra template parameters
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub options: BTreeMap<String, serde_json::Value>,
}

/// Template directory type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// Scripts
    #[serde(rename = "bin")]
    Scripts,
    /// Configuration files
    #[default]
    Config,
    /// User-owned configuration, created once and never overwritten
    Custom,
    /// Only additional templates and custom data
    None,
}

fn preserve_unknown_fields(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true
    })
}

/// Observed state of a ServiceExposure, written by the controller
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExposureStatus {
    /// Current state of the exposure
    pub state: ExposureState,

    /// Endpoint name to URL, for every endpoint exposed so far
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,

    /// Name of the rendered ConfigMap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<String>,

    /// Error message if reconciliation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Generation the status was computed for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Exposure reconciliation state
///
/// Serializes as PascalCase ("Ready", "Failed", etc.) but also accepts
/// lowercase on deserialization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum ExposureState {
    /// Not reconciled yet
    #[default]
    #[serde(alias = "pending")]
    Pending,
    /// Some endpoints are still waiting for a Service or hostname
    #[serde(alias = "progressing")]
    Progressing,
    /// Every endpoint has a URL
    #[serde(alias = "ready")]
    Ready,
    /// The last pass failed, see the status error
    #[serde(alias = "failed")]
    Failed,
}

impl ServiceExposure {
    /// Base name of the generated objects
    #[must_use]
    pub fn service_name(&self) -> String {
        self.spec
            .service_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.metadata.name.clone().unwrap_or_default())
    }
}

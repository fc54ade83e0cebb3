//! Template descriptions and typed template parameters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of template set, which is also the name of its directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    /// Scripts, mounted executable (`bin`)
    #[serde(rename = "bin")]
    Scripts,
    /// Configuration files (`config`)
    #[default]
    Config,
    /// User-owned configuration: created once, never overwritten (`custom`)
    Custom,
    /// No template directory, only additional templates and custom data
    None,
}

impl TemplateType {
    /// Directory name below `<base>/<kind>/`
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Scripts => "bin",
            TemplateType::Config => "config",
            TemplateType::Custom => "custom",
            TemplateType::None => "none",
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single template parameter.
///
/// Parameters are limited to JSON-like values so templates stay type-checked
/// at the boundary while keeping nested structure (lists, maps) available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// String
    String(String),
    /// List of values
    List(Vec<ParamValue>),
    /// Nested map
    Map(BTreeMap<String, ParamValue>),
}

/// Parameters passed to every template of a [`Template`]
pub type TemplateParams = BTreeMap<String, ParamValue>;

impl ParamValue {
    /// Convert a JSON value. `null` has no parameter representation and yields `None`;
    /// nulls nested in arrays or objects are dropped.
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(ParamValue::Bool(b)),
            Value::Number(n) => n
                .as_i64()
                .map(ParamValue::Int)
                .or_else(|| n.as_f64().map(ParamValue::Float)),
            Value::String(s) => Some(ParamValue::String(s)),
            Value::Array(items) => Some(ParamValue::List(
                items.into_iter().filter_map(ParamValue::from_json).collect(),
            )),
            Value::Object(map) => Some(ParamValue::Map(
                map.into_iter()
                    .filter_map(|(k, v)| ParamValue::from_json(v).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl<V: Into<ParamValue>> From<Vec<V>> for ParamValue {
    fn from(value: Vec<V>) -> Self {
        ParamValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<ParamValue>> From<BTreeMap<String, V>> for ParamValue {
    fn from(value: BTreeMap<String, V>) -> Self {
        ParamValue::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// A set of templates rendered into one ConfigMap or Secret.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    /// Name of the resulting ConfigMap/Secret
    pub name: String,
    /// Namespace of the resulting ConfigMap/Secret
    pub namespace: String,
    /// Which template directory to render
    pub template_type: TemplateType,
    /// Custom resource kind; its lowercase form selects the template directory
    pub instance_type: String,
    /// Optional version subdirectory, e.g. `18.0`
    pub version: Option<String>,
    /// Output file name to template path relative to the base path, for templates
    /// shared between kinds
    pub additional_templates: BTreeMap<String, String>,
    /// Output file name to content, added without rendering
    pub custom_data: BTreeMap<String, String>,
    /// Labels for the resulting object
    pub labels: BTreeMap<String, String>,
    /// Annotations for the resulting object
    pub annotations: BTreeMap<String, String>,
    /// Parameters available to every template
    pub options: TemplateParams,
    /// Do not set an owner reference on the resulting object
    pub skip_set_owner: bool,
}

impl Template {
    /// Template with no additional files, custom data or options
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        template_type: TemplateType,
        instance_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            template_type,
            instance_type: instance_type.into(),
            ..Default::default()
        }
    }
}

//! Labels, ownership and the namespace context an exposure pass runs in.

use crate::endpoint::Endpoint;
use crate::error::EndpointError;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use std::collections::BTreeMap;

/// Union of two label maps. Keys present in both take the value from `overlay`.
#[must_use]
pub fn merge_string_maps(
    base: &BTreeMap<String, String>,
    overlay: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = base.clone();
    merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Labels for an endpoint's Service and Route: the selector plus `<endpoint>: "true"`.
#[must_use]
pub fn endpoint_labels(selector: &BTreeMap<String, String>, endpoint: Endpoint) -> BTreeMap<String, String> {
    let flag = BTreeMap::from([(endpoint.as_str().to_string(), "true".to_string())]);
    merge_string_maps(selector, &flag)
}

/// Marks a created object as belonging to a parent resource.
///
/// Only used for cascading deletion; nothing walks back from a child to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerTag {
    /// API version of the owner, e.g. `endpoints.microscaler.io/v1alpha1`
    pub api_version: String,
    /// Kind of the owner
    pub kind: String,
    /// Name of the owner
    pub name: String,
    /// UID of the owner
    pub uid: String,
}

impl OwnerTag {
    /// Build an owner tag from any Kubernetes object with a static type.
    pub fn from_resource<K>(owner: &K) -> Result<Self, EndpointError>
    where
        K: Resource<DynamicType = ()>,
    {
        let meta = owner.meta();
        let name = meta
            .name
            .clone()
            .ok_or_else(|| EndpointError::InvalidOwner(format!("{} has no name", K::kind(&()))))?;
        let uid = meta
            .uid
            .clone()
            .ok_or_else(|| EndpointError::InvalidOwner(format!("{} {} has no uid", K::kind(&()), name)))?;

        Ok(Self {
            api_version: K::api_version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
            name,
            uid,
        })
    }

    /// Controller owner reference for the tagged object
    #[must_use]
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
            uid: self.uid.clone(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }
}

/// Where the exposed objects live and who owns them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposeContext {
    /// Namespace for the Services and Routes
    pub namespace: String,
    /// Owner of the created objects; `None` skips setting ownership
    pub owner: Option<OwnerTag>,
}

impl ExposeContext {
    /// Context without an owner
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            owner: None,
        }
    }

    /// Context whose created objects are garbage-collected with `owner`
    #[must_use]
    pub fn with_owner(mut self, owner: OwnerTag) -> Self {
        self.owner = Some(owner);
        self
    }
}

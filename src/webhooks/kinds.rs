//! Supported resource kinds.
//!
//! The set of kinds is closed and known at compile time. A [`KindRegistry`] is
//! built once at startup from a subset of them and shared read-only between
//! requests; handlers use it to type-check a call and decode its object.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;

use crate::webhooks::admission::GroupVersionResource;

/// Resource kinds this webhook knows how to decode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Pod,
    Deployment,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Pod, ResourceKind::Deployment];

    /// The group/version/resource the API server sends for this kind
    pub fn gvr(&self) -> GroupVersionResource {
        match self {
            ResourceKind::Pod => GroupVersionResource::new("", "v1", "pods"),
            ResourceKind::Deployment => GroupVersionResource::new("apps", "v1", "deployments"),
        }
    }

    /// Decode a raw object into this kind and return its metadata.
    ///
    /// The full typed shape is decoded so a structurally invalid object is
    /// rejected even when its metadata alone would parse.
    pub fn decode_metadata(&self, raw: &Value) -> Result<ObjectMeta, serde_json::Error> {
        match self {
            ResourceKind::Pod => {
                serde_json::from_value::<Pod>(raw.clone()).map(|pod| pod.metadata)
            }
            ResourceKind::Deployment => {
                serde_json::from_value::<Deployment>(raw.clone()).map(|d| d.metadata)
            }
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Pod => f.write_str("Pod"),
            ResourceKind::Deployment => f.write_str("Deployment"),
        }
    }
}

/// Immutable mapping from resource triple to kind
#[derive(Clone, Debug, Default)]
pub struct KindRegistry {
    kinds: BTreeMap<GroupVersionResource, ResourceKind>,
}

impl KindRegistry {
    pub fn new(kinds: impl IntoIterator<Item = ResourceKind>) -> Self {
        Self {
            kinds: kinds.into_iter().map(|kind| (kind.gvr(), kind)).collect(),
        }
    }

    /// Registry containing every known kind
    pub fn all() -> Self {
        Self::new(ResourceKind::ALL)
    }

    pub fn resolve(&self, gvr: &GroupVersionResource) -> Option<ResourceKind> {
        self.kinds.get(gvr).copied()
    }
}

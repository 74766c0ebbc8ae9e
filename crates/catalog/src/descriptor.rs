use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kubeui_core::ResourceId;
use serde::{Deserialize, Serialize};

use crate::store::CatalogEntry;

pub const DESCRIPTOR_KIND: &str = "ResourceDescriptor";

/// A column shown for a resource, read by JSON pointer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceColumn {
    pub name: String,
    #[serde(rename = "type", default = "string_type")]
    pub type_: String,
    pub pointer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub priority: i32,
}

fn string_type() -> String { "string".to_string() }

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Icon {
    pub src: String,
    #[serde(rename = "type", default)]
    pub type_: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptorSpec {
    pub resource: ResourceId,
    #[serde(default)]
    pub columns: Vec<ResourceColumn>,
    #[serde(default)]
    pub icons: Vec<Icon>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ResourceDescriptorSpec,
}

static NO_LABELS: BTreeMap<String, String> = BTreeMap::new();

impl CatalogEntry for ResourceDescriptor {
    fn name(&self) -> &str { self.metadata.name.as_deref().unwrap_or_default() }
    fn labels(&self) -> &BTreeMap<String, String> { self.metadata.labels.as_ref().unwrap_or(&NO_LABELS) }
}

impl ResourceDescriptor {
    /// Whether this descriptor describes `group`/`kind` (`core` stands for the empty group).
    pub fn describes(&self, group: &str, kind: &str) -> bool {
        let g = if group == "core" { "" } else { group };
        self.spec.resource.group == g && self.spec.resource.kind == kind
    }
}

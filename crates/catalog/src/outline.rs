use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kubeui_core::ResourceId;
use serde::{Deserialize, Serialize};

use crate::store::CatalogEntry;

pub const OUTLINE_KIND: &str = "ResourceOutline";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum BlockKind {
    #[default]
    Block,
    #[serde(rename = "Self")]
    SelfBlock,
    SubTable,
    Connection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupKind {
    #[serde(default)]
    pub group: String,
    pub kind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageBlockOutline {
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field_path: String,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<GroupKind>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionOutline {
    pub name: String,
    #[serde(default)]
    pub blocks: Vec<PageBlockOutline>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageOutline {
    pub name: String,
    #[serde(default)]
    pub sections: Vec<SectionOutline>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOutlineSpec {
    pub resource: ResourceId,
    #[serde(default)]
    pub default_layout: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<PageBlockOutline>,
    #[serde(default)]
    pub pages: Vec<PageOutline>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOutline {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ResourceOutlineSpec,
}

static NO_LABELS: BTreeMap<String, String> = BTreeMap::new();

impl CatalogEntry for ResourceOutline {
    fn name(&self) -> &str { self.metadata.name.as_deref().unwrap_or_default() }
    fn labels(&self) -> &BTreeMap<String, String> { self.metadata.labels.as_ref().unwrap_or(&NO_LABELS) }
}

//! Materialize a `ResourceLayout` from an outline by resolving every block
//! reference through the descriptor catalog.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kubeui_core::ResourceId;
use serde::{Deserialize, Serialize};

use crate::descriptor::{ResourceColumn, ResourceDescriptor};
use crate::outline::{BlockKind, PageBlockOutline, ResourceOutline};
use crate::store::{Catalog, CatalogEntry};
use crate::{CatalogError, API_VERSION};

pub const LAYOUT_KIND: &str = "ResourceLayout";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageBlockLayout {
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ResourceColumn>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionLayout {
    pub name: String,
    pub blocks: Vec<PageBlockLayout>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageLayout {
    pub name: String,
    pub sections: Vec<SectionLayout>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLayoutSpec {
    pub resource: ResourceId,
    #[serde(default)]
    pub default_layout: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<PageBlockLayout>,
    pub pages: Vec<PageLayout>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLayout {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ResourceLayoutSpec,
}

fn find<'c>(descriptors: &'c Catalog<ResourceDescriptor>, group: &str, kind: &str) -> Option<&'c ResourceDescriptor> {
    descriptors.list().iter().find(|d| d.describes(group, kind))
}

fn resolve_block(
    outline: &ResourceOutline,
    block: &PageBlockOutline,
    descriptors: &Catalog<ResourceDescriptor>,
) -> Result<PageBlockLayout, CatalogError> {
    let mut out = PageBlockLayout { kind: block.kind, name: block.name.clone(), field_path: block.field_path.clone(), ..Default::default() };
    match (&block.reference, block.kind) {
        (Some(r), _) => {
            let d = find(descriptors, &r.group, &r.kind).ok_or_else(|| CatalogError::Unresolved {
                outline: outline.name().to_string(),
                group: r.group.clone(),
                kind: r.kind.clone(),
            })?;
            out.resource = Some(d.spec.resource.clone());
            out.columns = d.spec.columns.clone();
        }
        (None, BlockKind::SelfBlock) => {
            let own = &outline.spec.resource;
            out.resource = Some(own.clone());
            out.columns = find(descriptors, &own.group, &own.kind).map(|d| d.spec.columns.clone()).unwrap_or_default();
        }
        (None, BlockKind::Block) => {}
        (None, BlockKind::SubTable | BlockKind::Connection) => {
            return Err(CatalogError::MissingRef { outline: outline.name().to_string(), block: block.name.clone() });
        }
    }
    Ok(out)
}

pub fn layout_from_outline(outline: &ResourceOutline, descriptors: &Catalog<ResourceDescriptor>) -> Result<ResourceLayout, CatalogError> {
    let header = outline.spec.header.as_ref().map(|h| resolve_block(outline, h, descriptors)).transpose()?;
    let mut pages = Vec::with_capacity(outline.spec.pages.len());
    for page in outline.spec.pages.iter() {
        let mut sections = Vec::with_capacity(page.sections.len());
        for section in page.sections.iter() {
            let blocks = section.blocks.iter().map(|b| resolve_block(outline, b, descriptors)).collect::<Result<Vec<_>, _>>()?;
            sections.push(SectionLayout { name: section.name.clone(), blocks });
        }
        pages.push(PageLayout { name: page.name.clone(), sections });
    }
    Ok(ResourceLayout {
        api_version: API_VERSION.to_string(),
        kind: LAYOUT_KIND.to_string(),
        metadata: ObjectMeta {
            name: outline.metadata.name.clone(),
            labels: outline.metadata.labels.clone(),
            ..Default::default()
        },
        spec: ResourceLayoutSpec {
            resource: outline.spec.resource.clone(),
            default_layout: outline.spec.default_layout,
            header,
            pages,
        },
    })
}

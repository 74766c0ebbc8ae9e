//! ResourceManifests: the rendered resource set behind one object, keyed by object id.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use kubeui_core::{ApiResult, Compute, GroupVersionKind, RequestContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::charts::{object_id, ClusterEditor, ModelMetadata};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceManifestsRequest {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

impl ResourceManifestsRequest {
    fn model(&self) -> ModelMetadata {
        ModelMetadata {
            resource: GroupVersionKind::gvk(&self.group, &self.version, &self.kind),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceManifestsResponse {
    #[serde(default)]
    pub objects: BTreeMap<String, Value>,
}

pub struct ResourceManifests {
    editor: ClusterEditor,
}

impl ResourceManifests {
    pub fn new(editor: ClusterEditor) -> Self { Self { editor } }
}

#[async_trait]
impl Compute for ResourceManifests {
    type Request = ResourceManifestsRequest;
    type Response = ResourceManifestsResponse;

    async fn compute(&self, ctx: &RequestContext, req: Self::Request) -> ApiResult<Self::Response> {
        let resources = self.editor.load_resources(ctx, &req.model()).await?;
        let objects = resources.into_iter().map(|obj| (object_id(&obj), obj)).collect();
        Ok(ResourceManifestsResponse { objects })
    }
}

//! ChartPresetQuery: helm values presets stored in the cluster.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kubeui_core::{ApiError, ApiResult, Compute, RequestContext, ResourceId, Selector};
use kubeui_kubehub::Cluster;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{non_empty, str_at};

pub const PRESET_GROUP: &str = "charts.x-helm.dev";
pub const PRESET_VERSION: &str = "v1alpha1";
pub const CHART_PRESET: &str = "ChartPreset";
pub const CLUSTER_CHART_PRESET: &str = "ClusterChartPreset";

/// By `name`, or by `selector` when the name is empty. `namespace` adds the
/// namespaced presets to the cluster-wide ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChartPresetQueryRequest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresetSource {
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresetValues {
    pub source: PresetSource,
    #[serde(default)]
    pub values: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChartPresetQueryResponse {
    #[serde(default)]
    pub presets: Vec<PresetValues>,
}

#[async_trait]
pub trait PresetLoader: Send + Sync {
    async fn load(&self, ctx: &RequestContext, req: &ChartPresetQueryRequest) -> ApiResult<Vec<PresetValues>>;
}

fn preset_values(obj: Value) -> PresetValues {
    let source = PresetSource {
        kind: str_at(&obj, "/kind").to_string(),
        namespace: str_at(&obj, "/metadata/namespace").to_string(),
        name: str_at(&obj, "/metadata/name").to_string(),
    };
    let values = obj.pointer("/spec/values").cloned().unwrap_or(Value::Null);
    PresetValues { source, values }
}

/// Reads `ChartPreset` and `ClusterChartPreset` objects.
pub struct ClusterPresetLoader {
    cluster: Arc<dyn Cluster>,
}

impl ClusterPresetLoader {
    pub fn new(cluster: Arc<dyn Cluster>) -> Self { Self { cluster } }

    async fn resource(&self, ctx: &RequestContext, kind: &str) -> ApiResult<Option<ResourceId>> {
        self.cluster.resolve_kind(ctx, PRESET_GROUP, kind).await
    }

    async fn by_name(&self, ctx: &RequestContext, namespace: Option<&str>, name: &str) -> ApiResult<Vec<PresetValues>> {
        if let (Some(ns), Some(res)) = (namespace, self.resource(ctx, CHART_PRESET).await?) {
            match self.cluster.get_object(ctx, &res, Some(ns), name).await {
                Ok(obj) => return Ok(vec![preset_values(obj)]),
                Err(e) if e.is_not_found() => debug!(namespace = ns, name, "presets: no namespaced preset, trying cluster"),
                Err(e) => return Err(e),
            }
        }
        match self.resource(ctx, CLUSTER_CHART_PRESET).await? {
            Some(res) => Ok(vec![preset_values(self.cluster.get_object(ctx, &res, None, name).await?)]),
            None => Err(ApiError::not_found(PRESET_GROUP, "clusterchartpresets", name)),
        }
    }

    async fn by_selector(&self, ctx: &RequestContext, namespace: Option<&str>, selector: &Selector) -> ApiResult<Vec<PresetValues>> {
        let mut out = Vec::new();
        // cluster presets first so namespaced values can be layered over them
        if let Some(res) = self.resource(ctx, CLUSTER_CHART_PRESET).await? {
            out.extend(sorted(self.cluster.list_objects(ctx, &res, None, selector).await?));
        }
        if let (Some(ns), Some(res)) = (namespace, self.resource(ctx, CHART_PRESET).await?) {
            out.extend(sorted(self.cluster.list_objects(ctx, &res, Some(ns), selector).await?));
        }
        Ok(out.into_iter().map(preset_values).collect())
    }
}

fn sorted(mut items: Vec<Value>) -> Vec<Value> {
    items.sort_by(|a, b| str_at(a, "/metadata/name").cmp(str_at(b, "/metadata/name")));
    items
}

#[async_trait]
impl PresetLoader for ClusterPresetLoader {
    async fn load(&self, ctx: &RequestContext, req: &ChartPresetQueryRequest) -> ApiResult<Vec<PresetValues>> {
        let namespace = non_empty(&req.namespace);
        if let Some(name) = non_empty(&req.name) {
            return self.by_name(ctx, namespace, name).await;
        }
        let selector = match req.selector.as_ref() {
            Some(s) => Selector::from_label_selector(s).map_err(|e| ApiError::bad_request(e.to_string()))?,
            None => Selector::everything(),
        };
        self.by_selector(ctx, namespace, &selector).await
    }
}

pub struct ChartPresetQuery {
    loader: Arc<dyn PresetLoader>,
}

impl ChartPresetQuery {
    pub fn new(loader: Arc<dyn PresetLoader>) -> Self { Self { loader } }
}

#[async_trait]
impl Compute for ChartPresetQuery {
    type Request = ChartPresetQueryRequest;
    type Response = ChartPresetQueryResponse;

    async fn compute(&self, ctx: &RequestContext, req: Self::Request) -> ApiResult<Self::Response> {
        Ok(ChartPresetQueryResponse { presets: self.loader.load(ctx, &req).await? })
    }
}

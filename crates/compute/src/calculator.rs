//! ResourceCalculator: shape and cost of an arbitrary workload manifest.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use kubeui_core::quantity::ResourceList;
use kubeui_core::{AccessTarget, ApiError, ApiResult, Compute, GroupVersionKind, RequestContext, ResourceId};
use kubeui_kubehub::Cluster;
use kubeui_resmetrics::{MetricsError, PodRole, Registry, ResourceMetrics};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{non_empty, str_at};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceCalculatorRequest {
    /// The manifest to measure, as sent.
    #[serde(alias = "raw")]
    pub resource: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Resources {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: ResourceList,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: ResourceList,
}

impl Resources {
    pub fn is_empty(&self) -> bool { self.requests.is_empty() && self.limits.is_empty() }
}

fn is_zero(n: &i64) -> bool { *n == 0 }

/// Unregistered kinds carry only `apiType` and `version`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCalculatorResponse {
    pub api_type: ResourceId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub replicas: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub role_replicas: BTreeMap<PodRole, i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(default, skip_serializing_if = "Resources::is_empty")]
    pub total_resource: Resources,
    #[serde(default, skip_serializing_if = "Resources::is_empty")]
    pub app_resource: Resources,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub role_resource_requests: BTreeMap<PodRole, ResourceList>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub role_resource_limits: BTreeMap<PodRole, ResourceList>,
}

pub struct ResourceCalculator {
    cluster: Arc<dyn Cluster>,
    metrics: Registry,
}

fn metrics_error(e: MetricsError) -> ApiError { ApiError::bad_request(e.to_string()) }

impl ResourceCalculator {
    pub fn new(cluster: Arc<dyn Cluster>, metrics: Registry) -> Self { Self { cluster, metrics } }

    async fn resolve(&self, ctx: &RequestContext, obj: &Value) -> ApiResult<ResourceId> {
        if !obj.is_object() {
            return Err(ApiError::internal("resource is not an object"));
        }
        let gvk = GroupVersionKind::of_object(obj).ok_or_else(|| ApiError::internal("resource has no apiVersion or kind"))?;
        self.cluster.resolve(ctx, &gvk).await.map_err(|e| match e {
            ApiError::Timeout(_) | ApiError::Cancelled => e,
            other => ApiError::internal(other),
        })
    }

    fn measure(m: &dyn ResourceMetrics, obj: &Value, resp: &mut ResourceCalculatorResponse) -> Result<(), MetricsError> {
        resp.replicas = m.replicas(obj)?;
        resp.role_replicas = m.role_replicas(obj)?;
        resp.mode = m.mode(obj)?;
        resp.total_resource.requests = m.total_resource_requests(obj)?;
        resp.total_resource.limits = m.total_resource_limits(obj)?;
        resp.app_resource.requests = m.app_resource_requests(obj)?;
        resp.app_resource.limits = m.app_resource_limits(obj)?;
        resp.role_resource_requests = m.role_resource_requests(obj)?;
        resp.role_resource_limits = m.role_resource_limits(obj)?;
        Ok(())
    }
}

#[async_trait]
impl Compute for ResourceCalculator {
    type Request = ResourceCalculatorRequest;
    type Response = ResourceCalculatorResponse;

    /// `create` on the manifest's own resource.
    async fn access_target(&self, ctx: &RequestContext, req: &Self::Request) -> ApiResult<Option<AccessTarget>> {
        let obj = &req.resource;
        let res = self.resolve(ctx, obj).await?;
        let namespace = if res.namespaced() {
            non_empty(str_at(obj, "/metadata/namespace")).or(ctx.namespace()).unwrap_or_default().to_string()
        } else {
            String::new()
        };
        Ok(Some(AccessTarget {
            verb: "create".into(),
            group: res.group,
            version: res.version,
            resource: res.name,
            subresource: String::new(),
            namespace,
            name: str_at(obj, "/metadata/name").to_string(),
        }))
    }

    async fn compute(&self, ctx: &RequestContext, req: Self::Request) -> ApiResult<Self::Response> {
        let obj = req.resource;
        let api_type = self.resolve(ctx, &obj).await?;
        let mut resp = ResourceCalculatorResponse {
            version: str_at(&obj, "/spec/version").to_string(),
            api_type,
            ..Default::default()
        };
        let Some(m) = self.metrics.get(&resp.api_type.gvk()) else {
            debug!(gvk = %resp.api_type.gvk(), "calculator: kind has no metrics");
            return Ok(resp);
        };
        Self::measure(m.as_ref(), &obj, &mut resp).map_err(metrics_error)?;
        debug!(gvk = %resp.api_type.gvk(), replicas = resp.replicas, mode = %resp.mode, "calculator: measured");
        Ok(resp)
    }
}

//! RenderAPI reads a live object or a selected set of them; RenderSection echoes.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kubeui_core::{ApiError, ApiResult, Compute, GroupVersionKind, ObjectList, RequestContext, Selector};
use kubeui_kubehub::Cluster;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::non_empty;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectRef {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RenderApiRequest {
    pub resource: GroupVersionKind,
    #[serde(rename = "ref")]
    pub ref_: ObjectRef,
    /// Lists instead of getting when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

pub struct RenderApi {
    cluster: Arc<dyn Cluster>,
}

impl RenderApi {
    pub fn new(cluster: Arc<dyn Cluster>) -> Self { Self { cluster } }
}

#[async_trait]
impl Compute for RenderApi {
    type Request = RenderApiRequest;
    type Response = Value;

    async fn compute(&self, ctx: &RequestContext, req: Self::Request) -> ApiResult<Self::Response> {
        let res = self.cluster.resolve(ctx, &req.resource).await?;
        let namespace = non_empty(&req.ref_.namespace);
        let Some(selector) = req.selector.as_ref() else {
            return self.cluster.get_object(ctx, &res, namespace, &req.ref_.name).await;
        };
        let selector = Selector::from_label_selector(selector).map_err(|e| ApiError::bad_request(e.to_string()))?;
        let mut list = ObjectList::new("v1", "List");
        list.items = self.cluster.list_objects(ctx, &res, namespace, &selector).await?;
        debug!(gvk = %req.resource, selector = %selector, count = list.items.len(), "render: listed");
        Ok(serde_json::to_value(list)?)
    }
}

/// Placeholder for server-side section rendering: the request comes back as the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderSection;

#[async_trait]
impl Compute for RenderSection {
    type Request = Value;
    type Response = Value;

    async fn compute(&self, _ctx: &RequestContext, req: Self::Request) -> ApiResult<Self::Response> { Ok(req) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeui_kubehub::MockCluster;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn render() -> RenderApi {
        let c = MockCluster::new()
            .with_object(json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "p", "namespace": "n", "labels": {"app": "web"}}}))
            .with_object(json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "q", "namespace": "n", "labels": {"app": "db"}}}));
        RenderApi::new(Arc::new(c))
    }

    fn pod_ref(name: &str) -> RenderApiRequest {
        RenderApiRequest {
            resource: GroupVersionKind::gvk("", "v1", "Pod"),
            ref_: ObjectRef { namespace: "n".into(), name: name.into() },
            selector: None,
        }
    }

    #[tokio::test]
    async fn nil_selector_gets_the_named_object() {
        let obj = render().compute(&RequestContext::default(), pod_ref("p")).await.unwrap();
        assert_eq!(obj["metadata"]["name"], "p");
        let err = render().compute(&RequestContext::default(), pod_ref("missing")).await.unwrap_err();
        assert_eq!(err.code(), 404);
    }

    #[tokio::test]
    async fn selector_lists_matching_objects() {
        let mut req = pod_ref("");
        req.selector = Some(LabelSelector { match_labels: Some(BTreeMap::from([("app".into(), "db".into())])), ..Default::default() });
        let list = render().compute(&RequestContext::default(), req).await.unwrap();
        assert_eq!(list["kind"], "List");
        assert_eq!(list["items"].as_array().unwrap().len(), 1);
        assert_eq!(list["items"][0]["metadata"]["name"], "q");
    }

    #[tokio::test]
    async fn section_echoes_its_request() {
        let req = json!({"section": "overview", "blocks": [1, 2]});
        assert_eq!(RenderSection.compute(&RequestContext::default(), req.clone()).await.unwrap(), req);
    }
}

//! In-memory cluster for tests and offline use.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Node, NodeStatus, Service};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::version::Info;
use kubeui_core::{ApiError, ApiResult, GroupVersionKind, RequestContext, ResourceId, ResourceScope, Selector};
use serde_json::Value;

use crate::Cluster;

/// Simple in-memory cluster. Objects are plain JSON matched by apiVersion/kind,
/// namespace and name.
#[derive(Debug, Clone)]
pub struct MockCluster {
    pub resources: Vec<ResourceId>,
    pub objects: Vec<Value>,
    pub nodes: Vec<Node>,
    pub namespaces: Vec<Namespace>,
    pub services: Vec<Service>,
    pub version: Info,
    /// Applied before every answer.
    pub latency: Option<Duration>,
}

fn builtin_resources() -> Vec<ResourceId> {
    use ResourceScope::{Cluster, Namespaced};
    [
        ("", "v1", "pods", "Pod", Namespaced),
        ("", "v1", "services", "Service", Namespaced),
        ("", "v1", "configmaps", "ConfigMap", Namespaced),
        ("", "v1", "secrets", "Secret", Namespaced),
        ("", "v1", "namespaces", "Namespace", Cluster),
        ("", "v1", "nodes", "Node", Cluster),
        ("apps", "v1", "deployments", "Deployment", Namespaced),
        ("apps", "v1", "replicasets", "ReplicaSet", Namespaced),
        ("apps", "v1", "statefulsets", "StatefulSet", Namespaced),
        ("apps", "v1", "daemonsets", "DaemonSet", Namespaced),
        ("batch", "v1", "jobs", "Job", Namespaced),
    ]
    .into_iter()
    .map(|(g, v, n, k, s)| ResourceId::new(g, v, n, k, s))
    .collect()
}

impl Default for MockCluster {
    fn default() -> Self {
        Self {
            resources: builtin_resources(),
            objects: Vec::new(),
            nodes: Vec::new(),
            namespaces: Vec::new(),
            services: Vec::new(),
            version: Info { major: "1".into(), minor: "29".into(), git_version: "v1.29.0".into(), ..Default::default() },
            latency: None,
        }
    }
}

fn labels_of(v: &Value) -> BTreeMap<String, String> {
    v.pointer("/metadata/labels")
        .and_then(|l| l.as_object())
        .map(|m| m.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
        .unwrap_or_default()
}

fn str_at<'a>(v: &'a Value, ptr: &str) -> &'a str { v.pointer(ptr).and_then(|x| x.as_str()).unwrap_or_default() }

impl MockCluster {
    pub fn new() -> Self { Self::default() }

    pub fn with_resource(mut self, res: ResourceId) -> Self {
        self.resources.push(res);
        self
    }

    /// Serve `management.cattle.io/v3` `Project`, which marks the cluster as rancher-managed.
    pub fn with_rancher(self) -> Self {
        self.with_resource(ResourceId::new("management.cattle.io", "v3", "projects", "Project", ResourceScope::Namespaced))
    }

    pub fn with_gateway_api(self) -> Self {
        self.with_resource(ResourceId::new("gateway.networking.k8s.io", "v1", "gatewayclasses", "GatewayClass", ResourceScope::Cluster))
    }

    pub fn with_object(mut self, obj: Value) -> Self {
        self.objects.push(obj);
        self
    }

    /// Add a node whose capacity and allocatable are both `resources`.
    pub fn with_node(mut self, name: &str, resources: &[(&str, &str)]) -> Self {
        let list: BTreeMap<String, Quantity> = resources.iter().map(|(k, v)| (k.to_string(), Quantity(v.to_string()))).collect();
        self.nodes.push(Node {
            metadata: ObjectMeta { name: Some(name.to_string()), ..Default::default() },
            status: Some(NodeStatus { capacity: Some(list.clone()), allocatable: Some(list), ..Default::default() }),
            ..Default::default()
        });
        self
    }

    pub fn with_namespace(mut self, name: &str, labels: &[(&str, &str)]) -> Self {
        let labels: BTreeMap<String, String> = labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        self.namespaces.push(Namespace {
            metadata: ObjectMeta { name: Some(name.to_string()), labels: Some(labels), ..Default::default() },
            ..Default::default()
        });
        self
    }

    pub fn with_service(mut self, svc: Service) -> Self {
        self.services.push(svc);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn answer<T: Send>(&self, ctx: &RequestContext, value: ApiResult<T>) -> ApiResult<T> {
        let latency = self.latency;
        ctx.run(async move {
            if let Some(d) = latency {
                tokio::time::sleep(d).await;
            }
            value
        })
        .await
    }

    fn matches(obj: &Value, res: &ResourceId, namespace: Option<&str>) -> bool {
        str_at(obj, "/apiVersion") == res.api_version()
            && str_at(obj, "/kind") == res.kind
            && match namespace {
                Some(ns) if res.namespaced() => str_at(obj, "/metadata/namespace") == ns,
                _ => true,
            }
    }
}

#[async_trait]
impl Cluster for MockCluster {
    async fn resolve(&self, ctx: &RequestContext, gvk: &GroupVersionKind) -> ApiResult<ResourceId> {
        let found = self.resources.iter().find(|r| r.gvk() == *gvk).cloned().ok_or_else(|| {
            ApiError::bad_request(format!("no matches for kind {:?} in version {:?}", gvk.kind, gvk.api_version()))
        });
        self.answer(ctx, found).await
    }

    async fn resolve_kind(&self, ctx: &RequestContext, group: &str, kind: &str) -> ApiResult<Option<ResourceId>> {
        let served = self.resources.iter().find(|r| r.group == group && r.kind == kind).cloned();
        self.answer(ctx, Ok(served)).await
    }

    async fn get_object(&self, ctx: &RequestContext, res: &ResourceId, namespace: Option<&str>, name: &str) -> ApiResult<Value> {
        let found = self
            .objects
            .iter()
            .find(|o| Self::matches(o, res, namespace) && str_at(o, "/metadata/name") == name)
            .cloned()
            .ok_or_else(|| ApiError::Upstream {
                code: 404,
                reason: "NotFound".into(),
                message: format!("{} \"{}\" not found", res.name, name),
            });
        self.answer(ctx, found).await
    }

    async fn list_objects(
        &self,
        ctx: &RequestContext,
        res: &ResourceId,
        namespace: Option<&str>,
        selector: &Selector,
    ) -> ApiResult<Vec<Value>> {
        let items =
            self.objects.iter().filter(|o| Self::matches(o, res, namespace) && selector.matches(&labels_of(o))).cloned().collect();
        self.answer(ctx, Ok(items)).await
    }

    async fn list_nodes(&self, ctx: &RequestContext) -> ApiResult<Vec<Node>> { self.answer(ctx, Ok(self.nodes.clone())).await }

    async fn list_namespaces(&self, ctx: &RequestContext, selector: &Selector) -> ApiResult<Vec<Namespace>> {
        let items = self.namespaces.iter().filter(|n| selector.matches_opt(n.metadata.labels.as_ref())).cloned().collect();
        self.answer(ctx, Ok(items)).await
    }

    async fn list_services(&self, ctx: &RequestContext, namespace: Option<&str>, selector: &Selector) -> ApiResult<Vec<Service>> {
        let items = self
            .services
            .iter()
            .filter(|s| namespace.map_or(true, |ns| s.metadata.namespace.as_deref() == Some(ns)))
            .filter(|s| selector.matches_opt(s.metadata.labels.as_ref()))
            .cloned()
            .collect();
        self.answer(ctx, Ok(items)).await
    }

    async fn server_version(&self, ctx: &RequestContext) -> ApiResult<Info> { self.answer(ctx, Ok(self.version.clone())).await }
}

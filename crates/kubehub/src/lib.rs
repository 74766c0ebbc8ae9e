//! kubeui kubehub – the host cluster as seen by the computed kinds
//!
//! Handlers never hold a kube client directly; they go through [`Cluster`], which
//! takes the request context on every call so cancellation and deadlines reach
//! the wire.

#![forbid(unsafe_code)]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Node, Service};
use k8s_openapi::apimachinery::pkg::version::Info;
use kubeui_core::{ApiResult, GroupVersionKind, RequestContext, ResourceId, Selector};
use serde_json::Value;

pub mod kube_cluster;
pub mod mapper;
pub mod mock;

pub use kube_cluster::KubeCluster;
pub use mapper::RestMapper;
pub use mock::MockCluster;

#[async_trait]
pub trait Cluster: Send + Sync {
    /// Map a kind onto its served resource (plural + scope).
    async fn resolve(&self, ctx: &RequestContext, gvk: &GroupVersionKind) -> ApiResult<ResourceId>;

    /// Resolve `group`/`kind` at whichever version the cluster prefers; `None` when no version is served.
    async fn resolve_kind(&self, ctx: &RequestContext, group: &str, kind: &str) -> ApiResult<Option<ResourceId>>;

    async fn get_object(&self, ctx: &RequestContext, res: &ResourceId, namespace: Option<&str>, name: &str) -> ApiResult<Value>;

    /// `namespace = None` lists across all namespaces (or the cluster scope).
    async fn list_objects(&self, ctx: &RequestContext, res: &ResourceId, namespace: Option<&str>, selector: &Selector)
        -> ApiResult<Vec<Value>>;

    async fn list_nodes(&self, ctx: &RequestContext) -> ApiResult<Vec<Node>>;

    async fn list_namespaces(&self, ctx: &RequestContext, selector: &Selector) -> ApiResult<Vec<Namespace>>;

    async fn list_services(&self, ctx: &RequestContext, namespace: Option<&str>, selector: &Selector) -> ApiResult<Vec<Service>>;

    async fn server_version(&self, ctx: &RequestContext) -> ApiResult<Info>;
}

/// Drop fields that only add noise to computed views.
pub fn strip_managed_fields(v: &mut Value) {
    if let Some(meta) = v.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        meta.remove("managedFields");
    }
}

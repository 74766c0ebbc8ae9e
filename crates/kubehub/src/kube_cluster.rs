use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Node, Service};
use k8s_openapi::apimachinery::pkg::version::Info;
use kube::api::{Api, ApiResource, DynamicObject, ListParams};
use kube::Client;
use kubeui_core::{ApiError, ApiResult, GroupVersionKind, RequestContext, ResourceId, Selector};
use serde_json::Value;
use tracing::debug;

use crate::mapper::RestMapper;
use crate::{strip_managed_fields, Cluster};

/// [`Cluster`] backed by a live kube client.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    mapper: Arc<RestMapper>,
}

fn api_resource(res: &ResourceId) -> ApiResource {
    ApiResource {
        group: res.group.clone(),
        version: res.version.clone(),
        api_version: res.api_version(),
        kind: res.kind.clone(),
        plural: res.name.clone(),
    }
}

fn list_params(selector: &Selector) -> ListParams {
    let lp = ListParams::default();
    if selector.is_empty() { lp } else { lp.labels(&selector.to_string()) }
}

fn to_value(obj: DynamicObject) -> ApiResult<Value> {
    let mut v = serde_json::to_value(obj)?;
    strip_managed_fields(&mut v);
    Ok(v)
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        let mapper = Arc::new(RestMapper::new(Arc::new(client.clone())));
        Self { client, mapper }
    }

    /// Client from the local kubeconfig or the in-cluster service account.
    pub async fn try_default() -> ApiResult<Self> { Ok(Self::new(Client::try_default().await?)) }

    pub fn client(&self) -> &Client { &self.client }

    fn dynamic(&self, res: &ResourceId, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = api_resource(res);
        match namespace {
            Some(ns) if res.namespaced() => Api::namespaced_with(self.client.clone(), ns, &ar),
            _ => Api::all_with(self.client.clone(), &ar),
        }
    }
}

#[async_trait]
impl Cluster for KubeCluster {
    async fn resolve(&self, ctx: &RequestContext, gvk: &GroupVersionKind) -> ApiResult<ResourceId> { self.mapper.resolve(ctx, gvk).await }

    async fn resolve_kind(&self, ctx: &RequestContext, group: &str, kind: &str) -> ApiResult<Option<ResourceId>> {
        self.mapper.resolve_kind(ctx, group, kind).await
    }

    async fn get_object(&self, ctx: &RequestContext, res: &ResourceId, namespace: Option<&str>, name: &str) -> ApiResult<Value> {
        let t0 = Instant::now();
        let api = self.dynamic(res, namespace);
        let obj = ctx.run(async { api.get(name).await.map_err(ApiError::from) }).await?;
        debug!(gvk = %res.gvk(), name, took_ms = %t0.elapsed().as_millis(), "kube: get ok");
        to_value(obj)
    }

    async fn list_objects(
        &self,
        ctx: &RequestContext,
        res: &ResourceId,
        namespace: Option<&str>,
        selector: &Selector,
    ) -> ApiResult<Vec<Value>> {
        let t0 = Instant::now();
        let api = self.dynamic(res, namespace);
        let lp = list_params(selector);
        let list = ctx.run(async { api.list(&lp).await.map_err(ApiError::from) }).await?;
        debug!(gvk = %res.gvk(), count = list.items.len(), took_ms = %t0.elapsed().as_millis(), "kube: list ok");
        list.items.into_iter().map(to_value).collect()
    }

    async fn list_nodes(&self, ctx: &RequestContext) -> ApiResult<Vec<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let list = ctx.run(async { api.list(&ListParams::default()).await.map_err(ApiError::from) }).await?;
        Ok(list.items)
    }

    async fn list_namespaces(&self, ctx: &RequestContext, selector: &Selector) -> ApiResult<Vec<Namespace>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let lp = list_params(selector);
        let list = ctx.run(async { api.list(&lp).await.map_err(ApiError::from) }).await?;
        Ok(list.items)
    }

    async fn list_services(&self, ctx: &RequestContext, namespace: Option<&str>, selector: &Selector) -> ApiResult<Vec<Service>> {
        let api: Api<Service> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let lp = list_params(selector);
        let list = ctx.run(async { api.list(&lp).await.map_err(ApiError::from) }).await?;
        Ok(list.items)
    }

    async fn server_version(&self, ctx: &RequestContext) -> ApiResult<Info> {
        ctx.run(async { self.client.apiserver_version().await.map_err(ApiError::from) }).await
    }
}

//! The standard kind table.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use kubeui_authz::Authorizer;
use kubeui_catalog::{layout_from_outline, CatalogError, ResourceOutline};
use kubeui_compute::{
    ChartPresetQuery, ChartRegistry, ClusterEditor, ClusterPresetLoader, GatewayInfoHandler, ProjectLister, RenderApi,
    RenderSection, ResourceCalculator, ResourceManifests, SiteInfoHandler, IDENTITY_API_VERSION, META_API_VERSION,
};
use kubeui_core::table::{ColumnSpec, ColumnTableConvertor};
use kubeui_core::{ApiError, ApiResult, GroupVersionKind, RequestContext};
use kubeui_kubehub::Cluster;
use serde_json::Value;
use tracing::info;

use crate::backend::{check_type_meta, Backend, CatalogBackend, CreateHandler, EnvelopeHandler, LookupSource};
use crate::registry::{RegisteredKind, Registry, Verb};

/// Shared collaborators of the standard handlers.
pub struct Deps {
    pub cluster: Arc<dyn Cluster>,
    pub site: Arc<SiteInfoHandler>,
    pub charts: Arc<ChartRegistry>,
    pub metrics: kubeui_resmetrics::Registry,
}

impl Deps {
    /// Captures the site snapshot, so this talks to the cluster once.
    pub async fn new(ctx: &RequestContext, cluster: Arc<dyn Cluster>, cluster_name: &str, chart_root: PathBuf) -> ApiResult<Self> {
        let site = Arc::new(SiteInfoHandler::capture(ctx, cluster.clone(), cluster_name).await?);
        Ok(Self {
            cluster,
            site,
            charts: Arc::new(ChartRegistry::new(chart_root)),
            metrics: kubeui_resmetrics::Registry::builtin(),
        })
    }
}

fn meta(kind: &str) -> GroupVersionKind {
    let (group, version) = META_API_VERSION.split_once('/').unwrap_or_default();
    GroupVersionKind::gvk(group, version, kind)
}

fn identity(kind: &str) -> GroupVersionKind {
    let (group, version) = IDENTITY_API_VERSION.split_once('/').unwrap_or_default();
    GroupVersionKind::gvk(group, version, kind)
}

fn columns(gvk: &GroupVersionKind, plural: &str, extra: Vec<ColumnSpec>) -> Arc<ColumnTableConvertor> {
    Arc::new(ColumnTableConvertor::new(&gvk.group, plural, extra))
}

fn compute<C: kubeui_core::Compute + 'static>(c: C) -> Backend { Backend::Compute(Arc::new(EnvelopeHandler::new(c))) }

fn resource_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("Group", "string", "/spec/resource/group", "API group of the described resource"),
        ColumnSpec::new("Version", "string", "/spec/resource/version", "API version of the described resource"),
        ColumnSpec::new("Kind", "string", "/spec/resource/kind", "Kind of the described resource"),
    ]
}

fn render_layout(outline: &ResourceOutline) -> Result<Value, CatalogError> {
    let layout = layout_from_outline(outline, kubeui_catalog::descriptors()?)?;
    serde_json::to_value(layout).map_err(|e| CatalogError::Decode { path: outline.metadata.name.clone().unwrap_or_default(), message: e.to_string() })
}

struct SiteInfoCreate(Arc<SiteInfoHandler>);

#[async_trait]
impl CreateHandler for SiteInfoCreate {
    async fn create(&self, ctx: &RequestContext, kind: &RegisteredKind, body: Value, _authz: Option<&dyn Authorizer>) -> ApiResult<Value> {
        check_type_meta(kind, &body)?;
        Ok(serde_json::to_value(self.0.create(ctx).await?)?)
    }
}

struct Projects(ProjectLister);

#[async_trait]
impl LookupSource for Projects {
    async fn get(&self, ctx: &RequestContext, name: &str) -> ApiResult<Value> { Ok(serde_json::to_value(self.0.get(ctx, name).await?)?) }

    async fn list(&self, ctx: &RequestContext) -> ApiResult<Vec<Value>> {
        self.0.list(ctx).await?.into_iter().map(|p| serde_json::to_value(p).map_err(ApiError::from)).collect()
    }
}

struct Gateways(GatewayInfoHandler);

#[async_trait]
impl LookupSource for Gateways {
    async fn get(&self, ctx: &RequestContext, name: &str) -> ApiResult<Value> { Ok(serde_json::to_value(self.0.get(ctx, name).await?)?) }
}

/// Every kind the server ships, in discovery order.
pub fn standard(deps: &Deps) -> ApiResult<Registry> {
    let descriptors = kubeui_catalog::descriptors().map_err(ApiError::internal)?;
    let outlines = kubeui_catalog::outlines().map_err(ApiError::internal)?;
    let cluster = &deps.cluster;
    let mut r = Registry::new();

    let gvk = meta("ResourceDescriptor");
    let table = columns(&gvk, "resourcedescriptors", resource_columns());
    r.register(RegisteredKind::new(gvk, "resourcedescriptors", Backend::Catalog(Arc::new(CatalogBackend::new(descriptors)))).with_table(table))?;

    let gvk = meta("ResourceOutline");
    let table = columns(&gvk, "resourceoutlines", resource_columns());
    r.register(RegisteredKind::new(gvk, "resourceoutlines", Backend::Catalog(Arc::new(CatalogBackend::new(outlines)))).with_table(table))?;

    let gvk = meta("ResourceLayout");
    let table = columns(&gvk, "resourcelayouts", resource_columns());
    let layouts = CatalogBackend::with_render(outlines, render_layout);
    r.register(RegisteredKind::new(gvk, "resourcelayouts", Backend::Catalog(Arc::new(layouts))).with_table(table))?;

    r.register(RegisteredKind::new(
        meta("ResourceCalculator"),
        "resourcecalculators",
        compute(ResourceCalculator::new(cluster.clone(), deps.metrics.clone())),
    ))?;
    r.register(RegisteredKind::new(meta("RenderAPI"), "renderapis", compute(RenderApi::new(cluster.clone()))))?;
    let editor = ClusterEditor::new(cluster.clone(), deps.charts.clone());
    r.register(RegisteredKind::new(meta("ResourceManifests"), "resourcemanifests", compute(ResourceManifests::new(editor))))?;
    let presets = ChartPresetQuery::new(Arc::new(ClusterPresetLoader::new(cluster.clone())));
    r.register(RegisteredKind::new(meta("ChartPresetQuery"), "chartpresetqueries", compute(presets)))?;
    r.register(RegisteredKind::new(meta("RenderSection"), "rendersections", compute(RenderSection)))?;

    let gvk = meta("GatewayInfo");
    let table = columns(
        &gvk,
        "gatewayinfos",
        vec![
            ColumnSpec::new("Service-Type", "string", "/spec/serviceType", "Type of the envoy service"),
            ColumnSpec::new("Host", "string", "/spec/hostName", "Host name the gateway is reachable at"),
            ColumnSpec::new("IP", "string", "/spec/ip", "Load balancer address"),
        ],
    );
    let gateways = Backend::Lookup(Arc::new(Gateways(GatewayInfoHandler::new(cluster.clone()))));
    r.register(RegisteredKind::new(gvk, "gatewayinfos", gateways).with_verbs(&[Verb::Get]).with_table(table))?;

    let gvk = meta("Project");
    let table = columns(
        &gvk,
        "projects",
        vec![
            ColumnSpec::new("Type", "string", "/spec/type", "Default, System or User"),
            ColumnSpec::new("Namespaces", "string", "/spec/namespaces", "Namespaces in the project"),
        ],
    );
    let projects = Backend::Lookup(Arc::new(Projects(ProjectLister::new(cluster.clone()))));
    r.register(RegisteredKind::new(gvk, "projects", projects).with_table(table))?;

    let site = Backend::Compute(Arc::new(SiteInfoCreate(deps.site.clone())));
    r.register(RegisteredKind::new(identity("SiteInfo"), "siteinfos", site))?;

    info!(kinds = r.len(), descriptors = descriptors.len(), outlines = outlines.len(), "api: kinds registered");
    Ok(r)
}

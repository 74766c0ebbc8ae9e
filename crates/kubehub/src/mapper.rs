//! Cached kind → resource mapping, refreshed from discovery on a miss.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use kube::discovery::{Discovery, Scope};
use kubeui_core::{gvk_key, ApiError, ApiResult, GroupVersionKind, RequestContext, ResourceId, ResourceScope};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

/// Misses inside this window are answered from the cache without another discovery pass.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ResourceDiscovery: Send + Sync {
    async fn discover(&self) -> ApiResult<Vec<ResourceId>>;
}

#[async_trait]
impl ResourceDiscovery for kube::Client {
    async fn discover(&self) -> ApiResult<Vec<ResourceId>> {
        let discovery = Discovery::new(self.clone()).run().await?;
        let mut out = Vec::new();
        for group in discovery.groups() {
            for ver in group.versions() {
                for (ar, caps) in group.versioned_resources(ver) {
                    let scope = if matches!(caps.scope, Scope::Namespaced) { ResourceScope::Namespaced } else { ResourceScope::Cluster };
                    out.push(ResourceId::new(&ar.group, &ar.version, &ar.plural, &ar.kind, scope));
                }
            }
        }
        Ok(out)
    }
}

#[derive(Default)]
struct MapperState {
    by_gvk: FxHashMap<String, ResourceId>,
    /// Preferred served version per (group, kind); discovery lists stable versions first.
    by_group_kind: FxHashMap<(String, String), ResourceId>,
    loaded_at: Option<Instant>,
}

impl MapperState {
    fn build(resources: Vec<ResourceId>) -> Self {
        let mut st = MapperState { loaded_at: Some(Instant::now()), ..Default::default() };
        for r in resources {
            st.by_group_kind.entry((r.group.clone(), r.kind.clone())).or_insert_with(|| r.clone());
            st.by_gvk.insert(gvk_key(&r.group, &r.version, &r.kind), r);
        }
        st
    }

    fn fresh(&self) -> bool { self.loaded_at.map_or(false, |t| t.elapsed() < MIN_REFRESH_INTERVAL) }
}

pub struct RestMapper {
    source: Arc<dyn ResourceDiscovery>,
    state: ArcSwap<MapperState>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl RestMapper {
    pub fn new(source: Arc<dyn ResourceDiscovery>) -> Self {
        Self { source, state: ArcSwap::from_pointee(MapperState::default()), refresh_lock: tokio::sync::Mutex::new(()) }
    }

    /// Re-run discovery unless another caller did so within the refresh window.
    async fn refresh(&self, ctx: &RequestContext) -> ApiResult<()> {
        let _guard = self.refresh_lock.lock().await;
        if self.state.load().fresh() {
            return Ok(());
        }
        let t0 = Instant::now();
        let resources = ctx.run(self.source.discover()).await?;
        let count = resources.len();
        metrics::counter!("kubeui_discovery_refresh_total", 1);
        metrics::histogram!("kubeui_discovery_ms", t0.elapsed().as_millis() as f64);
        self.state.store(Arc::new(MapperState::build(resources)));
        info!(count, took_ms = %t0.elapsed().as_millis(), "mapper: discovery refreshed");
        Ok(())
    }

    pub async fn resolve(&self, ctx: &RequestContext, gvk: &GroupVersionKind) -> ApiResult<ResourceId> {
        let key = gvk.key();
        if let Some(r) = self.state.load().by_gvk.get(&key) {
            return Ok(r.clone());
        }
        debug!(gvk = %key, "mapper: miss");
        self.refresh(ctx).await?;
        self.state.load().by_gvk.get(&key).cloned().ok_or_else(|| {
            ApiError::bad_request(format!("no matches for kind {:?} in version {:?}", gvk.kind, gvk.api_version()))
        })
    }

    /// The served resource for `group`/`kind` in its preferred version, if any.
    pub async fn resolve_kind(&self, ctx: &RequestContext, group: &str, kind: &str) -> ApiResult<Option<ResourceId>> {
        let key = (group.to_string(), kind.to_string());
        if let Some(r) = self.state.load().by_group_kind.get(&key) {
            return Ok(Some(r.clone()));
        }
        self.refresh(ctx).await?;
        Ok(self.state.load().by_group_kind.get(&key).cloned())
    }
}

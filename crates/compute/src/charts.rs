//! Editor charts and the cluster editor that loads a rendered resource set.
//!
//! A chart names a primary kind and the component kinds that ship alongside it.
//! Charts are looked up under a disk cache root first; bundled charts fill the
//! cache on a miss. The registry is shared by every handler; its lock guards the
//! in-memory map only and is never held across file I/O.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use include_dir::{include_dir, Dir};
use kubeui_core::labels::{Operator, Requirement};
use kubeui_core::{ApiError, ApiResult, GroupVersionKind, RequestContext, Selector};
use kubeui_kubehub::Cluster;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{non_empty, str_at};

static BUNDLED: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/data/charts");

pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditorChart {
    pub name: String,
    pub resource: GroupVersionKind,
    #[serde(default)]
    pub components: Vec<GroupVersionKind>,
}

/// The object an editor session is opened on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelMetadata {
    pub resource: GroupVersionKind,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
}

pub struct ChartRegistry {
    root: PathBuf,
    cache: RwLock<FxHashMap<String, Arc<EditorChart>>>,
}

fn decode(origin: &str, bytes: &[u8]) -> ApiResult<EditorChart> {
    serde_yaml::from_slice(bytes).map_err(|e| ApiError::internal(format!("decode chart {}: {}", origin, e)))
}

impl ChartRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into(), cache: RwLock::new(FxHashMap::default()) } }

    /// `$HOME/.kubeui/charts`.
    pub fn default_root() -> PathBuf {
        std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")).join(".kubeui").join("charts")
    }

    pub fn root(&self) -> &Path { &self.root }

    /// `apps/deployment.yaml`; the core group is spelled `core`.
    pub fn chart_path(group: &str, kind: &str) -> String {
        format!("{}/{}.yaml", non_empty(group).unwrap_or("core"), kind.to_ascii_lowercase())
    }

    pub async fn chart_for(&self, group: &str, kind: &str) -> ApiResult<Arc<EditorChart>> {
        let rel = Self::chart_path(group, kind);
        if let Some(c) = self.cache.read().await.get(&rel) {
            return Ok(c.clone());
        }
        let chart = Arc::new(self.fetch(&rel, group, kind).await?);
        // a racing miss may have landed first; keep whichever was inserted
        let mut cache = self.cache.write().await;
        Ok(cache.entry(rel).or_insert(chart).clone())
    }

    async fn fetch(&self, rel: &str, group: &str, kind: &str) -> ApiResult<EditorChart> {
        let path = self.root.join(rel);
        match tokio::fs::read(&path).await {
            Ok(bytes) => return decode(&path.display().to_string(), &bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(ApiError::internal(format!("read {}: {}", path.display(), e))),
        }
        let file = BUNDLED
            .get_file(rel)
            .ok_or_else(|| ApiError::bad_request(format!("no editor chart for kind {:?} in group {:?}", kind, group)))?;
        let chart = decode(rel, file.contents())?;
        if let Err(e) = write_through(&path, file.contents()).await {
            warn!(path = %path.display(), error = %e, "charts: cache write failed");
        } else {
            debug!(path = %path.display(), chart = %chart.name, "charts: cached bundled chart");
        }
        Ok(chart)
    }
}

/// Write via a sibling temp file and rename, so readers never see a partial chart.
async fn write_through(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let tmp = path.with_extension(format!("yaml.{}", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// `G=apps,K=Deployment,NS=shop,N=web`.
pub fn object_id(obj: &Value) -> String {
    let gvk = GroupVersionKind::of_object(obj).unwrap_or_default();
    format!(
        "G={},K={},NS={},N={}",
        gvk.group,
        gvk.kind,
        str_at(obj, "/metadata/namespace"),
        str_at(obj, "/metadata/name")
    )
}

/// Loads a chart's rendered resource set from the live cluster.
pub struct ClusterEditor {
    cluster: Arc<dyn Cluster>,
    registry: Arc<ChartRegistry>,
}

impl ClusterEditor {
    pub fn new(cluster: Arc<dyn Cluster>, registry: Arc<ChartRegistry>) -> Self { Self { cluster, registry } }

    /// The primary object followed by every component object of the same instance.
    pub async fn load_resources(&self, ctx: &RequestContext, model: &ModelMetadata) -> ApiResult<Vec<Value>> {
        let chart = self.registry.chart_for(&model.resource.group, &model.resource.kind).await?;
        let namespace = non_empty(&model.namespace);
        let primary = self.cluster.resolve(ctx, &model.resource).await?;
        let mut out = vec![self.cluster.get_object(ctx, &primary, namespace, &model.name).await?];

        let mut selector = Selector::everything();
        selector.push(
            Requirement::new(INSTANCE_LABEL, Operator::Equals, [model.name.as_str()])
                .map_err(|e| ApiError::bad_request(e.to_string()))?,
        );
        for component in chart.components.iter() {
            let res = match self.cluster.resolve(ctx, component).await {
                Ok(res) => res,
                Err(e) if e.code() == 400 => {
                    debug!(gvk = %component, "editor: component kind not served");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let mut items = self.cluster.list_objects(ctx, &res, namespace, &selector).await?;
            items.sort_by(|a, b| str_at(a, "/metadata/name").cmp(str_at(b, "/metadata/name")));
            out.extend(items);
        }
        debug!(chart = %chart.name, count = out.len(), "editor: loaded resources");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf { std::env::temp_dir().join(format!("kubeui-charts-{}", uuid::Uuid::new_v4())) }

    #[test]
    fn chart_paths_spell_out_core() {
        assert_eq!(ChartRegistry::chart_path("", "Pod"), "core/pod.yaml");
        assert_eq!(ChartRegistry::chart_path("apps", "Deployment"), "apps/deployment.yaml");
    }

    #[tokio::test]
    async fn bundled_chart_is_written_to_the_cache() {
        let root = scratch_dir();
        let reg = ChartRegistry::new(&root);
        let chart = reg.chart_for("apps", "Deployment").await.unwrap();
        assert_eq!(chart.resource.kind, "Deployment");
        assert!(chart.components.iter().any(|c| c.kind == "Service"));
        assert!(root.join("apps/deployment.yaml").exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_share_one_cached_chart() {
        let root = scratch_dir();
        let reg = Arc::new(ChartRegistry::new(&root));
        let lookups: Vec<_> = (0..8)
            .map(|i| {
                let reg = reg.clone();
                let kind = if i % 2 == 0 { "Deployment" } else { "StatefulSet" };
                tokio::spawn(async move { reg.chart_for("apps", kind).await })
            })
            .collect();
        let mut charts = Vec::new();
        for h in lookups {
            charts.push(h.await.unwrap().unwrap());
        }
        let again = reg.chart_for("apps", "Deployment").await.unwrap();
        assert!(charts.iter().step_by(2).all(|c| Arc::ptr_eq(c, &again)));
        assert!(charts.iter().skip(1).step_by(2).all(|c| c.resource.kind == "StatefulSet"));
        assert!(root.join("apps/statefulset.yaml").exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn disk_chart_wins_over_bundled() {
        let root = scratch_dir();
        std::fs::create_dir_all(root.join("apps")).unwrap();
        std::fs::write(
            root.join("apps/deployment.yaml"),
            "name: custom\nresource: {group: apps, version: v1, kind: Deployment}\ncomponents: []\n",
        )
        .unwrap();
        let chart = ChartRegistry::new(&root).chart_for("apps", "Deployment").await.unwrap();
        assert_eq!(chart.name, "custom");
        assert!(chart.components.is_empty());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn unknown_chart_is_bad_request() {
        let root = scratch_dir();
        let err = ChartRegistry::new(&root).chart_for("example.com", "Widget").await.unwrap_err();
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn object_ids() {
        let obj = serde_json::json!({"apiVersion": "apps/v1", "kind": "Deployment", "metadata": {"name": "web", "namespace": "shop"}});
        assert_eq!(object_id(&obj), "G=apps,K=Deployment,NS=shop,N=web");
        let cm = serde_json::json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "c"}});
        assert_eq!(object_id(&cm), "G=,K=ConfigMap,NS=,N=c");
    }
}

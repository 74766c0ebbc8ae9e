//! SiteInfo: a startup snapshot of the cluster plus live node totals.

use std::sync::Arc;

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use k8s_openapi::apimachinery::pkg::version::Info;
use kubeui_core::quantity::{add_resource_lists, ResourceList};
use kubeui_core::{ApiError, ApiResult, RequestContext, Selector};
use kubeui_kubehub::Cluster;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::IDENTITY_API_VERSION;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    pub count: i32,
    #[serde(default)]
    pub capacity: ResourceList,
    #[serde(default)]
    pub allocatable: ResourceList,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesInfo {
    #[serde(default)]
    pub cluster_name: String,
    /// uid of `kube-system`, stable for the life of the cluster.
    #[serde(default)]
    pub cluster_uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Info>,
    #[serde(default)]
    pub node_stats: NodeStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SiteInfo {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductInfo>,
    #[serde(default)]
    pub kubernetes: KubernetesInfo,
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            api_version: IDENTITY_API_VERSION.into(),
            kind: "SiteInfo".into(),
            metadata: ObjectMeta::default(),
            product: None,
            kubernetes: KubernetesInfo::default(),
        }
    }
}

pub struct SiteInfoHandler {
    cluster: Arc<dyn Cluster>,
    snapshot: SiteInfo,
}

impl SiteInfoHandler {
    /// Read cluster identity once, at startup.
    pub async fn capture(ctx: &RequestContext, cluster: Arc<dyn Cluster>, cluster_name: &str) -> ApiResult<Self> {
        let version = cluster.server_version(ctx).await?;
        let cluster_uid = cluster
            .list_namespaces(ctx, &Selector::everything())
            .await?
            .into_iter()
            .find(|ns| ns.metadata.name.as_deref() == Some("kube-system"))
            .and_then(|ns| ns.metadata.uid)
            .unwrap_or_default();
        let snapshot = SiteInfo {
            kubernetes: KubernetesInfo {
                cluster_name: cluster_name.to_string(),
                cluster_uid,
                version: Some(version),
                node_stats: NodeStats::default(),
            },
            ..Default::default()
        };
        Ok(Self::from_snapshot(cluster, snapshot))
    }

    /// Stamp `snapshot` with a fresh uid and creation time and drop product details.
    pub fn from_snapshot(cluster: Arc<dyn Cluster>, mut snapshot: SiteInfo) -> Self {
        snapshot.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        snapshot.metadata.creation_timestamp = Some(Time(Utc::now()));
        snapshot.product = None;
        info!(
            uid = snapshot.metadata.uid.as_deref().unwrap_or_default(),
            cluster = %snapshot.kubernetes.cluster_name,
            "siteinfo: snapshot captured"
        );
        Self { cluster, snapshot }
    }

    pub fn snapshot(&self) -> &SiteInfo { &self.snapshot }

    /// The snapshot with node count and summed node resources filled in.
    pub async fn create(&self, ctx: &RequestContext) -> ApiResult<SiteInfo> {
        let mut site = self.snapshot.clone();
        let nodes = self.cluster.list_nodes(ctx).await?;
        let stats = &mut site.kubernetes.node_stats;
        stats.count = nodes.len() as i32;
        for node in nodes.iter() {
            let Some(status) = node.status.as_ref() else { continue };
            if let Some(cap) = status.capacity.as_ref() {
                stats.capacity = add_resource_lists(&stats.capacity, cap).map_err(ApiError::internal)?;
            }
            if let Some(alloc) = status.allocatable.as_ref() {
                stats.allocatable = add_resource_lists(&stats.allocatable, alloc).map_err(ApiError::internal)?;
            }
        }
        debug!(nodes = stats.count, "siteinfo: node stats");
        Ok(site)
    }
}

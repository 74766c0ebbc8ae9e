//! Projects of a rancher-managed cluster, rebuilt from namespace labels.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kubeui_core::labels::{Operator, Requirement};
use kubeui_core::{ApiError, ApiResult, RequestContext, Selector};
use kubeui_kubehub::Cluster;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::META_API_VERSION;

pub const PROJECT_ID_LABEL: &str = "field.cattle.io/projectId";
const MANAGEMENT_GROUP: &str = "management.cattle.io";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProjectType {
    Default,
    System,
    #[default]
    User,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectSpec {
    #[serde(rename = "type")]
    pub type_: ProjectType,
    #[serde(default)]
    pub namespaces: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ProjectSpec,
}

impl Default for Project {
    fn default() -> Self {
        Self { api_version: META_API_VERSION.into(), kind: "Project".into(), metadata: ObjectMeta::default(), spec: ProjectSpec::default() }
    }
}

pub struct ProjectLister {
    cluster: Arc<dyn Cluster>,
}

#[derive(Default)]
struct Members {
    namespaces: Vec<String>,
    created: Option<Time>,
}

impl ProjectLister {
    pub fn new(cluster: Arc<dyn Cluster>) -> Self { Self { cluster } }

    /// Rancher serves its own `Project` kind.
    pub async fn is_managed(&self, ctx: &RequestContext) -> ApiResult<bool> { Ok(self.cluster.resolve_kind(ctx, MANAGEMENT_GROUP, "Project").await?.is_some()) }

    /// Empty on clusters that are not rancher-managed.
    pub async fn list(&self, ctx: &RequestContext) -> ApiResult<Vec<Project>> {
        if !self.is_managed(ctx).await? {
            debug!("projects: cluster is not rancher-managed");
            return Ok(Vec::new());
        }
        self.load(ctx).await
    }

    pub async fn get(&self, ctx: &RequestContext, name: &str) -> ApiResult<Project> {
        let not_found = || ApiError::not_found("meta.kubeui.dev", "projects", name);
        if !self.is_managed(ctx).await? {
            return Err(not_found());
        }
        self.load(ctx).await?.into_iter().find(|p| p.metadata.name.as_deref() == Some(name)).ok_or_else(not_found)
    }

    async fn load(&self, ctx: &RequestContext) -> ApiResult<Vec<Project>> {
        let mut selector = Selector::everything();
        selector.push(Requirement::new(PROJECT_ID_LABEL, Operator::Exists, Vec::<String>::new()).map_err(ApiError::internal)?);
        let namespaces = self.cluster.list_namespaces(ctx, &selector).await?;

        let mut by_id: BTreeMap<String, Members> = BTreeMap::new();
        for ns in namespaces {
            let Some(id) = ns.metadata.labels.as_ref().and_then(|l| l.get(PROJECT_ID_LABEL)).cloned() else { continue };
            let members = by_id.entry(id).or_default();
            if let Some(name) = ns.metadata.name {
                members.namespaces.push(name);
            }
            if let Some(t) = ns.metadata.creation_timestamp {
                if members.created.as_ref().map_or(true, |c| t.0 < c.0) {
                    members.created = Some(t);
                }
            }
        }
        Ok(by_id.into_iter().map(|(id, m)| project(id, m)).collect())
    }
}

fn project(id: String, mut m: Members) -> Project {
    m.namespaces.sort();
    let type_ = if m.namespaces.iter().any(|n| n == "default") {
        ProjectType::Default
    } else if m.namespaces.iter().any(|n| n == "kube-system") {
        ProjectType::System
    } else {
        ProjectType::User
    };
    Project {
        metadata: ObjectMeta {
            labels: Some(BTreeMap::from([(PROJECT_ID_LABEL.to_string(), id.clone())])),
            name: Some(id),
            creation_timestamp: m.created,
            ..Default::default()
        },
        spec: ProjectSpec { type_, namespaces: m.namespaces },
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use kubeui_kubehub::MockCluster;

    fn cluster() -> MockCluster {
        let mut c = MockCluster::new()
            .with_namespace("default", &[(PROJECT_ID_LABEL, "p-default")])
            .with_namespace("kube-system", &[(PROJECT_ID_LABEL, "p-system")])
            .with_namespace("shop", &[(PROJECT_ID_LABEL, "p-shop")])
            .with_namespace("shop-staging", &[(PROJECT_ID_LABEL, "p-shop")])
            .with_namespace("loose", &[]);
        for (i, ns) in c.namespaces.iter_mut().enumerate() {
            ns.metadata.creation_timestamp = Some(Time(Utc.with_ymd_and_hms(2024, 1, 10 - i as u32, 0, 0, 0).unwrap()));
        }
        c
    }

    #[tokio::test]
    async fn groups_namespaces_into_typed_projects() {
        let lister = ProjectLister::new(Arc::new(cluster().with_rancher()));
        let projects = lister.list(&RequestContext::default()).await.unwrap();
        let summary: Vec<(&str, ProjectType, usize)> = projects
            .iter()
            .map(|p| (p.metadata.name.as_deref().unwrap(), p.spec.type_, p.spec.namespaces.len()))
            .collect();
        assert_eq!(
            summary,
            [("p-default", ProjectType::Default, 1), ("p-shop", ProjectType::User, 2), ("p-system", ProjectType::System, 1)]
        );
        let shop = &projects[1];
        assert_eq!(shop.metadata.creation_timestamp.as_ref().unwrap().0, Utc.with_ymd_and_hms(2024, 1, 7, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn unmanaged_cluster_lists_nothing_and_gets_not_found() {
        let lister = ProjectLister::new(Arc::new(cluster()));
        let ctx = RequestContext::default();
        assert!(lister.list(&ctx).await.unwrap().is_empty());
        assert!(lister.get(&ctx, "p-shop").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn get_by_project_id() {
        let lister = ProjectLister::new(Arc::new(cluster().with_rancher()));
        let ctx = RequestContext::default();
        assert_eq!(lister.get(&ctx, "p-system").await.unwrap().spec.namespaces, ["kube-system"]);
        assert!(lister.get(&ctx, "p-nope").await.unwrap_err().is_not_found());
    }
}

//! kubeui resmetrics
//!
//! Shape and cost metrics for workload manifests: replica counts, pod roles and
//! resource totals. Objects are read as unstructured JSON so any manifest can be
//! fed in without a typed decode.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use kubeui_core::quantity::{add_resource_lists, max_resource_lists, scale_resource_list, QuantityError, ResourceList};
use kubeui_core::GroupVersionKind;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod workload;

pub use workload::{WorkloadKind, WorkloadMetrics};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricsError {
    #[error(transparent)]
    Quantity(#[from] QuantityError),
    #[error("malformed {field}: {message}")]
    Malformed { field: String, message: String },
}

impl MetricsError {
    pub(crate) fn malformed(field: &str, message: impl Into<String>) -> Self {
        Self::Malformed { field: field.to_string(), message: message.into() }
    }
}

pub type MetricsResult<T> = Result<T, MetricsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodRole {
    Default,
    Init,
}

/// Metric extraction for one kind.
pub trait ResourceMetrics: Send + Sync {
    fn replicas(&self, obj: &Value) -> MetricsResult<i64>;
    fn role_replicas(&self, obj: &Value) -> MetricsResult<BTreeMap<PodRole, i64>>;
    fn mode(&self, obj: &Value) -> MetricsResult<String>;
    /// Effective per-pod resources times replicas, plus persistent storage claims.
    fn total_resource_requests(&self, obj: &Value) -> MetricsResult<ResourceList>;
    fn total_resource_limits(&self, obj: &Value) -> MetricsResult<ResourceList>;
    /// What one replica's app containers ask for.
    fn app_resource_requests(&self, obj: &Value) -> MetricsResult<ResourceList>;
    fn app_resource_limits(&self, obj: &Value) -> MetricsResult<ResourceList>;
    fn role_resource_requests(&self, obj: &Value) -> MetricsResult<BTreeMap<PodRole, ResourceList>>;
    fn role_resource_limits(&self, obj: &Value) -> MetricsResult<BTreeMap<PodRole, ResourceList>>;
}

/// Kinds with metric extraction, keyed by `gvk_key`.
#[derive(Clone, Default)]
pub struct Registry {
    by_gvk: FxHashMap<String, Arc<dyn ResourceMetrics>>,
}

impl Registry {
    pub fn empty() -> Self { Self::default() }

    /// Pods and the built-in workload controllers.
    pub fn builtin() -> Self {
        let mut r = Self::default();
        for kind in WorkloadKind::ALL {
            let (group, version, name) = kind.gvk();
            r.register(&GroupVersionKind::gvk(group, version, name), Arc::new(WorkloadMetrics::new(kind)));
        }
        r
    }

    pub fn register(&mut self, gvk: &GroupVersionKind, m: Arc<dyn ResourceMetrics>) { self.by_gvk.insert(gvk.key(), m); }

    pub fn get(&self, gvk: &GroupVersionKind) -> Option<Arc<dyn ResourceMetrics>> { self.by_gvk.get(&gvk.key()).cloned() }

    pub fn is_registered(&self, gvk: &GroupVersionKind) -> bool { self.by_gvk.contains_key(&gvk.key()) }
}

pub(crate) fn sum(lists: impl IntoIterator<Item = ResourceList>) -> MetricsResult<ResourceList> {
    let mut acc = ResourceList::new();
    for l in lists {
        acc = add_resource_lists(&acc, &l)?;
    }
    Ok(acc)
}

pub(crate) fn max(lists: impl IntoIterator<Item = ResourceList>) -> MetricsResult<ResourceList> {
    let mut acc = ResourceList::new();
    for l in lists {
        acc = max_resource_lists(&acc, &l)?;
    }
    Ok(acc)
}

pub(crate) fn scale(list: &ResourceList, n: i64) -> MetricsResult<ResourceList> { Ok(scale_resource_list(list, n)?) }

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kubeui_core::quantity::ResourceList;
use serde_json::Value;

use crate::{max, scale, sum, MetricsError, MetricsResult, PodRole, ResourceMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Pod,
    Deployment,
    ReplicaSet,
    StatefulSet,
    DaemonSet,
    Job,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 6] = [Self::Pod, Self::Deployment, Self::ReplicaSet, Self::StatefulSet, Self::DaemonSet, Self::Job];

    pub fn gvk(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Pod => ("", "v1", "Pod"),
            Self::Deployment => ("apps", "v1", "Deployment"),
            Self::ReplicaSet => ("apps", "v1", "ReplicaSet"),
            Self::StatefulSet => ("apps", "v1", "StatefulSet"),
            Self::DaemonSet => ("apps", "v1", "DaemonSet"),
            Self::Job => ("batch", "v1", "Job"),
        }
    }

    fn pod_spec_pointer(self) -> &'static str {
        match self {
            Self::Pod => "/spec",
            _ => "/spec/template/spec",
        }
    }
}

/// Metrics for pods and the built-in controllers that template them.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadMetrics {
    kind: WorkloadKind,
}

#[derive(Clone, Copy)]
enum Field {
    Requests,
    Limits,
}

impl Field {
    fn key(self) -> &'static str {
        match self {
            Field::Requests => "requests",
            Field::Limits => "limits",
        }
    }
}

fn quantity_string(field: &str, v: &Value) -> MetricsResult<String> {
    match v {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(MetricsError::malformed(field, format!("expected a quantity, got {}", other))),
    }
}

fn resource_list(field: &str, v: Option<&Value>) -> MetricsResult<ResourceList> {
    let Some(v) = v else { return Ok(ResourceList::new()) };
    let obj = v.as_object().ok_or_else(|| MetricsError::malformed(field, "expected a map of quantities"))?;
    let mut out = ResourceList::new();
    for (name, q) in obj.iter() {
        let s = quantity_string(field, q)?;
        // validate eagerly so a bad manifest fails here and not mid-sum
        s.parse::<kubeui_core::quantity::Quantity>()?;
        out.insert(name.clone(), Quantity(s));
    }
    Ok(out)
}

fn containers<'a>(pod: Option<&'a Value>, key: &str) -> MetricsResult<Vec<&'a Value>> {
    match pod.and_then(|p| p.get(key)) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.iter().collect()),
        Some(_) => Err(MetricsError::malformed(key, "expected a list of containers")),
    }
}

fn int_at(obj: &Value, ptr: &str) -> MetricsResult<Option<i64>> {
    match obj.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or_else(|| MetricsError::malformed(ptr, "expected an integer")),
    }
}

impl WorkloadMetrics {
    pub fn new(kind: WorkloadKind) -> Self { Self { kind } }

    fn pod_spec<'a>(&self, obj: &'a Value) -> Option<&'a Value> { obj.pointer(self.kind.pod_spec_pointer()) }

    fn per_container(&self, obj: &Value, key: &str, field: Field) -> MetricsResult<Vec<ResourceList>> {
        containers(self.pod_spec(obj), key)?
            .into_iter()
            .map(|c| {
                let f = format!("{}.resources.{}", key, field.key());
                resource_list(&f, c.pointer(&format!("/resources/{}", field.key())))
            })
            .collect()
    }

    fn has_init(&self, obj: &Value) -> MetricsResult<bool> { Ok(!containers(self.pod_spec(obj), "initContainers")?.is_empty()) }

    /// Sum over app containers of one pod.
    fn app(&self, obj: &Value, field: Field) -> MetricsResult<ResourceList> { sum(self.per_container(obj, "containers", field)?) }

    /// Init containers run one at a time, so a pod needs the largest of them.
    fn init(&self, obj: &Value, field: Field) -> MetricsResult<ResourceList> { max(self.per_container(obj, "initContainers", field)?) }

    fn effective(&self, obj: &Value, field: Field) -> MetricsResult<ResourceList> {
        max([self.app(obj, field)?, self.init(obj, field)?])
    }

    fn claim_storage(&self, obj: &Value, field: Field) -> MetricsResult<ResourceList> {
        if self.kind != WorkloadKind::StatefulSet {
            return Ok(ResourceList::new());
        }
        let templates = match obj.pointer("/spec/volumeClaimTemplates") {
            None | Some(Value::Null) => return Ok(ResourceList::new()),
            Some(Value::Array(t)) => t,
            Some(_) => return Err(MetricsError::malformed("volumeClaimTemplates", "expected a list")),
        };
        let ptr = format!("/spec/resources/{}", field.key());
        sum(templates.iter().map(|t| resource_list("volumeClaimTemplates", t.pointer(&ptr))).collect::<MetricsResult<Vec<_>>>()?)
    }

    fn total(&self, obj: &Value, field: Field) -> MetricsResult<ResourceList> {
        let n = self.replicas(obj)?;
        sum([scale(&self.effective(obj, field)?, n)?, scale(&self.claim_storage(obj, field)?, n)?])
    }

    fn roles(&self, obj: &Value, field: Field) -> MetricsResult<BTreeMap<PodRole, ResourceList>> {
        let n = self.replicas(obj)?;
        let mut out = BTreeMap::new();
        out.insert(PodRole::Default, scale(&self.app(obj, field)?, n)?);
        if self.has_init(obj)? {
            out.insert(PodRole::Init, scale(&self.init(obj, field)?, n)?);
        }
        Ok(out)
    }
}

impl ResourceMetrics for WorkloadMetrics {
    fn replicas(&self, obj: &Value) -> MetricsResult<i64> {
        let n = match self.kind {
            WorkloadKind::Pod => Some(1),
            WorkloadKind::Deployment | WorkloadKind::ReplicaSet | WorkloadKind::StatefulSet => int_at(obj, "/spec/replicas")?,
            WorkloadKind::DaemonSet => int_at(obj, "/status/desiredNumberScheduled")?,
            WorkloadKind::Job => int_at(obj, "/spec/parallelism")?,
        };
        let n = n.unwrap_or(1);
        if n < 0 {
            return Err(MetricsError::malformed("replicas", format!("negative count {}", n)));
        }
        Ok(n)
    }

    fn role_replicas(&self, obj: &Value) -> MetricsResult<BTreeMap<PodRole, i64>> {
        let n = self.replicas(obj)?;
        let mut out = BTreeMap::from([(PodRole::Default, n)]);
        if self.has_init(obj)? {
            out.insert(PodRole::Init, n);
        }
        Ok(out)
    }

    fn mode(&self, _obj: &Value) -> MetricsResult<String> {
        let m = match self.kind {
            WorkloadKind::Pod => "Standalone",
            WorkloadKind::Deployment | WorkloadKind::ReplicaSet => "Replicated",
            WorkloadKind::StatefulSet => "Stateful",
            WorkloadKind::DaemonSet => "PerNode",
            WorkloadKind::Job => "Batch",
        };
        Ok(m.to_string())
    }

    fn total_resource_requests(&self, obj: &Value) -> MetricsResult<ResourceList> { self.total(obj, Field::Requests) }

    fn total_resource_limits(&self, obj: &Value) -> MetricsResult<ResourceList> { self.total(obj, Field::Limits) }

    fn app_resource_requests(&self, obj: &Value) -> MetricsResult<ResourceList> { self.app(obj, Field::Requests) }

    fn app_resource_limits(&self, obj: &Value) -> MetricsResult<ResourceList> { self.app(obj, Field::Limits) }

    fn role_resource_requests(&self, obj: &Value) -> MetricsResult<BTreeMap<PodRole, ResourceList>> { self.roles(obj, Field::Requests) }

    fn role_resource_limits(&self, obj: &Value) -> MetricsResult<BTreeMap<PodRole, ResourceList>> { self.roles(obj, Field::Limits) }
}

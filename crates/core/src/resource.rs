//! Group/version/kind identifiers and the resolved resource identifier.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn gvk(group: &str, version: &str, kind: &str) -> Self {
        Self { group: group.to_string(), version: version.to_string(), kind: kind.to_string() }
    }

    /// Split an `apiVersion` (`v1` or `apps/v1`) plus kind.
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        match api_version.split_once('/') {
            Some((g, v)) => Self::gvk(g, v, kind),
            None => Self::gvk("", api_version, kind),
        }
    }

    /// Read `apiVersion` and `kind` off an unstructured object.
    pub fn of_object(obj: &serde_json::Value) -> Option<Self> {
        let api_version = obj.get("apiVersion")?.as_str()?;
        let kind = obj.get("kind")?.as_str()?;
        if kind.is_empty() || api_version.is_empty() {
            return None;
        }
        Some(Self::from_api_version(api_version, kind))
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() { self.version.clone() } else { format!("{}/{}", self.group, self.version) }
    }

    /// "v1/Kind" or "group/v1/Kind".
    pub fn key(&self) -> String { gvk_key(&self.group, &self.version, &self.kind) }
}

impl std::fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.key()) }
}

pub fn gvk_key(group: &str, version: &str, kind: &str) -> String {
    if group.is_empty() { format!("{}/{}", version, kind) } else { format!("{}/{}/{}", group, version, kind) }
}


#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ResourceScope {
    Cluster,
    #[default]
    Namespaced,
}

/// A kind resolved through the REST mapper: plural name and scope included.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResourceId {
    #[serde(default)]
    pub group: String,
    pub version: String,
    /// Plural resource name, e.g. `deployments`.
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub scope: ResourceScope,
}

impl ResourceId {
    pub fn new(group: &str, version: &str, name: &str, kind: &str, scope: ResourceScope) -> Self {
        Self { group: group.to_string(), version: version.to_string(), name: name.to_string(), kind: kind.to_string(), scope }
    }

    pub fn gvk(&self) -> GroupVersionKind { GroupVersionKind::gvk(&self.group, &self.version, &self.kind) }

    pub fn namespaced(&self) -> bool { self.scope == ResourceScope::Namespaced }

    pub fn api_version(&self) -> String { self.gvk().api_version() }
}

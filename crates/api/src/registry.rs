//! Registered kinds and the table they are looked up in.

use std::fmt;
use std::sync::Arc;

use kubeui_core::table::DefaultTableConvertor;
use kubeui_core::{ApiError, ApiResult, GroupVersionKind, ObjectList, ResourceId, ResourceScope, TableConvertor};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{json, Value};
use smallvec::SmallVec;

use crate::backend::Backend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Create,
    Watch,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Create => "create",
            Verb::Watch => "watch",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// One virtual kind: identity, scope, served verbs, backend and table projection.
pub struct RegisteredKind {
    pub gvk: GroupVersionKind,
    pub singular: String,
    pub plural: String,
    pub namespaced: bool,
    pub verbs: SmallVec<[Verb; 4]>,
    pub backend: Backend,
    pub table: Arc<dyn TableConvertor>,
}

impl RegisteredKind {
    /// Cluster-scoped, serving the verbs its backend implies, with the `Name`/`Age` table.
    pub fn new(gvk: GroupVersionKind, plural: &str, backend: Backend) -> Self {
        let verbs = backend.default_verbs().iter().copied().collect();
        Self {
            singular: gvk.kind.to_ascii_lowercase(),
            plural: plural.to_string(),
            namespaced: false,
            verbs,
            table: Arc::new(DefaultTableConvertor::new(&gvk.group, plural)),
            gvk,
            backend,
        }
    }

    pub fn namespaced(mut self, namespaced: bool) -> Self {
        self.namespaced = namespaced;
        self
    }

    pub fn with_verbs(mut self, verbs: &[Verb]) -> Self {
        self.verbs = verbs.iter().copied().collect();
        self
    }

    pub fn with_table(mut self, table: Arc<dyn TableConvertor>) -> Self {
        self.table = table;
        self
    }

    pub fn supports(&self, verb: Verb) -> bool { self.verbs.contains(&verb) }

    pub fn group(&self) -> &str { &self.gvk.group }

    pub fn resource_id(&self) -> ResourceId {
        let scope = if self.namespaced { ResourceScope::Namespaced } else { ResourceScope::Cluster };
        ResourceId::new(&self.gvk.group, &self.gvk.version, &self.plural, &self.gvk.kind, scope)
    }

    /// An empty object of this kind.
    pub fn new_zero(&self) -> Value { json!({"apiVersion": self.gvk.api_version(), "kind": self.gvk.kind, "metadata": {}}) }

    pub fn new_zero_list(&self) -> ObjectList { ObjectList::new(self.gvk.api_version(), format!("{}List", self.gvk.kind)) }

    pub fn not_supported(&self, verb: Verb) -> ApiError {
        ApiError::MethodNotSupported { group: self.gvk.group.clone(), resource: self.plural.clone(), verb: verb.to_string() }
    }

    /// Fill `apiVersion`/`kind` on objects that come back without them.
    pub(crate) fn stamp(&self, obj: &mut Value) {
        if let Some(map) = obj.as_object_mut() {
            let empty = |v: Option<&Value>| v.and_then(|x| x.as_str()).map_or(true, str::is_empty);
            if empty(map.get("apiVersion")) {
                map.insert("apiVersion".into(), Value::String(self.gvk.api_version()));
            }
            if empty(map.get("kind")) {
                map.insert("kind".into(), Value::String(self.gvk.kind.clone()));
            }
        }
    }
}

impl fmt::Debug for RegisteredKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredKind")
            .field("gvk", &self.gvk)
            .field("plural", &self.plural)
            .field("namespaced", &self.namespaced)
            .field("verbs", &self.verbs)
            .finish_non_exhaustive()
    }
}

/// Kinds keyed by `gvk_key`, with a name index over plural, singular and
/// `plural.group` spellings.
#[derive(Default)]
pub struct Registry {
    kinds: Vec<Arc<RegisteredKind>>,
    gvks: FxHashSet<String>,
    by_name: FxHashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, kind: RegisteredKind) -> ApiResult<()> {
        let key = kind.gvk.key();
        if self.gvks.contains(&key) {
            return Err(ApiError::internal(format!("kind {} registered twice", key)));
        }
        let idx = self.kinds.len();
        let mut names = vec![kind.plural.clone(), kind.singular.clone()];
        if !kind.gvk.group.is_empty() {
            names.push(format!("{}.{}", kind.plural, kind.gvk.group));
        }
        for n in names {
            // first registration keeps the short name
            self.by_name.entry(n).or_insert(idx);
        }
        self.gvks.insert(key);
        self.kinds.push(Arc::new(kind));
        Ok(())
    }

    /// `projects`, `project`, `projects.meta.kubeui.dev` or a kind name in any case.
    pub fn lookup(&self, resource: &str) -> ApiResult<&Arc<RegisteredKind>> {
        let key = resource.to_ascii_lowercase();
        self.by_name
            .get(&key)
            .map(|i| &self.kinds[*i])
            .ok_or_else(|| ApiError::bad_request(format!("the server doesn't have a resource type {:?}", resource)))
    }

    /// Registration order.
    pub fn kinds(&self) -> impl Iterator<Item = &Arc<RegisteredKind>> { self.kinds.iter() }

    pub fn len(&self) -> usize { self.kinds.len() }

    pub fn is_empty(&self) -> bool { self.kinds.is_empty() }
}

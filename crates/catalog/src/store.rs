//! Read-only catalog of named documents loaded from an embedded directory tree.

use std::collections::BTreeMap;

use include_dir::{Dir, DirEntry};
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::CatalogError;

/// A document that can live in a catalog.
pub trait CatalogEntry: DeserializeOwned + Serialize + Clone + Send + Sync + 'static {
    fn name(&self) -> &str;
    fn labels(&self) -> &BTreeMap<String, String>;
}

/// Entries in path order, indexed by name and by path. Immutable once built.
#[derive(Debug, Clone)]
pub struct Catalog<T> {
    entries: Vec<T>,
    paths: Vec<String>,
    by_name: FxHashMap<String, usize>,
    by_path: FxHashMap<String, usize>,
}

fn is_document(path: &str) -> bool { path.ends_with(".yaml") || path.ends_with(".yml") || path.ends_with(".json") }

fn walk<'a>(dir: &'a Dir<'a>, out: &mut Vec<(String, &'a [u8])>) {
    for entry in dir.entries() {
        match entry {
            DirEntry::Dir(d) => walk(d, out),
            DirEntry::File(f) => {
                let path = f.path().to_string_lossy().replace('\\', "/");
                if is_document(&path) {
                    out.push((path, f.contents()));
                }
            }
        }
    }
}

impl<T: CatalogEntry> Catalog<T> {
    /// Load every document under `dir`, ordered lexicographically by path.
    pub fn from_dir(dir: &Dir<'_>) -> Result<Self, CatalogError> {
        let mut files = Vec::new();
        walk(dir, &mut files);
        Self::from_documents(files)
    }

    pub fn from_documents<P, B>(docs: impl IntoIterator<Item = (P, B)>) -> Result<Self, CatalogError>
    where
        P: Into<String>,
        B: AsRef<[u8]>,
    {
        let mut docs: Vec<(String, B)> = docs.into_iter().map(|(p, b)| (p.into(), b)).collect();
        docs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = Catalog { entries: Vec::with_capacity(docs.len()), paths: Vec::new(), by_name: FxHashMap::default(), by_path: FxHashMap::default() };
        for (path, bytes) in docs {
            let entry: T = serde_yaml::from_slice(bytes.as_ref())
                .map_err(|e| CatalogError::Decode { path: path.clone(), message: e.to_string() })?;
            let idx = out.entries.len();
            if let Some(prev) = out.by_name.insert(entry.name().to_string(), idx) {
                return Err(CatalogError::Duplicate {
                    name: entry.name().to_string(),
                    first: out.paths[prev].clone(),
                    second: path,
                });
            }
            out.by_path.insert(path.clone(), idx);
            out.paths.push(path);
            out.entries.push(entry);
        }
        debug!(count = out.entries.len(), "catalog: loaded");
        Ok(out)
    }

    pub fn load_by_name(&self, name: &str) -> Result<&T, CatalogError> {
        self.by_name.get(name).map(|i| &self.entries[*i]).ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    pub fn load_by_file(&self, path: &str) -> Result<&T, CatalogError> {
        let path = path.trim_start_matches("./");
        self.by_path.get(path).map(|i| &self.entries[*i]).ok_or_else(|| CatalogError::FileNotFound(path.to_string()))
    }

    /// All entries in deterministic path order.
    pub fn list(&self) -> &[T] { &self.entries }

    pub fn paths(&self) -> &[String] { &self.paths }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

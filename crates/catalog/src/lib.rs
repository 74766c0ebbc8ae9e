//! kubeui catalogs
//!
//! Resource descriptors and outlines ship inside the binary under `data/`.
//! Both catalogs are parsed once on first use and never change afterwards, so
//! their path order is stable for the lifetime of the process.

#![forbid(unsafe_code)]

use include_dir::{include_dir, Dir};
use once_cell::sync::OnceCell;

pub mod descriptor;
pub mod layout;
pub mod outline;
pub mod store;

pub use descriptor::{ResourceColumn, ResourceDescriptor};
pub use layout::{layout_from_outline, ResourceLayout};
pub use outline::ResourceOutline;
pub use store::{Catalog, CatalogEntry};

pub const API_VERSION: &str = "meta.kubeui.dev/v1alpha1";

static DESCRIPTOR_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/data/descriptors");
static OUTLINE_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/data/outlines");

static DESCRIPTORS: OnceCell<Catalog<ResourceDescriptor>> = OnceCell::new();
static OUTLINES: OnceCell<Catalog<ResourceOutline>> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog entry {0:?} not found")]
    NotFound(String),
    #[error("catalog file {0:?} not found")]
    FileNotFound(String),
    #[error("failed to decode {path}: {message}")]
    Decode { path: String, message: String },
    #[error("duplicate catalog entry {name:?} in {first} and {second}")]
    Duplicate { name: String, first: String, second: String },
    #[error("outline {outline:?} references {group}/{kind}, which has no resource descriptor")]
    Unresolved { outline: String, group: String, kind: String },
    #[error("outline {outline:?} block {block:?} needs a resource reference")]
    MissingRef { outline: String, block: String },
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound(_) | Self::FileNotFound(_)) }
}

/// The embedded resource descriptor catalog.
pub fn descriptors() -> Result<&'static Catalog<ResourceDescriptor>, CatalogError> {
    DESCRIPTORS.get_or_try_init(|| Catalog::from_dir(&DESCRIPTOR_DIR))
}

/// The embedded resource outline catalog.
pub fn outlines() -> Result<&'static Catalog<ResourceOutline>, CatalogError> {
    OUTLINES.get_or_try_init(|| Catalog::from_dir(&OUTLINE_DIR))
}

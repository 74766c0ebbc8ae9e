//! kubeui compute – handlers behind the computed kinds
//!
//! Every handler reads the host cluster through [`kubeui_kubehub::Cluster`] and
//! passes the request context along, so deadlines and cancellation apply to
//! each cluster call. Envelope kinds implement [`kubeui_core::Compute`]; site
//! info, projects and gateway info expose plain async reads that the
//! dispatcher wraps.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde_json::Value;

pub mod calculator;
pub mod charts;
pub mod gateway;
pub mod manifests;
pub mod presets;
pub mod projects;
pub mod render;
pub mod siteinfo;

pub use calculator::{ResourceCalculator, ResourceCalculatorRequest, ResourceCalculatorResponse};
pub use charts::{ChartRegistry, ClusterEditor, EditorChart, ModelMetadata};
pub use gateway::{GatewayInfo, GatewayInfoHandler};
pub use manifests::{ResourceManifests, ResourceManifestsRequest, ResourceManifestsResponse};
pub use presets::{ChartPresetQuery, ChartPresetQueryRequest, ChartPresetQueryResponse, ClusterPresetLoader, PresetLoader};
pub use projects::{Project, ProjectLister, ProjectType};
pub use render::{RenderApi, RenderApiRequest, RenderSection};
pub use siteinfo::{SiteInfo, SiteInfoHandler};

/// Group for every computed kind except site info.
pub const META_API_VERSION: &str = "meta.kubeui.dev/v1alpha1";
pub const IDENTITY_API_VERSION: &str = "identity.kubeui.dev/v1alpha1";

pub(crate) fn str_at<'a>(v: &'a Value, ptr: &str) -> &'a str { v.pointer(ptr).and_then(|x| x.as_str()).unwrap_or_default() }

pub(crate) fn labels_of(v: &Value) -> BTreeMap<String, String> {
    v.pointer("/metadata/labels")
        .and_then(|l| l.as_object())
        .map(|m| m.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
        .unwrap_or_default()
}

/// `None` for the empty string.
pub(crate) fn non_empty(s: &str) -> Option<&str> { if s.is_empty() { None } else { Some(s) } }

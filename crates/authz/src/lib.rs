//! kubeui authorization
//!
//! Two tiers: a local policy evaluated in-process, then a subject access review
//! submitted to the host cluster when the local tier has no opinion.

#![forbid(unsafe_code)]

use async_trait::async_trait;
use kubeui_core::{AccessTarget, ApiError, RequestContext, UserInfo};
use serde::{Deserialize, Serialize};

pub mod gate;
pub mod rbac;
pub mod sar;
pub mod tiered;

pub use gate::check_access;
pub use rbac::{LocalAuthorizer, RbacPolicy};
pub use sar::{AccessReviewer, RemoteAuthorizer};
pub use tiered::TieredAuthorizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Allow,
    Deny,
    NoOpinion,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthzError {
    #[error("subject access review failed: {0}")]
    Review(String),
    #[error("authorization evaluation error: {0}")]
    Evaluation(String),
    #[error("invalid authorization policy: {0}")]
    Policy(String),
    /// The request was cancelled or timed out while a decision was pending.
    #[error(transparent)]
    Aborted(ApiError),
}

/// Everything a decision is made from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pub user: UserInfo,
    pub verb: String,
    pub group: String,
    pub version: String,
    pub resource: String,
    pub subresource: String,
    pub namespace: String,
    pub name: String,
    /// Set for non-resource requests such as `/healthz`.
    pub path: String,
}

impl Attributes {
    pub fn for_target(user: &UserInfo, target: &AccessTarget) -> Self {
        Self {
            user: user.clone(),
            verb: target.verb.clone(),
            group: target.group.clone(),
            version: target.version.clone(),
            resource: target.resource.clone(),
            subresource: target.subresource.clone(),
            namespace: target.namespace.clone(),
            name: target.name.clone(),
            path: String::new(),
        }
    }

    pub fn non_resource(user: &UserInfo, verb: &str, path: &str) -> Self {
        Self { user: user.clone(), verb: verb.to_string(), path: path.to_string(), ..Default::default() }
    }

    pub fn is_resource_request(&self) -> bool { self.path.is_empty() }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub decision: Decision,
    pub reason: String,
    pub error: Option<AuthzError>,
}

impl Verdict {
    pub fn allow(reason: impl Into<String>) -> Self { Self { decision: Decision::Allow, reason: reason.into(), error: None } }
    pub fn deny(reason: impl Into<String>) -> Self { Self { decision: Decision::Deny, reason: reason.into(), error: None } }
    pub fn no_opinion() -> Self { Self { decision: Decision::NoOpinion, reason: String::new(), error: None } }
    pub fn failed(error: AuthzError) -> Self { Self { decision: Decision::NoOpinion, reason: String::new(), error: Some(error) } }
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, ctx: &RequestContext, attrs: &Attributes) -> Verdict;
}

pub(crate) fn record(tier: &'static str, v: &Verdict) {
    let decision = match (v.decision, v.error.is_some()) {
        (Decision::Allow, _) => "allow",
        (Decision::Deny, _) => "deny",
        (Decision::NoOpinion, true) => "error",
        (Decision::NoOpinion, false) => "no_opinion",
    };
    metrics::counter!("kubeui_authz_decisions_total", 1, "tier" => tier, "decision" => decision);
}

//! Remote tier: delegate the decision to the host cluster with a SubjectAccessReview.

use std::time::Instant;

use async_trait::async_trait;
use k8s_openapi::api::authorization::v1::{
    NonResourceAttributes, ResourceAttributes, SubjectAccessReview, SubjectAccessReviewSpec, SubjectAccessReviewStatus,
};
use kube::api::{Api, PostParams};
use kubeui_core::{ApiError, RequestContext};
use tracing::{debug, warn};

use crate::{Attributes, AuthzError, Authorizer, Verdict};

fn opt(s: &str) -> Option<String> { if s.is_empty() { None } else { Some(s.to_string()) } }

/// Build the review for `attrs`. Non-resource paths take precedence over resource fields.
pub fn build_review(attrs: &Attributes) -> SubjectAccessReview {
    let mut spec = SubjectAccessReviewSpec {
        user: opt(&attrs.user.name),
        uid: opt(&attrs.user.uid),
        groups: if attrs.user.groups.is_empty() { None } else { Some(attrs.user.groups.clone()) },
        extra: if attrs.user.extra.is_empty() { None } else { Some(attrs.user.extra.clone()) },
        ..Default::default()
    };
    if attrs.is_resource_request() {
        spec.resource_attributes = Some(ResourceAttributes {
            namespace: opt(&attrs.namespace),
            verb: opt(&attrs.verb),
            group: Some(attrs.group.clone()),
            version: opt(&attrs.version),
            resource: opt(&attrs.resource),
            subresource: opt(&attrs.subresource),
            name: opt(&attrs.name),
        });
    } else {
        spec.non_resource_attributes = Some(NonResourceAttributes { path: opt(&attrs.path), verb: opt(&attrs.verb) });
    }
    SubjectAccessReview { spec, ..Default::default() }
}

/// Map a review outcome onto a verdict.
pub fn verdict_from_status(status: &SubjectAccessReviewStatus) -> Verdict {
    let reason = status.reason.clone().unwrap_or_default();
    if status.allowed {
        return Verdict::allow(reason);
    }
    if status.denied.unwrap_or(false) {
        return Verdict::deny(reason);
    }
    match status.evaluation_error.as_deref().filter(|e| !e.is_empty()) {
        Some(err) => Verdict { reason, ..Verdict::failed(AuthzError::Evaluation(err.to_string())) },
        None => Verdict { reason, ..Verdict::no_opinion() },
    }
}

/// Submits reviews; implemented for the kube client and scripted in tests.
#[async_trait]
pub trait AccessReviewer: Send + Sync {
    async fn review(&self, review: SubjectAccessReview) -> Result<SubjectAccessReviewStatus, AuthzError>;
}

#[async_trait]
impl AccessReviewer for kube::Client {
    async fn review(&self, review: SubjectAccessReview) -> Result<SubjectAccessReviewStatus, AuthzError> {
        let api: Api<SubjectAccessReview> = Api::all(self.clone());
        let created = api.create(&PostParams::default(), &review).await.map_err(|e| AuthzError::Review(e.to_string()))?;
        created.status.ok_or_else(|| AuthzError::Review("response carried no status".to_string()))
    }
}

pub struct RemoteAuthorizer<R> {
    reviewer: R,
}

impl<R: AccessReviewer> RemoteAuthorizer<R> {
    pub fn new(reviewer: R) -> Self { Self { reviewer } }
}

#[async_trait]
impl<R: AccessReviewer> Authorizer for RemoteAuthorizer<R> {
    async fn authorize(&self, ctx: &RequestContext, attrs: &Attributes) -> Verdict {
        let t0 = Instant::now();
        let review = build_review(attrs);
        let res: Result<_, ApiError> = ctx.run(async { Ok(self.reviewer.review(review).await) }).await;
        let v = match res {
            Ok(Ok(status)) => verdict_from_status(&status),
            Ok(Err(e)) => {
                warn!(user = %attrs.user.name, error = %e, "authz: review failed");
                Verdict::failed(e)
            }
            Err(aborted) => Verdict::failed(AuthzError::Aborted(aborted)),
        };
        debug!(user = %attrs.user.name, verb = %attrs.verb, resource = %attrs.resource, decision = ?v.decision, took_ms = %t0.elapsed().as_millis(), "authz: review");
        crate::record("remote", &v);
        v
    }
}

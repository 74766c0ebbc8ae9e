//! Access gate run before handlers that act on behalf of the caller.

use kubeui_core::{AccessTarget, ApiError, ApiResult, RequestContext};
use tracing::{info, warn};

use crate::{Attributes, AuthzError, Authorizer, Decision};

fn describe(user: &str, t: &AccessTarget) -> String {
    let resource = if t.subresource.is_empty() { t.resource.clone() } else { format!("{}/{}", t.resource, t.subresource) };
    let mut msg = format!("User {:?} cannot {} resource {:?} in API group {:?}", user, t.verb, resource, t.group);
    if !t.namespace.is_empty() {
        msg.push_str(&format!(" in the namespace {:?}", t.namespace));
    }
    msg
}

/// Only Allow passes. Deny and NoOpinion are Forbidden, with a failed review's error
/// appended; a review cut short by the request context keeps its own error.
pub async fn check_access(authz: &dyn Authorizer, ctx: &RequestContext, target: &AccessTarget) -> ApiResult<()> {
    let attrs = Attributes::for_target(ctx.user(), target);
    let v = authz.authorize(ctx, &attrs).await;
    match (v.decision, v.error) {
        (Decision::Allow, _) => Ok(()),
        (Decision::Deny, _) => {
            info!(user = %attrs.user.name, verb = %target.verb, resource = %target.resource, reason = %v.reason, "authz: denied");
            let mut msg = describe(&attrs.user.name, target);
            if !v.reason.is_empty() {
                msg.push_str(&format!(": {}", v.reason));
            }
            Err(ApiError::Forbidden(msg))
        }
        (Decision::NoOpinion, Some(AuthzError::Aborted(e))) => Err(e),
        (Decision::NoOpinion, Some(e)) => {
            warn!(user = %attrs.user.name, verb = %target.verb, resource = %target.resource, error = %e, "authz: review failed");
            Err(ApiError::Forbidden(format!("{}: {}", describe(&attrs.user.name, target), e)))
        }
        (Decision::NoOpinion, None) => Err(ApiError::Forbidden(describe(&attrs.user.name, target))),
    }
}

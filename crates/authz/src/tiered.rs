use std::sync::Arc;

use async_trait::async_trait;
use kubeui_core::RequestContext;

use crate::{Attributes, Authorizer, Decision, Verdict};

/// Local tier first; the remote tier only sees requests the local tier has no opinion on.
#[derive(Clone)]
pub struct TieredAuthorizer {
    local: Arc<dyn Authorizer>,
    remote: Option<Arc<dyn Authorizer>>,
}

impl TieredAuthorizer {
    pub fn new(local: Arc<dyn Authorizer>, remote: Option<Arc<dyn Authorizer>>) -> Self { Self { local, remote } }
}

#[async_trait]
impl Authorizer for TieredAuthorizer {
    async fn authorize(&self, ctx: &RequestContext, attrs: &Attributes) -> Verdict {
        let v = self.local.authorize(ctx, attrs).await;
        match (v.decision, &v.error, &self.remote) {
            (Decision::Allow | Decision::Deny, _, _) => v,
            (Decision::NoOpinion, Some(_), _) => v,
            (Decision::NoOpinion, None, Some(remote)) => remote.authorize(ctx, attrs).await,
            (Decision::NoOpinion, None, None) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthzError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        verdict: Verdict,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(verdict: Verdict) -> Arc<Self> { Arc::new(Self { verdict, calls: AtomicUsize::new(0) }) }
        fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
    }

    #[async_trait]
    impl Authorizer for Scripted {
        async fn authorize(&self, _ctx: &RequestContext, _attrs: &Attributes) -> Verdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone()
        }
    }

    async fn run(local: Verdict) -> (Verdict, usize) {
        let remote = Scripted::new(Verdict::allow("remote"));
        let t = TieredAuthorizer::new(Scripted::new(local), Some(remote.clone() as Arc<dyn Authorizer>));
        let v = t.authorize(&RequestContext::default(), &Attributes::default()).await;
        (v, remote.calls())
    }

    #[tokio::test]
    async fn local_decisions_short_circuit() {
        let (v, calls) = run(Verdict::allow("local")).await;
        assert_eq!((v.decision, calls), (Decision::Allow, 0));
        let (v, calls) = run(Verdict::deny("local")).await;
        assert_eq!((v.decision, calls), (Decision::Deny, 0));
    }

    #[tokio::test]
    async fn no_opinion_consults_remote() {
        let (v, calls) = run(Verdict::no_opinion()).await;
        assert_eq!((v.decision, v.reason.as_str(), calls), (Decision::Allow, "remote", 1));
    }

    #[tokio::test]
    async fn local_error_is_returned_without_remote() {
        let (v, calls) = run(Verdict::failed(AuthzError::Evaluation("bad".into()))).await;
        assert_eq!(calls, 0);
        assert!(v.error.is_some());
    }

    #[tokio::test]
    async fn without_remote_tier_no_opinion_stands() {
        let t = TieredAuthorizer::new(Scripted::new(Verdict::no_opinion()), None);
        let v = t.authorize(&RequestContext::default(), &Attributes::default()).await;
        assert_eq!(v.decision, Decision::NoOpinion);
    }
}

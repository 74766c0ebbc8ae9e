//! Per-request ambient state: caller identity, namespace, cancellation and deadline.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{ApiError, ApiResult};

/// Authenticated identity of the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, Vec<String>>,
}

impl UserInfo {
    pub fn new(name: impl Into<String>) -> Self { Self { name: name.into(), ..Default::default() } }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn anonymous() -> Self { Self::new("system:anonymous").with_groups(["system:unauthenticated"]) }
}

/// Request-scoped context handed explicitly to every handler and cluster call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    user: UserInfo,
    namespace: Option<String>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(user: UserInfo) -> Self {
        Self { user, namespace: None, cancel: CancellationToken::new(), deadline: None }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|ns| !ns.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn user(&self) -> &UserInfo { &self.user }
    pub fn namespace(&self) -> Option<&str> { self.namespace.as_deref() }
    pub fn cancellation_token(&self) -> &CancellationToken { &self.cancel }
    pub fn deadline(&self) -> Option<Instant> { self.deadline }
    pub fn is_cancelled(&self) -> bool { self.cancel.is_cancelled() }

    /// Drive `fut` to completion unless the caller cancels or the deadline passes first.
    /// The losing future is dropped, which aborts any in-flight cluster call.
    pub async fn run<F, T>(&self, fut: F) -> ApiResult<T>
    where
        F: Future<Output = ApiResult<T>>,
    {
        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ApiError::Cancelled),
            _ = expired => Err(ApiError::Timeout("request deadline exceeded".to_string())),
            res = fut => res,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self { Self::new(UserInfo::anonymous()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_returns_inner_result() {
        let ctx = RequestContext::default();
        let v = ctx.run(async { Ok::<_, ApiError>(7) }).await;
        assert_eq!(v, Ok(7));
    }

    #[tokio::test]
    async fn cancelled_context_aborts_pending_call() {
        let ctx = RequestContext::default();
        ctx.cancellation_token().cancel();
        let res: ApiResult<()> = ctx.run(std::future::pending()).await;
        assert_eq!(res, Err(ApiError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires_slow_call() {
        let ctx = RequestContext::default().with_timeout(Duration::from_millis(50));
        let res: ApiResult<()> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(res, Err(ApiError::Timeout(_))));
    }

    #[test]
    fn empty_namespace_is_treated_as_none() {
        let ctx = RequestContext::default().with_namespace(Some(String::new()));
        assert_eq!(ctx.namespace(), None);
    }
}

//! Typed request/response envelope shared by every computed kind, and the
//! `Compute` seam the handlers implement.

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{ApiResult, RequestContext};

/// `{apiVersion, kind, metadata, request, response}`. The caller fills `request`;
/// the handler fills `response`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[serde(bound(serialize = "Req: Serialize, Resp: Serialize", deserialize = "Req: DeserializeOwned, Resp: DeserializeOwned"))]
pub struct ApiRequestObject<Req, Resp> {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Req>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Resp>,
}

impl<Req, Resp> Default for ApiRequestObject<Req, Resp> {
    fn default() -> Self {
        Self { api_version: String::new(), kind: String::new(), metadata: ObjectMeta::default(), request: None, response: None }
    }
}

impl<Req, Resp> ApiRequestObject<Req, Resp> {
    pub fn new(api_version: &str, kind: &str, request: Req) -> Self {
        Self { api_version: api_version.to_string(), kind: kind.to_string(), request: Some(request), ..Default::default() }
    }
}

/// What the caller must be allowed to do before a handler runs on their behalf.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessTarget {
    pub verb: String,
    pub group: String,
    pub version: String,
    pub resource: String,
    #[serde(default)]
    pub subresource: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
}

/// A computation behind a `create`.
#[async_trait]
pub trait Compute: Send + Sync {
    type Request: DeserializeOwned + Serialize + Send + Sync + 'static;
    type Response: DeserializeOwned + Serialize + Send + Sync + 'static;

    /// `Some` when the caller needs an access check against the returned target.
    async fn access_target(&self, _ctx: &RequestContext, _req: &Self::Request) -> ApiResult<Option<AccessTarget>> { Ok(None) }

    async fn compute(&self, ctx: &RequestContext, req: Self::Request) -> ApiResult<Self::Response>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_uses_request_and_response_fields() {
        let obj: ApiRequestObject<serde_json::Value, serde_json::Value> = serde_json::from_value(json!({
            "apiVersion": "meta.kubeui.dev/v1alpha1",
            "kind": "RenderSection",
            "request": {"a": 1}
        }))
        .unwrap();
        assert_eq!(obj.request, Some(json!({"a": 1})));
        assert!(obj.response.is_none());
        let back = serde_json::to_value(&obj).unwrap();
        assert!(back.get("response").is_none());
        assert_eq!(back["metadata"], json!({}));
    }
}

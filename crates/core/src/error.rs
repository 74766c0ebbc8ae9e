//! API error kinds and their mapping onto the orchestrator `Status` object.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ListMeta, Status, StatusDetails};
use serde::{Deserialize, Serialize};

/// Errors surfaced to API clients. Every variant maps to a status code + reason.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{} \"{name}\" not found", qualified(.group, .resource))]
    NotFound { group: String, resource: String, name: String },
    #[error("{0}")]
    Forbidden(String),
    #[error("the server does not allow this method on the requested resource: {verb} {}", qualified(.group, .resource))]
    MethodNotSupported { group: String, resource: String, verb: String },
    #[error("request entity too large: {0}")]
    RequestEntityTooLarge(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("Internal error occurred: {0}")]
    Internal(String),
    /// Status returned verbatim by the host cluster.
    #[error("{message}")]
    Upstream { code: u16, reason: String, message: String },
}

pub type ApiResult<T> = Result<T, ApiError>;

fn qualified(group: &str, resource: &str) -> String {
    if group.is_empty() { resource.to_string() } else { format!("{}.{}", resource, group) }
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self { Self::BadRequest(msg.into()) }

    pub fn internal(msg: impl std::fmt::Display) -> Self { Self::Internal(msg.to_string()) }

    pub fn not_found(group: &str, resource: &str, name: &str) -> Self {
        Self::NotFound { group: group.to_string(), resource: resource.to_string(), name: name.to_string() }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound { .. } => 404,
            Self::Forbidden(_) => 403,
            Self::MethodNotSupported { .. } => 405,
            Self::RequestEntityTooLarge(_) => 413,
            Self::Timeout(_) => 504,
            Self::Cancelled | Self::Internal(_) => 500,
            Self::Upstream { code, .. } => *code,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::BadRequest(_) => "BadRequest",
            Self::NotFound { .. } => "NotFound",
            Self::Forbidden(_) => "Forbidden",
            Self::MethodNotSupported { .. } => "MethodNotAllowed",
            Self::RequestEntityTooLarge(_) => "RequestEntityTooLarge",
            Self::Timeout(_) => "Timeout",
            Self::Cancelled | Self::Internal(_) => "InternalError",
            Self::Upstream { reason, .. } => reason.as_str(),
        }
    }

    pub fn is_not_found(&self) -> bool { self.code() == 404 }

    /// Render as the orchestrator's typed failure status.
    pub fn to_status(&self) -> Status {
        let details = match self {
            Self::NotFound { group, resource, name } => Some(StatusDetails {
                group: Some(group.clone()),
                kind: Some(resource.clone()),
                name: Some(name.clone()),
                ..Default::default()
            }),
            Self::MethodNotSupported { group, resource, .. } => Some(StatusDetails {
                group: Some(group.clone()),
                kind: Some(resource.clone()),
                ..Default::default()
            }),
            _ => None,
        };
        Status {
            code: Some(self.code() as i32),
            details,
            message: Some(self.to_string()),
            metadata: ListMeta::default(),
            reason: Some(self.reason().to_string()),
            status: Some("Failure".to_string()),
        }
    }
}

impl From<kube::Error> for ApiError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(resp) => Self::Upstream { code: resp.code, reason: resp.reason, message: resp.message },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self { Self::Internal(e.to_string()) }
}

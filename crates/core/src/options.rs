//! List/get/create options as received from the wire, the continue token,
//! and the list envelope returned for collections.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::labels::Selector;
use crate::{ApiError, ApiResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_selector: Option<String>,
    #[serde(default, rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continue_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Set by the wire layer for `?watch=true`; always refused.
    #[serde(default)]
    pub watch: bool,
}

impl ListOptions {
    pub fn with_labels(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_continue(mut self, token: impl Into<String>) -> Self {
        self.continue_token = Some(token.into());
        self
    }

    pub fn has_field_selector(&self) -> bool {
        self.field_selector.as_deref().map_or(false, |s| !s.trim().is_empty())
    }

    /// Parsed label selector; an absent or blank selector selects everything.
    pub fn selector(&self) -> ApiResult<Selector> {
        match self.label_selector.as_deref() {
            None => Ok(Selector::everything()),
            Some(s) => s.parse::<Selector>().map_err(|e| ApiError::bad_request(format!("invalid label selector: {}", e))),
        }
    }

    /// Start offset encoded in the continue token; an absent or empty token starts at 0.
    pub fn start(&self) -> ApiResult<usize> {
        match self.continue_token.as_deref() {
            None | Some("") => Ok(0),
            Some(tok) => decode_continue(tok),
        }
    }

    /// Effective page size; zero means unlimited.
    pub fn page_size(&self) -> usize { self.limit.unwrap_or(0) as usize }
}

pub fn encode_continue(offset: usize) -> String { offset.to_string() }

pub fn decode_continue(token: &str) -> ApiResult<usize> {
    token
        .parse::<usize>()
        .map_err(|e| ApiError::bad_request(format!("invalid continue option {:?}: {}", token, e)))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GetOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dry_run: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_manager: Option<String>,
}

/// Collection envelope, `<Kind>List`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectList {
    pub api_version: String,
    pub kind: String,
    pub metadata: ListMeta,
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    #[serde(default, rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continue_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl ObjectList {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { api_version: api_version.into(), kind: kind.into(), metadata: ListMeta::default(), items: Vec::new() }
    }

    pub fn continue_token(&self) -> Option<&str> { self.metadata.continue_token.as_deref() }

    /// `metadata.name` of every item, in order.
    pub fn names(&self) -> Vec<String> {
        self.items
            .iter()
            .filter_map(|it| it.pointer("/metadata/name").and_then(|v| v.as_str()).map(str::to_string))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continue_token_parses_as_offset() {
        assert_eq!(ListOptions::default().start(), Ok(0));
        assert_eq!(ListOptions::default().with_continue("").start(), Ok(0));
        assert_eq!(ListOptions::default().with_continue("4").start(), Ok(4));
        let err = ListOptions::default().with_continue("xyz").start().unwrap_err();
        assert_eq!(err.code(), 400);
        assert!(err.to_string().starts_with("invalid continue option"));
        assert!(ListOptions::default().with_continue("-1").start().is_err());
    }

    #[test]
    fn blank_field_selector_is_ignored() {
        let mut o = ListOptions::default();
        assert!(!o.has_field_selector());
        o.field_selector = Some("  ".into());
        assert!(!o.has_field_selector());
        o.field_selector = Some("metadata.name=x".into());
        assert!(o.has_field_selector());
    }

    #[test]
    fn list_options_use_wire_names() {
        let o: ListOptions = serde_json::from_value(serde_json::json!({
            "labelSelector": "a=b", "continue": "2", "limit": 5
        }))
        .unwrap();
        assert_eq!(o.label_selector.as_deref(), Some("a=b"));
        assert_eq!(o.start(), Ok(2));
        assert_eq!(o.page_size(), 5);
    }
}

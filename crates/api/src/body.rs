//! Request body decoding with size and complexity budgets.

use kubeui_core::{ApiError, ApiResult};
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_MAX_BODY_BYTES: usize = 1 << 20;
pub const DEFAULT_MAX_BODY_NODES: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLimits {
    pub max_bytes: usize,
    pub max_nodes: usize,
}

impl Default for BodyLimits {
    fn default() -> Self { Self { max_bytes: DEFAULT_MAX_BODY_BYTES, max_nodes: DEFAULT_MAX_BODY_NODES } }
}

impl BodyLimits {
    /// `KUBEUI_MAX_BODY_BYTES` and `KUBEUI_MAX_BODY_NODES`; unset or unparsable values keep the defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        let max_bytes = std::env::var("KUBEUI_MAX_BODY_BYTES").ok().and_then(|s| s.parse().ok()).unwrap_or(d.max_bytes);
        let max_nodes = std::env::var("KUBEUI_MAX_BODY_NODES").ok().and_then(|s| s.parse().ok()).unwrap_or(d.max_nodes);
        Self { max_bytes, max_nodes }
    }
}

fn count_nodes(v: &Value, budget: usize) -> usize {
    let mut stack = vec![v];
    let mut n = 0usize;
    while let Some(v) = stack.pop() {
        n += 1;
        if n > budget {
            break;
        }
        match v {
            Value::Array(items) => stack.extend(items.iter()),
            Value::Object(map) => stack.extend(map.values()),
            _ => {}
        }
    }
    n
}

/// JSON, or YAML when the bytes are not JSON.
pub fn decode_body(bytes: &[u8], limits: BodyLimits) -> ApiResult<Value> {
    if bytes.len() > limits.max_bytes {
        return Err(ApiError::RequestEntityTooLarge(format!("body is {} bytes, limit is {}", bytes.len(), limits.max_bytes)));
    }
    let value = match serde_json::from_slice::<Value>(bytes) {
        Ok(v) => v,
        Err(json_err) => {
            debug!(error = %json_err, "body: not json, trying yaml");
            serde_yaml::from_slice::<Value>(bytes).map_err(|e| ApiError::bad_request(format!("unable to decode body: {}", e)))?
        }
    };
    if count_nodes(&value, limits.max_nodes) > limits.max_nodes {
        return Err(ApiError::RequestEntityTooLarge(format!("body has more than {} nodes", limits.max_nodes)));
    }
    Ok(value)
}

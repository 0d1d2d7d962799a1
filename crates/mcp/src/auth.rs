// Per-call credential resolution

use crate::config::McpConfig;
use crate::error::{ToolError, ToolResult};
use axum::http::HeaderMap;
use serde_json::Value;

/// Name under which clients pass their own API key.
pub const API_KEY_PARAM: &str = "AGENTQL_API_KEY";

/// Credentials supplied with a single invocation.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub api_key: Option<String>,
}

impl AuthContext {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
        }
    }

    /// Read `_meta.auth.AGENTQL_API_KEY` from a `tools/call` request.
    pub fn from_meta(meta: Option<&Value>) -> Self {
        let api_key = meta
            .and_then(|meta| meta.get("auth"))
            .and_then(|auth| auth.get(API_KEY_PARAM))
            .and_then(Value::as_str)
            .map(str::to_string);

        Self { api_key }
    }

    /// Read the `AGENTQL_API_KEY` request header.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let api_key = headers
            .get(API_KEY_PARAM)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Self { api_key }
    }

    /// Fill in anything `self` lacks from `fallback`.
    pub fn or(self, fallback: AuthContext) -> Self {
        Self {
            api_key: non_empty(self.api_key).or(fallback.api_key),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Pick the API key for one call: per-call auth first, then the configured
/// default.
pub fn resolve_api_key(auth: &AuthContext, config: &McpConfig) -> ToolResult<String> {
    non_empty(auth.api_key.clone())
        .or_else(|| non_empty(config.api_key.clone()))
        .ok_or(ToolError::MissingCredential)
}

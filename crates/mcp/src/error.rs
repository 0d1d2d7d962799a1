//! Error types for tool invocations.

use crate::protocol::JsonRpcError;
use serde_json::json;

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors a tool invocation can fail with.
///
/// Every variant is terminal for the invocation that produced it; nothing is
/// retried.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// No tool is registered under this name.
    #[error("Unknown tool: '{name}'")]
    UnknownTool { name: String },

    /// No API key from the call context or the process configuration.
    #[error("AGENTQL_API_KEY not set")]
    MissingCredential,

    /// Required arguments were absent, empty or not strings.
    #[error("Both 'url' and 'prompt' are required (missing: {})", .fields.join(", "))]
    InvalidArgument { fields: Vec<&'static str> },

    /// The extraction service answered with a non-success status.
    #[error("AgentQL API error: {status_text}\n{body}")]
    RemoteService {
        status: u16,
        status_text: String,
        body: String,
    },

    /// The request never produced a response (connect, DNS, timeout).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A success response whose body was not valid JSON.
    #[error("Invalid response from AgentQL API: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

impl ToolError {
    /// Short machine-readable tag for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool { .. } => "unknown_tool",
            Self::MissingCredential => "missing_credential",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::RemoteService { .. } => "remote_service",
            Self::Transport(_) => "transport",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }

    /// Convert into the JSON-RPC error returned to the MCP client.
    ///
    /// Caller mistakes map to `-32602`, everything else to `-32603`. The
    /// structured fields travel in `data` so clients can branch on them.
    pub fn to_rpc_error(&self) -> JsonRpcError {
        let data = match self {
            Self::UnknownTool { name } => json!({"kind": self.kind(), "tool": name}),
            Self::InvalidArgument { fields } => json!({"kind": self.kind(), "fields": fields}),
            Self::RemoteService {
                status,
                status_text,
                body,
            } => json!({
                "kind": self.kind(),
                "status": status,
                "statusText": status_text,
                "body": body,
            }),
            _ => json!({"kind": self.kind()}),
        };

        let error = match self {
            Self::UnknownTool { .. } | Self::InvalidArgument { .. } => {
                JsonRpcError::invalid_params(self.to_string())
            }
            _ => JsonRpcError::internal_error(self.to_string()),
        };

        error.with_data(data)
    }
}

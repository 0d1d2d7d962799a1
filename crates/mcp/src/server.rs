// MCP server: JSON-RPC dispatch and the stdio transport

use crate::auth::AuthContext;
use crate::protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, ServerCapabilities, ServerInfo, ToolsCapability,
    DEFAULT_PROTOCOL_VERSION, JSONRPC_VERSION,
};
use crate::tools::ToolRegistry;
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead, FramedWrite, LinesCodec};

pub const SERVER_NAME: &str = "agentql-mcp";

/// Routes MCP requests to the tool registry.
///
/// Holds no per-session state; cloning is cheap and clones share the
/// registry.
#[derive(Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Handle one JSON-RPC message. Returns `None` for notifications.
    ///
    /// `auth` carries credentials the transport found outside the message
    /// itself (HTTP headers); they take precedence over `_meta.auth`.
    pub async fn handle_request(&self, request: JsonRpcRequest, auth: AuthContext) -> Option<JsonRpcResponse> {
        // Notifications never get a reply, not even an error
        let Some(id) = request.id else {
            tracing::debug!(method = %request.method, "Received notification");
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request()));
        }

        let outcome = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.list_tools(),
            "tools/call" => self.call_tool(request.params, auth).await,
            method => Err(JsonRpcError::method_not_found(method)),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    /// Parse a raw message and handle it. Malformed input gets a parse error.
    pub async fn handle_message(&self, message: &str, auth: AuthContext) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcRequest>(message) {
            Ok(request) => self.handle_request(request, auth).await,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse JSON-RPC message");
                Some(JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error()))
            }
        }
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = match params {
            Some(params) => serde_json::from_value(params)
                .map_err(|e| JsonRpcError::invalid_params(format!("Invalid initialize params: {}", e)))?,
            None => InitializeParams::default(),
        };

        if let Some(client) = &params.client_info {
            tracing::info!(client = %client.name, version = %client.version, "Client connected");
        }

        let result = InitializeResult {
            protocol_version: params
                .protocol_version
                .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        to_result(&result)
    }

    fn list_tools(&self) -> Result<Value, JsonRpcError> {
        to_result(&ListToolsResult {
            tools: self.registry.list_schemas(),
        })
    }

    async fn call_tool(&self, params: Option<Value>, auth: AuthContext) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("Missing params for tools/call"))
            .and_then(|params| {
                serde_json::from_value(params)
                    .map_err(|e| JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)))
            })?;

        let auth = auth.or(AuthContext::from_meta(params.meta.as_ref()));

        tracing::info!(tool = %params.name, "Calling tool");
        match self.registry.call(&params.name, params.arguments, &auth).await {
            Ok(result) => {
                tracing::info!(tool = %params.name, "Tool call succeeded");
                to_result(&result)
            }
            Err(e) => {
                tracing::warn!(tool = %params.name, kind = e.kind(), error = %e, "Tool call failed");
                Err(e.to_rpc_error())
            }
        }
    }

    /// Serve newline-delimited JSON-RPC over stdin/stdout until stdin closes.
    pub async fn serve_stdio(&self) -> Result<()> {
        tracing::info!("MCP server listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC on an arbitrary reader/writer pair.
    ///
    /// Each request runs on its own task so slow tool calls do not block
    /// others; responses are written in completion order. Lines are decoded
    /// lossily, so invalid UTF-8 becomes a parse error for that line only.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut lines = FramedRead::new(reader, AnyDelimiterCodec::new(b"\n".to_vec(), b"\n".to_vec()));
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

        let writer_task = tokio::spawn(async move {
            let mut sink = FramedWrite::new(writer, LinesCodec::new());
            while let Some(response) = rx.recv().await {
                let line = serde_json::to_string(&response).context("Failed to serialize response")?;
                sink.send(line).await.context("Failed to write response")?;
            }
            Ok::<_, anyhow::Error>(())
        });

        while let Some(line) = lines.next().await {
            let line = line.context("Failed to read from input")?;
            let line = String::from_utf8_lossy(&line).into_owned();
            if line.trim().is_empty() {
                continue;
            }

            let server = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(response) = server.handle_message(&line, AuthContext::default()).await {
                    // Receiver only goes away when the writer failed
                    let _ = tx.send(response);
                }
            });
        }

        tracing::info!("Input closed, shutting down");
        drop(tx);
        writer_task.await.context("Writer task panicked")??;
        Ok(())
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigLayer, McpConfig};
    use crate::tools::ExtractWebDataTool;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_server(api_url: &str, default_key: Option<&str>) -> McpServer {
        let config: McpConfig = ConfigLayer {
            agentql_api_key: default_key.map(str::to_string),
            api_url: Some(api_url.to_string()),
            ..Default::default()
        }
        .resolve()
        .unwrap();

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ExtractWebDataTool::new(Arc::new(config)).unwrap()));
        McpServer::new(registry)
    }

    fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
        serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let server = create_server("http://127.0.0.1:1/v1/query-data", None);

        let response = server
            .handle_request(
                request(1, "initialize", json!({"protocolVersion": "2025-03-26", "capabilities": {}})),
                AuthContext::default(),
            )
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], "agentql-mcp");
        assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
    }

    #[tokio::test]
    async fn test_list_tools() {
        let server = create_server("http://127.0.0.1:1/v1/query-data", None);

        let response = server
            .handle_request(request(2, "tools/list", Value::Null), AuthContext::default())
            .await
            .unwrap();

        let tools = response.result.unwrap()["tools"].clone();
        assert_eq!(tools.as_array().unwrap().len(), 1);
        assert_eq!(tools[0]["name"], "extract-web-data");
        assert_eq!(tools[0]["inputSchema"]["required"], json!(["url", "prompt"]));
    }

    #[tokio::test]
    async fn test_unknown_tool_makes_no_call() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock)
            .await;

        let server = create_server(&mock.uri(), Some("sk-default"));
        let response = server
            .handle_request(
                request(3, "tools/call", json!({"name": "web_fetch", "arguments": {}})),
                AuthContext::default(),
            )
            .await
            .unwrap();

        let error = response.error.unwrap();
        assert_eq!(error.code, JsonRpcError::INVALID_PARAMS);
        assert_eq!(error.message, "Unknown tool: 'web_fetch'");
    }

    #[tokio::test]
    async fn test_call_tool_uses_meta_auth() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-API-Key", "sk-meta"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"ok": true}})))
            .expect(1)
            .mount(&mock)
            .await;

        let server = create_server(&mock.uri(), None);
        let response = server
            .handle_request(
                request(
                    4,
                    "tools/call",
                    json!({
                        "name": "extract-web-data",
                        "arguments": {"url": "https://example.com", "prompt": "status"},
                        "_meta": {"auth": {"AGENTQL_API_KEY": "sk-meta"}}
                    }),
                ),
                AuthContext::default(),
            )
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["content"][0]["type"], "text");
        assert_eq!(result["content"][0]["text"], "{\n  \"ok\": true\n}");
    }

    #[tokio::test]
    async fn test_missing_credential_error() {
        let server = create_server("http://127.0.0.1:1/v1/query-data", None);

        let response = server
            .handle_request(
                request(
                    5,
                    "tools/call",
                    json!({"name": "extract-web-data", "arguments": {"url": "https://example.com", "prompt": "x"}}),
                ),
                AuthContext::default(),
            )
            .await
            .unwrap();

        let error = response.error.unwrap();
        assert_eq!(error.code, JsonRpcError::INTERNAL_ERROR);
        assert_eq!(error.data.unwrap()["kind"], "missing_credential");
    }

    #[tokio::test]
    async fn test_unknown_method_and_notification() {
        let server = create_server("http://127.0.0.1:1/v1/query-data", None);

        let response = server
            .handle_request(request(6, "resources/list", Value::Null), AuthContext::default())
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);

        let notification = server
            .handle_message(
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
                AuthContext::default(),
            )
            .await;
        assert!(notification.is_none());
    }

    #[tokio::test]
    async fn test_parse_error() {
        let server = create_server("http://127.0.0.1:1/v1/query-data", None);

        let response = server.handle_message("{not json", AuthContext::default()).await.unwrap();

        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.unwrap().code, JsonRpcError::PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_serve_over_stream() {
        let server = create_server("http://127.0.0.1:1/v1/query-data", None);

        let (client_side, server_side) = tokio::io::duplex(4096);
        let (server_read, server_write) = tokio::io::split(server_side);
        let serve = tokio::spawn(async move { server.serve(server_read, server_write).await });

        let (client_read, mut client_write) = tokio::io::split(client_side);
        client_write
            .write_all(b"{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n")
            .await
            .unwrap();
        client_write
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
            .await
            .unwrap();

        let mut lines = BufReader::new(client_read).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        let response: JsonRpcResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(response.id, json!(1));
        assert_eq!(response.result.unwrap(), json!({}));

        client_write.shutdown().await.unwrap();
        assert!(lines.next_line().await.unwrap().is_none());
        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_serve_survives_invalid_utf8_line() {
        let server = create_server("http://127.0.0.1:1/v1/query-data", None);

        let (client_side, server_side) = tokio::io::duplex(4096);
        let (server_read, server_write) = tokio::io::split(server_side);
        let serve = tokio::spawn(async move { server.serve(server_read, server_write).await });

        let (client_read, mut client_write) = tokio::io::split(client_side);
        let mut lines = BufReader::new(client_read).lines();

        client_write.write_all(b"\xff\xfe garbage\n").await.unwrap();
        let line = lines.next_line().await.unwrap().unwrap();
        let response: JsonRpcResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.unwrap().code, JsonRpcError::PARSE_ERROR);

        client_write
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n")
            .await
            .unwrap();
        let line = lines.next_line().await.unwrap().unwrap();
        let response: JsonRpcResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(response.id, json!(2));
        assert_eq!(response.result.unwrap(), json!({}));

        client_write.shutdown().await.unwrap();
        assert!(lines.next_line().await.unwrap().is_none());
        serve.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_notification_with_bad_version_gets_no_reply() {
        let server = create_server("http://127.0.0.1:1/v1/query-data", None);

        let notification = server
            .handle_message(r#"{"jsonrpc":"1.0","method":"notifications/initialized"}"#, AuthContext::default())
            .await;
        assert!(notification.is_none());

        let response = server
            .handle_message(r#"{"jsonrpc":"1.0","id":9,"method":"ping"}"#, AuthContext::default())
            .await
            .unwrap();
        assert_eq!(response.id, json!(9));
        assert_eq!(response.error.unwrap().code, JsonRpcError::INVALID_REQUEST);
    }
}

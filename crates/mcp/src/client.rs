//! HTTP client for the AgentQL `query-data` endpoint.

use crate::config::McpConfig;
use crate::error::{ToolError, ToolResult};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const REQUEST_ORIGIN: &str = "mcp-server";

/// Body of a `query-data` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionRequest {
    pub url: String,
    pub prompt: String,
    pub params: QueryParams,
}

impl ExtractionRequest {
    pub fn new(url: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            prompt: prompt.into(),
            params: QueryParams::default(),
        }
    }
}

/// Fixed extraction parameters: fast mode, no scrolling, no screenshot, no wait.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryParams {
    pub wait_for: u64,
    pub is_scroll_to_bottom_enabled: bool,
    pub mode: String,
    pub is_screenshot_enabled: bool,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            wait_for: 0,
            is_scroll_to_bottom_enabled: false,
            mode: "fast".to_string(),
            is_screenshot_enabled: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryDataResponse {
    #[serde(default)]
    data: Value,
}

/// Client for the extraction service.
///
/// Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ExtractionClient {
    client: Client,
    api_url: Url,
}

impl ExtractionClient {
    pub fn new(config: &McpConfig) -> ToolResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::HeaderName::from_static("x-tf-request-origin"),
            header::HeaderValue::from_static(REQUEST_ORIGIN),
        );

        let mut builder = Client::builder()
            .user_agent(concat!("agentql-mcp/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_url: config.api_url.clone(),
        })
    }

    /// POST one extraction request and return the `data` field of the reply.
    ///
    /// Exactly one HTTP request is made. Non-success statuses surface as
    /// [`ToolError::RemoteService`] with the body left unparsed.
    pub async fn query_data(&self, api_key: &str, request: &ExtractionRequest) -> ToolResult<Value> {
        debug!(url = %self.api_url, target_url = %request.url, "POST query-data");

        let response = self
            .client
            .post(self.api_url.clone())
            .header(API_KEY_HEADER, api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(ToolError::RemoteService {
                status: status.as_u16(),
                status_text: status
                    .canonical_reason()
                    .unwrap_or_else(|| status.as_str())
                    .to_string(),
                body,
            });
        }

        let body = response.bytes().await?;
        let parsed: QueryDataResponse = serde_json::from_slice(&body)?;
        Ok(parsed.data)
    }
}

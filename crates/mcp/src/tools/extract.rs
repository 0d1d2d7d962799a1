// AgentQL data extraction tool

use crate::auth::{resolve_api_key, AuthContext};
use crate::client::{ExtractionClient, ExtractionRequest};
use crate::config::McpConfig;
use crate::error::{ToolError, ToolResult};
use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{json_schema_object, json_schema_string, Tool};
use serde_json::Value;
use std::sync::Arc;

pub const EXTRACT_TOOL_NAME: &str = "extract-web-data";

/// Extracts structured JSON from a web page through the AgentQL API
pub struct ExtractWebDataTool {
    client: ExtractionClient,
    config: Arc<McpConfig>,
}

impl ExtractWebDataTool {
    pub fn new(config: Arc<McpConfig>) -> ToolResult<Self> {
        Ok(Self {
            client: ExtractionClient::new(&config)?,
            config,
        })
    }
}

/// Pull `url` and `prompt` out of the call arguments.
///
/// Each must be a non-empty string; every field that is not is reported.
fn parse_arguments(arguments: Option<&Value>) -> ToolResult<ExtractionRequest> {
    let field = |name: &str| {
        arguments
            .and_then(|args| args.get(name))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };

    match (field("url"), field("prompt")) {
        (Some(url), Some(prompt)) => Ok(ExtractionRequest::new(url, prompt)),
        (url, prompt) => {
            let mut fields = Vec::new();
            if url.is_none() {
                fields.push("url");
            }
            if prompt.is_none() {
                fields.push("prompt");
            }
            Err(ToolError::InvalidArgument { fields })
        }
    }
}

#[async_trait::async_trait]
impl Tool for ExtractWebDataTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: EXTRACT_TOOL_NAME.to_string(),
            description: "Extracts structured data as JSON from a web page given a URL using a Natural Language description of the data.".to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "url": json_schema_string("The URL of the public webpage to extract data from"),
                    "prompt": json_schema_string("Natural Language description of the data to extract from the page")
                }),
                vec!["url", "prompt"],
            ),
        }
    }

    async fn execute(&self, arguments: Option<Value>, auth: &AuthContext) -> ToolResult<CallToolResult> {
        // Credential first, so a misconfigured server fails before validation
        let api_key = resolve_api_key(auth, &self.config)?;
        let request = parse_arguments(arguments.as_ref())?;

        let data = self.client.query_data(&api_key, &request).await?;
        let text = serde_json::to_string_pretty(&data)?;

        Ok(CallToolResult::text(text))
    }
}

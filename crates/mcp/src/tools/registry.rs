// Tool trait and registry

use crate::auth::AuthContext;
use crate::error::{ToolError, ToolResult};
use crate::protocol::{CallToolResult, ToolSchema};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Tool executor trait
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool schema for MCP
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with the caller's arguments and per-call credentials
    async fn execute(&self, arguments: Option<Value>, auth: &AuthContext) -> ToolResult<CallToolResult>;
}

/// Tool registry for managing available tools
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        self.tools.insert(schema.name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all tool schemas, ordered by name
    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Look up `name` and run it. Unknown names fail before anything else
    /// happens.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<Value>,
        auth: &AuthContext,
    ) -> ToolResult<CallToolResult> {
        let tool = self.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;
        tool.execute(arguments, auth).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Helper functions for creating tool schemas

pub fn json_schema_object(properties: Value, required: Vec<&str>) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

pub fn json_schema_string(description: &str) -> Value {
    serde_json::json!({
        "type": "string",
        "description": description
    })
}

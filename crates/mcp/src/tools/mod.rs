pub mod extract;
mod registry;

pub use extract::{ExtractWebDataTool, EXTRACT_TOOL_NAME};
pub use registry::{json_schema_object, json_schema_string, Tool, ToolRegistry};

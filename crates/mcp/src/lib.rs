// MCP (Model Context Protocol) server exposing AgentQL data extraction
// as a single tool to agent clients.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod rest;
pub mod server;
pub mod tools;

pub use config::{McpConfig, TransportMode};
pub use error::{ToolError, ToolResult};
pub use server::McpServer;

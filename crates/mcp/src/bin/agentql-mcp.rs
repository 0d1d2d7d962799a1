// Standalone MCP server binary

use agentql_mcp::config::{ConfigLayer, McpConfig, TransportMode};
use agentql_mcp::server::McpServer;
use agentql_mcp::tools::{ExtractWebDataTool, ToolRegistry};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "agentql-mcp")]
#[command(about = "MCP server for AgentQL web data extraction", version, long_about = None)]
struct Args {
    /// Path to an optional TOML configuration file
    #[arg(short, long, default_value = "agentql-mcp.toml")]
    config: PathBuf,

    /// Default AgentQL API key, used when a call supplies none
    #[arg(long = "agentql_api_key", env = "AGENTQL_API_KEY", hide_env_values = true)]
    agentql_api_key: Option<String>,

    /// Transport to serve on
    #[arg(long, env = "MODE", value_enum)]
    mode: Option<TransportMode>,

    /// Port for the REST transport
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Path of the REST endpoint
    #[arg(long, env = "ENDPOINT")]
    endpoint: Option<String>,

    /// AgentQL query-data URL
    #[arg(long, env = "AGENTQL_API_URL")]
    api_url: Option<String>,

    /// Request timeout in seconds (0 disables it)
    #[arg(long, env = "AGENTQL_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

impl Args {
    fn overrides(&self) -> ConfigLayer {
        ConfigLayer {
            agentql_api_key: self.agentql_api_key.clone(),
            mode: self.mode,
            port: self.port,
            endpoint: self.endpoint.clone(),
            api_url: self.api_url.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing. Stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = Arc::new(McpConfig::load(&args.config, args.overrides())?);

    tracing::info!(mode = ?config.mode, "AgentQL MCP server starting...");
    if !config.has_default_key() {
        // Calls can still authenticate per request
        tracing::warn!("No default AGENTQL_API_KEY configured");
    }

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(
        ExtractWebDataTool::new(config.clone()).context("Failed to create HTTP client")?,
    ));
    tracing::info!("Registered {} tools", registry.list_schemas().len());

    let server = McpServer::new(registry);
    match config.mode {
        TransportMode::Stdio => server.serve_stdio().await?,
        TransportMode::Rest => agentql_mcp::rest::serve(server, config.port, &config.endpoint).await?,
    }

    Ok(())
}

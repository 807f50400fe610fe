#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::sync::Arc;

use dotenv::dotenv;
use poem::{EndpointExt, Route, Server, listener::TcpListener, middleware::Tracing};
use poem_mcpserver::{McpServer, streamable_http};
use remote_pty_mcp::mcp::{McpRemoteTools, RemoteConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Initialize logging with proper tracing default
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let config = Arc::new(RemoteConfig::from_env());
    match config.target() {
        Ok(target) => info!("Remote target: {}", target.display()),
        Err(e) => warn!("Remote tools will fail until configured: {}", e),
    }

    // Setup MCP server
    let mcp_port: u16 = std::env::var("MCP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let mcp_addr = format!("0.0.0.0:{}", mcp_port);
    info!("Starting MCP server on {}", mcp_addr);

    let app = Route::new()
        .at(
            "/",
            streamable_http::endpoint(move |_| {
                McpServer::new().tools(McpRemoteTools::new(config.clone()))
            }),
        )
        .with(Tracing);

    info!("MCP server with remote PTY tools is ready");

    Server::new(TcpListener::bind(mcp_addr))
        .name("Remote PTY MCP Server")
        .run(app)
        .await?;

    Ok(())
}

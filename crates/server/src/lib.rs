// Process entry point shared by the five tool server binaries

use anyhow::{Context, Result};
use clap::Parser;
use genmedia_core::storage::ObjectStoreStorage;
use genmedia_core::{ServerConfig, TransportMode};
use genmedia_mcp::{McpServer, Service, ToolContext};
use std::sync::Arc;

pub mod api;
pub mod cli;
pub mod telemetry;

use cli::Args;

/// Parse flags, load configuration and serve `service` on the selected
/// transport. Startup failures are returned so `main` exits non-zero.
pub async fn run(service: Service) -> Result<()> {
    let args = Args::parse();
    telemetry::init();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    let config = Arc::new(args.apply(config));
    tracing::info!(server = service.server_name(), ?config, "starting");

    let context = ToolContext::new(config.clone(), Arc::new(ObjectStoreStorage::gcs()))
        .context("failed to build upstream clients")?;
    let server = Arc::new(McpServer::new(service, context));

    match config.transport {
        TransportMode::Stdio => {
            genmedia_mcp::stdio::serve(server, tokio::io::stdin(), tokio::io::stdout())
                .await
                .context("stdio transport failed")?;
        }
        mode @ (TransportMode::Sse | TransportMode::Http) => {
            api::serve(&config.bind_addr(), server, mode).await?;
        }
    }
    Ok(())
}

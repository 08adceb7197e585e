use clap::Parser;
use genmedia_core::{ServerConfig, TransportMode};

/// Command line of every tool server binary.
#[derive(Parser, Debug)]
#[command(about = "MCP tool server for generative media", long_about = None)]
pub struct Args {
    /// Transport to serve on: stdio, sse or http
    #[arg(long, env = "MCP_TRANSPORT")]
    pub transport: Option<TransportMode>,

    /// Port for the sse and http transports
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl Args {
    /// Flags override the environment-derived configuration.
    pub fn apply(&self, config: ServerConfig) -> ServerConfig {
        let mut config = match self.transport {
            Some(transport) => config.with_transport(transport),
            None => config,
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        config
    }
}

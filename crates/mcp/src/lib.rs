// MCP (Model Context Protocol) layer for the generative-media tool servers.
// Protocol types, typed tools, the dispatcher and the stdio transport.

pub mod context;
pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod service;
pub mod stdio;
pub mod tools;

#[cfg(test)]
mod test_support;

pub use context::{Notifier, ToolContext};
pub use server::McpServer;
pub use service::Service;

// Shared runtime for the generative-media MCP tool servers

pub mod config;
pub mod error;
pub mod media;
pub mod operation;
pub mod process;
pub mod speech;
pub mod storage;
pub mod toolchain;
pub mod vertex;

pub use config::{ConfigError, ServerConfig, TransportMode};
pub use error::{ErrorKind, ToolError, ToolResult};
pub use media::{GcsUri, MediaReference};

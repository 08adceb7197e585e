//! Error taxonomy shared by every tool server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Coarse classification of a failed tool call, reported to callers verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    SchemaValidationFailed,
    UnknownTool,
    UpstreamApiError,
    ContentFiltered,
    SubprocessFailed,
    DependencyMissing,
    Timeout,
    StorageAccessError,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaValidationFailed => "SchemaValidationFailed",
            Self::UnknownTool => "UnknownTool",
            Self::UpstreamApiError => "UpstreamApiError",
            Self::ContentFiltered => "ContentFiltered",
            Self::SubprocessFailed => "SubprocessFailed",
            Self::DependencyMissing => "DependencyMissing",
            Self::Timeout => "Timeout",
            Self::StorageAccessError => "StorageAccessError",
            Self::Internal => "Internal",
        }
    }

    /// JSON-RPC error code reported for this kind.
    pub fn rpc_code(&self) -> i32 {
        match self {
            Self::SchemaValidationFailed => -32602,
            Self::UnknownTool => -32601,
            Self::UpstreamApiError => -32001,
            Self::ContentFiltered => -32002,
            Self::SubprocessFailed => -32003,
            Self::DependencyMissing => -32004,
            Self::Timeout => -32005,
            Self::StorageAccessError => -32006,
            Self::Internal => -32603,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors a tool call can end with.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    /// Arguments were malformed or a required field was missing.
    #[error("invalid arguments: {0}")]
    SchemaValidation(String),

    /// No tool with this name is registered.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The generative service rejected or failed the request.
    #[error("{0}")]
    Upstream(String),

    /// The service's safety system blocked the output.
    #[error("content filtered: {0}")]
    ContentFiltered(String),

    /// An external process exited unsuccessfully.
    #[error("{program} failed ({status}): {tail}")]
    SubprocessFailed {
        program: String,
        status: String,
        tail: String,
    },

    /// A required binary could not be spawned.
    #[error("required dependency not available: {0}")]
    DependencyMissing(String),

    /// The call exceeded its time budget.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Object storage or local file access failed.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SchemaValidation(_) => ErrorKind::SchemaValidationFailed,
            Self::UnknownTool(_) => ErrorKind::UnknownTool,
            Self::Upstream(_) => ErrorKind::UpstreamApiError,
            Self::ContentFiltered(_) => ErrorKind::ContentFiltered,
            Self::SubprocessFailed { .. } => ErrorKind::SubprocessFailed,
            Self::DependencyMissing(_) => ErrorKind::DependencyMissing,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Storage(_) => ErrorKind::StorageAccessError,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::SchemaValidation(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

impl PartialEq for ToolError {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.to_string() == other.to_string()
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::SchemaValidation(err.to_string())
    }
}

impl From<object_store::Error> for ToolError {
    fn from(err: object_store::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(format!("upstream request timed out: {}", err))
        } else {
            Self::Upstream(format!("upstream request failed: {}", err))
        }
    }
}

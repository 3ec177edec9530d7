//! Error types for freecad-mcp.
//!
//! RPC transport errors live in [`crate::rpc::RpcError`]; this module holds
//! configuration errors and the errors a tool handler can return.

use std::path::PathBuf;

use thiserror::Error;

use crate::rpc::RpcError;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Result type for tool handlers.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors a tool handler can return.
///
/// The tool layer turns every variant into an `isError` result prefixed with
/// the failed operation, so messages here describe only the cause.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Tool arguments are missing or malformed.
    #[error("{0}")]
    InvalidArgument(String),

    /// The RPC call itself failed.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// A local file could not be read or written.
    #[error("{path}: {source}")]
    Io {
        /// File that was accessed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// JSON could not be parsed or did not have the expected shape.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The host reported a failure.
    #[error("{0}")]
    Host(String),

    /// A host script printed no JSON result.
    #[error("could not find valid JSON in output: {output}")]
    MissingOutput {
        /// What the host printed instead.
        output: String,
    },
}

impl ToolError {
    /// Creates an invalid-argument error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates an IO error bound to a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

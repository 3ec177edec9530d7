//! Error types for RPC calls to the FreeCAD addon.

use thiserror::Error;

/// Result type for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors that can occur while talking to the FreeCAD RPC listener.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The HTTP request could not be sent or its body read.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The listener answered with a non-success HTTP status.
    #[error("RPC listener returned HTTP status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The response body is not well-formed XML.
    #[error("invalid XML in RPC response: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The response is XML but not a valid XML-RPC payload.
    #[error("malformed RPC payload: {message}")]
    Malformed {
        /// Description of what's wrong.
        message: String,
    },

    /// The remote method raised an exception.
    #[error("remote fault {code}: {message}")]
    Fault {
        /// XML-RPC fault code.
        code: i64,
        /// Fault string reported by the host.
        message: String,
    },

    /// The listener could not be reached or did not answer a ping.
    #[error(
        "Failed to connect to FreeCAD at {host}:{port}: {reason}. Make sure FreeCAD is running \
         with the MCP addon and RPC server started. Set FREECAD_HOST env var to override the \
         detected host."
    )]
    Unreachable {
        /// Host that was tried.
        host: String,
        /// Port that was tried.
        port: u16,
        /// Underlying failure.
        reason: String,
    },

    /// The result had an unexpected shape for the called method.
    #[error("unexpected result from '{method}': {message}")]
    UnexpectedResult {
        /// Remote method name.
        method: String,
        /// Description of what's wrong.
        message: String,
    },
}

impl RpcError {
    /// Creates a malformed payload error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_mentions_override() {
        let err = RpcError::Unreachable {
            host: "172.20.0.1".to_string(),
            port: 9875,
            reason: "connection refused".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("172.20.0.1:9875"));
        assert!(msg.contains("FREECAD_HOST"));
    }

    #[test]
    fn fault_display() {
        let err = RpcError::Fault {
            code: 1,
            message: "<class 'NameError'>:name 'x' is not defined".to_string(),
        };
        assert!(err.to_string().contains("NameError"));
    }
}

//! Newline-delimited stdio transport.
//!
//! One JSON-RPC message per line, UTF-8, no embedded newlines. stdin carries
//! client messages, stdout carries replies, and stderr belongs to the logger.

use std::io;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::mcp::protocol::{JsonRpcError, JsonRpcResponse};

/// Reads requests from stdin and writes replies to stdout.
pub struct StdioTransport {
    reader: BufReader<tokio::io::Stdin>,
    writer: tokio::io::Stdout,
}

impl StdioTransport {
    /// Wraps the process's stdin and stdout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            writer: tokio::io::stdout(),
        }
    }

    /// Reads the next line without its terminator, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from stdin fails.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(strip_terminator(line)))
    }

    /// Writes a success response.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        self.write_message(response).await
    }

    /// Writes an error response.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_error(&mut self, error: &JsonRpcError) -> io::Result<()> {
        self.write_message(error).await
    }

    async fn write_message<T: Serialize>(&mut self, message: &T) -> io::Result<()> {
        let json = encode_line(message)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_terminator(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}

/// Serialises a message as a single newline-terminated line.
fn encode_line<T: Serialize>(message: &T) -> io::Result<String> {
    let mut json =
        serde_json::to_string(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    // serde_json escapes newlines inside strings, so compact output is one line.
    debug_assert!(!json.contains('\n'));
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::RequestId;

    #[test]
    fn terminators_are_stripped() {
        assert_eq!(strip_terminator("{}\r\n".to_string()), "{}");
        assert_eq!(strip_terminator("{}\n".to_string()), "{}");
        assert_eq!(strip_terminator("{}".to_string()), "{}");
    }

    #[test]
    fn multi_line_text_stays_on_one_line() {
        let response = JsonRpcResponse::success(
            RequestId::Number(1),
            serde_json::json!({"content": [{"type": "text", "text": "line one\nline two"}]}),
        );
        let line = encode_line(&response).unwrap();
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn errors_are_one_line() {
        let error = JsonRpcError::method_not_found(RequestId::Number(1), "resources/list");
        let line = encode_line(&error).unwrap();
        assert_eq!(line.trim_end().lines().count(), 1);
    }
}

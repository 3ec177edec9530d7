//! MCP server lifecycle for the FreeCAD bridge.
//!
//! 1. **Initialisation**: capability negotiation and version agreement
//! 2. **Operation**: tool calls and prompt requests
//! 3. **Shutdown**: end of input or a termination signal
//!
//! The server handles one message at a time. Tool calls are forwarded to the
//! [`Toolbox`], which owns the FreeCAD connection.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::mcp::protocol::{
    parse_message, ErrorCode, IncomingMessage, JsonRpcError, JsonRpcErrorData,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId, MCP_PROTOCOL_VERSION,
    SERVER_NAME,
};
use crate::mcp::transport::StdioTransport;
use crate::tools::{prompts, Toolbox};

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListCapabilities>,
    /// Prompt-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListCapabilities>,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: Some(ListCapabilities::default()),
            prompts: Some(ListCapabilities::default()),
        }
    }
}

/// Capabilities of a listable feature (tools, prompts).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListCapabilities {
    /// Whether the list can change during the session.
    #[serde(rename = "listChanged", skip_serializing_if = "is_false")]
    pub list_changed: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // skip_serializing_if passes &T
const fn is_false(b: &bool) -> bool {
    !*b
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// A tool definition for tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Parameters for tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// Parameters for prompts/get request.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptGetParams {
    /// Name of the prompt.
    pub name: String,
    /// Prompt arguments (accepted and ignored).
    #[serde(default)]
    pub arguments: Value,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Base64-encoded image.
    Image {
        /// The encoded image bytes.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl ToolContent {
    /// Wraps a base64 PNG.
    #[must_use]
    pub fn png(data: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: "image/png".to_string(),
        }
    }
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }
}

/// The MCP server bridging agents to FreeCAD.
pub struct McpServer {
    /// Current server state.
    state: ServerState,
    /// The transport layer.
    transport: StdioTransport,
    /// Negotiated protocol version (set after initialisation).
    protocol_version: Option<String>,
    /// Tool handlers and the FreeCAD connection.
    toolbox: Toolbox,
}

impl McpServer {
    /// Creates a new MCP server around a toolbox.
    #[must_use]
    pub fn new(toolbox: Toolbox) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            transport: StdioTransport::new(),
            protocol_version: None,
            toolbox,
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Runs the MCP server main loop with graceful shutdown handling.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run(&mut self) -> std::io::Result<()> {
        let outcome = self.run_with_shutdown().await;
        self.toolbox.disconnect();
        outcome
    }

    /// Runs the main loop and handles shutdown.
    #[cfg(unix)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(std::io::Error::other)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(std::io::Error::other)?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.read_line() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Runs the main loop and handles shutdown.
    #[cfg(windows)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.read_line() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Handles the result from transport read.
    ///
    /// Returns `true` if the server should shut down.
    async fn handle_transport_result(
        &mut self,
        line_result: std::io::Result<Option<String>>,
    ) -> std::io::Result<bool> {
        let Some(line) = line_result? else {
            tracing::info!("stdin closed, shutting down");
            self.state = ServerState::ShuttingDown;
            return Ok(true);
        };

        if line.trim().is_empty() {
            return Ok(false);
        }

        match self.process_line(&line).await {
            Some(Ok(response)) => self.transport.write_response(&response).await?,
            Some(Err(error)) => self.transport.write_error(&error).await?,
            None => {}
        }

        Ok(self.state == ServerState::ShuttingDown)
    }

    /// Handles one line of input and returns the reply, if any.
    ///
    /// Notifications produce no reply.
    pub async fn process_line(
        &mut self,
        line: &str,
    ) -> Option<Result<JsonRpcResponse, JsonRpcError>> {
        match parse_message(line) {
            Ok(IncomingMessage::Request(req)) => Some(self.handle_request(&req).await),
            Ok(IncomingMessage::Notification(notif)) => {
                self.handle_notification(&notif);
                None
            }
            Err(error) => Some(Err(error)),
        }
    }

    /// Handles an incoming request.
    async fn handle_request(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        tracing::debug!(method = %req.method, id = %req.id, "Request");
        match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "tools/list" => self.handle_tools_list(req),
            "tools/call" => self.handle_tools_call(req).await,
            "prompts/list" => self.handle_prompts_list(req),
            "prompts/get" => self.handle_prompts_get(req),
            "ping" => Ok(Self::handle_ping(req)),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        }
    }

    /// Handles an incoming notification.
    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        if notif.method == "notifications/initialized" && self.state == ServerState::Initialising {
            tracing::info!("Client initialised");
            self.state = ServerState::Running;
        } else {
            tracing::debug!(method = %notif.method, "Ignoring notification");
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(JsonRpcError::new(
                Some(req.id.clone()),
                JsonRpcErrorData::with_message(
                    ErrorCode::InvalidRequest,
                    "Server already initialised",
                ),
            ));
        }

        let params: InitializeParams = parse_params(req, "initialize")?;
        if let Some(client) = &params.client_info {
            tracing::info!(
                client = %client.name,
                version = client.version.as_deref().unwrap_or("unknown"),
                requested = %params.protocol_version,
                "Initialising"
            );
        }

        let negotiated_version = MCP_PROTOCOL_VERSION.to_string();

        self.protocol_version = Some(negotiated_version.clone());
        self.state = ServerState::Initialising;

        let result = json!({
            "protocolVersion": negotiated_version,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": ServerInfo::default(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let result = json!({
            "tools": Toolbox::definitions(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the tools/call request.
    async fn handle_tools_call(
        &mut self,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let params: ToolCallParams = parse_params(req, "tool call")?;
        let result = self.toolbox.call(&params.name, params.arguments).await;

        let result_value = serde_json::to_value(&result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_error(
                req.id.clone(),
                "Internal error: failed to serialise result",
            )
        })?;

        Ok(JsonRpcResponse::success(req.id.clone(), result_value))
    }

    /// Handles the prompts/list request.
    fn handle_prompts_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "prompts": prompts::list() }),
        ))
    }

    /// Handles the prompts/get request.
    fn handle_prompts_get(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let params: PromptGetParams = parse_params(req, "prompt")?;
        let prompt = prompts::get(&params.name).ok_or_else(|| {
            JsonRpcError::invalid_params(req.id.clone(), format!("Unknown prompt: {}", params.name))
        })?;

        let result = serde_json::to_value(prompt)
            .map_err(|e| JsonRpcError::internal_error(req.id.clone(), e.to_string()))?;
        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the ping request.
    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }

    /// Ensures the server is in the Running state.
    fn require_running(&self, id: &RequestId) -> Result<(), JsonRpcError> {
        if self.state != ServerState::Running {
            return Err(JsonRpcError::new(
                Some(id.clone()),
                JsonRpcErrorData::with_message(ErrorCode::InvalidRequest, "Server not initialised"),
            ));
        }
        Ok(())
    }
}

/// Deserialises required request params.
fn parse_params<T: serde::de::DeserializeOwned>(
    req: &JsonRpcRequest,
    what: &str,
) -> Result<T, JsonRpcError> {
    let params = req.params.clone().ok_or_else(|| {
        JsonRpcError::invalid_params(req.id.clone(), format!("Missing {what} params"))
    })?;
    serde_json::from_value(params).map_err(|e| {
        JsonRpcError::invalid_params(req.id.clone(), format!("Invalid {what} params: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Clearances;
    use crate::rpc::{Connector, Endpoint};
    use std::time::Duration;

    fn server() -> McpServer {
        // Nothing listens on port 1; tool calls fail fast with a connection error.
        let connector = Connector::new(Endpoint::new("127.0.0.1", 1), Duration::from_millis(200));
        McpServer::new(Toolbox::new(connector, true, Clearances::default()))
    }

    async fn initialise(server: &mut McpServer) {
        let reply = server
            .process_line(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"test"}}}"#,
            )
            .await;
        assert!(matches!(reply, Some(Ok(_))));
        assert!(server
            .process_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .is_none());
        assert_eq!(server.state(), ServerState::Running);
    }

    #[test]
    fn server_initial_state() {
        assert_eq!(server().state(), ServerState::AwaitingInit);
    }

    #[test]
    fn capabilities_advertise_tools_and_prompts() {
        let caps = serde_json::to_value(ServerCapabilities::default()).unwrap();
        assert_eq!(caps, json!({"tools": {}, "prompts": {}}));
    }

    #[test]
    fn tool_call_result_text() {
        let result = ToolCallResult::text("Hello, world!");
        assert!(!result.is_error);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value, json!({"content": [{"type": "text", "text": "Hello, world!"}]}));
    }

    #[test]
    fn tool_call_result_error() {
        let value = serde_json::to_value(ToolCallResult::error("Something went wrong")).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][0]["text"], "Something went wrong");
    }

    #[test]
    fn png_content_serialises_with_mime_type() {
        let value = serde_json::to_value(ToolContent::png("iVBORw0KGgo=")).unwrap();
        assert_eq!(
            value,
            json!({"type": "image", "data": "iVBORw0KGgo=", "mimeType": "image/png"})
        );
    }

    #[tokio::test]
    async fn requests_before_initialisation_are_rejected() {
        let mut server = server();
        let reply = server
            .process_line(r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#)
            .await;
        let Some(Err(error)) = reply else {
            panic!("expected an error");
        };
        assert_eq!(error.error.code, ErrorCode::InvalidRequest.code());
        assert_eq!(error.error.message, "Server not initialised");
    }

    #[tokio::test]
    async fn initialise_twice_is_rejected() {
        let mut server = server();
        initialise(&mut server).await;
        let reply = server
            .process_line(
                r#"{"jsonrpc":"2.0","id":2,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
            )
            .await;
        assert!(matches!(reply, Some(Err(_))));
    }

    #[tokio::test]
    async fn lists_tools_and_prompts_once_running() {
        let mut server = server();
        initialise(&mut server).await;

        let Some(Ok(tools)) = server
            .process_line(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
            .await
        else {
            panic!("tools/list failed");
        };
        assert_eq!(
            tools.result["tools"].as_array().unwrap().len(),
            Toolbox::definitions().len()
        );

        let Some(Ok(prompt)) = server
            .process_line(
                r#"{"jsonrpc":"2.0","id":3,"method":"prompts/get","params":{"name":"asset_creation_strategy"}}"#,
            )
            .await
        else {
            panic!("prompts/get failed");
        };
        assert_eq!(prompt.result["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn unknown_prompt_is_invalid_params() {
        let mut server = server();
        initialise(&mut server).await;
        let Some(Err(error)) = server
            .process_line(r#"{"jsonrpc":"2.0","id":4,"method":"prompts/get","params":{"name":"x"}}"#)
            .await
        else {
            panic!("expected an error");
        };
        assert_eq!(error.error.code, ErrorCode::InvalidParams.code());
    }

    #[tokio::test]
    async fn unreachable_host_becomes_tool_error() {
        let mut server = server();
        initialise(&mut server).await;
        let Some(Ok(reply)) = server
            .process_line(
                r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"create_document","arguments":{"name":"Plant"}}}"#,
            )
            .await
        else {
            panic!("tools/call failed");
        };
        assert_eq!(reply.result["isError"], true);
        let text = reply.result["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Failed to create document:"), "{text}");
    }

    #[tokio::test]
    async fn unknown_method_is_reported() {
        let mut server = server();
        let Some(Err(error)) = server
            .process_line(r#"{"jsonrpc":"2.0","id":6,"method":"resources/list"}"#)
            .await
        else {
            panic!("expected an error");
        };
        assert_eq!(error.error.code, ErrorCode::MethodNotFound.code());
    }
}

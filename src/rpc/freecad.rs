//! Typed access to the FreeCAD addon's RPC methods.
//!
//! Every method here maps one-to-one onto a method exported by the addon's
//! RPC server. The addon answers most calls with a status struct
//! (`success` plus `message` or `error`), which is surfaced as [`HostReply`].

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::rpc::client::{Endpoint, RpcCaller, XmlRpcClient};
use crate::rpc::error::{RpcError, RpcResult};
use crate::script::{self, ScreenshotProbe};

/// PNG file signature.
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Status struct returned by most addon methods.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostReply {
    /// Whether the host reported success.
    #[serde(default)]
    pub success: bool,
    /// Informational message (stdout of executed code, for instance).
    #[serde(default)]
    pub message: Option<String>,
    /// Error message when `success` is false.
    #[serde(default)]
    pub error: Option<String>,
    /// Method-specific fields such as `document_name` or `object_name`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HostReply {
    /// Returns the message text, or an empty string.
    #[must_use]
    pub fn output(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }

    /// Returns the error text, or a generic placeholder.
    #[must_use]
    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or("Unknown error")
    }

    /// Returns a method-specific string field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// Typed client for the FreeCAD addon.
#[derive(Clone)]
pub struct FreeCad {
    caller: Arc<dyn RpcCaller>,
}

impl FreeCad {
    /// Wraps an RPC caller.
    #[must_use]
    pub fn new(caller: Arc<dyn RpcCaller>) -> Self {
        Self { caller }
    }

    fn reply(method: &str, value: Value) -> RpcResult<HostReply> {
        serde_json::from_value(value).map_err(|e| RpcError::UnexpectedResult {
            method: method.to_string(),
            message: e.to_string(),
        })
    }

    /// Checks that the listener is alive.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn ping(&self) -> RpcResult<bool> {
        let value = self.caller.call("ping", vec![]).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Creates a new document.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn create_document(&self, name: &str) -> RpcResult<HostReply> {
        let value = self.caller.call("create_document", vec![json!(name)]).await?;
        Self::reply("create_document", value)
    }

    /// Creates an object from `{Name, Type, Properties, Analysis}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn create_object(&self, doc_name: &str, obj_data: Value) -> RpcResult<HostReply> {
        let value = self
            .caller
            .call("create_object", vec![json!(doc_name), obj_data])
            .await?;
        Self::reply("create_object", value)
    }

    /// Edits an object with `{Properties}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn edit_object(
        &self,
        doc_name: &str,
        obj_name: &str,
        obj_data: Value,
    ) -> RpcResult<HostReply> {
        let value = self
            .caller
            .call("edit_object", vec![json!(doc_name), json!(obj_name), obj_data])
            .await?;
        Self::reply("edit_object", value)
    }

    /// Deletes an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn delete_object(&self, doc_name: &str, obj_name: &str) -> RpcResult<HostReply> {
        let value = self
            .caller
            .call("delete_object", vec![json!(doc_name), json!(obj_name)])
            .await?;
        Self::reply("delete_object", value)
    }

    /// Inserts a part from the parts library addon.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn insert_part_from_library(&self, relative_path: &str) -> RpcResult<HostReply> {
        let value = self
            .caller
            .call("insert_part_from_library", vec![json!(relative_path)])
            .await?;
        Self::reply("insert_part_from_library", value)
    }

    /// Executes Python code inside FreeCAD.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn execute_code(&self, code: &str) -> RpcResult<HostReply> {
        let value = self.caller.call("execute_code", vec![json!(code)]).await?;
        Self::reply("execute_code", value)
    }

    /// Lists the serialised objects of a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the result is not a list.
    pub async fn get_objects(&self, doc_name: &str) -> RpcResult<Vec<Value>> {
        match self.caller.call("get_objects", vec![json!(doc_name)]).await? {
            Value::Array(items) => Ok(items),
            other => Err(RpcError::UnexpectedResult {
                method: "get_objects".to_string(),
                message: format!("expected a list, got {other}"),
            }),
        }
    }

    /// Returns one serialised object.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn get_object(&self, doc_name: &str, obj_name: &str) -> RpcResult<Value> {
        self.caller
            .call("get_object", vec![json!(doc_name), json!(obj_name)])
            .await
    }

    /// Lists parts in the parts library addon.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn get_parts_list(&self) -> RpcResult<Vec<String>> {
        let value = self.caller.call("get_parts_list", vec![]).await?;
        Ok(value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Captures the active 3D view as a base64-encoded PNG.
    ///
    /// Returns `None` when the active view cannot be captured (spreadsheet or
    /// drawing pages, no GUI) or when anything fails along the way.
    pub async fn get_active_screenshot(&self, view_name: &str) -> Option<String> {
        match script::run::<ScreenshotProbe>(self, &script::screenshot_probe()).await {
            Ok(probe) if probe.supported => {}
            Ok(probe) => {
                tracing::info!(
                    view_type = probe.view_type.as_deref().unwrap_or("none"),
                    "Screenshot unavailable in current view"
                );
                return None;
            }
            Err(e) => {
                tracing::error!(error = %e, "Error probing active view");
                return None;
            }
        }

        match self
            .caller
            .call("get_active_screenshot", vec![json!(view_name)])
            .await
        {
            Ok(Value::String(data)) if is_png_base64(&data) => Some(data),
            Ok(Value::String(_)) => {
                tracing::warn!("Screenshot payload is not a base64 PNG");
                None
            }
            Ok(_) => None,
            Err(e) => {
                tracing::error!(error = %e, "Error getting screenshot");
                None
            }
        }
    }
}

/// Returns true if `data` is base64 that decodes to a PNG.
#[must_use]
pub fn is_png_base64(data: &str) -> bool {
    BASE64_STANDARD
        .decode(data.trim())
        .is_ok_and(|bytes| bytes.starts_with(PNG_MAGIC))
}

/// Lazily establishes and caches the connection to FreeCAD.
pub struct Connector {
    endpoint: Endpoint,
    timeout: Duration,
    caller: Option<Arc<dyn RpcCaller>>,
    cached: Option<FreeCad>,
}

impl Connector {
    /// Creates a connector that will open an XML-RPC client on first use.
    #[must_use]
    pub const fn new(endpoint: Endpoint, timeout: Duration) -> Self {
        Self {
            endpoint,
            timeout,
            caller: None,
            cached: None,
        }
    }

    /// Creates a connector over an existing caller instead of HTTP.
    #[must_use]
    pub fn with_caller(endpoint: Endpoint, caller: Arc<dyn RpcCaller>) -> Self {
        Self {
            endpoint,
            timeout: Duration::from_secs(30),
            caller: Some(caller),
            cached: None,
        }
    }

    /// Returns the configured endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the cached connection, connecting and pinging first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Unreachable`] if the listener does not answer.
    pub async fn connect(&mut self) -> RpcResult<FreeCad> {
        if let Some(freecad) = &self.cached {
            return Ok(freecad.clone());
        }

        let caller: Arc<dyn RpcCaller> = match &self.caller {
            Some(caller) => Arc::clone(caller),
            None => Arc::new(XmlRpcClient::new(self.endpoint.clone(), self.timeout)?),
        };
        let freecad = FreeCad::new(caller);

        let reason = match freecad.ping().await {
            Ok(true) => {
                tracing::info!(endpoint = %self.endpoint, "Connected to FreeCAD");
                self.cached = Some(freecad.clone());
                return Ok(freecad);
            }
            Ok(false) => "ping returned false".to_string(),
            Err(e) => e.to_string(),
        };

        tracing::error!(endpoint = %self.endpoint, %reason, "Failed to connect to FreeCAD");
        Err(RpcError::Unreachable {
            host: self.endpoint.host.clone(),
            port: self.endpoint.port,
            reason,
        })
    }

    /// Drops the cached connection.
    pub fn disconnect(&mut self) {
        if self.cached.take().is_some() {
            tracing::info!(endpoint = %self.endpoint, "Disconnecting from FreeCAD");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_reply_defaults() {
        let reply: HostReply =
            serde_json::from_value(json!({"success": true, "document_name": "Doc"})).unwrap();
        assert!(reply.success);
        assert_eq!(reply.field("document_name"), Some("Doc"));
        assert_eq!(reply.output(), "");
        assert_eq!(reply.error_text(), "Unknown error");
    }

    #[test]
    fn png_detection() {
        let png = BASE64_STANDARD.encode(b"\x89PNG\r\n\x1a\nrest");
        assert!(is_png_base64(&png));
        assert!(!is_png_base64(&BASE64_STANDARD.encode(b"GIF89a")));
        assert!(!is_png_base64("not base64!"));
    }
}

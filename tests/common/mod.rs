//! In-memory stand-in for the FreeCAD addon's RPC listener.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use freecad_mcp::contract::Clearances;
use freecad_mcp::rpc::{Connector, Endpoint, RpcCaller, RpcError, RpcResult};
use freecad_mcp::tools::Toolbox;

/// A 1x1 transparent PNG.
pub const TINY_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

type Responder = dyn Fn(&str, &[Value]) -> RpcResult<Value> + Send + Sync;

/// Records every call and answers through a closure.
pub struct MockFreeCad {
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    responder: Box<Responder>,
}

impl MockFreeCad {
    /// Answers `ping` with true and everything else through `responder`.
    pub fn new(
        responder: impl Fn(&str, &[Value]) -> RpcResult<Value> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        })
    }

    /// Methods called so far, pings excluded.
    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.clone())
            .filter(|m| m != "ping")
            .collect()
    }

    /// Parameters of the first call to `method`.
    pub fn params_of(&self, method: &str) -> Option<Vec<Value>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
    }

    /// Payloads of every host script sent through `execute_code`.
    pub fn script_payloads(&self) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == "execute_code")
            .filter_map(|(_, p)| p.first().and_then(Value::as_str).and_then(script_payload))
            .collect()
    }
}

#[async_trait]
impl RpcCaller for MockFreeCad {
    async fn call(&self, method: &str, params: Vec<Value>) -> RpcResult<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params.clone()));
        if method == "ping" {
            return Ok(json!(true));
        }
        (self.responder)(method, &params)
    }
}

/// Decodes the `payload = json.loads("...")` line of a rendered host script.
pub fn script_payload(code: &str) -> Option<Value> {
    let line = code
        .lines()
        .find(|l| l.starts_with("payload = json.loads("))?;
    let literal = line
        .trim_start_matches("payload = json.loads(")
        .strip_suffix(')')?;
    let text: String = serde_json::from_str(literal).ok()?;
    serde_json::from_str(&text).ok()
}

/// Wraps a host script's printed result the way the addon reports stdout.
pub fn script_output(result: &Value) -> Value {
    json!({
        "success": true,
        "message": format!("Python code execution scheduled. \nOutput: {result}\n"),
    })
}

/// A fault like the addon raises for an unknown object.
pub fn fault(message: &str) -> RpcError {
    RpcError::Fault {
        code: 1,
        message: message.to_string(),
    }
}

/// Builds a toolbox over a mock.
pub fn toolbox(mock: &Arc<MockFreeCad>, only_text: bool) -> Toolbox {
    let caller: Arc<dyn RpcCaller> = mock.clone();
    Toolbox::new(
        Connector::with_caller(Endpoint::new("localhost", 9875), caller),
        only_text,
        Clearances::default(),
    )
}

/// Text of the first content item.
pub fn first_text(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap_or_default()
}

//! Python programs executed inside FreeCAD.
//!
//! Operations the addon has no dedicated RPC method for are carried out by
//! sending a small Python program through `execute_code`. Every program is
//! assembled from three parts:
//!
//! ```text
//! prelude.py        helpers shared by all programs
//! payload = ...     the arguments, as a JSON string literal
//! <body>.py         defines main(payload)
//! epilogue.py       runs main, prints its result (or the error) as JSON
//! ```
//!
//! Arguments never get spliced into Python source. The payload is encoded
//! as a JSON string literal, which is also a valid Python string literal,
//! and decoded on the host with `json.loads`.

mod programs;

pub use programs::*;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ToolError, ToolResult};
use crate::rpc::FreeCad;

/// Helpers shared by every program.
const PRELUDE: &str = include_str!("host/prelude.py");

/// Runs `main(payload)` and prints the outcome as one JSON object.
const EPILOGUE: &str = include_str!("host/epilogue.py");

/// Longest slice of host output quoted back in errors.
const MAX_QUOTED_OUTPUT: usize = 500;

/// A Python program ready to be sent to the host.
#[derive(Debug, Clone)]
pub struct HostScript {
    name: &'static str,
    body: &'static str,
    payload: Value,
}

impl HostScript {
    /// Binds a program body to its payload.
    #[must_use]
    pub const fn new(name: &'static str, body: &'static str, payload: Value) -> Self {
        Self {
            name,
            body,
            payload,
        }
    }

    /// Program name, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The arguments the program will receive.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Assembles the full Python source.
    #[must_use]
    pub fn render(&self) -> String {
        let literal = Value::String(self.payload.to_string()).to_string();
        format!(
            "{PRELUDE}\npayload = json.loads({literal})\n\n{}\n{EPILOGUE}",
            self.body
        )
    }
}

/// Runs a program on the host and decodes the JSON it printed.
///
/// # Errors
///
/// Returns [`ToolError::Host`] if execution fails or the program reported an
/// error, and [`ToolError::MissingOutput`] if nothing JSON-shaped came back.
pub async fn run<T: DeserializeOwned>(freecad: &FreeCad, script: &HostScript) -> ToolResult<T> {
    tracing::debug!(script = script.name(), "Running host script");

    let reply = freecad.execute_code(&script.render()).await?;
    if !reply.success {
        return Err(ToolError::Host(reply.error_text().to_string()));
    }

    let output = reply.output();
    let Some(value) = extract_json_from_output(output) else {
        tracing::warn!(script = script.name(), "Host script printed no JSON");
        return Err(ToolError::MissingOutput {
            output: quote(output),
        });
    };

    if let Some(error) = reported_error(&value) {
        if let Some(traceback) = value.get("traceback").and_then(Value::as_str) {
            tracing::debug!(script = script.name(), %traceback, "Host script traceback");
        }
        return Err(ToolError::Host(error));
    }

    Ok(serde_json::from_value(value)?)
}

/// Finds the first JSON object embedded in `output`.
///
/// The addon prefixes captured stdout with its own status text, and FreeCAD
/// may print warnings before the program's result, so every `{` is tried as
/// the start of an object.
#[must_use]
pub fn extract_json_from_output(output: &str) -> Option<Value> {
    output
        .char_indices()
        .filter(|&(_, c)| c == '{')
        .find_map(|(start, _)| {
            serde_json::Deserializer::from_str(&output[start..])
                .into_iter::<Value>()
                .next()
                .and_then(Result::ok)
                .filter(Value::is_object)
        })
}

/// Returns the error a program reported, if any.
fn reported_error(value: &Value) -> Option<String> {
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Some(error.to_string());
    }
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        return Some("Unknown error".to_string());
    }
    None
}

fn quote(output: &str) -> String {
    match output.char_indices().nth(MAX_QUOTED_OUTPUT) {
        Some((cut, _)) => format!("{}...", &output[..cut]),
        None => output.to_string(),
    }
}

//! Agent-facing tool registry.
//!
//! Every tool is a method on [`Toolbox`] that takes typed arguments and
//! returns a [`ToolResult`]. [`Toolbox::call`] parses the arguments, runs the
//! handler and turns any error into an `isError` result whose text names the
//! operation that failed (`Failed to create object: ...`).
//!
//! Tools are grouped by concern:
//!
//! - [`document`]: documents, objects, code execution and views
//! - [`contract`]: spatial contract export/import and equipment envelopes
//! - [`sitefit`]: site-fit solutions, layout options and finalisation
//! - [`drawing`]: TechDraw plan sheets and exports
//! - [`csa`]: control system architecture diagrams
//! - [`prompts`]: canned prompts

mod contract;
mod csa;
mod document;
mod drawing;
pub mod prompts;
mod sitefit;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::contract::Clearances;
use crate::error::{ToolError, ToolResult};
use crate::filters::DetailLevel;
use crate::mcp::server::{ToolCallResult, ToolContent, ToolDefinition};
use crate::rpc::{Connector, FreeCad};

/// View captured when a tool attaches a screenshot.
const SCREENSHOT_VIEW: &str = "Isometric";

/// Arguments shared by tools that touch the 3D view.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Feedback {
    /// Attach a screenshot of the active view.
    #[serde(default)]
    pub include_screenshot: bool,
    /// How much of the host payload to return.
    #[serde(default)]
    pub detail_level: DetailLevel,
}

/// Holds the FreeCAD connection and per-session settings for tool handlers.
pub struct Toolbox {
    connector: Connector,
    only_text: bool,
    clearances: Clearances,
}

impl Toolbox {
    /// Creates a toolbox around a (not yet connected) connector.
    #[must_use]
    pub const fn new(connector: Connector, only_text: bool, clearances: Clearances) -> Self {
        Self {
            connector,
            only_text,
            clearances,
        }
    }

    /// Returns true if screenshots are suppressed for the whole session.
    #[must_use]
    pub const fn only_text(&self) -> bool {
        self.only_text
    }

    /// Returns every tool definition, in listing order.
    #[must_use]
    pub fn definitions() -> Vec<ToolDefinition> {
        let mut tools = document::definitions();
        tools.extend(contract::definitions());
        tools.extend(sitefit::definitions());
        tools.extend(drawing::definitions());
        tools.extend(csa::definitions());
        tools
    }

    /// Drops the cached connection.
    pub fn disconnect(&mut self) {
        self.connector.disconnect();
    }

    /// Calls a tool by name.
    ///
    /// Never fails: errors become `isError` results.
    pub async fn call(&mut self, name: &str, arguments: Value) -> ToolCallResult {
        let Some(action) = failure_phrase(name) else {
            return ToolCallResult::error(format!("Unknown tool: {name}"));
        };

        tracing::debug!(tool = name, "Calling tool");
        match self.dispatch(name, arguments).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(tool = name, error = %e, "Tool call failed");
                ToolCallResult::error(format!("Failed to {action}: {e}"))
            }
        }
    }

    async fn dispatch(&mut self, name: &str, args: Value) -> ToolResult<ToolCallResult> {
        match name {
            // Documents and objects
            "create_document" => self.create_document(parse(args)?).await,
            "create_object" => self.create_object(parse(args)?).await,
            "edit_object" => self.edit_object(parse(args)?).await,
            "delete_object" => self.delete_object(parse(args)?).await,
            "execute_code" => self.execute_code(parse(args)?).await,
            "get_view" => self.get_view(parse(args)?).await,
            "insert_part_from_library" => self.insert_part_from_library(parse(args)?).await,
            "get_objects" => self.get_objects(parse(args)?).await,
            "get_object" => self.get_object(parse(args)?).await,
            "get_parts_list" => self.get_parts_list().await,
            // Spatial contract
            "export_contract_json" => self.export_contract_json(parse(args)?).await,
            "apply_placements" => self.apply_placements(parse(args)?).await,
            "export_glb" => self.export_glb(parse(args)?).await,
            "create_equipment_envelope" => self.create_equipment_envelope(parse(args)?).await,
            "create_site_boundary" => self.create_site_boundary(parse(args)?).await,
            // Site-fit
            "import_sitefit_contract" => self.import_sitefit_contract(parse(args)?).await,
            "present_layout_options" => self.present_layout_options(parse(args)?).await,
            "finalize_selected_layout" => self.finalize_selected_layout(parse(args)?).await,
            // TechDraw
            "create_techdraw_plan_sheet" => self.create_techdraw_plan_sheet(parse(args)?).await,
            "techdraw_preflight" => self.techdraw_preflight(parse(args)?).await,
            "list_techdraw_templates" => Ok(Self::list_techdraw_templates()),
            "export_techdraw_page" => self.export_techdraw_page(parse(args)?).await,
            // Control system architecture
            "import_csa_topology" => self.import_csa_topology(parse(args)?).await,
            "export_csa_topology" => self.export_csa_topology(parse(args)?).await,
            "add_csa_controller" => self.add_csa_controller(parse(args)?).await,
            "add_csa_device" => self.add_csa_device(parse(args)?).await,
            "add_csa_link" => self.add_csa_link(parse(args)?).await,
            "run_csa_layout" => self.run_csa_layout(parse(args)?).await,
            "create_csa_techdraw_sheet" => self.create_csa_techdraw_sheet(parse(args)?).await,
            _ => Ok(ToolCallResult::error(format!("Unknown tool: {name}"))),
        }
    }

    /// Returns the live connection, connecting first if needed.
    async fn freecad(&mut self) -> ToolResult<FreeCad> {
        Ok(self.connector.connect().await?)
    }

    /// Builds a text result, attaching a screenshot when asked for.
    ///
    /// The host is only asked for a screenshot when it will be returned.
    async fn respond(
        &self,
        freecad: &FreeCad,
        text: impl Into<String>,
        include_screenshot: bool,
    ) -> ToolCallResult {
        let mut result = ToolCallResult::text(text);
        if include_screenshot && !self.only_text {
            if let Some(data) = freecad.get_active_screenshot(SCREENSHOT_VIEW).await {
                result.content.push(ToolContent::png(data));
            }
        }
        result
    }
}

/// Verb phrase used in `Failed to ...` messages, or `None` for unknown tools.
fn failure_phrase(name: &str) -> Option<&'static str> {
    let phrase = match name {
        "create_document" => "create document",
        "create_object" => "create object",
        "edit_object" => "edit object",
        "delete_object" => "delete object",
        "execute_code" => "execute code",
        "get_view" => "get view",
        "insert_part_from_library" => "insert part from library",
        "get_objects" => "get objects",
        "get_object" => "get object",
        "get_parts_list" => "get parts list",
        "export_contract_json" => "export contract",
        "apply_placements" => "apply placements",
        "export_glb" => "export GLB",
        "create_equipment_envelope" => "create equipment envelope",
        "create_site_boundary" => "create site boundary",
        "import_sitefit_contract" => "import site-fit contract",
        "present_layout_options" => "present layout options",
        "finalize_selected_layout" => "finalize layout",
        "create_techdraw_plan_sheet" => "create TechDraw page",
        "techdraw_preflight" => "run TechDraw preflight",
        "list_techdraw_templates" => "list TechDraw templates",
        "export_techdraw_page" => "export TechDraw page",
        "import_csa_topology" => "import CSA topology",
        "export_csa_topology" => "export CSA topology",
        "add_csa_controller" => "add controller",
        "add_csa_device" => "add device",
        "add_csa_link" => "add link",
        "run_csa_layout" => "run layout",
        "create_csa_techdraw_sheet" => "create TechDraw sheet",
        _ => return None,
    };
    Some(phrase)
}

/// Deserialises tool arguments; a missing argument object counts as empty.
fn parse<T: DeserializeOwned>(args: Value) -> ToolResult<T> {
    let args = if args.is_null() {
        Value::Object(Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ToolError::invalid(format!("Invalid arguments: {e}")))
}

/// Accepts a JSON document given either inline or as a JSON-encoded string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JsonArg {
    /// A JSON-encoded string.
    Text(String),
    /// An inline JSON value.
    Value(Value),
}

impl JsonArg {
    /// Parses the document as `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON or does not match `T`.
    pub fn decode<T: DeserializeOwned>(self) -> ToolResult<T> {
        match self {
            Self::Text(text) => Ok(serde_json::from_str(&text)?),
            Self::Value(value) => Ok(serde_json::from_value(value)?),
        }
    }
}

/// Builds a tool definition with an object schema.
fn tool(name: &str, description: &str, properties: Value, required: &[&str]) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}

/// Adds the `include_screenshot` and `detail_level` properties to a schema.
fn with_feedback(mut properties: Value) -> Value {
    if let Some(map) = properties.as_object_mut() {
        map.insert(
            "include_screenshot".to_string(),
            json!({
                "type": "boolean",
                "description": "Attach a screenshot of the active view (default: false)",
                "default": false
            }),
        );
        map.insert(
            "detail_level".to_string(),
            json!({
                "type": "string",
                "enum": ["compact", "full"],
                "description": "compact returns essential fields only, full returns everything (default: compact)",
                "default": "compact"
            }),
        );
    }
    properties
}

/// Adds only the `include_screenshot` property to a schema.
fn with_screenshot(mut properties: Value) -> Value {
    if let Some(map) = properties.as_object_mut() {
        map.insert(
            "include_screenshot".to_string(),
            json!({
                "type": "boolean",
                "description": "Attach a screenshot of the active view (default: false)",
                "default": false
            }),
        );
    }
    properties
}

//! Document, object and view tools backed by the addon's RPC methods.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{ToolError, ToolResult};
use crate::filters::{filter_object_properties, filter_objects_list};
use crate::mcp::server::{ToolCallResult, ToolContent, ToolDefinition};
use crate::rpc::HostReply;
use crate::tools::{tool, with_feedback, with_screenshot, Feedback, Toolbox};

/// Views `get_view` can capture.
pub const VIEW_NAMES: [&str; 9] = [
    "Isometric",
    "Front",
    "Top",
    "Right",
    "Back",
    "Left",
    "Bottom",
    "Dimetric",
    "Trimetric",
];

#[derive(Debug, Deserialize)]
pub struct CreateDocumentArgs {
    name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateObjectArgs {
    doc_name: String,
    obj_type: String,
    obj_name: String,
    #[serde(default)]
    analysis_name: Option<String>,
    #[serde(default)]
    obj_properties: Option<Map<String, Value>>,
    #[serde(flatten)]
    feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct EditObjectArgs {
    doc_name: String,
    obj_name: String,
    obj_properties: Map<String, Value>,
    #[serde(flatten)]
    feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct ObjectArgs {
    doc_name: String,
    obj_name: String,
    #[serde(flatten)]
    feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct DocumentArgs {
    doc_name: String,
    #[serde(flatten)]
    feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteCodeArgs {
    code: String,
    #[serde(flatten)]
    feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct GetViewArgs {
    view_name: String,
}

#[derive(Debug, Deserialize)]
pub struct InsertPartArgs {
    relative_path: String,
    #[serde(flatten)]
    feedback: Feedback,
}

/// Turns a failed status reply into a host error.
fn check(reply: HostReply) -> ToolResult<HostReply> {
    if reply.success {
        Ok(reply)
    } else {
        Err(ToolError::Host(reply.error_text().to_string()))
    }
}

impl Toolbox {
    pub(super) async fn create_document(
        &mut self,
        args: CreateDocumentArgs,
    ) -> ToolResult<ToolCallResult> {
        let freecad = self.freecad().await?;
        let reply = check(freecad.create_document(&args.name).await?)?;
        let name = reply.field("document_name").unwrap_or(&args.name);
        tracing::info!(document = name, "Created document");
        Ok(ToolCallResult::text(format!(
            "Document '{name}' created successfully"
        )))
    }

    pub(super) async fn create_object(
        &mut self,
        args: CreateObjectArgs,
    ) -> ToolResult<ToolCallResult> {
        let freecad = self.freecad().await?;
        let obj_data = json!({
            "Name": args.obj_name,
            "Type": args.obj_type,
            "Properties": args.obj_properties.unwrap_or_default(),
            "Analysis": args.analysis_name,
        });
        let reply = check(freecad.create_object(&args.doc_name, obj_data).await?)?;
        let name = reply.field("object_name").unwrap_or(&args.obj_name);
        let text = format!("Object '{name}' created successfully");
        Ok(self
            .respond(&freecad, text, args.feedback.include_screenshot)
            .await)
    }

    pub(super) async fn edit_object(&mut self, args: EditObjectArgs) -> ToolResult<ToolCallResult> {
        let freecad = self.freecad().await?;
        let obj_data = json!({ "Properties": args.obj_properties });
        let reply = check(
            freecad
                .edit_object(&args.doc_name, &args.obj_name, obj_data)
                .await?,
        )?;
        let name = reply.field("object_name").unwrap_or(&args.obj_name);
        let text = format!("Object '{name}' edited successfully");
        Ok(self
            .respond(&freecad, text, args.feedback.include_screenshot)
            .await)
    }

    pub(super) async fn delete_object(&mut self, args: ObjectArgs) -> ToolResult<ToolCallResult> {
        let freecad = self.freecad().await?;
        let reply = check(freecad.delete_object(&args.doc_name, &args.obj_name).await?)?;
        let name = reply.field("object_name").unwrap_or(&args.obj_name);
        let text = format!("Object '{name}' deleted successfully");
        Ok(self
            .respond(&freecad, text, args.feedback.include_screenshot)
            .await)
    }

    pub(super) async fn execute_code(&mut self, args: ExecuteCodeArgs) -> ToolResult<ToolCallResult> {
        let freecad = self.freecad().await?;
        let reply = check(freecad.execute_code(&args.code).await?)?;
        let text = format!("Code executed successfully: {}", reply.output());
        Ok(self
            .respond(&freecad, text, args.feedback.include_screenshot)
            .await)
    }

    /// Captures a named view. The image is the whole answer, so this ignores
    /// the session's text-only setting.
    pub(super) async fn get_view(&mut self, args: GetViewArgs) -> ToolResult<ToolCallResult> {
        if !VIEW_NAMES.contains(&args.view_name.as_str()) {
            return Err(ToolError::invalid(format!(
                "Invalid view '{}'. Valid options: {}",
                args.view_name,
                VIEW_NAMES.join(", ")
            )));
        }
        let freecad = self.freecad().await?;
        Ok(match freecad.get_active_screenshot(&args.view_name).await {
            Some(data) => ToolCallResult {
                content: vec![ToolContent::png(data)],
                is_error: false,
            },
            None => ToolCallResult::text(
                "Cannot get screenshot in the current view type (such as TechDraw or Spreadsheet)",
            ),
        })
    }

    pub(super) async fn insert_part_from_library(
        &mut self,
        args: InsertPartArgs,
    ) -> ToolResult<ToolCallResult> {
        let freecad = self.freecad().await?;
        let reply = check(freecad.insert_part_from_library(&args.relative_path).await?)?;
        let text = format!("Part inserted from library: {}", reply.output());
        Ok(self
            .respond(&freecad, text, args.feedback.include_screenshot)
            .await)
    }

    pub(super) async fn get_objects(&mut self, args: DocumentArgs) -> ToolResult<ToolCallResult> {
        let freecad = self.freecad().await?;
        let objects = freecad.get_objects(&args.doc_name).await?;
        let filtered = filter_objects_list(&objects, args.feedback.detail_level);
        let text = serde_json::to_string(&filtered)?;
        Ok(self
            .respond(&freecad, text, args.feedback.include_screenshot)
            .await)
    }

    pub(super) async fn get_object(&mut self, args: ObjectArgs) -> ToolResult<ToolCallResult> {
        let freecad = self.freecad().await?;
        let object = freecad.get_object(&args.doc_name, &args.obj_name).await?;
        let filtered = filter_object_properties(&object, args.feedback.detail_level);
        let text = serde_json::to_string(&filtered)?;
        Ok(self
            .respond(&freecad, text, args.feedback.include_screenshot)
            .await)
    }

    pub(super) async fn get_parts_list(&mut self) -> ToolResult<ToolCallResult> {
        let freecad = self.freecad().await?;
        let parts = freecad.get_parts_list().await?;
        if parts.is_empty() {
            return Ok(ToolCallResult::text(
                "No parts found in the parts library. You must add parts_library addon.",
            ));
        }
        Ok(ToolCallResult::text(serde_json::to_string(&parts)?))
    }
}

#[allow(clippy::too_many_lines)]
pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        tool(
            "create_document",
            "Create a new document in FreeCAD.",
            json!({
                "name": {"type": "string", "description": "Name of the document to create"}
            }),
            &["name"],
        ),
        tool(
            "create_object",
            "Create a new object in FreeCAD. Object types start with \"Part::\", \"Draft::\", \
             \"PartDesign::\" or \"Fem::\" (e.g. Part::Box, Part::Cylinder, Draft::Circle, \
             PartDesign::Body, Fem::AnalysisPython, Fem::ConstraintFixed). Placement is given \
             as {\"Base\": {x, y, z}, \"Rotation\": {\"Axis\": {x, y, z}, \"Angle\": deg}} in \
             millimetres; view properties go under \"ViewObject\". FEM constraints, materials \
             and meshes are attached to the analysis named by analysis_name.",
            with_feedback(json!({
                "doc_name": {"type": "string", "description": "Document to create the object in"},
                "obj_type": {"type": "string", "description": "FreeCAD type id, e.g. Part::Box"},
                "obj_name": {"type": "string", "description": "Name of the new object"},
                "analysis_name": {"type": "string", "description": "Optional: FEM analysis to add the object to"},
                "obj_properties": {"type": "object", "description": "Optional: properties to set on the object"}
            })),
            &["doc_name", "obj_type", "obj_name"],
        ),
        tool(
            "edit_object",
            "Edit the properties of an existing object. Use this when create_object cannot \
             express the change.",
            with_feedback(json!({
                "doc_name": {"type": "string", "description": "Document containing the object"},
                "obj_name": {"type": "string", "description": "Name of the object to edit"},
                "obj_properties": {"type": "object", "description": "Properties to change"}
            })),
            &["doc_name", "obj_name", "obj_properties"],
        ),
        tool(
            "delete_object",
            "Delete an object from a document.",
            with_screenshot(json!({
                "doc_name": {"type": "string", "description": "Document containing the object"},
                "obj_name": {"type": "string", "description": "Name of the object to delete"}
            })),
            &["doc_name", "obj_name"],
        ),
        tool(
            "execute_code",
            "Execute arbitrary Python code inside FreeCAD and return its output.",
            with_screenshot(json!({
                "code": {"type": "string", "description": "Python code to execute"}
            })),
            &["code"],
        ),
        tool(
            "get_view",
            "Get a screenshot of the active view from the given direction. Not available in \
             TechDraw or Spreadsheet views.",
            json!({
                "view_name": {
                    "type": "string",
                    "enum": VIEW_NAMES,
                    "description": "View direction to capture"
                }
            }),
            &["view_name"],
        ),
        tool(
            "insert_part_from_library",
            "Insert a part from the parts library addon.",
            with_screenshot(json!({
                "relative_path": {"type": "string", "description": "Path of the part inside the library"}
            })),
            &["relative_path"],
        ),
        tool(
            "get_objects",
            "List the objects in a document. Compact detail returns Name, Label and TypeId \
             per object.",
            with_feedback(json!({
                "doc_name": {"type": "string", "description": "Document to list"}
            })),
            &["doc_name"],
        ),
        tool(
            "get_object",
            "Get the properties of one object. Compact detail returns Name, Label, TypeId, \
             Placement and Shape.",
            with_feedback(json!({
                "doc_name": {"type": "string", "description": "Document containing the object"},
                "obj_name": {"type": "string", "description": "Name of the object"}
            })),
            &["doc_name", "obj_name"],
        ),
        tool(
            "get_parts_list",
            "List the parts available in the parts library addon.",
            json!({}),
            &[],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_reply_becomes_host_error() {
        let reply: HostReply =
            serde_json::from_value(json!({"success": false, "error": "No such document"}))
                .unwrap();
        let err = check(reply).unwrap_err();
        assert_eq!(err.to_string(), "No such document");
    }

    #[test]
    fn create_object_args_flatten_feedback() {
        let args: CreateObjectArgs = serde_json::from_value(json!({
            "doc_name": "Plant",
            "obj_type": "Part::Box",
            "obj_name": "Box",
            "include_screenshot": true,
            "detail_level": "full"
        }))
        .unwrap();
        assert!(args.feedback.include_screenshot);
        assert!(args.obj_properties.is_none());
    }

    #[test]
    fn get_view_schema_lists_views() {
        let defs = definitions();
        let get_view = defs.iter().find(|d| d.name == "get_view").unwrap();
        let views = get_view.input_schema["properties"]["view_name"]["enum"]
            .as_array()
            .unwrap();
        assert_eq!(views.len(), VIEW_NAMES.len());
    }
}

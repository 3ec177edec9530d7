//! Spatial contract tools: export, placements, meshes and envelopes.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::json;

use crate::contract::envelope::{parse_envelope, EquipmentPlan};
use crate::contract::extract::{build_contract, ExportOptions, LayoutExtraction};
use crate::contract::placement::placements_to_host;
use crate::contract::{self, Envelope, PlacementSet};
use crate::error::{ToolError, ToolResult};
use crate::filters::filter_contract_response;
use crate::mcp::server::{ToolCallResult, ToolDefinition};
use crate::platform::wsl_to_windows_path;
use crate::rpc::FreeCad;
use crate::script::{self, BuildOutcome, BuildStatus, MeshExport, PlacementOutcome, WireSpec};
use crate::tools::{tool, with_feedback, Feedback, JsonArg, Toolbox};
use crate::units::point_m_to_mm;

/// Chordal tolerance for mesh export, in millimetres.
const MESH_TOLERANCE_MM: f64 = 1.0;

/// Placement errors listed in a summary before the rest are elided.
const MAX_LISTED_ERRORS: usize = 5;

/// Default label of the site boundary wire.
pub const DEFAULT_BOUNDARY_NAME: &str = "SiteBoundary";

/// Site boundary line colour (green).
pub const BOUNDARY_COLOR: [f64; 3] = [0.0, 0.5, 0.0];

/// Site boundary line width in pixels.
pub const BOUNDARY_WIDTH: f64 = 3.0;

const fn default_height() -> f64 {
    crate::contract::sitefit::DEFAULT_STRUCTURE_HEIGHT
}

fn default_boundary_name() -> String {
    DEFAULT_BOUNDARY_NAME.to_string()
}

#[derive(Debug, Deserialize)]
pub struct ExportContractArgs {
    doc_name: String,
    project_name: String,
    #[serde(default)]
    boundary_object: Option<String>,
    #[serde(default)]
    equipment_prefix: String,
    #[serde(default)]
    output_path: Option<String>,
    #[serde(flatten)]
    feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct ApplyPlacementsArgs {
    doc_name: String,
    #[serde(default)]
    contract_json: Option<JsonArg>,
    #[serde(default)]
    contract_path: Option<String>,
    #[serde(flatten)]
    feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct ExportGlbArgs {
    doc_name: String,
    #[serde(default)]
    object_name: Option<String>,
    #[serde(default)]
    output_path: Option<String>,
    #[serde(flatten)]
    feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct EquipmentEnvelopeArgs {
    doc_name: String,
    equipment_id: String,
    equipment_type: String,
    shape: String,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    length: Option<f64>,
    #[serde(default)]
    diameter: Option<f64>,
    #[serde(default = "default_height")]
    height: f64,
    #[serde(flatten)]
    feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct SiteBoundaryArgs {
    doc_name: String,
    boundary_points: Vec<[f64; 2]>,
    #[serde(default = "default_boundary_name")]
    boundary_name: String,
    #[serde(flatten)]
    feedback: Feedback,
}

/// Moves objects in `doc_name` to the given contract placements.
pub(super) async fn place(
    freecad: &FreeCad,
    doc_name: &str,
    placements: &PlacementSet,
) -> ToolResult<PlacementOutcome> {
    let host = placements_to_host(&placements.placements);
    script::run(freecad, &script::apply_placements(doc_name, &host, true)).await
}

/// Formats an apply-placements summary.
fn placement_summary(outcome: &PlacementOutcome) -> String {
    let mut text = format!(
        "Applied placements:\n- Updated: {} objects",
        outcome.updated.len()
    );
    if !outcome.errors.is_empty() {
        text.push_str(&format!("\n- Errors: {}", outcome.errors.len()));
        for error in outcome.errors.iter().take(MAX_LISTED_ERRORS) {
            text.push_str(&format!("\n  - {error}"));
        }
    }
    text
}

/// Replaces a `.glb` extension with `.obj`; FreeCAD only writes OBJ.
fn obj_path_for(glb: &Path) -> PathBuf {
    match glb.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("glb") => glb.with_extension("obj"),
        _ => glb.to_path_buf(),
    }
}

fn envelope_dimensions(envelope: &Envelope) -> String {
    match envelope {
        Envelope::Circle { diameter } => format!("diameter={diameter}m"),
        Envelope::Rectangle { width, length } => format!("width={width}m, length={length}m"),
    }
}

impl Toolbox {
    pub(super) async fn export_contract_json(
        &mut self,
        args: ExportContractArgs,
    ) -> ToolResult<ToolCallResult> {
        let freecad = self.freecad().await?;
        let extraction: LayoutExtraction = script::run(
            &freecad,
            &script::extract_layout(&args.doc_name, args.boundary_object.as_deref()),
        )
        .await?;

        let options = ExportOptions {
            boundary_object: args.boundary_object.clone(),
            equipment_prefix: Some(args.equipment_prefix).filter(|p| !p.is_empty()),
            clearances: self.clearances,
            ..ExportOptions::default()
        };
        let contract = build_contract(&args.project_name, &extraction, &options);
        tracing::info!(
            document = %args.doc_name,
            equipment = contract.equipment.len(),
            boundary_points = contract.site.boundary.len(),
            "Built spatial contract"
        );

        let text = match &args.output_path {
            Some(path) => {
                let bytes = contract::write_pretty(Path::new(path), &contract).await?;
                format!(
                    "Contract exported to: {path} ({bytes} bytes)\nEquipment count: {}\nBoundary points: {}",
                    contract.equipment.len(),
                    contract.site.boundary.len()
                )
            }
            None => {
                let value = serde_json::to_value(&contract)?;
                let filtered = filter_contract_response(&value, args.feedback.detail_level);
                serde_json::to_string_pretty(&filtered)?
            }
        };
        Ok(self
            .respond(&freecad, text, args.feedback.include_screenshot)
            .await)
    }

    pub(super) async fn apply_placements(
        &mut self,
        args: ApplyPlacementsArgs,
    ) -> ToolResult<ToolCallResult> {
        let placements: PlacementSet = match (args.contract_json, &args.contract_path) {
            (Some(inline), _) => inline.decode()?,
            (None, Some(path)) => contract::read_json(Path::new(path)).await?,
            (None, None) => {
                return Err(ToolError::invalid(
                    "Either contract_json or contract_path must be provided",
                ))
            }
        };
        if placements.placements.is_empty() {
            return Err(ToolError::invalid("No placements found in contract"));
        }

        let freecad = self.freecad().await?;
        let outcome = place(&freecad, &args.doc_name, &placements).await?;
        tracing::info!(
            document = %args.doc_name,
            updated = outcome.updated.len(),
            errors = outcome.errors.len(),
            "Applied placements"
        );
        Ok(self
            .respond(
                &freecad,
                placement_summary(&outcome),
                args.feedback.include_screenshot,
            )
            .await)
    }

    pub(super) async fn export_glb(&mut self, args: ExportGlbArgs) -> ToolResult<ToolCallResult> {
        let glb_path = match &args.output_path {
            Some(path) => PathBuf::from(path),
            None => {
                let stem = args.object_name.as_deref().unwrap_or(&args.doc_name);
                std::env::temp_dir().join(format!("{stem}.glb"))
            }
        };
        let obj_path = obj_path_for(&glb_path);
        let host_path = wsl_to_windows_path(&obj_path.to_string_lossy(), true).await;

        let freecad = self.freecad().await?;
        let mesh: MeshExport = script::run(
            &freecad,
            &script::export_mesh(
                &args.doc_name,
                args.object_name.as_deref(),
                &host_path,
                MESH_TOLERANCE_MM,
            ),
        )
        .await?;
        if !mesh.exists {
            return Err(ToolError::Host(format!(
                "Export failed: file not created at {}",
                mesh.path
            )));
        }

        let mut text = format!(
            "Mesh exported:\nExported to: {} ({} bytes)\nVertices: {}\nFaces: {}",
            mesh.path, mesh.bytes, mesh.vertices, mesh.faces
        );
        for warning in &mesh.warnings {
            text.push_str(&format!("\nWarning: {warning}"));
        }
        text.push_str(&format!(
            "\n\nNote: FreeCAD exports OBJ natively. For GLB conversion, use:\n  \
             blender --background --python-expr \"import bpy; \
             bpy.ops.import_scene.obj(filepath='{}'); \
             bpy.ops.export_scene.gltf(filepath='{}')\"",
            obj_path.display(),
            glb_path.display()
        ));
        Ok(self
            .respond(&freecad, text, args.feedback.include_screenshot)
            .await)
    }

    pub(super) async fn create_equipment_envelope(
        &mut self,
        args: EquipmentEnvelopeArgs,
    ) -> ToolResult<ToolCallResult> {
        let envelope = parse_envelope(&args.shape, args.width, args.length, args.diameter)?;
        let plan = EquipmentPlan::envelope(
            &args.equipment_id,
            &args.equipment_type,
            &envelope,
            args.height,
        )?;

        let freecad = self.freecad().await?;
        let outcome: BuildOutcome =
            script::run(&freecad, &script::build_equipment(&args.doc_name, &plan, true)).await?;
        match outcome.status {
            BuildStatus::Created => {}
            BuildStatus::Exists => {
                return Err(ToolError::Host(format!(
                    "Object '{}' already exists in document '{}'",
                    outcome.name, args.doc_name
                )))
            }
            BuildStatus::Collision => {
                return Err(ToolError::Host(format!(
                    "Name collision for {} - object with similar name exists",
                    args.equipment_id
                )))
            }
        }
        tracing::info!(id = %args.equipment_id, name = %outcome.name, "Created equipment envelope");

        let text = format!(
            "Created equipment envelope:\n  ID: {}\n  Type: {}\n  Shape: {}\n  Dimensions: {}, height={}m",
            args.equipment_id,
            args.equipment_type,
            envelope.shape_name(),
            envelope_dimensions(&envelope),
            args.height
        );
        Ok(self
            .respond(&freecad, text, args.feedback.include_screenshot)
            .await)
    }

    pub(super) async fn create_site_boundary(
        &mut self,
        args: SiteBoundaryArgs,
    ) -> ToolResult<ToolCallResult> {
        if args.boundary_points.len() < 3 {
            return Err(ToolError::invalid(format!(
                "boundary_points needs at least 3 points, got {}",
                args.boundary_points.len()
            )));
        }

        let spec = WireSpec {
            doc_name: args.doc_name.clone(),
            label: args.boundary_name.clone(),
            points: args.boundary_points.iter().copied().map(point_m_to_mm).collect(),
            closed: true,
            line_color: BOUNDARY_COLOR,
            line_width: BOUNDARY_WIDTH,
            group: None,
            fit_view: true,
        };
        let freecad = self.freecad().await?;
        let outcome: script::WireOutcome = script::run(&freecad, &script::make_wire(&spec)).await?;
        tracing::info!(name = %outcome.name, label = %outcome.label, "Created site boundary");

        let text = format!(
            "Created site boundary:\n  Name: {}\n  Label: {}\n  Points: {}\n  Closed: Yes",
            outcome.name, outcome.label, outcome.points
        );
        Ok(self
            .respond(&freecad, text, args.feedback.include_screenshot)
            .await)
    }
}

#[allow(clippy::too_many_lines)]
pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        tool(
            "export_contract_json",
            "Export the FreeCAD layout as a spatial contract JSON document for layout solvers. \
             Equipment ids are the FreeCAD object labels (names when unlabelled); envelopes come from bounding boxes \
             (circle when width and length differ by under 10%). All lengths in metres. \
             Without output_path the contract is returned inline.",
            with_feedback(json!({
                "doc_name": {"type": "string", "description": "FreeCAD document to export"},
                "project_name": {"type": "string", "description": "Project name written to the contract"},
                "boundary_object": {"type": "string", "description": "Optional: name or label of the object holding the site boundary"},
                "equipment_prefix": {"type": "string", "description": "Optional: only export objects whose id starts with this prefix"},
                "output_path": {"type": "string", "description": "Optional: file to write the contract to"}
            })),
            &["doc_name", "project_name"],
        ),
        tool(
            "apply_placements",
            "Move equipment to the placements of a solved contract. Coordinates are equipment \
             centres in metres; rotation_deg is about the Z axis. Objects are found by name, \
             then by label.",
            with_feedback(json!({
                "doc_name": {"type": "string", "description": "FreeCAD document to update"},
                "contract_json": {
                    "type": ["string", "object"],
                    "description": "Contract (or {\"placements\": [...]}) as an object or JSON string"
                },
                "contract_path": {"type": "string", "description": "Path to a contract JSON file"}
            })),
            &["doc_name"],
        ),
        tool(
            "export_glb",
            "Export a mesh of one object or the whole document for 3D viewers. FreeCAD writes \
             OBJ next to the requested .glb path; the response includes a Blender command to \
             convert it to GLB.",
            with_feedback(json!({
                "doc_name": {"type": "string", "description": "FreeCAD document"},
                "object_name": {"type": "string", "description": "Optional: export only this object"},
                "output_path": {"type": "string", "description": "Optional: target .glb path (default: temp directory)"}
            })),
            &["doc_name"],
        ),
        tool(
            "create_equipment_envelope",
            "Create an equipment envelope solid. Circle envelopes become cylinders (digesters \
             get a dome), rectangle envelopes become boxes centred on the origin (buildings get \
             a roof slab). Dimensions in metres.",
            with_feedback(json!({
                "doc_name": {"type": "string", "description": "FreeCAD document (created if missing)"},
                "equipment_id": {"type": "string", "description": "Equipment tag, e.g. TK-101"},
                "equipment_type": {"type": "string", "description": "Equipment type, e.g. tank, digester, building"},
                "shape": {"type": "string", "enum": ["circle", "rectangle"], "description": "Envelope shape"},
                "width": {"type": "number", "description": "Width in metres (rectangle)"},
                "length": {"type": "number", "description": "Length in metres (rectangle)"},
                "diameter": {"type": "number", "description": "Diameter in metres (circle)"},
                "height": {"type": "number", "description": "Height in metres (default: 5.0)", "default": 5.0}
            })),
            &["doc_name", "equipment_id", "equipment_type", "shape"],
        ),
        tool(
            "create_site_boundary",
            "Create a closed site boundary polyline from [x, y] points in metres.",
            with_feedback(json!({
                "doc_name": {"type": "string", "description": "FreeCAD document (created if missing)"},
                "boundary_points": {
                    "type": "array",
                    "items": {"type": "array", "items": {"type": "number"}, "minItems": 2, "maxItems": 2},
                    "description": "Boundary vertices as [x, y] in metres"
                },
                "boundary_name": {"type": "string", "description": "Label of the boundary (default: SiteBoundary)"}
            })),
            &["doc_name", "boundary_points"],
        ),
    ]
}

//! The individual host programs and the results they print.
//!
//! All lengths crossing this boundary are millimetres.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::contract::envelope::EquipmentPlan;
use crate::contract::extract::BoundingBox;
use crate::contract::placement::HostPlacement;
use crate::script::HostScript;
use crate::techdraw::LabelPlacement;

macro_rules! program {
    ($name:literal) => {
        ($name, include_str!(concat!("host/", $name, ".py")))
    };
}

fn script((name, body): (&'static str, &'static str), payload: Value) -> HostScript {
    HostScript::new(name, body, payload)
}

// ==================== View and document helpers ====================

/// Whether the active view can be captured.
#[derive(Debug, Clone, Deserialize)]
pub struct ScreenshotProbe {
    /// True if the active view is a 3D view that can save images.
    pub supported: bool,
    /// Python class name of the active view.
    #[serde(default)]
    pub view_type: Option<String>,
}

/// Inspects the active view before a screenshot is requested.
#[must_use]
pub fn screenshot_probe() -> HostScript {
    script(program!("screenshot_probe"), json!({}))
}

/// How [`ensure_document`] treats an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentMode {
    /// Reuse the document or create it.
    Ensure,
    /// Always create a new document.
    New,
    /// Only activate an existing document.
    Activate,
}

/// What [`ensure_document`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// A new document was created.
    Created,
    /// The document already existed.
    Exists,
    /// No such document (activate mode only).
    NotFound,
}

/// Result of [`ensure_document`].
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentOutcome {
    /// What happened.
    pub status: DocumentStatus,
    /// Name FreeCAD gave the document.
    pub doc_name: String,
}

/// Makes a document active, creating it according to `mode`.
#[must_use]
pub fn ensure_document(doc_name: &str, mode: DocumentMode) -> HostScript {
    script(
        program!("ensure_document"),
        json!({"doc_name": doc_name, "mode": mode}),
    )
}

/// Result of [`refresh_view`].
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshOutcome {
    /// Document that was recomputed.
    pub doc_name: String,
}

/// Recomputes a document and fits the view.
#[must_use]
pub fn refresh_view(doc_name: &str, view_top: bool) -> HostScript {
    script(
        program!("refresh_view"),
        json!({"doc_name": doc_name, "view_top": view_top}),
    )
}

/// Result of [`close_documents`].
#[derive(Debug, Clone, Deserialize)]
pub struct CloseOutcome {
    /// Documents that were closed.
    pub closed: Vec<String>,
    /// Documents that were not open.
    pub missing: Vec<String>,
}

/// Closes documents by name.
#[must_use]
pub fn close_documents(names: &[String]) -> HostScript {
    script(program!("close_documents"), json!({"names": names}))
}

// ==================== Contract programs ====================

/// Reads the geometry needed to build a contract.
///
/// The result decodes into [`crate::contract::extract::LayoutExtraction`].
#[must_use]
pub fn extract_layout(doc_name: &str, boundary_object: Option<&str>) -> HostScript {
    script(
        program!("extract_layout"),
        json!({"doc_name": doc_name, "boundary_object": boundary_object}),
    )
}

/// Result of [`apply_placements`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlacementOutcome {
    /// Ids of the objects that were moved.
    pub updated: Vec<String>,
    /// One message per placement that could not be applied.
    pub errors: Vec<String>,
}

/// Moves objects to solved positions.
#[must_use]
pub fn apply_placements(
    doc_name: &str,
    placements: &[HostPlacement],
    label_fallback: bool,
) -> HostScript {
    script(
        program!("apply_placements"),
        json!({
            "doc_name": doc_name,
            "placements": placements,
            "label_fallback": label_fallback,
        }),
    )
}

/// What [`build_equipment`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// The solid was created.
    Created,
    /// An object with that name already existed; nothing was built.
    Exists,
    /// FreeCAD renamed the new object; it was removed again.
    Collision,
}

/// Result of [`build_equipment`].
#[derive(Debug, Clone, Deserialize)]
pub struct BuildOutcome {
    /// What happened.
    pub status: BuildStatus,
    /// Internal object name.
    pub name: String,
    /// Object label (the equipment id).
    pub label: String,
}

/// Builds an equipment solid from a plan.
#[must_use]
pub fn build_equipment(doc_name: &str, plan: &EquipmentPlan, fit_view: bool) -> HostScript {
    script(
        program!("build_equipment"),
        json!({
            "doc_name": doc_name,
            "id": plan.id,
            "name": plan.name,
            "parts": plan.parts,
            "properties": plan.properties,
            "fit_view": fit_view,
        }),
    )
}

/// A polyline to draw with `Draft.make_wire`.
#[derive(Debug, Clone, Serialize)]
pub struct WireSpec {
    /// Target document; created if missing.
    pub doc_name: String,
    /// Label of the new wire.
    pub label: String,
    /// Vertices in millimetres.
    pub points: Vec<[f64; 2]>,
    /// Whether the last vertex joins the first.
    pub closed: bool,
    /// RGB line colour, components in `0..=1`.
    pub line_color: [f64; 3],
    /// Line width in pixels.
    pub line_width: f64,
    /// Group to put the wire in, created if missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Whether to switch to top view and fit afterwards.
    pub fit_view: bool,
}

/// Result of [`make_wire`].
#[derive(Debug, Clone, Deserialize)]
pub struct WireOutcome {
    /// Internal object name.
    pub name: String,
    /// Object label.
    pub label: String,
    /// Number of vertices.
    pub points: usize,
}

/// Draws a polyline.
#[must_use]
pub fn make_wire(spec: &WireSpec) -> HostScript {
    script(program!("make_wire"), json!(spec))
}

/// Result of [`export_mesh`].
#[derive(Debug, Clone, Deserialize)]
pub struct MeshExport {
    /// Written file.
    pub path: String,
    /// Whether the file exists after writing.
    pub exists: bool,
    /// File size.
    #[serde(default)]
    pub bytes: u64,
    /// Vertex count of the combined mesh.
    #[serde(default)]
    pub vertices: u64,
    /// Facet count of the combined mesh.
    #[serde(default)]
    pub faces: u64,
    /// Objects that could not be meshed.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Tessellates one object, or every shape in the document, into a mesh file.
#[must_use]
pub fn export_mesh(
    doc_name: &str,
    object_name: Option<&str>,
    path: &str,
    tolerance: f64,
) -> HostScript {
    script(
        program!("export_mesh"),
        json!({
            "doc_name": doc_name,
            "object_name": object_name,
            "path": path,
            "tolerance": tolerance,
        }),
    )
}

// ==================== TechDraw programs ====================

/// Arguments of [`techdraw_page`].
#[derive(Debug, Clone, Serialize)]
pub struct PageRequest {
    /// Document to draw.
    pub doc_name: String,
    /// Page object name; an existing page is replaced.
    pub page_name: String,
    /// View object name; an existing view is replaced.
    pub view_name: String,
    /// Template file name inside FreeCAD's template directory.
    pub template_file: String,
    /// Page width used when no template is found.
    pub page_width: f64,
    /// Page height used when no template is found.
    pub page_height: f64,
    /// Title block values keyed by editable text name.
    pub fields: Map<String, Value>,
}

/// A shape the plan view will show.
#[derive(Debug, Clone, Deserialize)]
pub struct PageObject {
    /// Internal object name.
    pub name: String,
    /// Object label.
    pub label: String,
    /// Model-space bounds.
    pub bbox: BoundingBox,
    /// Whether the object gets a label.
    #[serde(default)]
    pub equipment: bool,
}

/// Result of [`techdraw_page`].
#[derive(Debug, Clone, Deserialize)]
pub struct PageSetup {
    /// Page object name.
    pub page: String,
    /// Resolved template, if any was found.
    #[serde(default)]
    pub template_path: Option<String>,
    /// Actual page width.
    pub page_width: f64,
    /// Actual page height.
    pub page_height: f64,
    /// Shapes to include in the view.
    pub objects: Vec<PageObject>,
    /// Non-fatal problems.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Creates a drawing page and reports what it should show.
#[must_use]
pub fn techdraw_page(request: &PageRequest) -> HostScript {
    script(program!("techdraw_page"), json!(request))
}

/// Arguments of [`techdraw_view`].
#[derive(Debug, Clone, Serialize)]
pub struct ViewRequest {
    /// Document to draw.
    pub doc_name: String,
    /// Page created by [`techdraw_page`].
    pub page_name: String,
    /// View object name.
    pub view_name: String,
    /// Object names to project.
    pub sources: Vec<String>,
    /// Drawing scale as a ratio.
    pub scale: f64,
    /// View centre on the page.
    pub x: f64,
    /// View centre on the page.
    pub y: f64,
    /// Equipment labels in page coordinates.
    pub labels: Vec<LabelPlacement>,
}

/// Result of [`techdraw_view`].
#[derive(Debug, Clone, Deserialize)]
pub struct ViewOutcome {
    /// Page object name.
    pub page: String,
    /// View object name.
    pub view: String,
    /// Number of projected objects.
    pub sources: usize,
    /// Number of labels created.
    pub labels: usize,
    /// Non-fatal problems.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Adds the top view and its labels to a page.
#[must_use]
pub fn techdraw_view(request: &ViewRequest) -> HostScript {
    script(program!("techdraw_view"), json!(request))
}

/// Destination files for [`export_page`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportPaths {
    /// PDF output (needs the GUI).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
    /// DXF output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dxf: Option<String>,
    /// SVG output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub svg: Option<String>,
}

impl ExportPaths {
    /// Returns true if no destination is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pdf.is_none() && self.dxf.is_none() && self.svg.is_none()
    }
}

/// One written file.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportedFile {
    /// `pdf`, `dxf` or `svg`.
    pub format: String,
    /// Written file.
    pub path: String,
    /// File size.
    #[serde(default)]
    pub bytes: u64,
}

/// One failed export.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportFailure {
    /// `pdf`, `dxf` or `svg`.
    pub format: String,
    /// What went wrong.
    pub error: String,
    /// Machine-readable cause.
    pub error_code: String,
    /// Underlying exception text.
    #[serde(default)]
    pub details: Option<String>,
}

/// Result of [`export_page`].
#[derive(Debug, Clone, Deserialize)]
pub struct PageExport {
    /// Files written.
    #[serde(default)]
    pub exports: Vec<ExportedFile>,
    /// Formats that failed.
    #[serde(default)]
    pub errors: Vec<ExportFailure>,
    /// Host environment facts.
    #[serde(default)]
    pub diagnostics: Map<String, Value>,
}

/// Writes a page to PDF, DXF and/or SVG.
#[must_use]
pub fn export_page(doc_name: &str, page_name: &str, paths: &ExportPaths) -> HostScript {
    let mut payload = json!(paths);
    if let Value::Object(map) = &mut payload {
        map.insert("doc_name".to_string(), json!(doc_name));
        map.insert("page_name".to_string(), json!(page_name));
    }
    script(program!("export_page"), payload)
}

/// Host facts relevant to drawing export.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TechDrawProbe {
    /// FreeCAD version string.
    #[serde(default)]
    pub freecad_version: String,
    /// Whether the GUI is running.
    #[serde(default)]
    pub gui_available: bool,
    /// Whether `TechDraw` imports.
    #[serde(default)]
    pub techdraw_module: bool,
    /// Whether `TechDrawGui` imports.
    #[serde(default)]
    pub techdraw_gui_module: bool,
    /// `DISPLAY` as seen by FreeCAD.
    #[serde(default)]
    pub display_env: String,
    /// Python `sys.platform`.
    #[serde(default)]
    pub platform: String,
    /// Whether the requested document is open.
    #[serde(default)]
    pub document_found: bool,
    /// Visible objects in that document.
    #[serde(default)]
    pub visible_objects: usize,
    /// Template directories FreeCAD knows about.
    #[serde(default)]
    pub template_search_paths: Vec<String>,
}

/// Collects drawing export diagnostics.
#[must_use]
pub fn techdraw_probe(doc_name: &str) -> HostScript {
    script(program!("techdraw_probe"), json!({"doc_name": doc_name}))
}

// ==================== Control system architecture ====================

/// Forwards an action to the CSA workbench addon.
///
/// `payload` carries an `action` key plus the action's arguments.
#[must_use]
pub fn csa_action(payload: Value) -> HostScript {
    script(program!("csa_action"), payload)
}

//! Site-fit tools: importing solved layouts, presenting options side by side
//! and finalising the chosen one.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::contract::envelope::EquipmentPlan;
use crate::contract::sitefit::{LayoutSolution, Segment, SiteFitContract, Structure};
use crate::contract::PlacementSet;
use crate::error::{ToolError, ToolResult};
use crate::mcp::server::{ToolCallResult, ToolDefinition};
use crate::rpc::FreeCad;
use crate::script::{
    self, BuildOutcome, BuildStatus, CloseOutcome, DocumentMode, DocumentOutcome, DocumentStatus,
    RefreshOutcome, WireOutcome, WireSpec,
};
use crate::techdraw::{find_template, parse_scale};
use crate::tools::contract::{place, BOUNDARY_COLOR, BOUNDARY_WIDTH, DEFAULT_BOUNDARY_NAME};
use crate::tools::drawing::{
    build_sheet, host_export_paths, SheetRequest, DEFAULT_SCALE, DEFAULT_TEMPLATE,
    DEFAULT_VIEW_NAME,
};
use crate::tools::{tool, with_feedback, Feedback, JsonArg, Toolbox};
use crate::units::point_m_to_mm;

/// Group holding imported road centre lines.
pub const DEFAULT_ROAD_LAYER: &str = "RoadCenterlines";

/// Road centre line colour (grey).
const ROAD_COLOR: [f64; 3] = [0.5, 0.5, 0.5];

const ROAD_WIDTH: f64 = 2.0;

/// Import errors quoted in the summary.
const MAX_LISTED_ERRORS: usize = 3;

/// Page created when a layout is finalised.
const FINAL_PAGE_NAME: &str = "PlanSheet";

const fn default_true() -> bool {
    true
}

fn default_road_layer() -> String {
    DEFAULT_ROAD_LAYER.to_string()
}

#[derive(Debug, Deserialize)]
pub struct ImportSiteFitArgs {
    doc_name: String,
    contract_json: JsonArg,
    #[serde(default = "default_true")]
    create_boundary: bool,
    #[serde(default = "default_true")]
    create_roads: bool,
    #[serde(default = "default_true")]
    create_equipment: bool,
    #[serde(default = "default_true")]
    apply_placements_flag: bool,
    #[serde(default = "default_road_layer")]
    road_layer_name: String,
    #[serde(flatten)]
    feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct LayoutOptionsArgs {
    doc_prefix: String,
    solutions: Vec<LayoutSolution>,
    #[serde(default)]
    site_boundary: Option<Vec<[f64; 2]>>,
    #[serde(flatten)]
    feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeArgs {
    doc_name: String,
    solution_id: String,
    #[serde(default)]
    project_name: String,
    #[serde(default)]
    drawing_number: String,
    #[serde(default = "default_true")]
    generate_techdraw: bool,
    #[serde(default)]
    export_pdf_path: Option<String>,
    #[serde(default)]
    cleanup_other_options: bool,
    #[serde(default)]
    other_option_docs: Option<Vec<String>>,
    #[serde(flatten)]
    feedback: Feedback,
}

/// Counts of what an import created.
#[derive(Debug, Default)]
struct ImportTally {
    boundary: bool,
    equipment: usize,
    placements: usize,
    roads: usize,
    errors: Vec<String>,
}

impl ImportTally {
    fn summary(&self, doc_name: &str) -> String {
        let mut lines = vec![format!("Imported site-fit contract into '{doc_name}':")];
        if self.boundary {
            lines.push("  - Boundary: 1".to_string());
        }
        if self.equipment > 0 {
            lines.push(format!("  - Equipment: {}", self.equipment));
        }
        if self.placements > 0 {
            lines.push(format!("  - Placements applied: {}", self.placements));
        }
        if self.roads > 0 {
            lines.push(format!("  - Road segments: {}", self.roads));
        }
        if !self.errors.is_empty() {
            lines.push(format!("  - Errors: {}", self.errors.len()));
            lines.extend(
                self.errors
                    .iter()
                    .take(MAX_LISTED_ERRORS)
                    .map(|e| format!("    - {e}")),
            );
        }
        lines.join("\n")
    }
}

/// One document created by `present_layout_options`.
#[derive(Debug)]
enum OptionDoc {
    Built {
        doc_name: String,
        rank: u32,
        metrics: Vec<(String, Value)>,
    },
    Failed {
        doc_name: String,
        error: String,
    },
}

fn boundary_wire(doc_name: &str, points: &[[f64; 2]], fit_view: bool) -> WireSpec {
    WireSpec {
        doc_name: doc_name.to_string(),
        label: DEFAULT_BOUNDARY_NAME.to_string(),
        points: points.iter().copied().map(point_m_to_mm).collect(),
        closed: true,
        line_color: BOUNDARY_COLOR,
        line_width: BOUNDARY_WIDTH,
        group: None,
        fit_view,
    }
}

fn road_wire(doc_name: &str, segment: &Segment, layer: &str) -> WireSpec {
    WireSpec {
        doc_name: doc_name.to_string(),
        label: segment.id.clone(),
        points: segment.points().into_iter().map(point_m_to_mm).collect(),
        closed: false,
        line_color: ROAD_COLOR,
        line_width: ROAD_WIDTH,
        group: Some(layer.to_string()),
        fit_view: false,
    }
}

/// Plans the plain footprint solid for a solver structure.
fn structure_plan(structure: &Structure) -> ToolResult<EquipmentPlan> {
    EquipmentPlan::footprint(
        &structure.id,
        structure.kind.as_deref().unwrap_or("unknown"),
        &structure.footprint.envelope(),
        structure.height,
    )
}

/// Builds a structure; `Ok(false)` means a name collision.
async fn build_structure(
    freecad: &FreeCad,
    doc_name: &str,
    structure: &Structure,
) -> ToolResult<bool> {
    let plan = structure_plan(structure)?;
    let outcome: BuildOutcome =
        script::run(freecad, &script::build_equipment(doc_name, &plan, false)).await?;
    Ok(outcome.status != BuildStatus::Collision)
}

/// Metric value as the summary shows it; fractional numbers get two decimals.
fn format_metric(value: &Value) -> String {
    match value {
        Value::Number(n) if n.is_f64() => format!("{:.2}", n.as_f64().unwrap_or_default()),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn options_summary(docs: &[OptionDoc]) -> String {
    let mut lines = vec!["Created layout option documents:".to_string()];
    for doc in docs {
        match doc {
            OptionDoc::Failed { doc_name, error } => {
                lines.push(format!("  - {doc_name}: ERROR - {error}"));
            }
            OptionDoc::Built {
                doc_name,
                rank,
                metrics,
            } => {
                lines.push(format!("  - {doc_name} (Rank {rank})"));
                if !metrics.is_empty() {
                    let metrics: Vec<String> = metrics
                        .iter()
                        .map(|(k, v)| format!("{k}: {}", format_metric(v)))
                        .collect();
                    lines.push(format!("    Metrics: {}", metrics.join(", ")));
                }
            }
        }
    }
    lines.push("\nReview each document in FreeCAD and select preferred layout.".to_string());
    lines.join("\n")
}

/// Creates one option document: boundary, footprints at the origin, then
/// the solution's placements.
async fn build_option(
    freecad: &FreeCad,
    doc_name: &str,
    solution: &LayoutSolution,
    site_boundary: Option<&[[f64; 2]]>,
) -> ToolResult<String> {
    let doc: DocumentOutcome =
        script::run(freecad, &script::ensure_document(doc_name, DocumentMode::New)).await?;
    let doc_name = doc.doc_name;

    if let Some(points) = site_boundary.filter(|p| !p.is_empty()) {
        let _: WireOutcome =
            script::run(freecad, &script::make_wire(&boundary_wire(&doc_name, points, false)))
                .await?;
    }

    for structure in &solution.structures {
        if !build_structure(freecad, &doc_name, structure).await? {
            tracing::warn!(document = %doc_name, id = %structure.id, "Structure name collision");
        }
    }

    let placed: Vec<_> = solution
        .structures
        .iter()
        .filter_map(|s| solution.placement_for(&s.id).cloned())
        .collect();
    if !placed.is_empty() {
        let outcome = place(freecad, &doc_name, &PlacementSet { placements: placed }).await?;
        for error in &outcome.errors {
            tracing::warn!(document = %doc_name, %error, "Placement not applied");
        }
    }

    let _: RefreshOutcome = script::run(freecad, &script::refresh_view(&doc_name, true)).await?;
    Ok(doc_name)
}

impl Toolbox {
    pub(super) async fn import_sitefit_contract(
        &mut self,
        args: ImportSiteFitArgs,
    ) -> ToolResult<ToolCallResult> {
        let contract: SiteFitContract = args.contract_json.decode()?;
        let freecad = self.freecad().await?;

        let doc: DocumentOutcome = script::run(
            &freecad,
            &script::ensure_document(&args.doc_name, DocumentMode::Ensure),
        )
        .await?;
        let doc_name = doc.doc_name;
        let mut tally = ImportTally::default();

        if args.create_boundary && !contract.site.boundary.is_empty() {
            let wire = boundary_wire(&doc_name, &contract.site.boundary, false);
            match script::run::<WireOutcome>(&freecad, &script::make_wire(&wire)).await {
                Ok(_) => tally.boundary = true,
                Err(e) => tally.errors.push(format!("Failed to create boundary: {e}")),
            }
        }

        if args.create_equipment {
            for structure in &contract.program.structures {
                match build_structure(&freecad, &doc_name, structure).await {
                    Ok(true) => tally.equipment += 1,
                    Ok(false) => tally.errors.push(format!(
                        "Name collision for {} - object with similar name exists",
                        structure.id
                    )),
                    Err(e) => {
                        tracing::error!(id = %structure.id, error = %e, "Equipment creation failed");
                        tally
                            .errors
                            .push(format!("Failed to create {}: {e}", structure.id));
                    }
                }
            }
        }

        if args.apply_placements_flag && !contract.placements.is_empty() {
            let placements = PlacementSet {
                placements: contract.placements.clone(),
            };
            match place(&freecad, &doc_name, &placements).await {
                Ok(outcome) => {
                    tally.placements = outcome.updated.len();
                    tally.errors.extend(outcome.errors);
                }
                Err(e) => tally.errors.push(format!("Failed to apply placements: {e}")),
            }
        }

        if args.create_roads {
            let segments = contract
                .road_network
                .as_ref()
                .map_or(&[][..], |r| r.segments.as_slice());
            for segment in segments {
                let wire = road_wire(&doc_name, segment, &args.road_layer_name);
                match script::run::<WireOutcome>(&freecad, &script::make_wire(&wire)).await {
                    Ok(_) => tally.roads += 1,
                    Err(e) => tally
                        .errors
                        .push(format!("Failed to create road {}: {e}", segment.id)),
                }
            }
        }

        let _: RefreshOutcome = script::run(&freecad, &script::refresh_view(&doc_name, true)).await?;
        tracing::info!(
            document = %doc_name,
            equipment = tally.equipment,
            placements = tally.placements,
            roads = tally.roads,
            errors = tally.errors.len(),
            "Imported site-fit contract"
        );
        Ok(self
            .respond(
                &freecad,
                tally.summary(&doc_name),
                args.feedback.include_screenshot,
            )
            .await)
    }

    pub(super) async fn present_layout_options(
        &mut self,
        args: LayoutOptionsArgs,
    ) -> ToolResult<ToolCallResult> {
        if args.solutions.is_empty() {
            return Err(ToolError::invalid("No solutions given"));
        }
        let freecad = self.freecad().await?;

        let mut docs = Vec::with_capacity(args.solutions.len());
        for (i, solution) in args.solutions.iter().enumerate() {
            let index = u32::try_from(i + 1).unwrap_or(u32::MAX);
            let rank = solution.rank.unwrap_or(index);
            let doc_name = format!("{}_Option{index}_Rank{rank}", args.doc_prefix);

            let built =
                build_option(&freecad, &doc_name, solution, args.site_boundary.as_deref()).await;
            docs.push(match built {
                Ok(doc_name) => {
                    tracing::info!(
                        document = %doc_name,
                        solution = solution.solution_id.as_deref().unwrap_or(""),
                        rank,
                        "Created layout option"
                    );
                    OptionDoc::Built {
                        doc_name,
                        rank,
                        metrics: solution
                            .metrics
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                    }
                }
                Err(e) => {
                    tracing::error!(document = %doc_name, error = %e, "Layout option failed");
                    OptionDoc::Failed {
                        doc_name,
                        error: e.to_string(),
                    }
                }
            });
        }

        Ok(self
            .respond(
                &freecad,
                options_summary(&docs),
                args.feedback.include_screenshot,
            )
            .await)
    }

    pub(super) async fn finalize_selected_layout(
        &mut self,
        args: FinalizeArgs,
    ) -> ToolResult<ToolCallResult> {
        let freecad = self.freecad().await?;
        let doc: DocumentOutcome = script::run(
            &freecad,
            &script::ensure_document(&args.doc_name, DocumentMode::Activate),
        )
        .await?;
        if doc.status == DocumentStatus::NotFound {
            return Err(ToolError::invalid(format!(
                "Document '{}' not found",
                args.doc_name
            )));
        }

        let mut lines = vec![
            format!("Finalized layout: {}", args.doc_name),
            format!("  Solution ID: {}", args.solution_id),
        ];

        let mut closed = 0;
        if args.cleanup_other_options {
            let others: Vec<String> = args
                .other_option_docs
                .iter()
                .flatten()
                .filter(|name| **name != args.doc_name)
                .cloned()
                .collect();
            if !others.is_empty() {
                let outcome: CloseOutcome =
                    script::run(&freecad, &script::close_documents(&others)).await?;
                closed = outcome.closed.len();
            }
        }

        if args.generate_techdraw {
            let request = SheetRequest {
                doc_name: args.doc_name.clone(),
                page_name: FINAL_PAGE_NAME.to_string(),
                view_name: DEFAULT_VIEW_NAME.to_string(),
                template: find_template(DEFAULT_TEMPLATE)?,
                scale: parse_scale(DEFAULT_SCALE)?,
                project_name: args.project_name.clone(),
                drawing_number: args.drawing_number.clone(),
                revision: "A".to_string(),
                include_labels: true,
                exports: host_export_paths(args.export_pdf_path.as_deref(), None, None).await,
            };
            match build_sheet(&freecad, &request).await {
                Ok(sheet) => {
                    lines.push("  TechDraw plan sheet: Generated".to_string());
                    if let Some(export) = &sheet.export {
                        if let Some(pdf) = export.exports.iter().find(|f| f.format == "pdf") {
                            let shown = args.export_pdf_path.as_deref().unwrap_or(&pdf.path);
                            lines.push(format!("  PDF exported: {shown}"));
                        }
                        if let Some(failure) = export.errors.iter().find(|f| f.format == "pdf") {
                            lines.push(format!("  PDF export failed: {}", failure.error));
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(document = %args.doc_name, error = %e, "Plan sheet failed");
                    lines.push(format!("  TechDraw plan sheet: Failed - {e}"));
                }
            }
        }

        if closed > 0 {
            lines.push(format!("  Other options closed: {closed}"));
        }
        tracing::info!(
            document = %args.doc_name,
            solution = %args.solution_id,
            closed,
            "Finalized layout"
        );
        Ok(self
            .respond(&freecad, lines.join("\n"), args.feedback.include_screenshot)
            .await)
    }
}

#[allow(clippy::too_many_lines)]
pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        tool(
            "import_sitefit_contract",
            "Import a solved site-fit contract in one call: creates the document if needed, \
             the site boundary, equipment footprints, the solved placements and road centre \
             lines. All coordinates in metres.",
            with_feedback(json!({
                "doc_name": {"type": "string", "description": "FreeCAD document (created if missing)"},
                "contract_json": {
                    "type": ["string", "object"],
                    "description": "Site-fit contract as an object or JSON string"
                },
                "create_boundary": {"type": "boolean", "description": "Draw the site boundary (default: true)", "default": true},
                "create_roads": {"type": "boolean", "description": "Draw road centre lines (default: true)", "default": true},
                "create_equipment": {"type": "boolean", "description": "Create equipment footprints (default: true)", "default": true},
                "apply_placements_flag": {"type": "boolean", "description": "Move equipment to the solved placements (default: true)", "default": true},
                "road_layer_name": {"type": "string", "description": "Group for road centre lines (default: RoadCenterlines)"}
            })),
            &["doc_name", "contract_json"],
        ),
        tool(
            "present_layout_options",
            "Create one FreeCAD document per candidate layout (<prefix>_Option<n>_Rank<r>) so \
             they can be reviewed side by side.",
            with_feedback(json!({
                "doc_prefix": {"type": "string", "description": "Prefix for document names, e.g. CBG_SitePlan"},
                "solutions": {
                    "type": "array",
                    "items": {"type": "object"},
                    "description": "Solutions with solution_id, rank, metrics, placements and structures"
                },
                "site_boundary": {
                    "type": "array",
                    "items": {"type": "array", "items": {"type": "number"}, "minItems": 2, "maxItems": 2},
                    "description": "Optional: site boundary as [x, y] points in metres"
                }
            })),
            &["doc_prefix", "solutions"],
        ),
        tool(
            "finalize_selected_layout",
            "Finalise the layout chosen after review: activate its document, optionally close \
             the other options, and generate a plan sheet with optional PDF export.",
            with_feedback(json!({
                "doc_name": {"type": "string", "description": "Document of the selected option"},
                "solution_id": {"type": "string", "description": "Id of the selected solution"},
                "project_name": {"type": "string", "description": "Title block project name"},
                "drawing_number": {"type": "string", "description": "Title block drawing number"},
                "generate_techdraw": {"type": "boolean", "description": "Generate the plan sheet (default: true)", "default": true},
                "export_pdf_path": {"type": "string", "description": "Optional: PDF output path"},
                "cleanup_other_options": {"type": "boolean", "description": "Close the other option documents (default: false)", "default": false},
                "other_option_docs": {"type": "array", "items": {"type": "string"}, "description": "Option documents to close"}
            })),
            &["doc_name", "solution_id"],
        ),
    ]
}

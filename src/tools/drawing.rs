//! TechDraw plan sheet tools.
//!
//! A plan sheet is built in two host round trips: [`script::techdraw_page`]
//! creates the page and reports the shapes and page size, then the view is
//! fitted and labelled here and [`script::techdraw_view`] places it. Exports
//! run as a third step when paths are given.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ToolError, ToolResult};
use crate::mcp::server::{ToolCallResult, ToolDefinition};
use crate::platform::{find_on_path, wsl_to_windows_path};
use crate::rpc::FreeCad;
use crate::script::{
    self, ExportPaths, PageExport, PageRequest, PageSetup, TechDrawProbe, ViewOutcome, ViewRequest,
};
use crate::techdraw::{
    find_template, format_scale, parse_scale, place_labels, plan_layout, title_block_fields,
    today, LabelTarget, PlanLayout, Template, TEMPLATES,
};
use crate::tools::{tool, with_feedback, Feedback, Toolbox};

/// Page object name used when none is given.
pub const DEFAULT_PAGE_NAME: &str = "A1_PLAN";
/// View object name used when none is given.
pub const DEFAULT_VIEW_NAME: &str = "TopView";
/// Template used when none is given.
pub const DEFAULT_TEMPLATE: &str = "ISO_A1_Landscape";
/// Scale used when none is given.
pub const DEFAULT_SCALE: &str = "1:200";

const XVFB_RUN: &str = "xvfb-run";

fn default_page_name() -> String {
    DEFAULT_PAGE_NAME.to_string()
}

fn default_view_name() -> String {
    DEFAULT_VIEW_NAME.to_string()
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

fn default_scale() -> String {
    DEFAULT_SCALE.to_string()
}

fn default_revision() -> String {
    "A".to_string()
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct PlanSheetArgs {
    doc_name: String,
    #[serde(default = "default_page_name")]
    page_name: String,
    #[serde(default = "default_template")]
    template: String,
    #[serde(default = "default_view_name")]
    view_name: String,
    #[serde(default = "default_scale")]
    scale: String,
    #[serde(default)]
    project_name: String,
    #[serde(default)]
    drawing_number: String,
    #[serde(default = "default_revision")]
    revision: String,
    #[serde(default = "default_true")]
    include_labels: bool,
    #[serde(default)]
    export_pdf_path: Option<String>,
    #[serde(default)]
    export_dxf_path: Option<String>,
    #[serde(flatten)]
    feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct PreflightArgs {
    doc_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportPageArgs {
    doc_name: String,
    page_name: String,
    #[serde(default)]
    export_pdf_path: Option<String>,
    #[serde(default)]
    export_dxf_path: Option<String>,
    #[serde(default)]
    export_svg_path: Option<String>,
    #[serde(flatten)]
    feedback: Feedback,
}

/// Everything needed to draw one plan sheet.
#[derive(Debug, Clone)]
pub(super) struct SheetRequest {
    pub doc_name: String,
    pub page_name: String,
    pub view_name: String,
    pub template: &'static Template,
    pub scale: f64,
    pub project_name: String,
    pub drawing_number: String,
    pub revision: String,
    pub include_labels: bool,
    /// Destinations as the host sees them.
    pub exports: ExportPaths,
}

/// What building a plan sheet produced.
#[derive(Debug, Clone)]
pub(super) struct Sheet {
    pub setup: PageSetup,
    pub layout: PlanLayout,
    pub view: ViewOutcome,
    pub export: Option<PageExport>,
}

/// Translates local export paths for the host.
pub(super) async fn host_export_paths(
    pdf: Option<&str>,
    dxf: Option<&str>,
    svg: Option<&str>,
) -> ExportPaths {
    async fn translate(path: Option<&str>) -> Option<String> {
        match path.filter(|p| !p.is_empty()) {
            Some(path) => Some(wsl_to_windows_path(path, true).await),
            None => None,
        }
    }
    ExportPaths {
        pdf: translate(pdf).await,
        dxf: translate(dxf).await,
        svg: translate(svg).await,
    }
}

/// Creates the page, fits and labels the top view, then exports.
pub(super) async fn build_sheet(freecad: &FreeCad, request: &SheetRequest) -> ToolResult<Sheet> {
    let fields = title_block_fields(
        &request.project_name,
        &request.drawing_number,
        &request.revision,
        &today(),
        &format_scale(request.scale),
    );
    let setup: PageSetup = script::run(
        freecad,
        &script::techdraw_page(&PageRequest {
            doc_name: request.doc_name.clone(),
            page_name: request.page_name.clone(),
            view_name: request.view_name.clone(),
            template_file: request.template.file.to_string(),
            page_width: f64::from(request.template.width),
            page_height: f64::from(request.template.height),
            fields,
        }),
    )
    .await?;

    let bounds: Vec<_> = setup.objects.iter().map(|o| o.bbox).collect();
    let layout = plan_layout(setup.page_width, setup.page_height, &bounds, request.scale);
    if layout.scaled_down() {
        tracing::info!(
            requested = %format_scale(layout.requested_scale),
            used = %format_scale(layout.scale),
            "Reduced view scale to fit the page"
        );
    }

    let labels = if request.include_labels {
        let targets: Vec<LabelTarget> = setup
            .objects
            .iter()
            .filter(|o| o.equipment)
            .map(|o| LabelTarget {
                name: o.name.clone(),
                text: o.label.clone(),
                bbox: o.bbox,
            })
            .collect();
        place_labels(&layout, &targets)
    } else {
        Vec::new()
    };

    let view: ViewOutcome = script::run(
        freecad,
        &script::techdraw_view(&ViewRequest {
            doc_name: request.doc_name.clone(),
            page_name: setup.page.clone(),
            view_name: request.view_name.clone(),
            sources: setup.objects.iter().map(|o| o.name.clone()).collect(),
            scale: layout.scale,
            x: layout.view_x,
            y: layout.view_y,
            labels,
        }),
    )
    .await?;

    let export = if request.exports.is_empty() {
        None
    } else {
        Some(
            script::run(
                freecad,
                &script::export_page(&request.doc_name, &setup.page, &request.exports),
            )
            .await?,
        )
    };

    tracing::info!(
        document = %request.doc_name,
        page = %view.page,
        sources = view.sources,
        labels = view.labels,
        "Created plan sheet"
    );
    Ok(Sheet {
        setup,
        layout,
        view,
        export,
    })
}

/// One line per written file or failed format.
fn export_lines(export: &PageExport) -> Vec<String> {
    let written = export.exports.iter().map(|f| {
        format!(
            "{} exported to: {} ({} bytes)",
            f.format.to_uppercase(),
            f.path,
            f.bytes
        )
    });
    let failed = export
        .errors
        .iter()
        .map(|e| format!("{} export failed: {}", e.format.to_uppercase(), e.error));
    written.chain(failed).collect()
}

fn sheet_summary(sheet: &Sheet) -> String {
    let mut text = format!(
        "TechDraw page '{}' created with {} objects",
        sheet.view.page, sheet.view.sources
    );
    if sheet.view.labels > 0 {
        text.push_str(&format!(", {} labels", sheet.view.labels));
    }
    if let Some(export) = &sheet.export {
        let lines = export_lines(export);
        if !lines.is_empty() {
            text.push_str(". ");
            text.push_str(&lines.join("; "));
        }
    }
    if sheet.layout.scaled_down() {
        text.push_str(&format!(
            "\nScale reduced from {} to {} to fit the page",
            format_scale(sheet.layout.requested_scale),
            format_scale(sheet.layout.scale)
        ));
    }
    for warning in sheet.setup.warnings.iter().chain(&sheet.view.warnings) {
        text.push_str(&format!("\nWarning: {warning}"));
    }
    text
}

/// Ways to get PDF export working on a host without a GUI.
fn headless_recommendations(xvfb_available: bool) -> Vec<String> {
    vec![
        if xvfb_available {
            "Run FreeCAD with Xvfb: xvfb-run -a freecad ...".to_string()
        } else {
            "Install Xvfb: apt install xvfb".to_string()
        },
        "Or set QT_QPA_PLATFORM=offscreen before starting FreeCAD".to_string(),
        "Or export DXF/SVG, which do not need the GUI".to_string(),
    ]
}

/// Local facts gathered for the preflight report.
#[derive(Debug, Clone, Default)]
struct LocalEnv {
    xvfb_available: bool,
    display: Option<String>,
}

impl LocalEnv {
    fn probe() -> Self {
        Self {
            xvfb_available: find_on_path(XVFB_RUN).is_some(),
            display: std::env::var("DISPLAY").ok(),
        }
    }
}

fn preflight_report(
    doc_name: &str,
    probe: &TechDrawProbe,
    local: &LocalEnv,
    error: Option<&str>,
) -> String {
    let can_export_pdf = probe.gui_available && probe.techdraw_gui_module;

    let mut recommendations = Vec::new();
    if !probe.gui_available {
        recommendations.extend(headless_recommendations(local.xvfb_available));
    }
    if probe.gui_available && !probe.techdraw_gui_module {
        recommendations
            .push("TechDrawGui module not available - check FreeCAD installation".to_string());
    }
    if local.display.is_none() && !probe.platform.starts_with("win") {
        recommendations.push("DISPLAY environment variable not set".to_string());
    }

    let display = local
        .display
        .clone()
        .filter(|d| !d.is_empty())
        .or_else(|| Some(probe.display_env.clone()).filter(|d| !d.is_empty()))
        .unwrap_or_else(|| "(not set)".to_string());
    let or_unknown = |s: &str| {
        if s.is_empty() {
            "unknown".to_string()
        } else {
            s.to_string()
        }
    };

    let mut lines = vec![
        "TechDraw Preflight Check".to_string(),
        "=".repeat(40),
        format!(
            "Status: {}",
            if can_export_pdf { "READY" } else { "NOT_READY" }
        ),
        format!("Can export PDF: {can_export_pdf}"),
        String::new(),
        "Environment:".to_string(),
        format!("  FreeCAD version: {}", or_unknown(&probe.freecad_version)),
        format!("  Platform: {}", or_unknown(&probe.platform)),
        format!("  GUI available: {}", probe.gui_available),
        format!("  TechDraw module: {}", probe.techdraw_module),
        format!("  TechDrawGui module: {}", probe.techdraw_gui_module),
        format!("  DISPLAY: {display}"),
        format!("  Xvfb available: {}", local.xvfb_available),
        String::new(),
        format!("Document '{doc_name}':"),
    ];
    if error.is_none() && !probe.document_found {
        lines.push("  Not found".to_string());
    }
    lines.push(format!("  Visible objects: {}", probe.visible_objects));

    if !probe.template_search_paths.is_empty() {
        lines.push(String::new());
        lines.push("Template search paths:".to_string());
        lines.extend(probe.template_search_paths.iter().map(|p| format!("  - {p}")));
    }
    if !recommendations.is_empty() {
        lines.push(String::new());
        lines.push("Recommendations:".to_string());
        lines.extend(recommendations.iter().map(|r| format!("  - {r}")));
    }
    if let Some(error) = error {
        lines.push(String::new());
        lines.push(format!("Error: {error}"));
    }
    lines.join("\n")
}

fn export_failure_report(export: &PageExport, xvfb_available: bool) -> String {
    let mut lines = vec![
        "TechDraw Export Failed".to_string(),
        "=".repeat(40),
        String::new(),
    ];
    for error in &export.errors {
        lines.push(format!("Format: {}", error.format.to_uppercase()));
        lines.push(format!("  Error: {}", error.error));
        lines.push(format!("  Code: {}", error.error_code));
        if let Some(details) = &error.details {
            lines.push(format!("  Details: {details}"));
        }
        lines.push(String::new());
    }
    if !export.exports.is_empty() {
        lines.push("Written:".to_string());
        for file in &export.exports {
            lines.push(format!(
                "  {}: {} ({} bytes)",
                file.format.to_uppercase(),
                file.path,
                file.bytes
            ));
        }
        lines.push(String::new());
    }

    lines.push("Diagnostics:".to_string());
    for (key, value) in &export.diagnostics {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        lines.push(format!("  {key}: {value}"));
    }

    let gui_mode = export
        .diagnostics
        .get("gui_mode")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !gui_mode {
        lines.push(String::new());
        lines.push("Recommendations:".to_string());
        lines.extend(
            headless_recommendations(xvfb_available)
                .iter()
                .map(|r| format!("  - {r}")),
        );
    }
    lines.join("\n")
}

impl Toolbox {
    pub(super) async fn create_techdraw_plan_sheet(
        &mut self,
        args: PlanSheetArgs,
    ) -> ToolResult<ToolCallResult> {
        let scale = parse_scale(&args.scale)?;
        let template = find_template(&args.template)?;
        let exports = host_export_paths(
            args.export_pdf_path.as_deref(),
            args.export_dxf_path.as_deref(),
            None,
        )
        .await;

        let request = SheetRequest {
            doc_name: args.doc_name,
            page_name: args.page_name,
            view_name: args.view_name,
            template,
            scale,
            project_name: args.project_name,
            drawing_number: args.drawing_number,
            revision: args.revision,
            include_labels: args.include_labels,
            exports,
        };
        let freecad = self.freecad().await?;
        let sheet = build_sheet(&freecad, &request).await?;
        Ok(self
            .respond(
                &freecad,
                sheet_summary(&sheet),
                args.feedback.include_screenshot,
            )
            .await)
    }

    pub(super) async fn techdraw_preflight(
        &mut self,
        args: PreflightArgs,
    ) -> ToolResult<ToolCallResult> {
        let local = LocalEnv::probe();
        let freecad = self.freecad().await?;
        let (probe, error) =
            match script::run::<TechDrawProbe>(&freecad, &script::techdraw_probe(&args.doc_name))
                .await
            {
                Ok(probe) => (probe, None),
                Err(e) => (TechDrawProbe::default(), Some(e.to_string())),
            };
        tracing::info!(
            document = %args.doc_name,
            gui_available = probe.gui_available,
            can_export_pdf = probe.gui_available && probe.techdraw_gui_module,
            "TechDraw preflight complete"
        );
        Ok(ToolCallResult::text(preflight_report(
            &args.doc_name,
            &probe,
            &local,
            error.as_deref(),
        )))
    }

    pub(super) fn list_techdraw_templates() -> ToolCallResult {
        let mut lines = vec!["Available TechDraw Templates:".to_string(), String::new()];
        lines.extend(
            TEMPLATES
                .iter()
                .map(|t| format!("  {}: {}mm x {}mm", t.name, t.width, t.height)),
        );
        ToolCallResult::text(lines.join("\n"))
    }

    pub(super) async fn export_techdraw_page(
        &mut self,
        args: ExportPageArgs,
    ) -> ToolResult<ToolCallResult> {
        let exports = host_export_paths(
            args.export_pdf_path.as_deref(),
            args.export_dxf_path.as_deref(),
            args.export_svg_path.as_deref(),
        )
        .await;
        if exports.is_empty() {
            return Err(ToolError::invalid(
                "At least one export path must be specified",
            ));
        }

        let freecad = self.freecad().await?;
        let export: PageExport = script::run(
            &freecad,
            &script::export_page(&args.doc_name, &args.page_name, &exports),
        )
        .await?;

        if export.errors.is_empty() {
            let mut text = "Export completed:".to_string();
            for file in &export.exports {
                text.push_str(&format!(
                    "\n  - {}: {} ({} bytes)",
                    file.format.to_uppercase(),
                    file.path,
                    file.bytes
                ));
            }
            return Ok(self
                .respond(&freecad, text, args.feedback.include_screenshot)
                .await);
        }

        tracing::warn!(
            document = %args.doc_name,
            page = %args.page_name,
            failed = export.errors.len(),
            "TechDraw export failed"
        );
        let report = export_failure_report(&export, find_on_path(XVFB_RUN).is_some());
        let mut result = self
            .respond(&freecad, report, args.feedback.include_screenshot)
            .await;
        result.is_error = true;
        Ok(result)
    }
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    let template_names: Vec<&str> = TEMPLATES.iter().map(|t| t.name).collect();
    vec![
        tool(
            "create_techdraw_plan_sheet",
            "Create a TechDraw plan sheet with a top view of the model, a filled title block \
             and equipment labels. The requested scale is reduced when the model would not \
             fit. Optionally exports PDF (needs the FreeCAD GUI) and DXF.",
            with_feedback(json!({
                "doc_name": {"type": "string", "description": "FreeCAD document to draw"},
                "page_name": {"type": "string", "description": "Page object name (default: A1_PLAN)"},
                "template": {"type": "string", "enum": template_names, "description": "Sheet template (default: ISO_A1_Landscape)"},
                "view_name": {"type": "string", "description": "Top view object name (default: TopView)"},
                "scale": {"type": "string", "description": "Scale as a ratio, e.g. 1:200 (default)"},
                "project_name": {"type": "string", "description": "Title block project name"},
                "drawing_number": {"type": "string", "description": "Title block drawing number, e.g. 100-GA-001"},
                "revision": {"type": "string", "description": "Title block revision (default: A)"},
                "include_labels": {"type": "boolean", "description": "Label equipment (default: true)", "default": true},
                "export_pdf_path": {"type": "string", "description": "Optional: PDF output path"},
                "export_dxf_path": {"type": "string", "description": "Optional: DXF output path"}
            })),
            &["doc_name"],
        ),
        tool(
            "techdraw_preflight",
            "Check whether TechDraw export will work: FreeCAD GUI, TechDraw modules, DISPLAY \
             and Xvfb, with recommendations.",
            json!({
                "doc_name": {"type": "string", "description": "Document to check"}
            }),
            &["doc_name"],
        ),
        tool(
            "list_techdraw_templates",
            "List the TechDraw templates and their sheet sizes.",
            json!({}),
            &[],
        ),
        tool(
            "export_techdraw_page",
            "Export an existing TechDraw page to PDF, DXF and/or SVG. At least one path is \
             required. PDF export needs the FreeCAD GUI.",
            with_feedback(json!({
                "doc_name": {"type": "string", "description": "FreeCAD document"},
                "page_name": {"type": "string", "description": "TechDraw page object name"},
                "export_pdf_path": {"type": "string", "description": "Optional: PDF output path"},
                "export_dxf_path": {"type": "string", "description": "Optional: DXF output path"},
                "export_svg_path": {"type": "string", "description": "Optional: SVG output path"}
            })),
            &["doc_name", "page_name"],
        ),
    ]
}

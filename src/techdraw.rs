//! Plan sheet geometry.
//!
//! Drawing page sizes, scale parsing, view fitting and label placement. All
//! page quantities are millimetres on the sheet; model quantities are
//! millimetres in the FreeCAD document.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::contract::extract::BoundingBox;
use crate::error::{ToolError, ToolResult};

/// A drawing template FreeCAD ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    /// Name accepted by the tools.
    pub name: &'static str,
    /// Sheet width.
    pub width: u32,
    /// Sheet height.
    pub height: u32,
    /// SVG file inside FreeCAD's template directory.
    pub file: &'static str,
}

/// Supported sheet templates.
pub const TEMPLATES: [Template; 12] = [
    template("ISO_A0_Landscape", 1189, 841, "A0_Landscape_blank.svg"),
    template("ISO_A0_Portrait", 841, 1189, "A0_Portrait_blank.svg"),
    template("ISO_A1_Landscape", 841, 594, "A1_Landscape_blank.svg"),
    template("ISO_A1_Portrait", 594, 841, "A1_Portrait_blank.svg"),
    template("ISO_A2_Landscape", 594, 420, "A2_Landscape_blank.svg"),
    template("ISO_A2_Portrait", 420, 594, "A2_Portrait_blank.svg"),
    template("ISO_A3_Landscape", 420, 297, "A3_Landscape_blank.svg"),
    template("ISO_A3_Portrait", 297, 420, "A3_Portrait_blank.svg"),
    template("ISO_A4_Landscape", 297, 210, "A4_Landscape_blank.svg"),
    template("ISO_A4_Portrait", 210, 297, "A4_Portrait_blank.svg"),
    template("ANSI_D_Landscape", 864, 559, "ANSI_D_Landscape.svg"),
    template("ANSI_E_Landscape", 1118, 864, "ANSI_E_Landscape.svg"),
];

const fn template(name: &'static str, width: u32, height: u32, file: &'static str) -> Template {
    Template {
        name,
        width,
        height,
        file,
    }
}

/// Looks up a template by name.
///
/// # Errors
///
/// Returns an error listing the valid names.
pub fn find_template(name: &str) -> ToolResult<&'static Template> {
    TEMPLATES.iter().find(|t| t.name == name).ok_or_else(|| {
        let valid: Vec<&str> = TEMPLATES.iter().map(|t| t.name).collect();
        ToolError::invalid(format!(
            "Invalid template '{name}'. Valid options: {}",
            valid.join(", ")
        ))
    })
}

/// Parses `"1:200"` (or a plain number) into a ratio.
///
/// # Errors
///
/// Returns an error for malformed input or a ratio that is not positive.
pub fn parse_scale(scale: &str) -> ToolResult<f64> {
    let invalid = |reason: &str| ToolError::invalid(format!("Invalid scale format '{scale}': {reason}"));
    let number = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|e| invalid(&e.to_string()))
    };

    let value = match scale.split_once(':') {
        Some((num, den)) => {
            let den = number(den)?;
            if den == 0.0 {
                return Err(invalid("division by zero"));
            }
            number(num)? / den
        }
        None => number(scale)?,
    };

    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(invalid("scale must be positive"))
    }
}

/// Formats a ratio the way title blocks show it (`0.005` is `1:200`).
#[must_use]
pub fn format_scale(scale: f64) -> String {
    if scale >= 1.0 {
        format!("{}:1", crate::units::round_to(scale, 2))
    } else {
        format!("1:{}", crate::units::round_to(1.0 / scale, 0))
    }
}

/// Left and top page margin.
const MARGIN_NEAR: f64 = 10.0;
/// Right and bottom margin, leaving room for the title block.
const MARGIN_FAR: f64 = 50.0;
/// Share of the drawing area the model may fill when auto-fitting.
const FIT_FILL: f64 = 0.9;

/// Where and how large the plan view goes on the sheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanLayout {
    /// Final view scale.
    pub scale: f64,
    /// The scale that was asked for.
    pub requested_scale: f64,
    /// Largest scale at which the model fits.
    pub fit_scale: f64,
    /// View centre on the page.
    pub view_x: f64,
    /// View centre on the page.
    pub view_y: f64,
    /// Page width.
    pub page_width: f64,
    /// Page height.
    pub page_height: f64,
    /// Combined model bounds.
    pub model: BoundingBox,
}

impl PlanLayout {
    /// Whether the requested scale had to be reduced.
    #[must_use]
    pub fn scaled_down(&self) -> bool {
        self.scale < self.requested_scale
    }

    /// Maps a model-space plan point onto the page.
    #[must_use]
    pub fn to_page(&self, point: [f64; 2]) -> [f64; 2] {
        let center = self.model.center();
        [
            self.view_x + (point[0] - center[0]) * self.scale,
            self.view_y + (point[1] - center[1]) * self.scale,
        ]
    }
}

/// Fits the model into the drawing area of a page.
///
/// The requested scale is kept when the model fits at it; otherwise the
/// view is scaled so the model fills 90 % of the drawing area.
#[must_use]
pub fn plan_layout(
    page_width: f64,
    page_height: f64,
    bounds: &[BoundingBox],
    requested_scale: f64,
) -> PlanLayout {
    let model = bounds
        .iter()
        .copied()
        .reduce(|a, b| a.union(&b))
        .unwrap_or(BoundingBox {
            x_max: 1000.0,
            y_max: 1000.0,
            ..BoundingBox::default()
        });

    let area_width = page_width - MARGIN_NEAR - MARGIN_FAR;
    let area_height = page_height - MARGIN_NEAR - MARGIN_FAR;

    let fit = |area: f64, extent: f64| {
        if extent > 0.0 {
            area * FIT_FILL / extent
        } else {
            requested_scale
        }
    };
    let fit_scale = fit(area_width, model.width()).min(fit(area_height, model.length()));
    let scale = if requested_scale <= fit_scale {
        requested_scale
    } else {
        fit_scale
    };

    PlanLayout {
        scale,
        requested_scale,
        fit_scale,
        view_x: MARGIN_NEAR + area_width / 2.0,
        view_y: MARGIN_FAR + area_height / 2.0,
        page_width,
        page_height,
        model,
    }
}

/// Something to label on the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTarget {
    /// Internal object name.
    pub name: String,
    /// Label text.
    pub text: String,
    /// Model-space bounds.
    pub bbox: BoundingBox,
}

/// A label with its leader, in page coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelPlacement {
    /// Object the label belongs to.
    pub name: String,
    /// Label text.
    pub text: String,
    /// Leader tip, at the object.
    pub origin: [f64; 2],
    /// Label position.
    pub position: [f64; 2],
}

/// Distance of the label strips from the page edge.
const ZONE_MARGIN: f64 = 40.0;
/// Depth of each label strip.
const ZONE_WIDTH: f64 = 60.0;
/// Minimum distance between labels in one strip.
const MIN_LABEL_SPACING: f64 = 12.0;
/// Inset from the ends of a strip.
const ZONE_INSET: f64 = 5.0;
/// Labels never come closer to the page edge than this.
const PAGE_CLAMP: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy)]
struct Zone {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

/// Places labels in strips around the view.
///
/// Each label goes to the strip on the side of the sheet opposite to its
/// object's offset from the model centre. Within a strip, labels are pushed
/// apart to keep a minimum spacing and clamped to the strip and page.
#[must_use]
pub fn place_labels(layout: &PlanLayout, targets: &[LabelTarget]) -> Vec<LabelPlacement> {
    let half_w = layout.model.width() * layout.scale / 2.0;
    let half_h = layout.model.length() * layout.scale / 2.0;
    let (view_left, view_right) = (layout.view_x - half_w, layout.view_x + half_w);
    let (view_bottom, view_top) = (layout.view_y - half_h, layout.view_y + half_h);
    let (page_w, page_h) = (layout.page_width, layout.page_height);

    let zone = |side| match side {
        Side::Left => Zone {
            x_min: ZONE_MARGIN,
            x_max: ZONE_MARGIN + ZONE_WIDTH,
            y_min: view_bottom,
            y_max: view_top,
        },
        Side::Right => Zone {
            x_min: page_w - ZONE_MARGIN - ZONE_WIDTH,
            x_max: page_w - ZONE_MARGIN,
            y_min: view_bottom,
            y_max: view_top,
        },
        Side::Top => Zone {
            x_min: view_left,
            x_max: view_right,
            y_min: page_h - ZONE_MARGIN - ZONE_WIDTH,
            y_max: page_h - ZONE_MARGIN,
        },
        Side::Bottom => Zone {
            x_min: view_left,
            x_max: view_right,
            y_min: ZONE_MARGIN,
            y_max: ZONE_MARGIN + ZONE_WIDTH,
        },
    };

    let mut occupied: Vec<(Side, f64)> = Vec::new();
    let model_center = layout.model.center();

    targets
        .iter()
        .map(|target| {
            let center = target.bbox.center();
            let origin = layout.to_page(center);
            let (dx, dy) = (center[0] - model_center[0], center[1] - model_center[1]);

            let side = if dx.abs() > dy.abs() {
                if dx < 0.0 {
                    Side::Right
                } else {
                    Side::Left
                }
            } else if dy < 0.0 {
                Side::Top
            } else {
                Side::Bottom
            };
            let z = zone(side);
            let vertical = matches!(side, Side::Left | Side::Right);

            let (start, lo, hi) = if vertical {
                (origin[1], z.y_min, z.y_max)
            } else {
                (origin[0], z.x_min, z.x_max)
            };
            let along = occupied
                .iter()
                .filter(|(s, _)| *s == side)
                .fold(start, |pos, (_, taken)| {
                    if (pos - taken).abs() < MIN_LABEL_SPACING {
                        taken + MIN_LABEL_SPACING
                    } else {
                        pos
                    }
                });
            let along = along.min(hi - ZONE_INSET).max(lo + ZONE_INSET);
            occupied.push((side, along));

            let (x, y) = if vertical {
                ((z.x_min + z.x_max) / 2.0, along)
            } else {
                (along, (z.y_min + z.y_max) / 2.0)
            };

            LabelPlacement {
                name: target.name.clone(),
                text: target.text.clone(),
                origin,
                position: [
                    x.min(page_w - PAGE_CLAMP).max(PAGE_CLAMP),
                    y.min(page_h - PAGE_CLAMP).max(PAGE_CLAMP),
                ],
            }
        })
        .collect()
}

/// Title block values keyed by the editable text names FreeCAD templates use.
///
/// Empty values are left out so template defaults stay.
#[must_use]
pub fn title_block_fields(
    project_name: &str,
    drawing_number: &str,
    revision: &str,
    date: &str,
    scale: &str,
) -> Map<String, Value> {
    let entries: [(&[&str], &str); 5] = [
        (&["TITLE", "FC:Title", "DRAWING_TITLE"], project_name),
        (&["DWG_NO", "FC:DrawingNumber", "DRAWING_NUMBER"], drawing_number),
        (&["REV", "FC:Revision", "REVISION"], revision),
        (&["DATE", "FC:Date"], date),
        (&["SCALE", "FC:Scale"], scale),
    ];
    entries
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .flat_map(|(keys, value)| {
            keys.iter()
                .map(move |key| ((*key).to_string(), Value::String((*value).to_string())))
        })
        .collect()
}

/// Today's date for title blocks.
#[must_use]
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

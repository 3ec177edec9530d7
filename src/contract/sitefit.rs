//! Site-fit solver output: the format consumed by `import_sitefit_contract`
//! and `present_layout_options`.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::contract::model::{Envelope, Placement};

/// Default structure height in metres.
pub const DEFAULT_STRUCTURE_HEIGHT: f64 = 5.0;

/// Default footprint dimension in metres.
pub const DEFAULT_FOOTPRINT_SIZE: f64 = 10.0;

/// A solved site-fit contract.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteFitContract {
    /// Site geometry.
    #[serde(default)]
    pub site: SiteFitSite,
    /// Structures to place.
    #[serde(default)]
    pub program: Program,
    /// Solved placements.
    #[serde(default)]
    pub placements: Vec<Placement>,
    /// Road centre lines.
    #[serde(default)]
    pub road_network: Option<RoadNetwork>,
}

/// Site block of a site-fit contract.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteFitSite {
    /// Boundary polygon in metres.
    #[serde(default)]
    pub boundary: Vec<[f64; 2]>,
}

/// Program block of a site-fit contract.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Program {
    /// Structures to place.
    #[serde(default)]
    pub structures: Vec<Structure>,
}

/// One structure of the program.
#[derive(Debug, Clone, Deserialize)]
pub struct Structure {
    /// Structure id.
    #[serde(default)]
    pub id: String,
    /// Structure category.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Plan footprint.
    #[serde(default)]
    pub footprint: Footprint,
    /// Height in metres.
    #[serde(default = "default_height")]
    pub height: f64,
}

const fn default_height() -> f64 {
    DEFAULT_STRUCTURE_HEIGHT
}

/// Footprint as the solver writes it: `{shape: "circle", d}` or
/// `{shape: "rect", w, h}`. Anything that is not a circle is a rectangle.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Footprint {
    /// Shape name.
    #[serde(default)]
    pub shape: Option<String>,
    /// Diameter of a circle.
    #[serde(default)]
    pub d: Option<f64>,
    /// Extent along X of a rectangle.
    #[serde(default)]
    pub w: Option<f64>,
    /// Extent along Y of a rectangle.
    #[serde(default)]
    pub h: Option<f64>,
}

impl Footprint {
    /// Converts the footprint into a contract envelope.
    #[must_use]
    pub fn envelope(&self) -> Envelope {
        if self.shape.as_deref() == Some("circle") {
            Envelope::Circle {
                diameter: self.d.unwrap_or(DEFAULT_FOOTPRINT_SIZE),
            }
        } else {
            Envelope::Rectangle {
                width: self.w.unwrap_or(DEFAULT_FOOTPRINT_SIZE),
                length: self.h.unwrap_or(DEFAULT_FOOTPRINT_SIZE),
            }
        }
    }
}

/// Road network block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoadNetwork {
    /// Road segments.
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// One road centre line.
#[derive(Debug, Clone, Deserialize)]
pub struct Segment {
    /// Segment id.
    #[serde(default = "default_segment_id")]
    pub id: String,
    /// Start point.
    #[serde(default)]
    pub start: [f64; 2],
    /// End point.
    #[serde(default)]
    pub end: [f64; 2],
    /// Intermediate points.
    #[serde(default)]
    pub waypoints: Vec<[f64; 2]>,
}

fn default_segment_id() -> String {
    "road".to_string()
}

impl Segment {
    /// Returns start, waypoints and end in order.
    #[must_use]
    pub fn points(&self) -> Vec<[f64; 2]> {
        std::iter::once(self.start)
            .chain(self.waypoints.iter().copied())
            .chain(std::iter::once(self.end))
            .collect()
    }
}

/// One candidate layout from the solver's solution list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayoutSolution {
    /// Solution id.
    #[serde(default)]
    pub solution_id: Option<String>,
    /// Solver rank (1 is best).
    #[serde(default)]
    pub rank: Option<u32>,
    /// Quality metrics.
    #[serde(default)]
    pub metrics: IndexMap<String, Value>,
    /// Solved placements.
    #[serde(default)]
    pub placements: Vec<Placement>,
    /// Structures placed by this solution.
    #[serde(default)]
    pub structures: Vec<Structure>,
}

impl LayoutSolution {
    /// Finds the placement for a structure id.
    #[must_use]
    pub fn placement_for(&self, id: &str) -> Option<&Placement> {
        self.placements.iter().find(|p| p.id == id)
    }
}

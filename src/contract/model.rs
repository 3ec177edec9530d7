//! Spatial contract document types.
//!
//! All lengths are in metres. Keys this crate does not know about are kept
//! in `extra` maps so a read-modify-write cycle loses nothing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Contract format version written by this crate.
pub const CONTRACT_VERSION: &str = "1.0.0";

/// The spatial contract interchange document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Project identification and coordinate frame.
    pub project: Project,
    /// Site geometry.
    #[serde(default)]
    pub site: Site,
    /// Equipment envelopes.
    #[serde(default)]
    pub equipment: Vec<Equipment>,
    /// Solved placements (filled in by the layout solver).
    #[serde(default)]
    pub placements: Vec<Placement>,
    /// Process connections, carried through untouched.
    #[serde(default)]
    pub connections: Vec<Value>,
    /// Visualisation overrides, carried through untouched.
    #[serde(default)]
    pub viz_overrides: Vec<Value>,
    /// Provenance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Unknown top-level keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Project block of the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project identifier.
    pub name: String,
    /// Coordinate reference system.
    #[serde(default = "default_crs")]
    pub crs: String,
    /// Survey origin of the local frame.
    #[serde(default)]
    pub origin: Origin,
    /// Rotation of the local frame relative to grid north.
    #[serde(default)]
    pub rotation_deg: f64,
    /// Length unit.
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Contract format version.
    #[serde(default = "default_version")]
    pub version: String,
}

impl Project {
    /// Creates a project block in a local metre frame.
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            crs: default_crs(),
            origin: Origin::default(),
            rotation_deg: 0.0,
            unit: default_unit(),
            version: default_version(),
        }
    }
}

fn default_crs() -> String {
    "local".to_string()
}

fn default_unit() -> String {
    "m".to_string()
}

fn default_version() -> String {
    CONTRACT_VERSION.to_string()
}

/// Survey origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    /// Easting in metres.
    #[serde(default)]
    pub easting: f64,
    /// Northing in metres.
    #[serde(default)]
    pub northing: f64,
    /// Elevation in metres.
    #[serde(default)]
    pub elevation: f64,
}

/// Site geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Boundary polygon as `[x, y]` points.
    #[serde(default)]
    pub boundary: Vec<[f64; 2]>,
    /// Keep-out zones.
    #[serde(default)]
    pub keepouts: Vec<Value>,
    /// Site entrances.
    #[serde(default)]
    pub entrances: Vec<Value>,
}

/// One piece of equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    /// Equipment tag, kept verbatim as the FreeCAD label.
    pub id: String,
    /// Equipment category (`storage_tank`, `pump`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Plan footprint.
    pub envelope: Envelope,
    /// Overall height.
    pub height: f64,
    /// Elevation of the base.
    #[serde(default)]
    pub base_elevation: f64,
    /// Rotation about Z in degrees.
    #[serde(default)]
    pub rotation_deg: f64,
    /// Back-reference into the authoritative model.
    pub truth_ref: String,
    /// Required clearances.
    #[serde(default)]
    pub clearances: Clearances,
    /// Parametric expressions keyed by property name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, String>,
}

/// Plan footprint of a piece of equipment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Envelope {
    /// Circular footprint.
    Circle {
        /// Diameter.
        diameter: f64,
    },
    /// Rectangular footprint; `width` runs along X, `length` along Y.
    Rectangle {
        /// Extent along X.
        width: f64,
        /// Extent along Y.
        length: f64,
    },
}

impl Envelope {
    /// Returns the shape name used in tool output.
    #[must_use]
    pub const fn shape_name(&self) -> &'static str {
        match self {
            Self::Circle { .. } => "circle",
            Self::Rectangle { .. } => "rectangle",
        }
    }
}

/// Clearances around equipment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clearances {
    /// Maintenance access clearance.
    pub maintenance: f64,
    /// Operational clearance.
    pub operation: f64,
}

impl Default for Clearances {
    fn default() -> Self {
        Self {
            maintenance: 2.0,
            operation: 1.5,
        }
    }
}

/// A solved position for one piece of equipment.
///
/// `x`/`y` are the centre of the footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Equipment id. Solvers may send it as `structure_id`.
    #[serde(alias = "structure_id")]
    pub id: String,
    /// Centre X.
    #[serde(default)]
    pub x: f64,
    /// Centre Y.
    #[serde(default)]
    pub y: f64,
    /// Rotation about Z in degrees.
    #[serde(default)]
    pub rotation_deg: f64,
}

/// Provenance block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// UTC timestamp, RFC 3339.
    pub created_at: String,
    /// Producing tool.
    pub created_by: String,
    /// FreeCAD file the contract was extracted from.
    pub source_file: String,
    /// Content hash of the equipment list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Unknown metadata keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Any document carrying a `placements` list.
///
/// Used when only the placements of a contract matter, so partial documents
/// such as `{"placements": [...]}` are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlacementSet {
    /// The placements.
    #[serde(default)]
    pub placements: Vec<Placement>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_tagging() {
        let circle: Envelope =
            serde_json::from_value(json!({"shape": "circle", "diameter": 12.0})).unwrap();
        assert_eq!(circle, Envelope::Circle { diameter: 12.0 });

        let rect = Envelope::Rectangle {
            width: 20.0,
            length: 30.0,
        };
        assert_eq!(
            serde_json::to_value(rect).unwrap(),
            json!({"shape": "rectangle", "width": 20.0, "length": 30.0})
        );
    }

    #[test]
    fn placement_accepts_structure_id() {
        let p: Placement =
            serde_json::from_value(json!({"structure_id": "DIG-101", "x": 50, "y": 40})).unwrap();
        assert_eq!(p.id, "DIG-101");
        assert!((p.rotation_deg - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_keys_survive() {
        let doc = json!({
            "project": {"name": "etp"},
            "solver": {"seed": 7},
            "placements": [{"id": "TK-101", "x": 1.0, "y": 2.0}]
        });
        let contract: Contract = serde_json::from_value(doc).unwrap();
        assert_eq!(contract.project.unit, "m");
        assert_eq!(contract.extra["solver"], json!({"seed": 7}));

        let back = serde_json::to_value(&contract).unwrap();
        assert_eq!(back["solver"], json!({"seed": 7}));
        assert_eq!(back["placements"][0]["id"], "TK-101");
        assert!(back.get("metadata").is_none());
    }

    #[test]
    fn parameters_keep_order() {
        let equipment: Equipment = serde_json::from_value(json!({
            "id": "TK-101",
            "type": "storage_tank",
            "envelope": {"shape": "circle", "diameter": 12.0},
            "height": 8.5,
            "truth_ref": "FreeCAD::Plant::TK-101",
            "parameters": {"Radius": "Sheet.D / 2", "Height": "Sheet.H"}
        }))
        .unwrap();
        let keys: Vec<&str> = equipment.parameters.keys().map(String::as_str).collect();
        assert_eq!(keys, ["Radius", "Height"]);
        assert_eq!(equipment.clearances, Clearances::default());
    }
}

//! Building a spatial contract from FreeCAD geometry.
//!
//! The host program `extract_layout` reports raw geometry in millimetres;
//! everything else (unit conversion, filtering, type inference, hashing)
//! happens here so it can be tested without FreeCAD.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use sha2::{Digest, Sha256};

use crate::contract::canonical;
use crate::contract::model::{
    Clearances, Contract, Envelope, Equipment, Metadata, Project, Site,
};
use crate::units::{mm_to_m, point_mm_to_m, round_to};

/// Producer name recorded in contract metadata.
pub const CREATED_BY: &str = "freecad-mcp/export_contract_json";

/// Object types that never count as equipment.
const SKIPPED_TYPES: [&str; 4] = ["Draft::Wire", "Draft::Dimension", "Draft::Text", "Draft::Label"];

/// Relative width/length difference under which a footprint is a circle.
const CIRCLE_TOLERANCE: f64 = 0.1;

/// Decimal places kept for exported dimensions.
const DIMENSION_PLACES: i32 = 3;

/// Axis-aligned bounds in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum X.
    pub x_min: f64,
    /// Maximum X.
    pub x_max: f64,
    /// Minimum Y.
    pub y_min: f64,
    /// Maximum Y.
    pub y_max: f64,
    /// Minimum Z.
    pub z_min: f64,
    /// Maximum Z.
    pub z_max: f64,
}

impl BoundingBox {
    /// Extent along X.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Extent along Y.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Extent along Z.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.z_max - self.z_min
    }

    /// Plan-view centre.
    #[must_use]
    pub fn center(&self) -> [f64; 2] {
        [
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        ]
    }

    /// Smallest box containing both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            x_min: self.x_min.min(other.x_min),
            x_max: self.x_max.max(other.x_max),
            y_min: self.y_min.min(other.y_min),
            y_max: self.y_max.max(other.y_max),
            z_min: self.z_min.min(other.z_min),
            z_max: self.z_max.max(other.z_max),
        }
    }
}

/// One shape-bearing object as reported by the host.
#[derive(Debug, Clone, Deserialize)]
pub struct HostObject {
    /// Internal object name.
    pub name: String,
    /// User-visible label.
    #[serde(default)]
    pub label: String,
    /// FreeCAD type id.
    pub type_id: String,
    /// Shape bounds.
    pub bbox: BoundingBox,
    /// Placement base.
    #[serde(default)]
    pub base: [f64; 3],
    /// Placement rotation about Z in degrees; zero when tilted off Z.
    #[serde(default)]
    pub rotation_deg: f64,
    /// Bound expressions as `(property, expression)` pairs.
    #[serde(default)]
    pub expressions: Vec<(String, String)>,
}

impl HostObject {
    /// Equipment tag: the label, which keeps characters object names cannot.
    #[must_use]
    pub fn tag(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }

    fn is_called(&self, name: &str) -> bool {
        !name.is_empty() && (self.name == name || self.label == name)
    }
}

/// Everything `extract_layout` reports for one document.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutExtraction {
    /// Document name.
    pub doc_name: String,
    /// Saved file, or the document name if unsaved.
    #[serde(default)]
    pub source_file: String,
    /// Boundary points in millimetres.
    #[serde(default)]
    pub boundary: Vec<[f64; 2]>,
    /// Shape-bearing objects.
    #[serde(default)]
    pub objects: Vec<HostObject>,
}

/// Knobs for [`build_contract`].
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Object holding the site boundary, by name or label; excluded from equipment.
    pub boundary_object: Option<String>,
    /// Only objects whose tag starts with this become equipment.
    pub equipment_prefix: Option<String>,
    /// Clearances written for every piece of equipment.
    pub clearances: Clearances,
    /// Timestamp recorded in metadata.
    pub created_at: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            boundary_object: None,
            equipment_prefix: None,
            clearances: Clearances::default(),
            created_at: now_rfc3339(),
        }
    }
}

/// Current UTC time in RFC 3339 form.
#[must_use]
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Builds a contract from extracted geometry.
///
/// Placements are left empty; the layout solver fills them in.
#[must_use]
pub fn build_contract(project: &str, extraction: &LayoutExtraction, options: &ExportOptions) -> Contract {
    let equipment: Vec<Equipment> = extraction
        .objects
        .iter()
        .filter(|obj| is_equipment(obj, options))
        .map(|obj| to_equipment(obj, &extraction.doc_name, options.clearances))
        .collect();

    let hash = equipment_hash(&equipment);
    tracing::debug!(
        equipment = equipment.len(),
        boundary_points = extraction.boundary.len(),
        %hash,
        "Built contract"
    );

    Contract {
        project: Project::local(project),
        site: Site {
            boundary: extraction.boundary.iter().copied().map(point_mm_to_m).collect(),
            ..Site::default()
        },
        equipment,
        placements: Vec::new(),
        connections: Vec::new(),
        viz_overrides: Vec::new(),
        metadata: Some(Metadata {
            created_at: options.created_at.clone(),
            created_by: CREATED_BY.to_string(),
            source_file: extraction.source_file.clone(),
            hash: Some(hash),
            extra: Map::new(),
        }),
        extra: Map::new(),
    }
}

fn is_equipment(obj: &HostObject, options: &ExportOptions) -> bool {
    if options
        .boundary_object
        .as_deref()
        .is_some_and(|boundary| obj.is_called(boundary))
    {
        return false;
    }
    if SKIPPED_TYPES.contains(&obj.type_id.as_str()) {
        return false;
    }
    options
        .equipment_prefix
        .as_deref()
        .map_or(true, |prefix| prefix.is_empty() || obj.tag().starts_with(prefix))
}

fn to_equipment(obj: &HostObject, doc_name: &str, clearances: Clearances) -> Equipment {
    let parameters: IndexMap<String, String> = obj.expressions.iter().cloned().collect();
    Equipment {
        id: obj.tag().to_string(),
        kind: infer_equipment_type(obj.tag()).to_string(),
        envelope: envelope_from_bbox(&obj.bbox),
        height: round_to(mm_to_m(obj.bbox.height()), DIMENSION_PLACES),
        base_elevation: round_to(mm_to_m(obj.base[2]), DIMENSION_PLACES),
        rotation_deg: round_to(obj.rotation_deg, DIMENSION_PLACES),
        truth_ref: format!("FreeCAD::{doc_name}::{}", obj.name),
        clearances,
        parameters,
    }
}

/// Derives a plan footprint in metres from a millimetre bounding box.
///
/// Near-square boxes become circles whose diameter is the mean side.
#[must_use]
pub fn envelope_from_bbox(bbox: &BoundingBox) -> Envelope {
    let width = mm_to_m(bbox.width());
    let length = mm_to_m(bbox.length());
    if (width - length).abs() < CIRCLE_TOLERANCE * width.max(length) {
        Envelope::Circle {
            diameter: round_to((width + length) / 2.0, DIMENSION_PLACES),
        }
    } else {
        Envelope::Rectangle {
            width: round_to(width, DIMENSION_PLACES),
            length: round_to(length, DIMENSION_PLACES),
        }
    }
}

/// `sha256:` plus the first 16 hex digits of the digest of the equipment
/// list.
///
/// The digest input is Python's `json.dumps(equipment, sort_keys=True)`, so
/// Python consumers of the contract can recompute it.
#[must_use]
pub fn equipment_hash(equipment: &[Equipment]) -> String {
    let canonical = serde_json::to_value(equipment)
        .and_then(|value| canonical::to_python_json(&value))
        .unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    let hex = hex::encode(digest);
    format!("sha256:{}", &hex[..16])
}

static TYPE_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"tank|^tk", "storage_tank"),
        (r"reactor|^r-", "reactor"),
        (r"pump|^p-", "pump"),
        (r"clarifier", "clarifier"),
        (r"thickener", "thickener"),
        (r"filter", "filter"),
        (r"blower|^bl-", "blower"),
        (r"compressor", "compressor"),
        (r"exchanger|^e-", "heat_exchanger"),
        (r"column|^c-", "column"),
        (r"vessel|^v-", "vessel"),
        (r"basin", "basin"),
        (r"building", "building"),
        (r"substation", "substation"),
        (r"mcc", "mcc"),
        (r"rack", "pipe_rack"),
    ]
    .into_iter()
    .map(|(pattern, kind)| (Regex::new(pattern).expect("equipment type pattern is valid"), kind))
    .collect()
});

/// Infers an equipment category from an object name.
///
/// Matching is case-insensitive and the first matching rule wins.
#[must_use]
pub fn infer_equipment_type(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    TYPE_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(&lower))
        .map_or("other", |(_, kind)| kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(w: f64, l: f64, h: f64) -> BoundingBox {
        BoundingBox {
            x_min: 0.0,
            x_max: w,
            y_min: 0.0,
            y_max: l,
            z_min: 0.0,
            z_max: h,
        }
    }

    fn object(name: &str, label: &str, type_id: &str, bbox: BoundingBox) -> HostObject {
        HostObject {
            name: name.to_string(),
            label: label.to_string(),
            type_id: type_id.to_string(),
            bbox,
            base: [5000.0, 7000.0, 250.0],
            rotation_deg: 0.0,
            expressions: Vec::new(),
        }
    }

    fn extraction() -> LayoutExtraction {
        LayoutExtraction {
            doc_name: "Plant".to_string(),
            source_file: "/home/eng/plant.FCStd".to_string(),
            boundary: vec![[0.0, 0.0], [100_000.0, 0.0], [100_000.0, 80_000.0]],
            objects: vec![
                object("TK_101", "TK-101", "Part::Cylinder", bbox(12_000.0, 12_000.0, 8_500.0)),
                object("PumpHouse", "", "Part::Box", bbox(6_000.0, 4_000.0, 3_000.0)),
                object("Wire", "SiteBoundary", "Part::Feature", bbox(100_000.0, 80_000.0, 0.0)),
                object("Wire001", "Wire001", "Draft::Wire", bbox(10.0, 10.0, 0.0)),
            ],
        }
    }

    fn options() -> ExportOptions {
        ExportOptions {
            boundary_object: Some("SiteBoundary".to_string()),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            ..ExportOptions::default()
        }
    }

    #[test]
    fn equipment_types_by_name() {
        assert_eq!(infer_equipment_type("TK-101"), "storage_tank");
        assert_eq!(infer_equipment_type("R-201"), "reactor");
        assert_eq!(infer_equipment_type("FeedPump"), "pump");
        assert_eq!(infer_equipment_type("BL-1"), "blower");
        assert_eq!(infer_equipment_type("E-301"), "heat_exchanger");
        assert_eq!(infer_equipment_type("ControlBuilding"), "building");
        assert_eq!(infer_equipment_type("MCC_A"), "mcc");
        assert_eq!(infer_equipment_type("PipeRack"), "pipe_rack");
        assert_eq!(infer_equipment_type("Box"), "other");
    }

    #[test]
    fn first_rule_wins() {
        // "tank" is checked before "pump".
        assert_eq!(infer_equipment_type("PumpTank"), "storage_tank");
    }

    #[test]
    fn contract_from_extraction() {
        let contract = build_contract("etp", &extraction(), &options());

        let ids: Vec<&str> = contract.equipment.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["TK-101", "PumpHouse"]);
        assert!(contract.placements.is_empty());
        assert_eq!(contract.site.boundary[1], [100.0, 0.0]);

        let tank = &contract.equipment[0];
        assert_eq!(tank.kind, "storage_tank");
        assert_eq!(tank.envelope, Envelope::Circle { diameter: 12.0 });
        assert!((tank.height - 8.5).abs() < 1e-9);
        assert!((tank.base_elevation - 0.25).abs() < 1e-9);
        assert!(tank.rotation_deg.abs() < f64::EPSILON);
        assert_eq!(tank.truth_ref, "FreeCAD::Plant::TK_101");

        let house = &contract.equipment[1];
        assert_eq!(
            house.envelope,
            Envelope::Rectangle {
                width: 6.0,
                length: 4.0
            }
        );

        let metadata = contract.metadata.unwrap();
        assert_eq!(metadata.created_by, CREATED_BY);
        assert_eq!(metadata.source_file, "/home/eng/plant.FCStd");
        let hash = metadata.hash.unwrap();
        assert!(hash.starts_with("sha256:"));
        assert_eq!(hash.len(), "sha256:".len() + 16);
    }

    #[test]
    fn prefix_filters_equipment() {
        let opts = ExportOptions {
            equipment_prefix: Some("TK-".to_string()),
            ..options()
        };
        let contract = build_contract("etp", &extraction(), &opts);
        assert_eq!(contract.equipment.len(), 1);
        assert_eq!(contract.equipment[0].id, "TK-101");
    }

    #[test]
    fn ids_come_from_labels() {
        let mut ex = extraction();
        ex.objects.push(object("P_201", "P-201", "Part::Box", bbox(1_200.0, 800.0, 900.0)));
        let contract = build_contract("etp", &ex, &options());

        let ids: Vec<&str> = contract.equipment.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["TK-101", "PumpHouse", "P-201"]);
        assert_eq!(contract.equipment[2].kind, "pump");
        assert_eq!(contract.equipment[2].truth_ref, "FreeCAD::Plant::P_201");
    }

    #[test]
    fn boundary_object_matches_name_or_label() {
        let by_name = ExportOptions {
            boundary_object: Some("Wire".to_string()),
            ..options()
        };
        let ids: Vec<String> = build_contract("etp", &extraction(), &by_name)
            .equipment
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, ["TK-101", "PumpHouse"]);

        let unset = ExportOptions {
            boundary_object: None,
            ..options()
        };
        assert_eq!(build_contract("etp", &extraction(), &unset).equipment.len(), 3);
    }

    #[test]
    fn z_rotation_is_exported() {
        let mut ex = extraction();
        ex.objects[1].rotation_deg = 90.000_000_1;
        let contract = build_contract("etp", &ex, &options());
        assert!((contract.equipment[1].rotation_deg - 90.0).abs() < f64::EPSILON);

        let value = serde_json::to_value(&contract.equipment[1]).unwrap();
        assert_eq!(value["rotation_deg"], 90.0);
    }

    #[test]
    fn hash_matches_python_json_dumps() {
        let equipment = vec![Equipment {
            id: "TK-101".to_string(),
            kind: "storage_tank".to_string(),
            envelope: Envelope::Circle { diameter: 3.0 },
            height: 6.0,
            base_elevation: 0.0,
            rotation_deg: 90.0,
            truth_ref: "FreeCAD::Plant::TK_101".to_string(),
            clearances: Clearances::default(),
            parameters: IndexMap::new(),
        }];
        assert_eq!(equipment_hash(&equipment), "sha256:d74988299f13a752");
    }

    #[test]
    fn type_patterns_compile() {
        assert_eq!(LazyLock::force(&TYPE_PATTERNS).len(), 16);
    }

    #[test]
    fn hash_is_stable_and_content_sensitive() {
        let a = build_contract("etp", &extraction(), &options());
        let b = build_contract("other", &extraction(), &options());
        assert_eq!(a.metadata.unwrap().hash, b.metadata.unwrap().hash);

        let mut changed = extraction();
        changed.objects[0].bbox.z_max = 9_000.0;
        let c = build_contract("etp", &changed, &options());
        assert_ne!(
            c.metadata.unwrap().hash,
            build_contract("etp", &extraction(), &options()).metadata.unwrap().hash
        );
    }

    #[test]
    fn expressions_become_parameters() {
        let mut ex = extraction();
        ex.objects[0].expressions = vec![
            ("Radius".to_string(), "Spreadsheet.D / 2".to_string()),
            ("Height".to_string(), "Spreadsheet.H".to_string()),
        ];
        let contract = build_contract("etp", &ex, &options());
        let params = &contract.equipment[0].parameters;
        assert_eq!(params.get("Radius").map(String::as_str), Some("Spreadsheet.D / 2"));
        assert!(contract.equipment[1].parameters.is_empty());
    }

    #[test]
    fn near_square_is_circle() {
        assert_eq!(
            envelope_from_bbox(&bbox(10_000.0, 9_500.0, 1.0)),
            Envelope::Circle { diameter: 9.75 }
        );
        assert_eq!(envelope_from_bbox(&bbox(10_000.0, 8_000.0, 1.0)).shape_name(), "rectangle");
    }

    #[test]
    fn bbox_union_and_center() {
        let a = bbox(10.0, 10.0, 1.0);
        let mut b = bbox(10.0, 10.0, 1.0);
        b.x_min = -20.0;
        let u = a.union(&b);
        assert!((u.width() - 30.0).abs() < f64::EPSILON);
        assert_eq!(u.center(), [-5.0, 5.0]);
    }
}

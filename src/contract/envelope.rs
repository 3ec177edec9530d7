//! Equipment solids built from contract envelopes.
//!
//! A plan lists the primitives (millimetres, centred on the origin in plan)
//! and the metadata properties that make up one piece of equipment. The host
//! program `build_equipment` turns a plan into FreeCAD objects.

use serde::Serialize;
use serde_json::{json, Value};

use crate::contract::model::Envelope;
use crate::contract::placement::normalize_object_name;
use crate::error::{ToolError, ToolResult};
use crate::units::{m_to_mm, mm_to_m};

/// Equipment types drawn as a tank with a dome cover.
pub const DIGESTER_TYPES: [&str; 4] = ["digester", "anaerobic_digester", "anmbr", "gas_holder"];

/// Equipment types drawn as walls with a flat roof slab.
pub const BUILDING_TYPES: [&str; 10] = [
    "building",
    "control_building",
    "biogas_building",
    "pump_station",
    "blower_building",
    "mcc_building",
    "dewatering_building",
    "uv_building",
    "chemical_building",
    "screen_building",
];

/// Dome height as a fraction of the tank diameter.
pub const DOME_RATIO: f64 = 0.15;

/// Roof slab thickness in millimetres.
pub const ROOF_THICKNESS_MM: f64 = 300.0;

/// Roof overhang on each side in millimetres.
pub const ROOF_OVERHANG_MM: f64 = 200.0;

/// Primitive solid kinds understood by `build_equipment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartKind {
    /// `Part::Cylinder` standing on its base.
    Cylinder,
    /// `Part::Box` with its corner at `base`.
    Box,
    /// Upper half of a `Part::Ellipsoid`.
    Dome,
}

/// One primitive of an equipment solid. Lengths in millimetres.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartSpec {
    /// Appended to the equipment name when there are several parts.
    pub suffix: &'static str,
    /// Primitive kind.
    pub kind: PartKind,
    /// Cylinder or dome radius.
    pub radius: f64,
    /// Height (dome rise for domes).
    pub height: f64,
    /// Box extent along X.
    pub length: f64,
    /// Box extent along Y.
    pub width: f64,
    /// Placement base.
    pub base: [f64; 3],
}

impl PartSpec {
    fn cylinder(suffix: &'static str, radius: f64, height: f64) -> Self {
        Self {
            suffix,
            kind: PartKind::Cylinder,
            radius,
            height,
            length: 0.0,
            width: 0.0,
            base: [0.0; 3],
        }
    }

    fn dome(radius: f64, rise: f64, z: f64) -> Self {
        Self {
            suffix: "dome",
            kind: PartKind::Dome,
            radius,
            height: rise,
            length: 0.0,
            width: 0.0,
            base: [0.0, 0.0, z],
        }
    }

    /// A box centred on the origin in plan.
    fn centred_box(suffix: &'static str, x_extent: f64, y_extent: f64, height: f64, z: f64) -> Self {
        Self {
            suffix,
            kind: PartKind::Box,
            radius: 0.0,
            height,
            length: x_extent,
            width: y_extent,
            base: [-x_extent / 2.0, -y_extent / 2.0, z],
        }
    }
}

/// FreeCAD property types used for equipment metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    /// `App::PropertyString`.
    String,
    /// `App::PropertyFloat`.
    Float,
}

/// A metadata property attached to the equipment root object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySpec {
    /// Property name.
    pub name: &'static str,
    /// Property type.
    pub kind: PropertyKind,
    /// Value to assign.
    pub value: Value,
    /// Tooltip.
    pub doc: &'static str,
}

impl PropertySpec {
    fn string(name: &'static str, value: &str, doc: &'static str) -> Self {
        Self {
            name,
            kind: PropertyKind::String,
            value: json!(value),
            doc,
        }
    }

    fn float(name: &'static str, value: f64, doc: &'static str) -> Self {
        Self {
            name,
            kind: PropertyKind::Float,
            value: json!(value),
            doc,
        }
    }
}

/// Everything needed to build one piece of equipment.
#[derive(Debug, Clone, PartialEq)]
pub struct EquipmentPlan {
    /// Equipment tag, used as the label.
    pub id: String,
    /// FreeCAD object name derived from the tag.
    pub name: String,
    /// Equipment category.
    pub equipment_type: String,
    /// Primitives; more than one becomes a compound.
    pub parts: Vec<PartSpec>,
    /// Metadata properties on the root object.
    pub properties: Vec<PropertySpec>,
}

impl EquipmentPlan {
    /// Plans a detailed envelope: digesters get a dome, buildings a roof.
    ///
    /// Dimensions are in metres.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension is not positive or the height leaves
    /// no room below the dome or roof.
    pub fn envelope(
        id: &str,
        equipment_type: &str,
        envelope: &Envelope,
        height: f64,
    ) -> ToolResult<Self> {
        require_positive("height", height)?;
        let kind = equipment_type.to_lowercase();
        let height_mm = m_to_mm(height);

        let (parts, mut properties) = match *envelope {
            Envelope::Circle { diameter } => {
                require_positive("diameter", diameter)?;
                let radius_mm = m_to_mm(diameter) / 2.0;
                if DIGESTER_TYPES.contains(&kind.as_str()) {
                    let dome_m = diameter * DOME_RATIO;
                    let dome_mm = m_to_mm(dome_m);
                    let tank_mm = height_mm - dome_mm;
                    if tank_mm <= 0.0 {
                        return Err(ToolError::invalid(format!(
                            "height {height}m must exceed the dome height {dome_m}m"
                        )));
                    }
                    (
                        vec![
                            PartSpec::cylinder("tank", radius_mm, tank_mm),
                            PartSpec::dome(radius_mm, dome_mm, tank_mm),
                        ],
                        vec![
                            PropertySpec::float("DiameterM", diameter, "Diameter in meters"),
                            PropertySpec::float("HeightM", height, "Total height in meters"),
                            PropertySpec::float("DomeHeightM", dome_m, "Dome height in meters"),
                        ],
                    )
                } else {
                    (
                        vec![PartSpec::cylinder("body", radius_mm, height_mm)],
                        vec![
                            PropertySpec::float("DiameterM", diameter, "Diameter in meters"),
                            PropertySpec::float("HeightM", height, "Height in meters"),
                        ],
                    )
                }
            }
            Envelope::Rectangle { width, length } => {
                require_positive("width", width)?;
                require_positive("length", length)?;
                let (x_mm, y_mm) = (m_to_mm(width), m_to_mm(length));
                let parts = if BUILDING_TYPES.contains(&kind.as_str()) {
                    let wall_mm = height_mm - ROOF_THICKNESS_MM;
                    if wall_mm <= 0.0 {
                        return Err(ToolError::invalid(format!(
                            "height {height}m must exceed the roof thickness {}m",
                            mm_to_m(ROOF_THICKNESS_MM)
                        )));
                    }
                    vec![
                        PartSpec::centred_box("walls", x_mm, y_mm, wall_mm, 0.0),
                        PartSpec::centred_box(
                            "roof",
                            x_mm + 2.0 * ROOF_OVERHANG_MM,
                            y_mm + 2.0 * ROOF_OVERHANG_MM,
                            ROOF_THICKNESS_MM,
                            wall_mm,
                        ),
                    ]
                } else {
                    vec![PartSpec::centred_box("body", x_mm, y_mm, height_mm, 0.0)]
                };
                (
                    parts,
                    vec![
                        PropertySpec::float("WidthM", width, "Width in meters"),
                        PropertySpec::float("LengthM", length, "Length in meters"),
                        PropertySpec::float("HeightM", height, "Height in meters"),
                    ],
                )
            }
        };

        properties.insert(
            0,
            PropertySpec::string("EquipmentType", equipment_type, "Equipment type"),
        );
        Ok(Self {
            id: id.to_string(),
            name: normalize_object_name(id),
            equipment_type: equipment_type.to_string(),
            parts,
            properties,
        })
    }

    /// Plans a plain footprint solid (one cylinder or box) for imported
    /// solver structures.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension is not positive.
    pub fn footprint(
        id: &str,
        equipment_type: &str,
        envelope: &Envelope,
        height: f64,
    ) -> ToolResult<Self> {
        require_positive("height", height)?;
        let height_mm = m_to_mm(height);
        let part = match *envelope {
            Envelope::Circle { diameter } => {
                require_positive("diameter", diameter)?;
                PartSpec::cylinder("body", m_to_mm(diameter) / 2.0, height_mm)
            }
            Envelope::Rectangle { width, length } => {
                require_positive("width", width)?;
                require_positive("length", length)?;
                PartSpec::centred_box("body", m_to_mm(width), m_to_mm(length), height_mm, 0.0)
            }
        };
        Ok(Self {
            id: id.to_string(),
            name: normalize_object_name(id),
            equipment_type: equipment_type.to_string(),
            parts: vec![part],
            properties: vec![PropertySpec::string(
                "EquipmentType",
                equipment_type,
                "Equipment type",
            )],
        })
    }
}

fn require_positive(what: &str, value: f64) -> ToolResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ToolError::invalid(format!("{what} must be positive, got {value}")))
    }
}

/// Builds an envelope from loose tool arguments.
///
/// # Errors
///
/// Returns an error for an unknown shape or a missing dimension.
pub fn parse_envelope(
    shape: &str,
    width: Option<f64>,
    length: Option<f64>,
    diameter: Option<f64>,
) -> ToolResult<Envelope> {
    match shape {
        "circle" => diameter
            .filter(|d| d.abs() > f64::EPSILON)
            .map(|diameter| Envelope::Circle { diameter })
            .ok_or_else(|| ToolError::invalid("diameter is required for circle shape")),
        "rectangle" => match (width.filter(|w| w.abs() > f64::EPSILON), length.filter(|l| l.abs() > f64::EPSILON)) {
            (Some(width), Some(length)) => Ok(Envelope::Rectangle { width, length }),
            _ => Err(ToolError::invalid(
                "width and length are required for rectangle shape",
            )),
        },
        other => Err(ToolError::invalid(format!(
            "Unknown shape: {other}. Use 'rectangle' or 'circle'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn plain_tank_is_one_cylinder() {
        let plan = EquipmentPlan::envelope(
            "TK-101",
            "storage_tank",
            &Envelope::Circle { diameter: 12.0 },
            8.5,
        )
        .unwrap();
        assert_eq!(plan.name, "TK_101");
        assert_eq!(plan.id, "TK-101");
        assert_eq!(plan.parts.len(), 1);
        assert_eq!(plan.parts[0].kind, PartKind::Cylinder);
        assert!(approx(plan.parts[0].radius, 6000.0));
        assert!(approx(plan.parts[0].height, 8500.0));
        let names: Vec<&str> = plan.properties.iter().map(|p| p.name).collect();
        assert_eq!(names, ["EquipmentType", "DiameterM", "HeightM"]);
    }

    #[test]
    fn digester_gets_dome() {
        let plan = EquipmentPlan::envelope(
            "DIG-101",
            "Digester",
            &Envelope::Circle { diameter: 40.0 },
            20.0,
        )
        .unwrap();
        assert_eq!(plan.parts.len(), 2);
        let (tank, dome) = (&plan.parts[0], &plan.parts[1]);
        assert!(approx(dome.height, 6000.0));
        assert!(approx(tank.height, 14_000.0));
        assert!(approx(dome.base[2], 14_000.0));
        assert_eq!(dome.kind, PartKind::Dome);
        assert!(plan.properties.iter().any(|p| p.name == "DomeHeightM"));
    }

    #[test]
    fn digester_too_short_for_dome() {
        let err = EquipmentPlan::envelope(
            "DIG-1",
            "digester",
            &Envelope::Circle { diameter: 40.0 },
            5.0,
        )
        .unwrap_err();
        assert!(err.to_string().contains("dome"));
    }

    #[test]
    fn building_gets_roof_with_overhang() {
        let plan = EquipmentPlan::envelope(
            "BLDG-001",
            "building",
            &Envelope::Rectangle {
                width: 20.0,
                length: 30.0,
            },
            6.0,
        )
        .unwrap();
        let (walls, roof) = (&plan.parts[0], &plan.parts[1]);
        assert!(approx(walls.height, 5700.0));
        assert_eq!(walls.base, [-10_000.0, -15_000.0, 0.0]);
        assert!(approx(roof.length, 20_400.0));
        assert!(approx(roof.width, 30_400.0));
        assert_eq!(roof.base, [-10_200.0, -15_200.0, 5700.0]);
    }

    #[test]
    fn building_shorter_than_roof_is_rejected() {
        let err = EquipmentPlan::envelope(
            "BLDG-002",
            "building",
            &Envelope::Rectangle {
                width: 10.0,
                length: 10.0,
            },
            0.25,
        )
        .unwrap_err();
        assert!(
            err.to_string().contains("must exceed the roof thickness 0.3m"),
            "{err}"
        );
    }

    #[test]
    fn footprint_box_is_centred() {
        let plan = EquipmentPlan::footprint(
            "PS-1",
            "pump_station",
            &Envelope::Rectangle {
                width: 8.0,
                length: 4.0,
            },
            5.0,
        )
        .unwrap();
        assert_eq!(plan.parts.len(), 1);
        assert_eq!(plan.parts[0].base, [-4000.0, -2000.0, 0.0]);
        assert_eq!(plan.properties.len(), 1);
    }

    #[test]
    fn envelope_argument_errors() {
        assert_eq!(
            parse_envelope("circle", None, None, Some(12.0)).unwrap(),
            Envelope::Circle { diameter: 12.0 }
        );
        assert!(parse_envelope("circle", Some(1.0), Some(1.0), None)
            .unwrap_err()
            .to_string()
            .contains("diameter is required"));
        assert!(parse_envelope("rectangle", Some(1.0), None, None)
            .unwrap_err()
            .to_string()
            .contains("width and length are required"));
        assert_eq!(
            parse_envelope("hexagon", None, None, None).unwrap_err().to_string(),
            "Unknown shape: hexagon. Use 'rectangle' or 'circle'"
        );
    }

    #[test]
    fn rejects_non_positive_height() {
        assert!(EquipmentPlan::footprint("X", "other", &Envelope::Circle { diameter: 1.0 }, 0.0)
            .is_err());
    }
}

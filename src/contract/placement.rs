//! Placement conversion between the contract and FreeCAD.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::contract::model::Placement;
use crate::units::m_to_mm;

static INVALID_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("name pattern is valid"));

/// A placement in FreeCAD units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostPlacement {
    /// Equipment id, unchanged from the contract.
    pub id: String,
    /// FreeCAD object name the id maps to.
    pub name: String,
    /// Centre X in millimetres.
    pub x: f64,
    /// Centre Y in millimetres.
    pub y: f64,
    /// Rotation about Z in degrees.
    pub rotation_deg: f64,
}

/// Converts contract placements to millimetres.
#[must_use]
pub fn placements_to_host(placements: &[Placement]) -> Vec<HostPlacement> {
    placements
        .iter()
        .map(|p| HostPlacement {
            id: p.id.clone(),
            name: normalize_object_name(&p.id),
            x: m_to_mm(p.x),
            y: m_to_mm(p.y),
            rotation_deg: p.rotation_deg,
        })
        .collect()
}

/// Maps an equipment tag onto a name FreeCAD accepts unchanged.
///
/// FreeCAD object names allow ASCII letters, digits and underscores and may
/// not start with a digit. Names that already qualify pass through, so
/// objects named after their tag are found directly.
#[must_use]
pub fn normalize_object_name(id: &str) -> String {
    let replaced = INVALID_NAME_CHARS.replace_all(id, "_").into_owned();
    if replaced.is_empty() || replaced.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{replaced}")
    } else {
        replaced
    }
}

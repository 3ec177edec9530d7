//! Length unit conversion between the interchange format and FreeCAD.
//!
//! FreeCAD works in millimetres internally. The spatial contract and every
//! agent-facing tool parameter use metres. All conversions go through this
//! module so the factor lives in one place.

/// Millimetres per metre.
pub const MM_PER_M: f64 = 1000.0;

/// Converts metres to millimetres.
#[must_use]
pub fn m_to_mm(metres: f64) -> f64 {
    metres * MM_PER_M
}

/// Converts millimetres to metres.
#[must_use]
pub fn mm_to_m(millimetres: f64) -> f64 {
    millimetres / MM_PER_M
}

/// Converts an `[x, y]` point from metres to millimetres.
#[must_use]
pub fn point_m_to_mm(point: [f64; 2]) -> [f64; 2] {
    [m_to_mm(point[0]), m_to_mm(point[1])]
}

/// Converts an `[x, y]` point from millimetres to metres.
#[must_use]
pub fn point_mm_to_m(point: [f64; 2]) -> [f64; 2] {
    [mm_to_m(point[0]), mm_to_m(point[1])]
}

/// Rounds `value` to `places` decimal places.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metres_to_millimetres() {
        assert!((m_to_mm(1.5) - 1500.0).abs() < f64::EPSILON);
        assert!((mm_to_m(250.0) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn round_trip_preserves_value() {
        for value in [0.0, 0.001, 1.0, 12.345, 45.2, 78.1, -3.75, 1234.5678, 1e-6] {
            let back = mm_to_m(m_to_mm(value));
            assert!(
                (back - value).abs() <= value.abs() * 1e-12 + 1e-15,
                "{value} came back as {back}"
            );
        }
    }

    #[test]
    fn point_round_trip() {
        let p = [45.2, 78.1];
        let back = point_mm_to_m(point_m_to_mm(p));
        assert!((back[0] - p[0]).abs() < 1e-12);
        assert!((back[1] - p[1]).abs() < 1e-12);
    }

    #[test]
    fn rounding_to_three_places() {
        assert!((round_to(12.345_67, 3) - 12.346).abs() < 1e-12);
        assert!((round_to(-0.000_4, 3) - 0.0).abs() < 1e-12);
    }
}

//! JSON text identical to Python's `json.dumps(value, sort_keys=True)`.
//!
//! Python separates items with `", "` and keys with `": "`, escapes every
//! non-ASCII character, and prints floats with `repr`. Key order comes from
//! `serde_json::Value` maps, which are sorted.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use serde_json::Value;

struct PythonFormatter;

impl Formatter for PythonFormatter {
    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if c.is_ascii() {
                writer.write_all(c.encode_utf8(&mut [0; 4]).as_bytes())?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }

    fn write_f64<W: ?Sized + Write>(&mut self, writer: &mut W, value: f64) -> io::Result<()> {
        writer.write_all(python_float_repr(value).as_bytes())
    }
}

/// Python's `repr` of a finite float.
fn python_float_repr(value: f64) -> String {
    let scientific = format!("{value:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if (-4..16).contains(&exponent) {
        let plain = value.to_string();
        if plain.contains('.') {
            plain
        } else {
            format!("{plain}.0")
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    }
}

/// Serialises `value` the way Python's `json.dumps(value, sort_keys=True)` does.
///
/// # Errors
///
/// Returns an error if serialisation fails.
pub fn to_python_json(value: &Value) -> serde_json::Result<String> {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PythonFormatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn matches_python_layout() {
        let value = json!({
            "b": [1.0, "é", -0.0, 1e16, 0.1 + 0.2],
            "a": 1.5e-5,
            "c": {"z": 1, "y": "\n"}
        });
        assert_eq!(
            to_python_json(&value).unwrap(),
            r#"{"a": 1.5e-05, "b": [1.0, "\u00e9", -0.0, 1e+16, 0.30000000000000004], "c": {"y": "\n", "z": 1}}"#
        );
    }

    #[test]
    fn astral_characters_use_surrogate_pairs() {
        assert_eq!(to_python_json(&json!(["🦀"])).unwrap(), r#"["\ud83e\udd80"]"#);
    }

    #[test]
    fn float_repr() {
        assert_eq!(python_float_repr(3.0), "3.0");
        assert_eq!(python_float_repr(0.0001), "0.0001");
        assert_eq!(python_float_repr(0.00001), "1e-05");
        assert_eq!(python_float_repr(1e15), "1000000000000000.0");
        assert_eq!(python_float_repr(1.25e100), "1.25e+100");
    }
}

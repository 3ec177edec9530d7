//! Response filtering for reducing agent context consumption.
//!
//! Compact mode (the default) keeps only the fields an agent needs to decide
//! its next step. Full mode passes the host payload through untouched.
//!
//! Key names match the FreeCAD addon serializer output (PascalCase).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How much of a host payload to return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    /// Essential fields only.
    #[default]
    Compact,
    /// Every field the host returned.
    Full,
}

/// Object fields kept in compact mode.
pub const COMPACT_OBJECT_FIELDS: [&str; 5] = ["Name", "Label", "TypeId", "Placement", "Shape"];

/// Status fields always kept so callers can still tell success from failure.
pub const STATUS_FIELDS: [&str; 3] = ["success", "error", "message"];

/// Object fields kept per entry when listing a document in compact mode.
pub const COMPACT_LIST_FIELDS: [&str; 3] = ["Name", "Label", "TypeId"];

/// Contract keys dropped in compact mode.
pub const CONTRACT_VERBOSE_KEYS: [&str; 3] = ["metadata", "debug_info", "timing"];

/// Filters a single object's properties.
#[must_use]
pub fn filter_object_properties(obj: &Value, level: DetailLevel) -> Value {
    if level == DetailLevel::Full {
        return obj.clone();
    }

    let Some(map) = obj.as_object() else {
        return obj.clone();
    };

    let kept: Map<String, Value> = COMPACT_OBJECT_FIELDS
        .iter()
        .chain(STATUS_FIELDS.iter())
        .filter_map(|key| map.get(*key).map(|v| ((*key).to_string(), v.clone())))
        .collect();

    Value::Object(kept)
}

/// Filters a list of objects.
///
/// In compact mode every entry carries exactly `Name`, `Label` and `TypeId`;
/// missing ones become `null`.
#[must_use]
pub fn filter_objects_list(objects: &[Value], level: DetailLevel) -> Vec<Value> {
    if level == DetailLevel::Full {
        return objects.to_vec();
    }

    objects
        .iter()
        .map(|obj| {
            let entry: Map<String, Value> = COMPACT_LIST_FIELDS
                .iter()
                .map(|key| {
                    let value = obj.get(*key).cloned().unwrap_or(Value::Null);
                    ((*key).to_string(), value)
                })
                .collect();
            Value::Object(entry)
        })
        .collect()
}

/// Filters a contract document.
///
/// Contract data is kept whole because downstream solvers need it; only
/// metadata and debug keys are dropped in compact mode.
#[must_use]
pub fn filter_contract_response(response: &Value, level: DetailLevel) -> Value {
    if level == DetailLevel::Full {
        return response.clone();
    }

    let Some(map) = response.as_object() else {
        return response.clone();
    };

    let kept: Map<String, Value> = map
        .iter()
        .filter(|(key, _)| !CONTRACT_VERBOSE_KEYS.contains(&key.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Value::Object(kept)
}

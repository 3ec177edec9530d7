//! Spatial contract interchange.
//!
//! The spatial contract is the JSON document exchanged with layout solvers:
//! site boundary, equipment envelopes and solved placements, all in metres.
//! FreeCAD stays the authoritative model; the contract is a projection of it
//! and placements flow back through [`placement::placements_to_host`].
//!
//! - [`model`]: the contract document itself
//! - [`canonical`]: the JSON form the equipment hash is taken over
//! - [`sitefit`]: solver output accepted on import
//! - [`extract`]: FreeCAD geometry to contract
//! - [`envelope`]: contract envelopes to FreeCAD solids
//! - [`placement`]: placements to FreeCAD units and names

pub mod canonical;
pub mod envelope;
pub mod extract;
pub mod model;
pub mod placement;
pub mod sitefit;

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ToolError, ToolResult};

pub use model::{Clearances, Contract, Envelope, Equipment, Placement, PlacementSet};

/// Writes `value` as pretty-printed JSON, creating parent directories.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Returns an error if serialisation or any filesystem step fails.
pub async fn write_pretty<T: Serialize>(path: &Path, value: &T) -> ToolResult<u64> {
    let text = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ToolError::io(parent, e))?;
    }
    tokio::fs::write(path, text.as_bytes())
        .await
        .map_err(|e| ToolError::io(path, e))?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "Wrote JSON file");
    Ok(text.len() as u64)
}

/// Reads and parses a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse as `T`.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> ToolResult<T> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ToolError::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

//! freecad-mcp: MCP server that lets AI agents drive FreeCAD.
//!
//! The agent speaks MCP over stdio; this crate turns tool calls into XML-RPC
//! calls against the FreeCAD addon's listener, or into small Python programs
//! run through it. On top of plain document editing it carries the
//! process-engineering workflow:
//!
//! - **Spatial contract**: export the site and equipment as a metre-based
//!   JSON document, re-import solved placements
//! - **Site-fit**: import solver output, build one document per layout
//!   option, finalise the chosen one
//! - **TechDraw**: plan sheets with title blocks, labels and PDF/DXF/SVG export
//! - **CSA**: control-system architecture diagrams through the CSA workbench
//!
//! # Modules
//!
//! - [`config`]: configuration loading and validation
//! - [`error`]: error types
//! - [`mcp`]: MCP protocol and server lifecycle
//! - [`rpc`]: XML-RPC client and the typed FreeCAD facade
//! - [`script`]: Python programs run inside FreeCAD
//! - [`tools`]: the agent-facing tool registry
//! - [`contract`]: spatial contract model and conversions
//! - [`techdraw`]: drawing page geometry
//! - [`filters`]: compact/full response filtering
//! - [`platform`]: WSL host detection and path translation
//! - [`units`]: metre/millimetre conversion

pub mod config;
pub mod contract;
pub mod error;
pub mod filters;
pub mod mcp;
pub mod platform;
pub mod rpc;
pub mod script;
pub mod techdraw;
pub mod tools;
pub mod units;

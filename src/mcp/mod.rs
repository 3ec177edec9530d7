//! Model Context Protocol server over stdio.
//!
//! ```text
//! stdin ──▶ StdioTransport ──▶ McpServer (lifecycle) ──▶ Toolbox ──▶ FreeCAD
//! stdout ◀────────┘                  │
//!                                    └──▶ prompts
//! ```
//!
//! Protocol revision 2024-11-05.

pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::McpServer;
pub use transport::StdioTransport;

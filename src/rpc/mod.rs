//! Client side of the FreeCAD addon's XML-RPC listener.
//!
//! # Architecture
//!
//! ```text
//! FreeCad (typed methods) ──▶ RpcCaller (trait) ──▶ XmlRpcClient ──HTTP POST /RPC2──▶ addon
//!                                     ▲
//!                                     └── test doubles
//! ```
//!
//! [`Connector`] owns the lazily created connection and verifies it with a
//! ping before handing it out.

pub mod client;
pub mod codec;
pub mod error;
pub mod freecad;

pub use client::{Endpoint, RpcCaller, XmlRpcClient, DEFAULT_PORT};
pub use error::{RpcError, RpcResult};
pub use freecad::{Connector, FreeCad, HostReply};

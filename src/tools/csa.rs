//! Control system architecture tools.
//!
//! Each tool forwards one action to the CSA workbench addon running inside
//! FreeCAD. The addon owns the diagram model; these handlers only validate
//! arguments, translate paths and format the addon's replies.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ToolResult;
use crate::mcp::server::{ToolCallResult, ToolDefinition};
use crate::platform::wsl_to_windows_path;
use crate::rpc::FreeCad;
use crate::script;
use crate::tools::{tool, with_screenshot, Toolbox};

/// Declares a closed set of names accepted by the addon.
macro_rules! names {
    ($(#[$meta:meta])* $name:ident default $default:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every accepted name, in schema order.
            pub const ALL: &'static [&'static str] = &[$($text),+];

            /// The name the addon expects.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

names! {
    /// Placement algorithm for controllers and devices.
    LayoutAlgorithm default NetworkxSpring {
        NetworkxSpring => "networkx_spring",
        NetworkxHierarchical => "networkx_hierarchical",
        ElkHierarchical => "elk_hierarchical",
        SimpleGrid => "simple_grid",
    }
}

names! {
    /// Topology serialisation format.
    TopologyFormat default Yaml {
        Yaml => "yaml",
        Json => "json",
    }
}

names! {
    /// Kind of controller.
    ControllerType default Plc {
        Plc => "PLC",
        Dcs => "DCS",
        Pac => "PAC",
        SafetyPlc => "Safety_PLC",
        SoftPlc => "Soft_PLC",
        EdgeController => "Edge_Controller",
        MotionController => "Motion_Controller",
        RedundantPlc => "Redundant_PLC",
    }
}

names! {
    /// Kind of field or network device.
    DeviceType default RemoteIo {
        RemoteIo => "RemoteIO",
        Hmi => "HMI",
        Scada => "SCADA",
        Historian => "Historian",
        OpcUaServer => "OPC_UA_Server",
        Gateway => "Gateway",
        Vfd => "VFD",
        SoftStarter => "Soft_Starter",
        Mcc => "MCC",
        IndustrialPc => "Industrial_PC",
        Switch => "Switch",
        Router => "Router",
        Firewall => "Firewall",
        WirelessAp => "Wireless_AP",
        JunctionBox => "Junction_Box",
        MarshallingCabinet => "Marshalling_Cabinet",
    }
}

names! {
    /// Network protocol of a link.
    Protocol default EthernetIp {
        EthernetIp => "Ethernet_IP",
        Profinet => "Profinet",
        ModbusTcp => "Modbus_TCP",
        ModbusRtu => "Modbus_RTU",
        Profibus => "Profibus",
        DeviceNet => "DeviceNet",
        ControlNet => "ControlNet",
        Hart => "HART",
        FoundationFieldbus => "Foundation_Fieldbus",
        OpcUa => "OPC_UA",
        Mqtt => "MQTT",
        Bacnet => "BACnet",
    }
}

fn default_sheet_title() -> String {
    "Control System Architecture".to_string()
}

fn default_sheet_number() -> String {
    "CSA-001".to_string()
}

fn default_sheet_template() -> String {
    "A1_Landscape_CSA".to_string()
}

fn default_revision() -> String {
    "A".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ImportTopologyArgs {
    doc_name: String,
    topology_yaml: String,
    #[serde(default)]
    layout_algorithm: LayoutAlgorithm,
    #[serde(default)]
    include_screenshot: bool,
}

#[derive(Debug, Deserialize)]
pub struct ExportTopologyArgs {
    doc_name: String,
    #[serde(default)]
    format: TopologyFormat,
    #[serde(default)]
    output_path: Option<String>,
    #[serde(default)]
    include_screenshot: bool,
}

#[derive(Debug, Deserialize)]
pub struct ControllerArgs {
    doc_name: String,
    controller_id: String,
    #[serde(default)]
    controller_type: ControllerType,
    #[serde(default)]
    zone: String,
    #[serde(default)]
    equipment_tags: Vec<String>,
    #[serde(default)]
    manufacturer: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    ip_address: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    include_screenshot: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeviceArgs {
    doc_name: String,
    device_id: String,
    #[serde(default)]
    device_type: DeviceType,
    #[serde(default)]
    parent_controller: String,
    #[serde(default)]
    zone: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    ip_address: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    include_screenshot: bool,
}

#[derive(Debug, Deserialize)]
pub struct LinkArgs {
    doc_name: String,
    source: String,
    target: String,
    #[serde(default)]
    protocol: Protocol,
    #[serde(default)]
    network: String,
    #[serde(default)]
    cable_type: String,
    #[serde(default)]
    source_port: String,
    #[serde(default)]
    target_port: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    include_screenshot: bool,
}

#[derive(Debug, Deserialize)]
pub struct LayoutArgs {
    doc_name: String,
    #[serde(default)]
    algorithm: LayoutAlgorithm,
    #[serde(default)]
    include_screenshot: bool,
}

#[derive(Debug, Deserialize)]
pub struct SheetArgs {
    doc_name: String,
    #[serde(default = "default_sheet_title")]
    title: String,
    #[serde(default = "default_sheet_number")]
    sheet_number: String,
    #[serde(default = "default_sheet_template")]
    template: String,
    #[serde(default = "default_revision")]
    revision: String,
    #[serde(default)]
    export_pdf_path: Option<String>,
    #[serde(default)]
    include_screenshot: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ImportReply {
    #[serde(default)]
    project_name: Option<String>,
    #[serde(default)]
    controller_count: Option<u64>,
    #[serde(default)]
    device_count: Option<u64>,
    #[serde(default)]
    link_count: Option<u64>,
}

impl ImportReply {
    fn summary(&self, doc_name: &str) -> String {
        let mut text = format!("CSA topology imported successfully to '{doc_name}'");
        if let Some(project) = &self.project_name {
            text.push_str(&format!("\nProject: {project}"));
        }
        let counts = [
            ("Controllers", self.controller_count),
            ("Devices", self.device_count),
            ("Links", self.link_count),
        ];
        for (what, count) in counts {
            if let Some(count) = count {
                text.push_str(&format!("\n{what}: {count}"));
            }
        }
        text
    }
}

#[derive(Debug, Default, Deserialize)]
struct ExportReply {
    #[serde(default)]
    exported: bool,
    #[serde(default)]
    output_path: Option<String>,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct LayoutReply {
    #[serde(default)]
    node_count: Option<u64>,
    #[serde(default)]
    edge_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetReply {
    #[serde(default)]
    page_name: Option<String>,
    #[serde(default)]
    sheet_number: Option<String>,
    #[serde(default)]
    pdf_exported: bool,
    #[serde(default)]
    pdf_path: Option<String>,
}

impl SheetReply {
    fn summary(&self, title: &str) -> String {
        let mut text = format!("TechDraw sheet '{title}' created successfully");
        if let Some(page) = self.page_name.as_deref().filter(|p| !p.is_empty()) {
            text.push_str(&format!("\nPage: {page}"));
        }
        if let Some(number) = self.sheet_number.as_deref().filter(|n| !n.is_empty()) {
            text.push_str(&format!("\nSheet number: {number}"));
        }
        if let (true, Some(path)) = (self.pdf_exported, &self.pdf_path) {
            text.push_str(&format!("\nPDF exported to: {path}"));
        }
        text
    }
}

/// Adds the action name to a payload.
fn action_payload(action: &str, mut payload: Value) -> Value {
    if let Value::Object(map) = &mut payload {
        map.insert("action".to_string(), json!(action));
    }
    payload
}

/// Host-side form of an optional output path; the addon treats "" as unset.
async fn host_path(path: Option<&str>) -> String {
    match path.filter(|p| !p.is_empty()) {
        Some(path) => wsl_to_windows_path(path, true).await,
        None => String::new(),
    }
}

impl Toolbox {
    /// Runs one addon action and decodes its reply.
    async fn csa_action<T: DeserializeOwned>(
        &mut self,
        action: &str,
        payload: Value,
    ) -> ToolResult<(FreeCad, T)> {
        let freecad = self.freecad().await?;
        tracing::debug!(action, "Running CSA action");
        let reply = script::run(&freecad, &script::csa_action(action_payload(action, payload)))
            .await?;
        Ok((freecad, reply))
    }

    pub(super) async fn import_csa_topology(
        &mut self,
        args: ImportTopologyArgs,
    ) -> ToolResult<ToolCallResult> {
        let (freecad, reply): (_, ImportReply) = self
            .csa_action(
                "import_topology",
                json!({
                    "doc_name": args.doc_name,
                    "topology_yaml": args.topology_yaml,
                    "layout_algorithm": args.layout_algorithm,
                }),
            )
            .await?;
        Ok(self
            .respond(&freecad, reply.summary(&args.doc_name), args.include_screenshot)
            .await)
    }

    pub(super) async fn export_csa_topology(
        &mut self,
        args: ExportTopologyArgs,
    ) -> ToolResult<ToolCallResult> {
        let output_path = host_path(args.output_path.as_deref()).await;
        let (freecad, reply): (_, ExportReply) = self
            .csa_action(
                "export_topology",
                json!({
                    "doc_name": args.doc_name,
                    "format": args.format,
                    "output_path": output_path,
                }),
            )
            .await?;
        let text = if reply.exported {
            let path = reply
                .output_path
                .or(args.output_path)
                .unwrap_or_default();
            format!("CSA topology exported to: {path}")
        } else {
            reply.content
        };
        Ok(self.respond(&freecad, text, args.include_screenshot).await)
    }

    pub(super) async fn add_csa_controller(
        &mut self,
        args: ControllerArgs,
    ) -> ToolResult<ToolCallResult> {
        let (freecad, _): (_, Value) = self
            .csa_action(
                "add_controller",
                json!({
                    "doc_name": args.doc_name,
                    "controller_id": args.controller_id,
                    "controller_type": args.controller_type,
                    "zone": args.zone,
                    "equipment_tags": args.equipment_tags,
                    "manufacturer": args.manufacturer,
                    "model": args.model,
                    "ip_address": args.ip_address,
                    "description": args.description,
                }),
            )
            .await?;
        let text = format!(
            "Controller '{}' ({}) added successfully",
            args.controller_id, args.controller_type
        );
        Ok(self.respond(&freecad, text, args.include_screenshot).await)
    }

    pub(super) async fn add_csa_device(&mut self, args: DeviceArgs) -> ToolResult<ToolCallResult> {
        let (freecad, _): (_, Value) = self
            .csa_action(
                "add_device",
                json!({
                    "doc_name": args.doc_name,
                    "device_id": args.device_id,
                    "device_type": args.device_type,
                    "parent_controller": args.parent_controller,
                    "zone": args.zone,
                    "model": args.model,
                    "ip_address": args.ip_address,
                    "description": args.description,
                }),
            )
            .await?;
        let text = format!(
            "Device '{}' ({}) added successfully",
            args.device_id, args.device_type
        );
        Ok(self.respond(&freecad, text, args.include_screenshot).await)
    }

    pub(super) async fn add_csa_link(&mut self, args: LinkArgs) -> ToolResult<ToolCallResult> {
        let (freecad, _): (_, Value) = self
            .csa_action(
                "add_link",
                json!({
                    "doc_name": args.doc_name,
                    "source": args.source,
                    "target": args.target,
                    "protocol": args.protocol,
                    "network": args.network,
                    "cable_type": args.cable_type,
                    "source_port": args.source_port,
                    "target_port": args.target_port,
                    "description": args.description,
                }),
            )
            .await?;
        let text = format!(
            "Link '{}' -> '{}' ({}) added successfully",
            args.source, args.target, args.protocol
        );
        Ok(self.respond(&freecad, text, args.include_screenshot).await)
    }

    pub(super) async fn run_csa_layout(&mut self, args: LayoutArgs) -> ToolResult<ToolCallResult> {
        let (freecad, reply): (_, LayoutReply) = self
            .csa_action(
                "run_layout",
                json!({"doc_name": args.doc_name, "algorithm": args.algorithm}),
            )
            .await?;
        let mut text = format!("Layout completed using '{}'", args.algorithm);
        if let Some(nodes) = reply.node_count {
            text.push_str(&format!("\nNodes positioned: {nodes}"));
        }
        if let Some(edges) = reply.edge_count {
            text.push_str(&format!("\nEdges routed: {edges}"));
        }
        Ok(self.respond(&freecad, text, args.include_screenshot).await)
    }

    pub(super) async fn create_csa_techdraw_sheet(
        &mut self,
        args: SheetArgs,
    ) -> ToolResult<ToolCallResult> {
        let pdf_path = host_path(args.export_pdf_path.as_deref()).await;
        let (freecad, reply): (_, SheetReply) = self
            .csa_action(
                "create_techdraw_sheet",
                json!({
                    "doc_name": args.doc_name,
                    "title": args.title,
                    "sheet_number": args.sheet_number,
                    "template": args.template,
                    "revision": args.revision,
                    "export_pdf_path": pdf_path,
                }),
            )
            .await?;
        Ok(self
            .respond(&freecad, reply.summary(&args.title), args.include_screenshot)
            .await)
    }
}

#[allow(clippy::too_many_lines)]
pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        tool(
            "import_csa_topology",
            "Import a control system architecture topology from YAML (metadata, zones, \
             controllers, devices, links) and lay it out. Needs the CSAWorkbench addon.",
            with_screenshot(json!({
                "doc_name": {"type": "string", "description": "FreeCAD document (created if missing)"},
                "topology_yaml": {"type": "string", "description": "Topology as YAML"},
                "layout_algorithm": {
                    "type": "string",
                    "enum": LayoutAlgorithm::ALL,
                    "description": "Layout algorithm (default: networkx_spring; elk_hierarchical needs Node.js)"
                }
            })),
            &["doc_name", "topology_yaml"],
        ),
        tool(
            "export_csa_topology",
            "Export the CSA diagram of a document as YAML or JSON, to a file or inline.",
            with_screenshot(json!({
                "doc_name": {"type": "string", "description": "FreeCAD document"},
                "format": {"type": "string", "enum": TopologyFormat::ALL, "description": "Output format (default: yaml)"},
                "output_path": {"type": "string", "description": "Optional: file to write; content is returned when omitted"}
            })),
            &["doc_name"],
        ),
        tool(
            "add_csa_controller",
            "Add a controller (PLC, DCS, PAC...) to the CSA diagram, optionally linked to \
             the equipment tags it controls.",
            with_screenshot(json!({
                "doc_name": {"type": "string", "description": "FreeCAD document"},
                "controller_id": {"type": "string", "description": "Controller id, e.g. PLC-101"},
                "controller_type": {"type": "string", "enum": ControllerType::ALL, "description": "Controller type (default: PLC)"},
                "zone": {"type": "string", "description": "Network zone id, e.g. level_1"},
                "equipment_tags": {"type": "array", "items": {"type": "string"}, "description": "Equipment tags this controller manages"},
                "manufacturer": {"type": "string", "description": "Manufacturer"},
                "model": {"type": "string", "description": "Model number"},
                "ip_address": {"type": "string", "description": "IP address"},
                "description": {"type": "string", "description": "Description"}
            })),
            &["doc_name", "controller_id"],
        ),
        tool(
            "add_csa_device",
            "Add a device (remote I/O, HMI, SCADA, network gear...) to the CSA diagram.",
            with_screenshot(json!({
                "doc_name": {"type": "string", "description": "FreeCAD document"},
                "device_id": {"type": "string", "description": "Device id, e.g. RIO-101"},
                "device_type": {"type": "string", "enum": DeviceType::ALL, "description": "Device type (default: RemoteIO)"},
                "parent_controller": {"type": "string", "description": "Id of the parent controller"},
                "zone": {"type": "string", "description": "Network zone id"},
                "model": {"type": "string", "description": "Model number"},
                "ip_address": {"type": "string", "description": "IP address"},
                "description": {"type": "string", "description": "Description"}
            })),
            &["doc_name", "device_id"],
        ),
        tool(
            "add_csa_link",
            "Add a network link between two CSA components.",
            with_screenshot(json!({
                "doc_name": {"type": "string", "description": "FreeCAD document"},
                "source": {"type": "string", "description": "Source controller or device id"},
                "target": {"type": "string", "description": "Target controller or device id"},
                "protocol": {"type": "string", "enum": Protocol::ALL, "description": "Protocol (default: Ethernet_IP)"},
                "network": {"type": "string", "description": "Network id"},
                "cable_type": {"type": "string", "description": "Cable specification, e.g. Cat6 STP"},
                "source_port": {"type": "string", "description": "Port on the source"},
                "target_port": {"type": "string", "description": "Port on the target"},
                "description": {"type": "string", "description": "Description"}
            })),
            &["doc_name", "source", "target"],
        ),
        tool(
            "run_csa_layout",
            "Re-run the layout of a CSA diagram. Hierarchical layouts follow Purdue levels.",
            with_screenshot(json!({
                "doc_name": {"type": "string", "description": "FreeCAD document"},
                "algorithm": {"type": "string", "enum": LayoutAlgorithm::ALL, "description": "Layout algorithm (default: networkx_spring)"}
            })),
            &["doc_name"],
        ),
        tool(
            "create_csa_techdraw_sheet",
            "Create a TechDraw sheet of the CSA diagram with title block, optionally exported \
             to PDF.",
            with_screenshot(json!({
                "doc_name": {"type": "string", "description": "FreeCAD document"},
                "title": {"type": "string", "description": "Sheet title (default: Control System Architecture)"},
                "sheet_number": {"type": "string", "description": "Sheet number (default: CSA-001)"},
                "template": {"type": "string", "description": "Template name (default: A1_Landscape_CSA)"},
                "revision": {"type": "string", "description": "Revision (default: A)"},
                "export_pdf_path": {"type": "string", "description": "Optional: PDF output path"}
            })),
            &["doc_name"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_serde() {
        let t: ControllerType = serde_json::from_value(json!("Safety_PLC")).unwrap();
        assert_eq!(t, ControllerType::SafetyPlc);
        assert_eq!(json!(DeviceType::OpcUaServer), json!("OPC_UA_Server"));
        assert_eq!(Protocol::Bacnet.to_string(), "BACnet");
        assert!(serde_json::from_value::<Protocol>(json!("Token_Ring")).is_err());
    }

    #[test]
    fn schema_lists_match_variants() {
        assert_eq!(ControllerType::ALL.len(), 8);
        assert_eq!(DeviceType::ALL.len(), 16);
        assert_eq!(Protocol::ALL.len(), 12);
        assert_eq!(LayoutAlgorithm::ALL[0], LayoutAlgorithm::default().as_str());
    }

    #[test]
    fn payload_carries_action() {
        let payload = action_payload("run_layout", json!({"doc_name": "CSA"}));
        assert_eq!(payload["action"], "run_layout");
        assert_eq!(payload["doc_name"], "CSA");
    }

    #[test]
    fn import_summary_includes_reported_counts() {
        let reply: ImportReply = serde_json::from_value(json!({
            "success": true,
            "project_name": "WWTP Control System",
            "controller_count": 2,
            "link_count": 5
        }))
        .unwrap();
        assert_eq!(
            reply.summary("WWTP_CSA"),
            "CSA topology imported successfully to 'WWTP_CSA'\n\
             Project: WWTP Control System\nControllers: 2\nLinks: 5"
        );
    }

    #[test]
    fn sheet_summary_mentions_pdf_only_when_exported() {
        let reply = SheetReply {
            page_name: Some("CSA_Page".to_string()),
            sheet_number: Some("CSA-101".to_string()),
            pdf_exported: false,
            pdf_path: Some("C:/out/csa.pdf".to_string()),
        };
        let text = reply.summary("Control System Architecture");
        assert!(text.contains("Page: CSA_Page\nSheet number: CSA-101"));
        assert!(!text.contains("PDF"));
    }

    #[test]
    fn controller_defaults() {
        let args: ControllerArgs =
            serde_json::from_value(json!({"doc_name": "CSA", "controller_id": "PLC-101"})).unwrap();
        assert_eq!(args.controller_type, ControllerType::Plc);
        assert!(args.equipment_tags.is_empty());
        assert!(!args.include_screenshot);
    }
}

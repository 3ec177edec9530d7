//! End-to-end MCP sessions against a mock FreeCAD.

mod common;

use serde_json::{json, Value};

use common::{first_text, toolbox, MockFreeCad};
use freecad_mcp::mcp::protocol::ErrorCode;
use freecad_mcp::mcp::server::{McpServer, ServerState};

async fn send(server: &mut McpServer, message: Value) -> Value {
    match server.process_line(&message.to_string()).await {
        Some(Ok(response)) => serde_json::to_value(response).unwrap(),
        Some(Err(error)) => serde_json::to_value(error).unwrap(),
        None => Value::Null,
    }
}

async fn running_server(mock: &std::sync::Arc<MockFreeCad>) -> McpServer {
    let mut server = McpServer::new(toolbox(mock, false));
    let init = send(
        &mut server,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0.0"}
            }
        }),
    )
    .await;
    assert_eq!(init["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(init["result"]["serverInfo"]["name"], "freecad-mcp");
    assert!(init["result"]["capabilities"]["prompts"].is_object());

    let ack = send(
        &mut server,
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
    )
    .await;
    assert!(ack.is_null());
    assert_eq!(server.state(), ServerState::Running);
    server
}

#[tokio::test]
async fn full_session_creates_a_document() {
    let mock = MockFreeCad::new(|method, params| match method {
        "create_document" => Ok(json!({
            "success": true,
            "document_name": params[0],
        })),
        other => panic!("unexpected call {other}"),
    });
    let mut server = running_server(&mock).await;

    let reply = send(
        &mut server,
        json!({
            "jsonrpc": "2.0",
            "id": "call-1",
            "method": "tools/call",
            "params": {"name": "create_document", "arguments": {"name": "Plant"}}
        }),
    )
    .await;

    assert_eq!(reply["id"], "call-1");
    assert!(reply["result"].get("isError").is_none());
    assert_eq!(
        first_text(&reply["result"]),
        "Document 'Plant' created successfully"
    );
    assert_eq!(mock.methods(), vec!["create_document"]);
}

#[tokio::test]
async fn tools_list_names_every_workflow() {
    let mock = MockFreeCad::new(|_, _| Ok(Value::Null));
    let mut server = running_server(&mock).await;

    let reply = send(
        &mut server,
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
    )
    .await;
    let names: Vec<&str> = reply["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();

    for expected in [
        "create_document",
        "get_parts_list",
        "export_contract_json",
        "finalize_selected_layout",
        "export_techdraw_page",
        "create_csa_techdraw_sheet",
    ] {
        assert!(names.contains(&expected), "missing {expected}");
    }
    assert!(mock.methods().is_empty());
}

#[tokio::test]
async fn prompts_are_listed_and_rendered() {
    let mock = MockFreeCad::new(|_, _| Ok(Value::Null));
    let mut server = running_server(&mock).await;

    let listed = send(
        &mut server,
        json!({"jsonrpc": "2.0", "id": 3, "method": "prompts/list"}),
    )
    .await;
    assert_eq!(
        listed["result"]["prompts"][0]["name"],
        "asset_creation_strategy"
    );

    let rendered = send(
        &mut server,
        json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "prompts/get",
            "params": {"name": "asset_creation_strategy"}
        }),
    )
    .await;
    let text = rendered["result"]["messages"][0]["content"]["text"]
        .as_str()
        .unwrap();
    assert!(text.contains("insert_part_from_library()"));
}

#[tokio::test]
async fn host_faults_become_tool_errors_not_protocol_errors() {
    let mock = MockFreeCad::new(|_, _| Err(common::fault("Document 'Nope' not found")));
    let mut server = running_server(&mock).await;

    let reply = send(
        &mut server,
        json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": {"name": "get_objects", "arguments": {"doc_name": "Nope"}}
        }),
    )
    .await;

    assert!(reply.get("error").is_none());
    assert_eq!(reply["result"]["isError"], true);
    let text = first_text(&reply["result"]);
    assert!(text.starts_with("Failed to get objects:"), "{text}");
    assert!(text.contains("Document 'Nope' not found"));
}

#[tokio::test]
async fn protocol_errors_keep_their_codes() {
    let mock = MockFreeCad::new(|_, _| Ok(Value::Null));
    let mut server = McpServer::new(toolbox(&mock, false));

    let early = send(
        &mut server,
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"name": "get_parts_list"}}),
    )
    .await;
    assert_eq!(early["error"]["code"], ErrorCode::InvalidRequest.code());

    let Some(Err(parse)) = server.process_line("{not json").await else {
        panic!("expected a parse error");
    };
    assert_eq!(parse.error.code, ErrorCode::ParseError.code());

    let ping = send(&mut server, json!({"jsonrpc": "2.0", "id": 9, "method": "ping"})).await;
    assert_eq!(ping["result"], json!({}));

    let mut server = running_server(&mock).await;
    let missing = send(
        &mut server,
        json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call"}),
    )
    .await;
    assert_eq!(missing["error"]["code"], ErrorCode::InvalidParams.code());
    assert!(mock.methods().is_empty());
}

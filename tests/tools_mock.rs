//! Tool handlers against a scripted FreeCAD.

mod common;

use serde_json::{json, Value};

use common::{first_text, script_output, script_payload, toolbox, MockFreeCad, TINY_PNG};

fn screenshot_host(method: &str, params: &[Value]) -> freecad_mcp::rpc::RpcResult<Value> {
    match method {
        "create_object" => Ok(json!({"success": true, "object_name": "Tank"})),
        "execute_code" => {
            let code = params[0].as_str().unwrap_or_default();
            assert!(code.contains("UNSUPPORTED_VIEWS"), "unexpected script");
            Ok(script_output(&json!({"supported": true, "view_type": "View3DInventor"})))
        }
        "get_active_screenshot" => Ok(json!(TINY_PNG)),
        other => panic!("unexpected call {other}"),
    }
}

#[tokio::test]
async fn screenshot_is_attached_when_requested() {
    let mock = MockFreeCad::new(screenshot_host);
    let mut tools = toolbox(&mock, false);

    let result = tools
        .call(
            "create_object",
            json!({
                "doc_name": "Plant",
                "obj_type": "Part::Cylinder",
                "obj_name": "Tank",
                "obj_properties": {"Radius": 2000, "Height": 6000},
                "include_screenshot": true
            }),
        )
        .await;
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(first_text(&value), "Object 'Tank' created successfully");
    assert_eq!(value["content"][1]["type"], "image");
    assert_eq!(value["content"][1]["mimeType"], "image/png");
    assert_eq!(
        mock.params_of("get_active_screenshot").unwrap(),
        vec![json!("Isometric")]
    );
}

#[tokio::test]
async fn text_only_mode_never_asks_for_screenshots() {
    let mock = MockFreeCad::new(screenshot_host);
    let mut tools = toolbox(&mock, true);

    let result = tools
        .call(
            "create_object",
            json!({
                "doc_name": "Plant",
                "obj_type": "Part::Box",
                "obj_name": "Tank",
                "include_screenshot": true
            }),
        )
        .await;

    assert_eq!(result.content.len(), 1);
    assert_eq!(mock.methods(), vec!["create_object"]);
}

#[tokio::test]
async fn compact_listing_keeps_identity_fields() {
    let mock = MockFreeCad::new(|method, _| match method {
        "get_objects" => Ok(json!([{
            "Name": "TK_101",
            "Label": "TK-101",
            "TypeId": "Part::Cylinder",
            "Placement": {"Base": {"x": 0, "y": 0, "z": 0}},
            "Radius": 1500.0
        }])),
        other => panic!("unexpected call {other}"),
    });
    let mut tools = toolbox(&mock, false);

    let compact = tools.call("get_objects", json!({"doc_name": "Plant"})).await;
    let listed: Value = serde_json::from_str(first_text(&serde_json::to_value(&compact).unwrap())).unwrap();
    assert_eq!(
        listed,
        json!([{"Name": "TK_101", "Label": "TK-101", "TypeId": "Part::Cylinder"}])
    );

    let full = tools
        .call("get_objects", json!({"doc_name": "Plant", "detail_level": "full"}))
        .await;
    let listed: Value = serde_json::from_str(first_text(&serde_json::to_value(&full).unwrap())).unwrap();
    assert_eq!(listed[0]["Radius"], 1500.0);
}

#[tokio::test]
async fn host_reported_failure_names_the_operation() {
    let mock = MockFreeCad::new(|method, _| match method {
        "execute_code" => Ok(json!({"success": false, "error": "NameError: name 'x' is not defined"})),
        other => panic!("unexpected call {other}"),
    });
    let mut tools = toolbox(&mock, false);

    let result = tools.call("execute_code", json!({"code": "print(x)"})).await;

    assert!(result.is_error);
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(
        first_text(&value),
        "Failed to execute code: NameError: name 'x' is not defined"
    );
}

#[tokio::test]
async fn invalid_arguments_fail_before_contacting_the_host() {
    let mock = MockFreeCad::new(|method, _| panic!("unexpected call {method}"));
    let mut tools = toolbox(&mock, false);

    let missing = tools.call("create_document", json!({})).await;
    assert!(missing.is_error);

    let boundary = tools
        .call(
            "create_site_boundary",
            json!({"doc_name": "Plant", "boundary_points": [[0, 0], [10, 0]]}),
        )
        .await;
    let text = first_text(&serde_json::to_value(&boundary).unwrap()).to_string();
    assert!(text.starts_with("Failed to create site boundary:"), "{text}");
    assert!(text.contains("at least 3 points"));

    let unknown = tools.call("render_footprint", json!({})).await;
    assert_eq!(
        first_text(&serde_json::to_value(&unknown).unwrap()),
        "Unknown tool: render_footprint"
    );
    assert!(mock.methods().is_empty());
}

#[tokio::test]
async fn site_boundary_is_sent_in_millimetres() {
    let mock = MockFreeCad::new(|method, _| match method {
        "execute_code" => Ok(script_output(&json!({"name": "Wire", "label": "SiteBoundary", "points": 4}))),
        other => panic!("unexpected call {other}"),
    });
    let mut tools = toolbox(&mock, false);

    let result = tools
        .call(
            "create_site_boundary",
            json!({
                "doc_name": "Plant",
                "boundary_points": [[0, 0], [120.5, 0], [120.5, 80], [0, 80]]
            }),
        )
        .await;

    assert!(!result.is_error, "{result:?}");
    let text = first_text(&serde_json::to_value(&result).unwrap()).to_string();
    assert!(text.contains("Name: Wire\n  Label: SiteBoundary"), "{text}");

    let payload = &mock.script_payloads()[0];
    assert_eq!(payload["label"], "SiteBoundary");
    assert_eq!(payload["points"][1], json!([120_500.0, 0.0]));
    assert_eq!(payload["closed"], true);
}

#[tokio::test]
async fn missing_csa_addon_is_reported() {
    let mock = MockFreeCad::new(|method, params| match method {
        "execute_code" => {
            let payload = script_payload(params[0].as_str().unwrap_or_default()).unwrap();
            assert_eq!(payload["action"], "add_controller");
            assert_eq!(payload["controller_type"], "Safety_PLC");
            Ok(script_output(&json!({
                "success": false,
                "error": "CSAWorkbench addon not installed"
            })))
        }
        other => panic!("unexpected call {other}"),
    });
    let mut tools = toolbox(&mock, false);

    let result = tools
        .call(
            "add_csa_controller",
            json!({
                "doc_name": "CSA",
                "controller_id": "PLC-01",
                "controller_type": "Safety_PLC"
            }),
        )
        .await;

    assert!(result.is_error);
    assert_eq!(
        first_text(&serde_json::to_value(&result).unwrap()),
        "Failed to add controller: CSAWorkbench addon not installed"
    );
}

#[tokio::test]
async fn unknown_csa_controller_type_is_rejected() {
    let mock = MockFreeCad::new(|method, _| panic!("unexpected call {method}"));
    let mut tools = toolbox(&mock, false);

    let result = tools
        .call(
            "add_csa_controller",
            json!({"doc_name": "CSA", "controller_id": "X", "controller_type": "Abacus"}),
        )
        .await;

    assert!(result.is_error);
    assert!(mock.methods().is_empty());
}

#[tokio::test]
async fn templates_are_listed_without_a_host() {
    let mock = MockFreeCad::new(|method, _| panic!("unexpected call {method}"));
    let mut tools = toolbox(&mock, false);

    let result = tools.call("list_techdraw_templates", json!({})).await;
    let text = first_text(&serde_json::to_value(&result).unwrap()).to_string();

    assert!(text.starts_with("Available TechDraw Templates:"));
    assert!(text.contains("ISO_A1_Landscape"));
}

#[tokio::test]
async fn export_page_requires_a_target() {
    let mock = MockFreeCad::new(|method, _| panic!("unexpected call {method}"));
    let mut tools = toolbox(&mock, false);

    let result = tools
        .call(
            "export_techdraw_page",
            json!({"doc_name": "Plant", "page_name": "A1_PLAN"}),
        )
        .await;
    let text = first_text(&serde_json::to_value(&result).unwrap()).to_string();

    assert!(result.is_error);
    assert!(text.contains("At least one export path must be specified"), "{text}");
}

//! Spatial contract files written and read by the tools.

mod common;

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use common::{first_text, script_output, script_payload, toolbox, MockFreeCad};
use freecad_mcp::contract::{Contract, Envelope};

fn plant_host(method: &str, params: &[Value]) -> freecad_mcp::rpc::RpcResult<Value> {
    assert_eq!(method, "execute_code", "unexpected call {method}");
    let payload = script_payload(params[0].as_str().unwrap_or_default()).unwrap();

    if let Some(placements) = payload.get("placements").and_then(Value::as_array) {
        let updated: Vec<&Value> = placements.iter().map(|p| &p["id"]).collect();
        return Ok(script_output(&json!({"updated": updated, "errors": []})));
    }

    Ok(script_output(&json!({
        "doc_name": "Plant",
        "source_file": "/projects/plant.FCStd",
        "boundary": [[0.0, 0.0], [50000.0, 0.0], [50000.0, 30000.0], [0.0, 30000.0]],
        "objects": [
            {
                "name": "TK_101",
                "label": "TK-101",
                "type_id": "Part::Cylinder",
                "bbox": {"x_min": -1500.0, "x_max": 1500.0, "y_min": -1500.0, "y_max": 1500.0, "z_min": 0.0, "z_max": 6000.0},
                "base": [0.0, 0.0, 0.0],
                "expressions": [["Height", "Spreadsheet.tank_height"]]
            },
            {
                "name": "P_201",
                "label": "P-201",
                "type_id": "Part::Box",
                "bbox": {"x_min": 0.0, "x_max": 1200.0, "y_min": 0.0, "y_max": 800.0, "z_min": 0.0, "z_max": 900.0},
                "base": [0.0, 0.0, 0.0],
                "rotation_deg": 90.0
            },
            {
                "name": "Wire",
                "label": "SiteBoundary",
                "type_id": "Draft::Wire",
                "bbox": {"x_min": 0.0, "x_max": 50000.0, "y_min": 0.0, "y_max": 30000.0, "z_min": 0.0, "z_max": 0.0}
            }
        ]
    })))
}

#[tokio::test]
async fn exported_contract_is_written_in_metres() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plant.contract.json");
    let mock = MockFreeCad::new(plant_host);
    let mut tools = toolbox(&mock, false);

    let result = tools
        .call(
            "export_contract_json",
            json!({
                "doc_name": "Plant",
                "project_name": "Riverside WWTP",
                "boundary_object": "SiteBoundary",
                "output_path": path.to_string_lossy()
            }),
        )
        .await;
    let text = first_text(&serde_json::to_value(&result).unwrap()).to_string();
    assert!(!result.is_error, "{text}");
    assert!(text.starts_with(&format!("Contract exported to: {}", path.display())));
    assert!(text.contains("Equipment count: 2"));
    assert!(text.contains("Boundary points: 4"));

    let contract: Contract =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(contract.project.name, "Riverside WWTP");
    assert_eq!(contract.site.boundary[2], [50.0, 30.0]);

    assert_eq!(mock.script_payloads()[0]["boundary_object"], "SiteBoundary");

    let ids: Vec<&str> = contract.equipment.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["TK-101", "P-201"]);

    let tank = &contract.equipment[0];
    assert_eq!(tank.envelope, Envelope::Circle { diameter: 3.0 });
    assert!((tank.height - 6.0).abs() < 1e-9);
    assert_eq!(tank.truth_ref, "FreeCAD::Plant::TK_101");
    assert_eq!(tank.parameters["Height"], "Spreadsheet.tank_height");

    let pump = &contract.equipment[1];
    assert_eq!(pump.kind, "pump");
    assert!((pump.rotation_deg - 90.0).abs() < 1e-9);
    assert_eq!(pump.truth_ref, "FreeCAD::Plant::P_201");
    assert_eq!(
        pump.envelope,
        Envelope::Rectangle {
            width: 1.2,
            length: 0.8
        }
    );

    let metadata = contract.metadata.unwrap();
    assert_eq!(metadata.source_file, "/projects/plant.FCStd");
    assert!(metadata
        .hash
        .is_some_and(|h| h.starts_with("sha256:") && h.len() == 23));
}

#[tokio::test]
async fn equipment_ids_survive_create_then_export() {
    let built: Arc<Mutex<Vec<Value>>> = Arc::default();
    let objects = Arc::clone(&built);
    let mock = MockFreeCad::new(move |method, params| {
        assert_eq!(method, "execute_code", "unexpected call {method}");
        let payload = script_payload(params[0].as_str().unwrap_or_default()).unwrap();
        let mut objects = objects.lock().unwrap();

        if payload.get("parts").is_some() {
            objects.push(json!({
                "name": payload["name"],
                "label": payload["id"],
                "type_id": "Part::Cylinder",
                "bbox": {"x_min": -2000.0, "x_max": 2000.0, "y_min": -2000.0, "y_max": 2000.0, "z_min": 0.0, "z_max": 5000.0},
            }));
            return Ok(script_output(&json!({
                "status": "created",
                "name": payload["name"],
                "label": payload["id"],
            })));
        }
        Ok(script_output(&json!({"doc_name": "Plant", "objects": *objects})))
    });
    let mut tools = toolbox(&mock, false);

    for id in ["TK-101", "DIG 2"] {
        let created = tools
            .call(
                "create_equipment_envelope",
                json!({
                    "doc_name": "Plant",
                    "equipment_id": id,
                    "equipment_type": "tank",
                    "shape": "circle",
                    "diameter": 4.0,
                    "height": 5.0
                }),
            )
            .await;
        assert!(!created.is_error, "{created:?}");
    }
    let names: Vec<Value> = built.lock().unwrap().iter().map(|o| o["name"].clone()).collect();
    assert_eq!(names, [json!("TK_101"), json!("DIG_2")]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roundtrip.json");
    let exported = tools
        .call(
            "export_contract_json",
            json!({
                "doc_name": "Plant",
                "project_name": "Riverside WWTP",
                "equipment_prefix": "TK-",
                "output_path": path.to_string_lossy()
            }),
        )
        .await;
    assert!(!exported.is_error, "{exported:?}");

    let contract: Contract =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let ids: Vec<&str> = contract.equipment.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["TK-101"]);
}

#[tokio::test]
async fn solved_contract_file_moves_equipment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("solved.json");
    std::fs::write(
        &path,
        json!({
            "project": {"name": "Riverside WWTP"},
            "placements": [
                {"id": "TK-101", "x": 12.5, "y": 4.0, "rotation_deg": 90.0},
                {"structure_id": "P-201", "x": 20.0, "y": 8.25}
            ]
        })
        .to_string(),
    )
    .unwrap();

    let mock = MockFreeCad::new(plant_host);
    let mut tools = toolbox(&mock, false);
    let result = tools
        .call(
            "apply_placements",
            json!({"doc_name": "Plant", "contract_path": path.to_string_lossy()}),
        )
        .await;

    let text = first_text(&serde_json::to_value(&result).unwrap()).to_string();
    assert_eq!(text, "Applied placements:\n- Updated: 2 objects");

    let payload = &mock.script_payloads()[0];
    let sent = &payload["placements"];
    assert_eq!(sent[0]["id"], "TK-101");
    assert_eq!(sent[0]["name"], "TK_101");
    assert_eq!(sent[0]["x"], 12_500.0);
    assert_eq!(sent[0]["rotation_deg"], 90.0);
    assert_eq!(sent[1]["id"], "P-201");
    assert_eq!(sent[1]["y"], 8_250.0);
    assert_eq!(payload["label_fallback"], true);
}

#[tokio::test]
async fn inline_contract_wins_over_path() {
    let mock = MockFreeCad::new(plant_host);
    let mut tools = toolbox(&mock, false);

    let result = tools
        .call(
            "apply_placements",
            json!({
                "doc_name": "Plant",
                "contract_json": "{\"placements\": [{\"id\": \"TK_101\", \"x\": 1, \"y\": 2}]}",
                "contract_path": "/does/not/exist.json"
            }),
        )
        .await;

    assert!(!result.is_error);
    assert_eq!(mock.script_payloads()[0]["placements"][0]["x"], 1000.0);
}

#[tokio::test]
async fn unreadable_contract_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockFreeCad::new(plant_host);
    let mut tools = toolbox(&mock, false);

    let missing = dir.path().join("missing.json");
    let result = tools
        .call(
            "apply_placements",
            json!({"doc_name": "Plant", "contract_path": missing.to_string_lossy()}),
        )
        .await;
    let text = first_text(&serde_json::to_value(&result).unwrap()).to_string();
    assert!(result.is_error);
    assert!(text.starts_with("Failed to apply placements:"), "{text}");

    let empty = dir.path().join("empty.json");
    std::fs::write(&empty, r#"{"placements": []}"#).unwrap();
    let result = tools
        .call(
            "apply_placements",
            json!({"doc_name": "Plant", "contract_path": empty.to_string_lossy()}),
        )
        .await;
    let text = first_text(&serde_json::to_value(&result).unwrap()).to_string();
    assert!(text.contains("No placements found in contract"), "{text}");
    assert!(mock.methods().is_empty());
}

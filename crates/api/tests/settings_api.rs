mod common;

use axum::http::StatusCode;
use common::{build_test_app, get, post_json, KNOWN_REPOSITORY};
use serde_json::{json, Value};
use varnava_core::remote_model::DEFAULT_PREVIEW_REPOSITORY;

#[tokio::test]
async fn prompt_settings_follow_device_and_models() {
    let test = build_test_app().await;

    let (status, body) = get(&test.app, "/settings/prompts").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["constants"]["base_dimension"], 512);
    assert_eq!(body["constants"]["upscaled_dimension"], 968);

    let settings = body["settings"].as_array().unwrap();
    let find = |name: &str| {
        settings
            .iter()
            .find(|s| s["name"] == name)
            .unwrap_or_else(|| panic!("missing setting {name}"))
    };

    // Nothing is downloaded, so the active model is offered.
    assert_eq!(find("model")["default"], DEFAULT_PREVIEW_REPOSITORY);
    assert_eq!(find("method")["default"], "dpm");
    assert!(find("method")["values"]
        .as_array()
        .unwrap()
        .iter()
        .any(|v| v == "k-lms"));
    assert_eq!(find("seed")["default"], -1);
    assert_eq!(find("batch")["max"], 4);
}

fn setting<'a>(body: &'a Value, name: &str) -> &'a Value {
    body["settings"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == name)
        .unwrap_or_else(|| panic!("missing setting {name}"))
}

#[tokio::test]
async fn model_default_is_the_model_the_worker_loads() {
    let test = build_test_app().await;
    // A second preview model that is fully present on disk.
    let snapshot = test
        .state
        .resources
        .layout()
        .snapshot_dir(KNOWN_REPOSITORY, "f00d");
    std::fs::create_dir_all(&snapshot).unwrap();
    std::fs::write(snapshot.join("model_index.json"), vec![0u8; 42]).unwrap();

    let (status, _) = post_json(
        &test.app,
        "/resources/models",
        json!({ "kind": "preview", "path": KNOWN_REPOSITORY }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&test.app, "/settings/prompts").await;
    let model = setting(&body, "model");

    // The active model is still the first tracked one, even though only the
    // added model is complete.
    assert_eq!(model["default"], DEFAULT_PREVIEW_REPOSITORY);
    assert_eq!(
        model["values"],
        json!([DEFAULT_PREVIEW_REPOSITORY, KNOWN_REPOSITORY])
    );
}

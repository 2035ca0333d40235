mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{build_test_app, get, post_json, KNOWN_REPOSITORY};
use serde_json::json;
use varnava_core::remote_model::{
    DEFAULT_PREVIEW_REPOSITORY, DEFAULT_UPSCALE_REPOSITORY, DEFAULT_VARIATION_REPOSITORY,
};

#[tokio::test]
async fn status_lists_default_models() {
    let test = build_test_app().await;

    let (status, body) = get(&test.app, "/resources").await;

    assert_eq!(status, StatusCode::OK);
    let resources = body["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 3);
    assert_eq!(resources[0]["path"], DEFAULT_PREVIEW_REPOSITORY);
    assert_eq!(resources[0]["is_required"], true);
    assert_eq!(resources[1]["path"], DEFAULT_UPSCALE_REPOSITORY);
    assert_eq!(resources[2]["path"], DEFAULT_VARIATION_REPOSITORY);
    assert_eq!(resources[2]["kind"], "variation");
    assert_eq!(resources[2]["is_required"], true);
    assert_eq!(body["isDownloading"], false);
    assert_eq!(body["downloadingPath"], serde_json::Value::Null);
    assert_eq!(body["isDataPathDefault"], true);
}

#[tokio::test]
async fn update_data_path_requires_path() {
    let test = build_test_app().await;

    let (status, body) = post_json(&test.app, "/resources/update_data_path", json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing-field");
    assert_eq!(body["error-details"]["name"], "path");
}

#[tokio::test]
async fn update_data_path_validates_directory() {
    let test = build_test_app().await;
    let missing = test.dir.path().join("missing");
    let file = test.dir.path().join("notes.txt");
    std::fs::write(&file, b"x").unwrap();

    let (status, body) =
        post_json(&test.app, "/resources/update_data_path", json!({ "path": missing })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "path-not-found");

    let (_, body) =
        post_json(&test.app, "/resources/update_data_path", json!({ "path": file })).await;
    assert_eq!(body["error"], "path-not-directory");
}

#[tokio::test]
async fn update_data_path_persists_choice() {
    let test = build_test_app().await;
    let elsewhere = test.dir.path().join("elsewhere");
    std::fs::create_dir_all(&elsewhere).unwrap();

    let (status, body) =
        post_json(&test.app, "/resources/update_data_path", json!({ "path": elsewhere })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (_, body) = get(&test.app, "/resources").await;
    assert_eq!(body["isDataPathDefault"], false);
    assert_eq!(body["dataPath"], json!(elsewhere));
}

#[tokio::test]
async fn add_model_resolves_on_hub() {
    let test = build_test_app().await;

    let (status, body) = post_json(
        &test.app,
        "/resources/models",
        json!({ "kind": "upscale", "path": KNOWN_REPOSITORY }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"]["name"], "known");
    assert_eq!(body["model"]["total_file_bytes"], 42);

    let (status, body) =
        post_json(&test.app, "/resources/models", json!({ "path": KNOWN_REPOSITORY })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already-tracked");

    let (_, body) = get(&test.app, "/resources").await;
    assert_eq!(body["upscale_models"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn add_model_rejects_unknown_repository() {
    let test = build_test_app().await;

    let (status, body) =
        post_json(&test.app, "/resources/models", json!({ "path": "org/nowhere" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid-model");

    let (status, body) = post_json(&test.app, "/resources/models", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing-field");
}

#[tokio::test]
async fn remove_model_untracks() {
    let test = build_test_app().await;

    let (status, body) = post_json(
        &test.app,
        "/resources/models/remove",
        json!({ "path": DEFAULT_UPSCALE_REPOSITORY }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"]["repository_path"], DEFAULT_UPSCALE_REPOSITORY);

    let (status, body) = post_json(
        &test.app,
        "/resources/models/remove",
        json!({ "path": DEFAULT_UPSCALE_REPOSITORY }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not-found");
}

#[tokio::test]
async fn failed_downloads_are_reported_per_model() {
    let test = build_test_app().await;

    let (status, body) = post_json(&test.app, "/resources/start_downloading", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["started"], true);

    tokio::time::timeout(Duration::from_secs(5), async {
        while test.state.resources.is_downloading() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // The fake hub does not know the default repositories.
    let (_, body) = get(&test.app, "/resources").await;
    let failure = &body["failures"][DEFAULT_PREVIEW_REPOSITORY];
    assert_eq!(failure["transient"], false);
    assert!(body["failures"][DEFAULT_UPSCALE_REPOSITORY].is_object());
    assert!(body["failures"][DEFAULT_VARIATION_REPOSITORY].is_object());

    let (_, body) = post_json(&test.app, "/resources/stop_downloading", json!({})).await;
    assert_eq!(body["stopped"], false);
}

#[tokio::test]
async fn variation_model_is_built_in() {
    let test = build_test_app().await;

    let (status, body) = post_json(
        &test.app,
        "/resources/models/remove",
        json!({ "path": DEFAULT_VARIATION_REPOSITORY }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = post_json(
        &test.app,
        "/resources/models",
        json!({ "kind": "variation", "path": KNOWN_REPOSITORY }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (_, body) = get(&test.app, "/resources").await;
    assert_eq!(body["resources"].as_array().unwrap().len(), 3);
}

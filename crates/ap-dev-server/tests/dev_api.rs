// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

mod common;

use common::spawn_server;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn ping_and_version() {
    let server = spawn_server().await;

    let response = server.client.get(server.url("/dev/ping")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), "ok");

    let (status, body) = server.get_json("/dev/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn list_groups_tasks_by_entrypoint() {
    let server = spawn_server().await;

    let (status, body) = server.get_json("/dev/list").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entrypoints"]["tasks/my_task.sh"]["tasks"], json!(["my_task"]));
    assert_eq!(body["entrypoints"]["tasks/uses_db.sh"]["tasks"], json!(["uses_db"]));
}

#[tokio::test]
async fn registered_task_lookup() {
    let server = spawn_server().await;

    let (status, body) = server.get_json("/dev/tasks/uses_db").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resources"], json!({"db": "local_db"}));

    let (status, _) = server.get_json("/dev/tasks/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pre_allocation_requires_a_slug() {
    let server = spawn_server().await;

    let (status, problem) = server.post_json("/dev/runs/create", json!({"taskSlug": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(problem["errors"]["task_slug"], json!(["Task slug is required"]));
}

#[tokio::test]
async fn metadata_stand_ins() {
    let server = spawn_server().await;

    let (_, body) = server.get_json("/v0/tasks/getMetadata?slug=my_task").await;
    assert_eq!(body, json!({"id": "tsk-my_task", "slug": "my_task"}));

    let (_, body) = server.get_json("/v0/views/get?slug=dashboard").await;
    assert_eq!(body, json!({"id": "vew-dashboard", "slug": "dashboard"}));

    let (status, _) = server.get_json("/v0/views/get?slug=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn users_are_synthetic() {
    let server = spawn_server().await;

    let (status, body) = server.get_json("/i/users/get?userID=usr-local").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["userID"], "usr-local");
    assert_eq!(body["user"]["email"], "editor@localhost");
    assert!(body["user"]["avatarURL"].is_string());
}

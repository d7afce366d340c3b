// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

mod common;

use std::time::Duration;

use common::{SLOW_TASK_DELAY, spawn_server};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn execute_then_get_returns_the_same_run() {
    let server = spawn_server().await;

    let (status, run) = server
        .post_json(
            "/v0/tasks/execute",
            json!({"slug": "my_task", "paramValues": {"param1": "a"}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "Succeeded");
    assert_eq!(run["taskSlug"], "my_task");
    assert_eq!(run["paramValues"], json!({"param1": "a"}));
    assert_eq!(run["outputs"]["params"], json!({"param1": "a"}));
    assert!(run["succeededAt"].is_string());
    assert!(run.get("failedAt").is_none());

    let run_id = run["runID"].as_str().unwrap();
    assert!(run_id.starts_with("run"));
    assert_eq!(run_id.len(), 13);

    let (status, fetched) = server.get_json(&format!("/v0/runs/get?id={run_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, run);

    let (_, outputs) = server.get_json(&format!("/v0/runs/getOutputs?id={run_id}")).await;
    assert_eq!(outputs["output"], run["outputs"]);
}

#[tokio::test]
async fn executor_failure_is_recorded_not_returned() {
    let server = spawn_server().await;

    let (status, run) = server
        .post_json("/v0/tasks/execute", json!({"slug": "failing_task"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "Failed");
    assert!(run["failedAt"].is_string());
    assert!(run.get("succeededAt").is_none());
    assert_eq!(run["outputs"]["params"], json!({}));
}

#[tokio::test]
async fn unregistered_task_is_not_found() {
    let server = spawn_server().await;

    let (status, problem) = server.post_json("/v0/tasks/execute", json!({"slug": "nope"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(problem["detail"], "Task with slug nope is not registered locally");
}

#[tokio::test]
async fn missing_slug_is_a_validation_error() {
    let server = spawn_server().await;

    let (status, problem) = server.post_json("/v0/tasks/execute", json!({"slug": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(problem["errors"]["slug"], json!(["Task slug is required"]));
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let server = spawn_server().await;

    let response = server
        .client
        .post(server.url("/v0/tasks/execute"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn runs_are_listed_most_recent_first() {
    let server = spawn_server().await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let (_, run) = server.post_json("/v0/tasks/execute", json!({"slug": "my_task"})).await;
        ids.push(run["runID"].as_str().unwrap().to_string());
    }
    server.post_json("/v0/tasks/execute", json!({"slug": "failing_task"})).await;

    let (status, body) = server.get_json("/v0/runs/list?taskSlug=my_task").await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<&str> = body["runs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|run| run["runID"].as_str().unwrap())
        .collect();
    ids.reverse();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn child_runs_are_descendants() {
    let server = spawn_server().await;

    let (_, parent) = server.post_json("/v0/tasks/execute", json!({"slug": "my_task"})).await;
    let parent_id = parent["runID"].as_str().unwrap();
    let (_, child) = server
        .post_json(
            "/v0/tasks/execute",
            json!({"slug": "my_task", "parentRunID": parent_id}),
        )
        .await;
    let child_id = child["runID"].as_str().unwrap();
    let (_, grandchild) = server
        .post_json(
            "/v0/tasks/execute",
            json!({"slug": "failing_task", "parentRunID": child_id}),
        )
        .await;
    server.post_json("/v0/tasks/execute", json!({"slug": "my_task"})).await;

    let (status, body) = server.get_json(&format!("/i/runs/getDescendants?runID={parent_id}")).await;
    assert_eq!(status, StatusCode::OK);
    let descendants: Vec<&str> = body["descendants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|run| run["runID"].as_str().unwrap())
        .collect();
    assert_eq!(descendants, vec![child_id, grandchild["runID"].as_str().unwrap()]);

    let (_, body) = server.get_json(&format!("/i/runs/get?id={child_id}")).await;
    assert_eq!(body["run"]["parentID"], parent_id);
    assert_eq!(body["task"]["slug"], "my_task");
}

#[tokio::test]
async fn run_finishes_after_the_caller_disconnects() {
    let server = spawn_server().await;
    let (_, created) = server.post_json("/dev/runs/create", json!({"taskSlug": "slow_task"})).await;
    let run_id = created["runID"].as_str().unwrap();

    let abandoned = server
        .client
        .post(server.url("/v0/tasks/execute"))
        .json(&json!({"slug": "slow_task", "runID": run_id}))
        .timeout(Duration::from_millis(200))
        .send()
        .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(SLOW_TASK_DELAY + Duration::from_millis(1200)).await;
    let (status, run) = server.get_json(&format!("/v0/runs/get?id={run_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "Succeeded");
    assert!(run["succeededAt"].is_string());

    let logs = server
        .client
        .get(server.url(&format!("/dev/logs/{run_id}")))
        .send()
        .await
        .unwrap();
    let body = tokio::time::timeout(Duration::from_secs(3), logs.text())
        .await
        .expect("log stream ended")
        .unwrap();
    assert!(body.contains("starting slow_task"));
}

#[tokio::test]
async fn unknown_run_is_not_found() {
    let server = spawn_server().await;

    let (status, problem) = server.get_json("/v0/runs/get?id=run0000000000").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(problem["detail"], "Run not found: run0000000000");
}

#[tokio::test]
async fn attached_resources_and_config_vars_reach_the_executor() {
    let server = spawn_server_with_config().await;

    let (status, run) = server.post_json("/v0/tasks/execute", json!({"slug": "uses_db"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "Succeeded");
    assert_eq!(run["outputs"]["resources"], json!(["db"]));
    assert_eq!(run["outputs"]["env"]["API_KEY"], "test");
}

#[tokio::test]
async fn missing_attachment_names_the_slug() {
    let server = spawn_server().await;

    let (status, problem) = server.post_json("/v0/tasks/execute", json!({"slug": "uses_db"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        problem["detail"],
        "Cannot find resource with slug local_db in dev config file"
    );
}

#[tokio::test]
async fn builtin_tasks_see_every_resource() {
    let server = spawn_server_with_config().await;

    let (status, run) = server
        .post_json("/v0/tasks/execute", json!({"slug": "airplane:sql_query"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["outputs"]["resources"], json!(["local_db", "team_slack"]));

    let (_, run) = server
        .post_json(
            "/v0/tasks/execute",
            json!({"slug": "airplane:sql_query", "resources": {"db": "res-local_db"}}),
        )
        .await;
    assert_eq!(run["outputs"]["resources"], json!(["db"]));
}

async fn spawn_server_with_config() -> common::TestServer {
    common::spawn_server_with(|dir| {
        std::fs::write(
            dir.path().join("airplane.dev.yaml"),
            "configVars:\n  API_KEY: test\nresources:\n  - kind: postgres\n    id: res-local_db\n    slug: local_db\n    name: Local DB\n    host: localhost\n    port: \"5432\"\n    database: app\n    username: postgres\n    password: secret\n",
        )
        .unwrap();
    })
    .await
}

#[tokio::test]
async fn empty_identifiers_are_validation_errors() {
    let server = spawn_server().await;

    for (path, field, message) in [
        ("/v0/runs/get?id=", "id", "ID is required"),
        ("/v0/runs/getOutputs?id=", "id", "ID is required"),
        ("/v0/runs/list?taskSlug=", "task_slug", "Task slug is required"),
        ("/i/runs/get?id=", "id", "ID is required"),
        ("/i/runs/getDescendants?runID=", "run_id", "Run ID is required"),
        ("/i/prompts/list?runID=", "run_id", "Run ID is required"),
        ("/v0/prompts/get?id=", "id", "ID is required"),
        ("/i/resources/get?slug=", "slug", "Slug is required"),
        ("/v0/tasks/getMetadata", "slug", "Slug is required"),
    ] {
        let (status, problem) = server.get_json(path).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
        assert_eq!(problem["errors"][field], json!([message]), "{path}");
    }
}

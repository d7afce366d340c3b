// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

mod common;

use std::time::Duration;

use ap_api_contract::{LogLevel, LogLine};
use common::{TestServer, spawn_server};
use futures::StreamExt;
use reqwest::StatusCode;
use serde_json::json;

/// Read an SSE response to the end and decode each `data:` payload.
async fn collect_lines(response: reqwest::Response) -> Vec<LogLine> {
    let mut body = response.bytes_stream();
    let mut buffer = String::new();
    let mut lines = Vec::new();

    let read = async {
        while let Some(chunk) = body.next().await {
            buffer.push_str(&String::from_utf8_lossy(&chunk.expect("chunk")));
            while let Some(end) = buffer.find("\n\n") {
                let event: String = buffer.drain(..end + 2).collect();
                for data in event.lines().filter_map(|line| line.strip_prefix("data:")) {
                    lines.push(serde_json::from_str(data.trim()).expect("log line json"));
                }
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), read)
        .await
        .expect("log stream did not end");
    lines
}

async fn attach(server: &TestServer, run_id: &str) -> reqwest::Response {
    let response = server
        .client
        .get(server.url(&format!("/dev/logs/{run_id}")))
        .send()
        .await
        .expect("attach");
    assert_eq!(response.status(), StatusCode::OK);
    response
}

async fn pre_allocate(server: &TestServer, slug: &str) -> String {
    let (status, body) = server.post_json("/dev/runs/create", json!({"taskSlug": slug})).await;
    assert_eq!(status, StatusCode::OK);
    body["runID"].as_str().unwrap().to_string()
}

fn texts(lines: &[LogLine]) -> Vec<&str> {
    lines.iter().map(|line| line.text.as_str()).collect()
}

#[tokio::test]
async fn listener_attached_before_execution_sees_every_line() {
    let server = spawn_server().await;
    let run_id = pre_allocate(&server, "my_task").await;

    let (_, queued) = server.get_json(&format!("/v0/runs/get?id={run_id}")).await;
    assert_eq!(queued["status"], "Queued");

    let response = attach(&server, &run_id).await;
    let listener = tokio::spawn(collect_lines(response));

    let (status, run) = server
        .post_json("/v0/tasks/execute", json!({"slug": "my_task", "runID": run_id}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["runID"], run_id.as_str());
    assert_eq!(run["status"], "Succeeded");

    let lines = listener.await.unwrap();
    assert_eq!(texts(&lines), vec!["starting my_task", "finished"]);
    assert!(lines.iter().all(|line| line.level == LogLevel::Info));
}

#[tokio::test]
async fn late_listener_gets_the_replay_and_the_end() {
    let server = spawn_server().await;
    let (_, run) = server.post_json("/v0/tasks/execute", json!({"slug": "failing_task"})).await;
    let run_id = run["runID"].as_str().unwrap();

    let lines = collect_lines(attach(&server, run_id).await).await;
    assert_eq!(texts(&lines), vec!["starting failing_task", "finished", "task failed"]);
    assert_eq!(lines[2].level, LogLevel::Error);
}

#[tokio::test]
async fn concurrent_listeners_each_get_the_full_stream() {
    let server = spawn_server().await;
    let run_id = pre_allocate(&server, "my_task").await;

    let first = tokio::spawn(collect_lines(attach(&server, &run_id).await));
    let second = tokio::spawn(collect_lines(attach(&server, &run_id).await));

    server
        .post_json("/v0/tasks/execute", json!({"slug": "my_task", "runID": run_id}))
        .await;

    let first = first.await.unwrap();
    let second = second.await.unwrap();
    assert_eq!(texts(&first), vec!["starting my_task", "finished"]);
    assert_eq!(first, second);
}

#[tokio::test]
async fn unknown_run_has_no_log_stream() {
    let server = spawn_server().await;
    let response = server
        .client
        .get(server.url("/dev/logs/runmissing00"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pre_allocated_run_for_unknown_task_ends_its_stream() {
    let server = spawn_server().await;
    let run_id = pre_allocate(&server, "ghost").await;
    let listener = tokio::spawn(collect_lines(attach(&server, &run_id).await));

    let (status, _) = server
        .post_json("/v0/tasks/execute", json!({"slug": "ghost", "runID": run_id}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let lines = listener.await.unwrap();
    assert_eq!(texts(&lines), vec!["Task with slug ghost is not registered locally"]);

    let (_, run) = server.get_json(&format!("/v0/runs/get?id={run_id}")).await;
    assert_eq!(run["status"], "Failed");
}

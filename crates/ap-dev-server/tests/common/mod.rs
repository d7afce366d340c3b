// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use ap_api_contract::{LogLine, Outputs, TaskEntry};
use ap_dev_server::dependencies::ServerDependencies;
use ap_dev_server::executor::{ExecutionError, Executor, RunConfig};
use ap_dev_server::registry::TaskRegistry;
use ap_dev_server::{Server, ServerConfig};
use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Executor that echoes what it was given instead of running anything.
///
/// `failing_task` fails with partial outputs and `slow_task` takes
/// [`SLOW_TASK_DELAY`] to finish; every task logs two lines.
pub struct EchoExecutor;

pub const SLOW_TASK_DELAY: Duration = Duration::from_millis(800);

#[async_trait]
impl Executor for EchoExecutor {
    async fn execute(&self, config: RunConfig) -> Result<Outputs, ExecutionError> {
        config.logs.publish(LogLine::info(format!("starting {}", config.task_slug))).await;
        if config.task_slug == "slow_task" {
            tokio::time::sleep(SLOW_TASK_DELAY).await;
        }
        config.logs.publish(LogLine::info("finished")).await;

        let resources: Vec<&String> = config.resources.keys().collect();
        let outputs = json!({
            "params": config.param_values,
            "resources": resources,
            "env": config.env_vars,
        });
        match config.task_slug.as_str() {
            "failing_task" => Err(ExecutionError::new("task failed").with_outputs(outputs)),
            _ => Ok(outputs),
        }
    }
}

pub fn task(slug: &str, resources: &[(&str, &str)]) -> TaskEntry {
    TaskEntry {
        slug: slug.into(),
        name: slug.replace('_', " "),
        kind: "shell".into(),
        kind_options: Default::default(),
        entrypoint: format!("tasks/{slug}.sh"),
        parameters: Some(json!([{"slug": "param1", "type": "shorttext"}])),
        resources: resources.iter().map(|(a, s)| (a.to_string(), s.to_string())).collect(),
        env_vars: BTreeMap::new(),
    }
}

pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub dir: TempDir,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get_json(&self, path: &str) -> (reqwest::StatusCode, serde_json::Value) {
        let response = self.client.get(self.url(path)).send().await.expect("request");
        let status = response.status();
        (status, response.json().await.expect("json body"))
    }

    pub async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> (reqwest::StatusCode, serde_json::Value) {
        let response = self.client.post(self.url(path)).json(&body).send().await.expect("request");
        let status = response.status();
        (status, response.json().await.expect("json body"))
    }

    pub fn dev_config_path(&self) -> std::path::PathBuf {
        self.dir.path().join("airplane.dev.yaml")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawn a dev server on a free port with the standard test tasks registered.
pub async fn spawn_server() -> TestServer {
    spawn_server_with(|_| {}).await
}

pub async fn spawn_server_with(configure: impl FnOnce(&TempDir)) -> TestServer {
    let dir = tempfile::tempdir().expect("tempdir");
    configure(&dir);

    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ServerConfig {
        bind_addr: addr,
        root_dir: dir.path().to_path_buf(),
        dev_config_path: dir.path().join("airplane.dev.yaml"),
        ..ServerConfig::default()
    };

    let registry = TaskRegistry::new();
    registry.register_task(task("my_task", &[])).await;
    registry.register_task(task("failing_task", &[])).await;
    registry.register_task(task("slow_task", &[])).await;
    registry.register_task(task("uses_db", &[("db", "local_db")])).await;

    let state = ServerDependencies::new(config.clone())
        .with_registry(registry)
        .with_executor(Arc::new(EchoExecutor))
        .build()
        .await
        .expect("deps")
        .into_state();

    let server = Server::with_state(config, state);
    let handle = tokio::spawn(async move {
        server.run().await.expect("server run");
    });

    let server = TestServer {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::new(),
        dir,
        handle,
    };
    wait_until_ready(&server).await;
    server
}

async fn wait_until_ready(server: &TestServer) {
    for _ in 0..100 {
        if let Ok(response) = server.client.get(server.url("/dev/ping")).send().await {
            if response.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("dev server did not become ready at {}", server.base_url);
}

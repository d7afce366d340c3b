// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Task execution
//!
//! A run is registered before the executor starts so it can be polled,
//! streamed and prompted while it is in flight. The terminal transition is a
//! single [`RunStore::update`], which keeps prompts created during execution.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use ap_api_contract::validation::{validate_create_run_request, validate_execute_request};
use ap_api_contract::{CreateRunRequest, ExecuteTaskRequest, LogLine, Resource, Run, RunStatus, TaskEntry};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::dev_config::DevConfigStore;
use crate::error::{ServerError, ServerResult};
use crate::executor::{Executor, RunConfig};
use crate::registry::{TaskRegistry, is_builtin};
use crate::resources::ResourceMerger;
use crate::store::RunStore;

const RUN_ID_PREFIX: &str = "run";
const RANDOM_SUFFIX_LEN: usize = 10;

/// `prefix` followed by ten random lowercase alphanumerics.
pub fn generate_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{prefix}{suffix}")
}

pub struct Dispatcher {
    runs: Arc<RunStore>,
    registry: Arc<TaskRegistry>,
    merger: Arc<ResourceMerger>,
    dev_config: Arc<DevConfigStore>,
    executor: Arc<dyn Executor>,
    config: ServerConfig,
}

impl Dispatcher {
    pub fn new(
        runs: Arc<RunStore>,
        registry: Arc<TaskRegistry>,
        merger: Arc<ResourceMerger>,
        dev_config: Arc<DevConfigStore>,
        executor: Arc<dyn Executor>,
        config: ServerConfig,
    ) -> Self {
        Self {
            runs,
            registry,
            merger,
            dev_config,
            executor,
            config,
        }
    }

    /// Register a queued run so listeners can attach before it executes.
    pub async fn create_run(&self, request: CreateRunRequest) -> ServerResult<Run> {
        validate_create_run_request(&request)?;
        let run = Run::new(generate_id(RUN_ID_PREFIX), &request.task_slug, &self.config.user_id);
        self.runs.add(&request.task_slug, run.clone()).await;
        info!(run_id = %run.run_id, task = %request.task_slug, "pre-allocated run");
        Ok(run)
    }

    /// Execute a task and wait for it to finish.
    ///
    /// Executor failures are recorded on the run rather than returned.
    pub async fn execute(&self, request: ExecuteTaskRequest) -> ServerResult<Run> {
        validate_execute_request(&request)?;
        let slug = request.slug.clone();
        let run_id = request
            .run_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| generate_id(RUN_ID_PREFIX));
        let builtin = is_builtin(&slug);

        let task = if builtin {
            None
        } else {
            match self.registry.task(&slug).await {
                Some(task) => Some(task),
                None => {
                    let err = ServerError::TaskNotRegistered(slug.clone());
                    self.abandon(&run_id, &err).await;
                    return Err(err);
                }
            }
        };

        let resources = match self.resolve_resources(task.as_ref(), &request).await {
            Ok(resources) => resources,
            Err(err) => {
                self.abandon(&run_id, &err).await;
                return Err(err);
            }
        };

        let created_at = match self.runs.get(&run_id).await {
            Some(existing) => existing.created_at,
            None => Utc::now(),
        };
        let mut run = Run::new(&run_id, &slug, &self.config.user_id);
        run.created_at = created_at;
        run.status = RunStatus::Active;
        run.parent_id = request.parent_run_id.clone();
        run.param_values = request.param_values.clone();
        run.parameters = task.as_ref().and_then(|t| t.parameters.clone());
        let logs = self.runs.add(&slug, run).await;

        let run_config = self.run_config(&run_id, &slug, task.as_ref(), &request, resources, logs).await;
        info!(run_id = %run_id, task = %slug, builtin, "executing task");

        // Detached so a dropped request neither cancels the executor nor skips
        // the terminal transition.
        let finish = tokio::spawn(finish_run(
            Arc::clone(&self.runs),
            Arc::clone(&self.executor),
            run_config,
        ));
        finish
            .await
            .map_err(|err| ServerError::Internal(format!("run {run_id} did not finish: {err}")))?
    }

    async fn resolve_resources(
        &self,
        task: Option<&TaskEntry>,
        request: &ExecuteTaskRequest,
    ) -> ServerResult<BTreeMap<String, Resource>> {
        let resources = match task {
            Some(task) => self.merger.resolve_attachments(&task.resources).await?,
            None => self.merger.resolve_builtin(&request.resources).await?,
        };
        Ok(resources)
    }

    async fn run_config(
        &self,
        run_id: &str,
        slug: &str,
        task: Option<&TaskEntry>,
        request: &ExecuteTaskRequest,
        resources: BTreeMap<String, Resource>,
        logs: Arc<crate::logs::LogBroker>,
    ) -> RunConfig {
        let mut env_vars = self.dev_config.config_vars().await;
        if let Some(task) = task {
            env_vars.extend(task.env_vars.clone());
        }
        let entrypoint = task
            .filter(|t| !t.entrypoint.is_empty())
            .map(|t| absolute_entrypoint(&self.config.root_dir, &t.entrypoint));

        RunConfig {
            run_id: run_id.to_string(),
            task_slug: slug.to_string(),
            task_name: task.map(|t| t.name.clone()).unwrap_or_else(|| slug.to_string()),
            kind: task.map(|t| t.kind.clone()).unwrap_or_default(),
            kind_options: task.map(|t| t.kind_options.clone()).unwrap_or_default(),
            entrypoint,
            root_dir: self.config.root_dir.clone(),
            param_values: request.param_values.clone(),
            resources,
            env_vars,
            env_slug: self.config.env.remote_slug().map(str::to_string),
            is_builtin: task.is_none(),
            api_host: self.config.api_host(),
            logs,
        }
    }

    // A pre-allocated run that can never start is failed so its listeners end.
    async fn abandon(&self, run_id: &str, reason: &ServerError) {
        let Some(logs) = self.runs.log_broker(run_id).await else {
            return;
        };
        let now = Utc::now();
        let updated = self
            .runs
            .update(run_id, |run| {
                run.fail(run.outputs.clone(), now);
                Ok::<(), ServerError>(())
            })
            .await;
        if updated.is_ok() {
            logs.publish(LogLine::error(reason.to_string())).await;
            logs.close().await;
        }
        warn!(run_id = %run_id, error = %reason, "run could not be started");
    }
}

/// Await the executor, then record the outcome and end the log stream.
async fn finish_run(
    runs: Arc<RunStore>,
    executor: Arc<dyn Executor>,
    config: RunConfig,
) -> ServerResult<Run> {
    let run_id = config.run_id.clone();
    let slug = config.task_slug.clone();
    let logs = Arc::clone(&config.logs);
    let result = executor.execute(config).await;

    let finished_at = Utc::now();
    let final_run = runs
        .update(&run_id, |run| {
            match &result {
                Ok(outputs) => run.succeed(outputs.clone(), finished_at),
                Err(err) => run.fail(err.outputs.clone(), finished_at),
            };
            Ok::<(), ServerError>(())
        })
        .await;

    match &result {
        Ok(_) => info!(run_id = %run_id, task = %slug, "run succeeded"),
        Err(err) => {
            warn!(run_id = %run_id, task = %slug, error = %err, "run failed");
            logs.publish(LogLine::error(err.message.clone())).await;
        }
    }
    logs.close().await;

    final_run
}

fn absolute_entrypoint(root_dir: &std::path::Path, entrypoint: &str) -> PathBuf {
    let path = PathBuf::from(entrypoint);
    if path.is_absolute() { path } else { root_dir.join(path) }
}

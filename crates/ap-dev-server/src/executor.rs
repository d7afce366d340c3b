// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The seam between dispatch and whatever actually runs a task

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use ap_api_contract::{Outputs, ParamValues, Resource};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::logs::LogBroker;

/// Everything an executor needs to run one task
#[derive(Clone)]
pub struct RunConfig {
    pub run_id: String,
    pub task_slug: String,
    pub task_name: String,
    /// Runtime kind, e.g. `shell`. Empty for built-ins.
    pub kind: String,
    pub kind_options: Map<String, Value>,
    /// Absolute path of the entrypoint, when the task has one.
    pub entrypoint: Option<PathBuf>,
    pub root_dir: PathBuf,
    pub param_values: ParamValues,
    /// Alias to resource, secrets included.
    pub resources: BTreeMap<String, Resource>,
    /// Config variables followed by the task's own env vars.
    pub env_vars: BTreeMap<String, String>,
    pub env_slug: Option<String>,
    pub is_builtin: bool,
    /// Base URL of this dev server, for prompts and child runs.
    pub api_host: String,
    pub logs: Arc<LogBroker>,
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("run_id", &self.run_id)
            .field("task_slug", &self.task_slug)
            .field("kind", &self.kind)
            .field("entrypoint", &self.entrypoint)
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("is_builtin", &self.is_builtin)
            .finish_non_exhaustive()
    }
}

/// A failed execution, with whatever outputs were produced before it failed
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
    pub outputs: Outputs,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            outputs: Value::Null,
        }
    }

    pub fn with_outputs(mut self, outputs: Outputs) -> Self {
        self.outputs = outputs;
        self
    }
}

/// Runs a task to completion.
///
/// Implementations stream output through `config.logs`. Closing the broker is
/// left to the dispatcher.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, config: RunConfig) -> Result<Outputs, ExecutionError>;
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Request, response and record types for the dev server API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use validator::Validate;

use crate::resources::MergedResource;

/// Parameter name to value.
pub type ParamValues = Map<String, Value>;

/// Whatever a task produced. `null` until the task sets something.
pub type Outputs = Value;

/// Run lifecycle states
///
/// `Queued` and `Active` are both non-terminal. A run leaves them exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    Queued,
    Active,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed | RunStatus::Cancelled)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStatus::Queued => "Queued",
            RunStatus::Active => "Active",
            RunStatus::Succeeded => "Succeeded",
            RunStatus::Failed => "Failed",
            RunStatus::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// One execution of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    #[serde(rename = "runID")]
    pub run_id: String,
    #[serde(rename = "taskID")]
    pub task_id: String,
    pub task_slug: String,
    #[serde(rename = "parentID", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub outputs: Outputs,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "creatorID")]
    pub creator_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub succeeded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub param_values: ParamValues,
    /// Declared parameter schema, when the task entry provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(default)]
    pub prompts: Vec<Prompt>,
    #[serde(default)]
    pub is_waiting_for_user: bool,
}

impl Run {
    /// A queued run with no outputs and no prompts.
    pub fn new(
        run_id: impl Into<String>,
        task_slug: impl Into<String>,
        creator_id: impl Into<String>,
    ) -> Self {
        let task_slug = task_slug.into();
        Self {
            run_id: run_id.into(),
            task_id: task_id(&task_slug),
            task_slug,
            parent_id: None,
            status: RunStatus::Queued,
            outputs: Value::Null,
            created_at: Utc::now(),
            creator_id: creator_id.into(),
            succeeded_at: None,
            failed_at: None,
            cancelled_at: None,
            param_values: ParamValues::new(),
            parameters: None,
            prompts: Vec::new(),
            is_waiting_for_user: false,
        }
    }

    /// Move to `Succeeded`. Returns false if the run had already finished.
    pub fn succeed(&mut self, outputs: Outputs, at: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = RunStatus::Succeeded;
        self.outputs = outputs;
        self.succeeded_at = Some(at);
        true
    }

    /// Move to `Failed`. Returns false if the run had already finished.
    pub fn fail(&mut self, outputs: Outputs, at: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = RunStatus::Failed;
        self.outputs = outputs;
        self.failed_at = Some(at);
        true
    }

    pub fn refresh_waiting_for_user(&mut self) {
        self.is_waiting_for_user = self.prompts.iter().any(|prompt| !prompt.is_submitted());
    }
}

/// Task IDs are not tracked locally, so one is derived from the slug.
pub fn task_id(slug: &str) -> String {
    format!("tsk-{slug}")
}

pub fn view_id(slug: &str) -> String {
    format!("vew-{slug}")
}

/// A request for human input that pauses a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: String,
    #[serde(rename = "runID")]
    pub run_id: String,
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub values: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
}

impl Prompt {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One line of task output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub text: String,
}

impl LogLine {
    pub fn new(level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, text)
    }
}

/// A task known to the dev server, as produced by definition discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEntry {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    /// Runtime kind, e.g. `shell`, `node` or `python`.
    pub kind: String,
    #[serde(default)]
    pub kind_options: Map<String, Value>,
    /// Path to the definition's entrypoint, relative to the dev root.
    #[serde(default)]
    pub entrypoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    /// Alias used inside the task to resource slug.
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewEntry {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entrypoint: String,
}

/// Tasks and views discovered in a dev root, loaded at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
    #[serde(default)]
    pub views: Vec<ViewEntry>,
}

// Execution and run queries

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteTaskRequest {
    #[validate(length(min = 1, message = "Task slug is required"))]
    pub slug: String,
    #[serde(default)]
    pub param_values: ParamValues,
    #[serde(rename = "runID", default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Alias to resource ID, honoured for built-in tasks.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, String>,
    #[serde(rename = "parentRunID", default, skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRunRequest {
    #[validate(length(min = 1, message = "Task slug is required"))]
    pub task_slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRunResponse {
    #[serde(rename = "runID")]
    pub run_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct IdQuery {
    #[serde(default)]
    #[validate(length(min = 1, message = "ID is required"))]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SlugQuery {
    #[serde(default)]
    #[validate(length(min = 1, message = "Slug is required"))]
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListRunsQuery {
    #[serde(default)]
    #[validate(length(min = 1, message = "Task slug is required"))]
    pub task_slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RunIdQuery {
    #[serde(rename = "runID", default)]
    #[validate(length(min = 1, message = "Run ID is required"))]
    pub run_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRunsResponse {
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetOutputsResponse {
    pub output: Outputs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetDescendantsResponse {
    pub descendants: Vec<Run>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunWithTaskResponse {
    pub run: Run,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub id: String,
    pub slug: String,
}

// Resources

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateResourceRequest {
    #[validate(length(min = 1, message = "Resource name is required"))]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub kind: String,
    /// Kind-specific configuration, decoded once the kind is known.
    #[serde(default)]
    pub resource: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResourceRequest {
    #[validate(length(min = 1, message = "Resource ID is required"))]
    pub id: String,
    #[validate(length(min = 1, message = "Resource slug is required"))]
    pub slug: String,
    #[validate(length(min = 1, message = "Resource name is required"))]
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub resource: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DeleteResourceRequest {
    #[validate(length(min = 1, message = "Resource ID is required"))]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceIdResponse {
    #[serde(rename = "resourceID")]
    pub resource_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceResponse {
    pub resource: MergedResource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResourcesResponse {
    pub resources: Vec<MergedResource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlugAvailabilityQuery {
    pub slug: String,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlugAvailabilityResponse {
    pub available: bool,
}

// Prompts

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPromptsResponse {
    pub prompts: Vec<Prompt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SubmitPromptRequest {
    #[validate(length(min = 1, message = "Prompt ID is required"))]
    pub id: String,
    #[serde(default)]
    pub values: Map<String, Value>,
    #[serde(rename = "runID")]
    #[validate(length(min = 1, message = "Run ID is required"))]
    pub run_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CreatePromptRequest {
    #[serde(rename = "runID")]
    #[validate(length(min = 1, message = "Run ID is required"))]
    pub run_id: String,
    #[serde(default)]
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptIdResponse {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPromptResponse {
    pub prompt: Prompt,
}

// Users

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdQuery {
    #[serde(rename = "userID")]
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub email: String,
    pub name: String,
    #[serde(rename = "avatarURL")]
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetUserResponse {
    pub user: User,
}

// Dev listing

/// Tasks and views defined in one entrypoint file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntrypointUsage {
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub views: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevListResponse {
    pub entrypoints: BTreeMap<String, EntrypointUsage>,
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Endpoints used by the local studio UI

use ap_api_contract::{CreateRunRequest, CreateRunResponse, DevListResponse, TaskEntry};
use axum::{
    Json,
    extract::{Path, State},
};

use crate::ServerResult;
use crate::error::ServerError;
use crate::state::AppState;

/// Entrypoints under the dev root with the tasks and views they define
pub async fn list_entrypoints(State(state): State<AppState>) -> Json<DevListResponse> {
    let entrypoints = state.registry.entrypoints(&state.config.root_dir).await;
    Json(DevListResponse { entrypoints })
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ServerResult<Json<TaskEntry>> {
    state
        .registry
        .task(&slug)
        .await
        .map(Json)
        .ok_or(ServerError::TaskNotRegistered(slug))
}

/// Pre-allocate a run so log listeners can attach before execution
pub async fn create_run(
    State(state): State<AppState>,
    Json(request): Json<CreateRunRequest>,
) -> ServerResult<Json<CreateRunResponse>> {
    let run = state.dispatcher.create_run(request).await?;
    Ok(Json(CreateRunResponse { run_id: run.run_id }))
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Run query endpoints

use ap_api_contract::{
    GetDescendantsResponse, GetOutputsResponse, IdQuery, ListRunsQuery, ListRunsResponse, Run,
    RunIdQuery, RunWithTaskResponse,
};
use axum::{
    Json,
    extract::{Query, State},
};
use validator::Validate;

use crate::ServerResult;
use crate::error::ServerError;
use crate::state::AppState;

async fn find_run(state: &AppState, run_id: &str) -> ServerResult<Run> {
    state
        .runs
        .get(run_id)
        .await
        .ok_or_else(|| ServerError::RunNotFound(run_id.to_string()))
}

pub async fn get_run(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> ServerResult<Json<Run>> {
    query.validate()?;
    Ok(Json(find_run(&state, &query.id).await?))
}

/// Runs of a task, most recent first
pub async fn list_runs(
    State(state): State<AppState>,
    Query(query): Query<ListRunsQuery>,
) -> ServerResult<Json<ListRunsResponse>> {
    query.validate()?;
    Ok(Json(ListRunsResponse {
        runs: state.runs.history(&query.task_slug).await,
    }))
}

pub async fn get_outputs(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> ServerResult<Json<GetOutputsResponse>> {
    query.validate()?;
    let run = find_run(&state, &query.id).await?;
    Ok(Json(GetOutputsResponse { output: run.outputs }))
}

/// Run together with the registered task it belongs to
pub async fn get_run_with_task(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> ServerResult<Json<RunWithTaskResponse>> {
    query.validate()?;
    let run = find_run(&state, &query.id).await?;
    let task = state.registry.task(&run.task_slug).await;
    Ok(Json(RunWithTaskResponse { run, task }))
}

pub async fn get_descendants(
    State(state): State<AppState>,
    Query(query): Query<RunIdQuery>,
) -> ServerResult<Json<GetDescendantsResponse>> {
    query.validate()?;
    Ok(Json(GetDescendantsResponse {
        descendants: state.runs.descendants(&query.run_id).await,
    }))
}

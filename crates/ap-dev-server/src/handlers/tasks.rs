// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Task execution and metadata endpoints

use ap_api_contract::{EntityMetadata, ExecuteTaskRequest, Run, SlugQuery, task_id, view_id};
use axum::{
    Json,
    extract::{Query, State},
};

use validator::Validate;

use crate::ServerResult;
use crate::state::AppState;

/// Execute a task and return the finished run.
///
/// A failed execution still answers 200; the failure is in the run status.
pub async fn execute_task(
    State(state): State<AppState>,
    Json(request): Json<ExecuteTaskRequest>,
) -> ServerResult<Json<Run>> {
    let run = state.dispatcher.execute(request).await?;
    Ok(Json(run))
}

pub async fn get_task_metadata(Query(query): Query<SlugQuery>) -> ServerResult<Json<EntityMetadata>> {
    query.validate()?;
    Ok(Json(EntityMetadata {
        id: task_id(&query.slug),
        slug: query.slug,
    }))
}

pub async fn get_view(Query(query): Query<SlugQuery>) -> ServerResult<Json<EntityMetadata>> {
    query.validate()?;
    Ok(Json(EntityMetadata {
        id: view_id(&query.slug),
        slug: query.slug,
    }))
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Prompt endpoints

use ap_api_contract::{
    CreatePromptRequest, GetPromptResponse, IdQuery, ListPromptsResponse, PromptIdResponse,
    RunIdQuery, SubmitPromptRequest,
};
use axum::{
    Json,
    extract::{Query, State},
};

use validator::Validate;

use crate::ServerResult;
use crate::state::AppState;

pub async fn list_prompts(
    State(state): State<AppState>,
    Query(query): Query<RunIdQuery>,
) -> ServerResult<Json<ListPromptsResponse>> {
    query.validate()?;
    let prompts = state.prompts.list(&query.run_id).await?;
    Ok(Json(ListPromptsResponse { prompts }))
}

pub async fn submit_prompt(
    State(state): State<AppState>,
    Json(request): Json<SubmitPromptRequest>,
) -> ServerResult<Json<PromptIdResponse>> {
    let prompt = state.prompts.submit(request).await?;
    Ok(Json(PromptIdResponse { id: prompt.id }))
}

pub async fn create_prompt(
    State(state): State<AppState>,
    Json(request): Json<CreatePromptRequest>,
) -> ServerResult<Json<PromptIdResponse>> {
    let prompt = state.prompts.create(request).await?;
    Ok(Json(PromptIdResponse { id: prompt.id }))
}

pub async fn get_prompt(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> ServerResult<Json<GetPromptResponse>> {
    query.validate()?;
    let prompt = state.prompts.get(&query.id).await?;
    Ok(Json(GetPromptResponse { prompt }))
}

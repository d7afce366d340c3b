// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Resource management endpoints
//!
//! Writes go to the dev config file. Reads see the merged local and remote
//! set, with secret fields blanked.

use ap_api_contract::validation::{
    validate_create_resource_request, validate_delete_resource_request,
    validate_update_resource_request,
};
use ap_api_contract::{
    CreateResourceRequest, DeleteResourceRequest, ListResourcesResponse, MergedResource,
    ResourceConfig, ResourceIdResponse, ResourceKind, ResourceResponse, SlugAvailabilityQuery,
    SlugAvailabilityResponse, SlugQuery, UpdateResourceRequest,
};
use axum::{
    Json,
    extract::{Query, State},
};
use serde_json::{Value, json};
use tracing::info;
use validator::Validate;

use crate::ServerResult;
use crate::error::ServerError;
use crate::state::AppState;

fn decode_config(kind: &str, resource: Value) -> ServerResult<ResourceConfig> {
    let kind: ResourceKind = kind.parse()?;
    Ok(ResourceConfig::decode(kind, resource)?)
}

fn redacted(entry: MergedResource) -> MergedResource {
    MergedResource {
        resource: entry.resource.redacted(),
        remote: entry.remote,
    }
}

pub async fn create_resource(
    State(state): State<AppState>,
    Json(request): Json<CreateResourceRequest>,
) -> ServerResult<Json<ResourceIdResponse>> {
    validate_create_resource_request(&request)?;
    let config = decode_config(&request.kind, request.resource)?;
    let resource = state
        .dev_config
        .create_resource(&request.name, request.slug.as_deref(), config)
        .await?;

    info!(id = %resource.id, slug = %resource.slug, kind = %resource.kind(), "created resource");
    Ok(Json(ResourceIdResponse {
        resource_id: resource.id,
    }))
}

pub async fn update_resource(
    State(state): State<AppState>,
    Json(request): Json<UpdateResourceRequest>,
) -> ServerResult<Json<ResourceIdResponse>> {
    validate_update_resource_request(&request)?;
    let config = decode_config(&request.kind, request.resource)?;
    let resource = state
        .dev_config
        .update_resource(&request.id, &request.slug, &request.name, config)
        .await?;

    info!(previous_id = %request.id, id = %resource.id, slug = %resource.slug, "updated resource");
    Ok(Json(ResourceIdResponse {
        resource_id: resource.id,
    }))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    Json(request): Json<DeleteResourceRequest>,
) -> ServerResult<Json<Value>> {
    validate_delete_resource_request(&request)?;
    let removed = state.dev_config.delete_resource(&request.id).await?;
    info!(id = %removed.id, slug = %removed.slug, "deleted resource");
    Ok(Json(json!({})))
}

pub async fn get_resource(
    State(state): State<AppState>,
    Query(query): Query<SlugQuery>,
) -> ServerResult<Json<ResourceResponse>> {
    query.validate()?;
    let mut merged = state.merger.merged().await?;
    let entry = merged
        .remove(&query.slug)
        .ok_or(ServerError::ResourceNotFound(query.slug))?;
    Ok(Json(ResourceResponse {
        resource: redacted(entry),
    }))
}

/// Merged resources, ordered by slug
pub async fn list_resources(
    State(state): State<AppState>,
) -> ServerResult<Json<ListResourcesResponse>> {
    let merged = state.merger.merged().await?;
    Ok(Json(ListResourcesResponse {
        resources: merged.into_values().map(redacted).collect(),
    }))
}

/// A slug is available when no local resource uses it, or only the one being edited.
pub async fn is_slug_available(
    State(state): State<AppState>,
    Query(query): Query<SlugAvailabilityQuery>,
) -> Json<SlugAvailabilityResponse> {
    let config = state.dev_config.snapshot().await;
    let available = match config.resource(&query.slug) {
        None => true,
        Some(existing) => query.id.as_deref() == Some(existing.id.as_str()),
    };
    Json(SlugAvailabilityResponse { available })
}

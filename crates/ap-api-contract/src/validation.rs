// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Validation helpers for request bodies

use validator::Validate;

use crate::error::ApiContractError;
use crate::slug::is_valid_slug;
use crate::types::*;

pub fn validate_execute_request(request: &ExecuteTaskRequest) -> Result<(), ApiContractError> {
    request.validate()?;
    Ok(())
}

pub fn validate_create_run_request(request: &CreateRunRequest) -> Result<(), ApiContractError> {
    request.validate()?;
    Ok(())
}

/// An explicit slug must already be in slug form.
pub fn validate_create_resource_request(
    request: &CreateResourceRequest,
) -> Result<(), ApiContractError> {
    request.validate()?;
    if let Some(slug) = request.slug.as_deref().filter(|s| !s.is_empty()) {
        validate_slug(slug)?;
    }
    Ok(())
}

pub fn validate_update_resource_request(
    request: &UpdateResourceRequest,
) -> Result<(), ApiContractError> {
    request.validate()?;
    validate_slug(&request.slug)
}

pub fn validate_delete_resource_request(
    request: &DeleteResourceRequest,
) -> Result<(), ApiContractError> {
    request.validate()?;
    Ok(())
}

pub fn validate_submit_prompt_request(
    request: &SubmitPromptRequest,
) -> Result<(), ApiContractError> {
    request.validate()?;
    Ok(())
}

pub fn validate_create_prompt_request(
    request: &CreatePromptRequest,
) -> Result<(), ApiContractError> {
    request.validate()?;
    Ok(())
}

pub fn validate_slug(slug: &str) -> Result<(), ApiContractError> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(ApiContractError::InvalidSlug(slug.to_string()))
    }
}

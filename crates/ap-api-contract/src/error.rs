// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for contract parsing and validation

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiContractError {
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown resource kind: {0}")]
    UnknownResourceKind(String),

    #[error("Resource is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Cannot change resource kind from {existing} to {incoming}")]
    KindMismatch { existing: String, incoming: String },

    #[error("Invalid resource ID: {0}")]
    InvalidResourceId(String),

    #[error("Invalid slug '{0}': use lowercase letters, digits and underscores")]
    InvalidSlug(String),
}

/// Problem+JSON error response format as per RFC 7807
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub detail: String,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub errors: HashMap<String, Vec<String>>,
}

impl ProblemDetails {
    /// Collect per-field messages from validator output.
    pub fn field_errors(errors: &validator::ValidationErrors) -> HashMap<String, Vec<String>> {
        errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|err| match &err.message {
                        Some(message) => message.to_string(),
                        None => err.code.to_string(),
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect()
    }
}

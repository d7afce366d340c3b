// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Server error types and handling

use ap_api_contract::{ApiContractError, ProblemDetails};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::dev_config::DevConfigError;
use crate::resources::ResourceError;
use crate::store::RunStoreError;

/// Server result type
pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Task with slug {0} is not registered locally")]
    TaskNotRegistered(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("prompt does not exist")]
    PromptNotFound(String),

    #[error("{0}")]
    Contract(#[from] ApiContractError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    DevConfig(DevConfigError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    fn problem(kind: &str, title: &str, status: StatusCode, detail: String) -> ProblemDetails {
        ProblemDetails {
            problem_type: format!("https://docs.airplane.dev/errors/{kind}"),
            title: title.to_string(),
            status: Some(status.as_u16()),
            detail,
            errors: Default::default(),
        }
    }

    /// Convert error to Problem+JSON response
    pub fn to_problem(&self) -> ProblemDetails {
        let detail = self.to_string();
        match self {
            ServerError::RunNotFound(_) => {
                Self::problem("not-found", "Run Not Found", StatusCode::NOT_FOUND, detail)
            }
            ServerError::TaskNotRegistered(_) => {
                Self::problem("not-found", "Task Not Found", StatusCode::NOT_FOUND, detail)
            }
            ServerError::ResourceNotFound(_) => {
                Self::problem("not-found", "Resource Not Found", StatusCode::NOT_FOUND, detail)
            }
            ServerError::PromptNotFound(_) => {
                Self::problem("not-found", "Prompt Not Found", StatusCode::NOT_FOUND, detail)
            }
            ServerError::Contract(ApiContractError::Validation(errors)) => {
                let mut problem = Self::problem(
                    "validation",
                    "Validation Error",
                    StatusCode::BAD_REQUEST,
                    "Request validation failed".to_string(),
                );
                problem.errors = ProblemDetails::field_errors(errors);
                problem
            }
            ServerError::Contract(_) => {
                Self::problem("bad-request", "Bad Request", StatusCode::BAD_REQUEST, detail)
            }
            ServerError::Conflict(_) => {
                Self::problem("conflict", "Conflict", StatusCode::CONFLICT, detail)
            }
            ServerError::DevConfig(_) => Self::problem(
                "dev-config",
                "Dev Config Error",
                StatusCode::INTERNAL_SERVER_ERROR,
                detail,
            ),
            ServerError::Resource(ResourceError::Remote(_)) => Self::problem(
                "upstream",
                "Remote Environment Error",
                StatusCode::BAD_GATEWAY,
                detail,
            ),
            ServerError::Resource(_) => {
                Self::problem("not-found", "Resource Not Found", StatusCode::NOT_FOUND, detail)
            }
            ServerError::Internal(_) => Self::problem(
                "internal",
                "Internal Server Error",
                StatusCode::INTERNAL_SERVER_ERROR,
                detail,
            ),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let problem = self.to_problem();
        let status = StatusCode::from_u16(problem.status.unwrap_or(500))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(problem)).into_response()
    }
}

impl From<RunStoreError> for ServerError {
    fn from(err: RunStoreError) -> Self {
        match err {
            RunStoreError::NotFound(id) => ServerError::RunNotFound(id),
        }
    }
}

/// Config errors that describe a request problem keep their request status.
impl From<DevConfigError> for ServerError {
    fn from(err: DevConfigError) -> Self {
        match err {
            DevConfigError::SlugTaken(_) => ServerError::Conflict(err.to_string()),
            DevConfigError::ResourceNotFound(_) => ServerError::ResourceNotFound(err.to_string()),
            DevConfigError::Contract(inner) => ServerError::Contract(inner),
            other => ServerError::DevConfig(other),
        }
    }
}

impl From<validator::ValidationErrors> for ServerError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServerError::Contract(ApiContractError::Validation(err))
    }
}

/// Convert any error to ServerError
impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::Internal(format!("{err:#}"))
    }
}

/// Convert IO errors
impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Internal(format!("IO error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_errors_map_to_404() {
        let problem = ServerError::RunNotFound("run1".into()).to_problem();
        assert_eq!(problem.status, Some(404));
        assert_eq!(problem.detail, "Run not found: run1");

        let problem = ServerError::PromptNotFound("pmt1".into()).to_problem();
        assert_eq!(problem.detail, "prompt does not exist");
    }

    #[test]
    fn slug_conflicts_become_409() {
        let err: ServerError = DevConfigError::SlugTaken("db".into()).into();
        let problem = err.to_problem();
        assert_eq!(problem.status, Some(409));
        assert_eq!(problem.detail, "Conflict: Resource with slug db already exists");
    }

    #[test]
    fn validation_errors_list_fields() {
        use validator::Validate;
        let request = ap_api_contract::CreateRunRequest {
            task_slug: String::new(),
        };
        let err: ServerError = request.validate().unwrap_err().into();
        let problem = err.to_problem();
        assert_eq!(problem.status, Some(400));
        assert_eq!(problem.errors["task_slug"], vec!["Task slug is required"]);
    }

    #[test]
    fn remote_failures_are_bad_gateway() {
        let err: ServerError = ResourceError::Remote(anyhow::anyhow!("timeout")).into();
        assert_eq!(err.to_problem().status, Some(502));
    }
}

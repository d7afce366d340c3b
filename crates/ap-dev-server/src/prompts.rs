// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Prompts: pausing a run until a user submits values

use std::sync::Arc;

use ap_api_contract::validation::{validate_create_prompt_request, validate_submit_prompt_request};
use ap_api_contract::{CreatePromptRequest, Prompt, SubmitPromptRequest};
use chrono::Utc;
use tracing::info;

use crate::dispatcher::generate_id;
use crate::error::{ServerError, ServerResult};
use crate::store::RunStore;

const PROMPT_ID_PREFIX: &str = "pmt";

pub struct PromptService {
    runs: Arc<RunStore>,
    user_id: String,
}

impl PromptService {
    pub fn new(runs: Arc<RunStore>, user_id: impl Into<String>) -> Self {
        Self {
            runs,
            user_id: user_id.into(),
        }
    }

    /// Prompts of a run in creation order.
    pub async fn list(&self, run_id: &str) -> ServerResult<Vec<Prompt>> {
        let run = self
            .runs
            .get(run_id)
            .await
            .ok_or_else(|| ServerError::RunNotFound(run_id.to_string()))?;
        Ok(run.prompts)
    }

    pub async fn get(&self, prompt_id: &str) -> ServerResult<Prompt> {
        self.runs
            .find_prompt(prompt_id)
            .await
            .ok_or_else(|| ServerError::PromptNotFound(prompt_id.to_string()))
    }

    /// Open a prompt on a run; the run waits for user input until it is submitted.
    pub async fn create(&self, request: CreatePromptRequest) -> ServerResult<Prompt> {
        validate_create_prompt_request(&request)?;
        let prompt = Prompt {
            id: generate_id(PROMPT_ID_PREFIX),
            run_id: request.run_id.clone(),
            schema: request.schema,
            values: Default::default(),
            created_at: Utc::now(),
            submitted_at: None,
            submitted_by: None,
        };

        let created = prompt.clone();
        self.runs
            .update(&request.run_id, move |run| {
                run.prompts.push(created);
                run.refresh_waiting_for_user();
                Ok::<(), ServerError>(())
            })
            .await?;

        info!(run_id = %request.run_id, prompt_id = %prompt.id, "prompt created");
        Ok(prompt)
    }

    /// Record submitted values. Resubmitting overwrites the earlier values.
    pub async fn submit(&self, request: SubmitPromptRequest) -> ServerResult<Prompt> {
        validate_submit_prompt_request(&request)?;
        let now = Utc::now();
        let user_id = self.user_id.clone();
        let prompt_id = request.id.clone();
        let values = request.values;

        let run = self
            .runs
            .update(&request.run_id, |run| {
                let prompt = run
                    .prompts
                    .iter_mut()
                    .find(|prompt| prompt.id == prompt_id)
                    .ok_or_else(|| ServerError::PromptNotFound(prompt_id.clone()))?;
                prompt.values = values;
                prompt.submitted_at = Some(now);
                prompt.submitted_by = Some(user_id);
                run.refresh_waiting_for_user();
                Ok::<(), ServerError>(())
            })
            .await?;

        info!(run_id = %request.run_id, prompt_id = %request.id, "prompt submitted");
        run.prompts
            .into_iter()
            .find(|prompt| prompt.id == request.id)
            .ok_or(ServerError::PromptNotFound(request.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ap_api_contract::Run;
    use serde_json::{Map, json};

    async fn service_with_run() -> (PromptService, Arc<RunStore>) {
        let runs = Arc::new(RunStore::new());
        runs.add("my_task", Run::new("run1", "my_task", "usr-local")).await;
        (PromptService::new(Arc::clone(&runs), "usr-local"), runs)
    }

    fn values(v: serde_json::Value) -> Map<String, serde_json::Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn create_marks_run_waiting() {
        let (prompts, runs) = service_with_run().await;
        let prompt = prompts
            .create(CreatePromptRequest {
                run_id: "run1".into(),
                schema: json!({"parameters": []}),
            })
            .await
            .unwrap();

        assert!(prompt.id.starts_with("pmt"));
        assert!(runs.get("run1").await.unwrap().is_waiting_for_user);
        assert_eq!(prompts.get(&prompt.id).await.unwrap(), prompt);
        assert_eq!(prompts.list("run1").await.unwrap(), vec![prompt]);
    }

    #[tokio::test]
    async fn submit_records_values_and_clears_waiting() {
        let (prompts, runs) = service_with_run().await;
        let prompt = prompts
            .create(CreatePromptRequest {
                run_id: "run1".into(),
                schema: json!({}),
            })
            .await
            .unwrap();

        let submitted = prompts
            .submit(SubmitPromptRequest {
                id: prompt.id.clone(),
                values: values(json!({"approve": true})),
                run_id: "run1".into(),
            })
            .await
            .unwrap();

        assert_eq!(submitted.values["approve"], json!(true));
        assert_eq!(submitted.submitted_by.as_deref(), Some("usr-local"));
        assert!(submitted.submitted_at.is_some());
        assert!(!runs.get("run1").await.unwrap().is_waiting_for_user);
    }

    #[tokio::test]
    async fn submit_to_unknown_prompt_leaves_run_untouched() {
        let (prompts, runs) = service_with_run().await;
        let before = runs.get("run1").await.unwrap();

        let err = prompts
            .submit(SubmitPromptRequest {
                id: "pmtmissing".into(),
                values: Map::new(),
                run_id: "run1".into(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "prompt does not exist");
        assert_eq!(runs.get("run1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn unknown_run_is_not_found() {
        let (prompts, _) = service_with_run().await;
        assert!(matches!(prompts.list("nope").await, Err(ServerError::RunNotFound(_))));
        let err = prompts
            .create(CreatePromptRequest {
                run_id: "nope".into(),
                schema: json!({}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::RunNotFound(_)));
    }

    #[tokio::test]
    async fn waiting_stays_set_while_any_prompt_is_open() {
        let (prompts, runs) = service_with_run().await;
        let first = prompts
            .create(CreatePromptRequest {
                run_id: "run1".into(),
                schema: json!({}),
            })
            .await
            .unwrap();
        prompts
            .create(CreatePromptRequest {
                run_id: "run1".into(),
                schema: json!({}),
            })
            .await
            .unwrap();

        prompts
            .submit(SubmitPromptRequest {
                id: first.id,
                values: Map::new(),
                run_id: "run1".into(),
            })
            .await
            .unwrap();
        assert!(runs.get("run1").await.unwrap().is_waiting_for_user);
    }
}

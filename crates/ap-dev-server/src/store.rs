// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory run store
//!
//! Runs live for the lifetime of the process. Each run owns a [`LogBroker`]
//! that survives overwrites of the run record, so listeners attached to a
//! pre-allocated run keep receiving lines once execution starts.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use ap_api_contract::{Prompt, Run};
use tokio::sync::RwLock;

use crate::logs::LogBroker;

#[derive(Debug, thiserror::Error)]
pub enum RunStoreError {
    #[error("Run not found: {0}")]
    NotFound(String),
}

struct RunRecord {
    run: Run,
    logs: Arc<LogBroker>,
}

#[derive(Default)]
struct Inner {
    runs: HashMap<String, RunRecord>,
    /// Run IDs per task slug, in insertion order.
    by_slug: HashMap<String, Vec<String>>,
}

#[derive(Default)]
pub struct RunStore {
    inner: RwLock<Inner>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `run`, replacing any record with the same ID.
    ///
    /// The existing log broker is kept on overwrite. Returns the broker for the run.
    pub async fn add(&self, task_slug: &str, run: Run) -> Arc<LogBroker> {
        let mut inner = self.inner.write().await;
        let run_id = run.run_id.clone();

        let logs = match inner.runs.remove(&run_id) {
            Some(previous) => {
                let old_slug = previous.run.task_slug.clone();
                if old_slug != task_slug {
                    if let Some(ids) = inner.by_slug.get_mut(&old_slug) {
                        ids.retain(|id| id != &run_id);
                    }
                }
                previous.logs
            }
            None => Arc::new(LogBroker::new()),
        };

        let ids = inner.by_slug.entry(task_slug.to_string()).or_default();
        if !ids.contains(&run_id) {
            ids.push(run_id.clone());
        }

        let mut run = run;
        run.task_slug = task_slug.to_string();
        inner.runs.insert(run_id, RunRecord { run, logs: Arc::clone(&logs) });
        logs
    }

    pub async fn get(&self, run_id: &str) -> Option<Run> {
        self.inner.read().await.runs.get(run_id).map(|record| record.run.clone())
    }

    pub async fn log_broker(&self, run_id: &str) -> Option<Arc<LogBroker>> {
        self.inner.read().await.runs.get(run_id).map(|record| Arc::clone(&record.logs))
    }

    /// Apply `mutate` to the run under the write lock.
    ///
    /// The mutator works on a copy that is only committed when it returns `Ok`,
    /// so a rejected mutation leaves the stored run untouched.
    pub async fn update<F, E>(&self, run_id: &str, mutate: F) -> Result<Run, E>
    where
        F: FnOnce(&mut Run) -> Result<(), E>,
        E: From<RunStoreError>,
    {
        let mut inner = self.inner.write().await;
        let record = inner
            .runs
            .get_mut(run_id)
            .ok_or_else(|| RunStoreError::NotFound(run_id.to_string()))?;

        let mut draft = record.run.clone();
        mutate(&mut draft)?;
        // ID and slug index stay consistent regardless of what the mutator did.
        draft.run_id = record.run.run_id.clone();
        draft.task_slug = record.run.task_slug.clone();
        record.run = draft.clone();
        Ok(draft)
    }

    /// Runs for `task_slug`, most recent first.
    pub async fn history(&self, task_slug: &str) -> Vec<Run> {
        let inner = self.inner.read().await;
        let mut runs: Vec<Run> = inner
            .by_slug
            .get(task_slug)
            .map(|ids| {
                ids.iter()
                    .rev()
                    .filter_map(|id| inner.runs.get(id))
                    .map(|record| record.run.clone())
                    .collect()
            })
            .unwrap_or_default();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs
    }

    /// Every run whose parent chain includes `run_id`, breadth first.
    pub async fn descendants(&self, run_id: &str) -> Vec<Run> {
        let inner = self.inner.read().await;

        let mut children: HashMap<&str, Vec<&Run>> = HashMap::new();
        for record in inner.runs.values() {
            if let Some(parent) = record.run.parent_id.as_deref() {
                children.entry(parent).or_default().push(&record.run);
            }
        }
        for siblings in children.values_mut() {
            siblings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.run_id.cmp(&b.run_id)));
        }

        let mut seen: HashSet<&str> = HashSet::from([run_id]);
        let mut queue: VecDeque<&str> = VecDeque::from([run_id]);
        let mut found = Vec::new();
        while let Some(current) = queue.pop_front() {
            for child in children.get(current).into_iter().flatten() {
                if seen.insert(child.run_id.as_str()) {
                    queue.push_back(child.run_id.as_str());
                    found.push((*child).clone());
                }
            }
        }
        found
    }

    /// Look a prompt up across all runs.
    pub async fn find_prompt(&self, prompt_id: &str) -> Option<Prompt> {
        let inner = self.inner.read().await;
        inner
            .runs
            .values()
            .flat_map(|record| record.run.prompts.iter())
            .find(|prompt| prompt.id == prompt_id)
            .cloned()
    }

    /// Number of runs per task slug.
    pub async fn counts(&self) -> BTreeMap<String, usize> {
        let inner = self.inner.read().await;
        inner.by_slug.iter().map(|(slug, ids)| (slug.clone(), ids.len())).collect()
    }
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Tasks and views known to the dev server
//!
//! Entries come from definition discovery, which runs outside this crate and
//! hands over a [`RegistrySnapshot`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use ap_api_contract::{EntrypointUsage, RegistrySnapshot, TaskEntry, ViewEntry};
use tokio::sync::RwLock;

/// Slug prefix reserved for platform-provided tasks.
pub const BUILTIN_PREFIX: &str = "airplane:";

pub fn is_builtin(slug: &str) -> bool {
    slug.starts_with(BUILTIN_PREFIX)
}

#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<BTreeMap<String, TaskEntry>>,
    views: RwLock<BTreeMap<String, ViewEntry>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Self {
        Self {
            tasks: RwLock::new(snapshot.tasks.into_iter().map(|t| (t.slug.clone(), t)).collect()),
            views: RwLock::new(snapshot.views.into_iter().map(|v| (v.slug.clone(), v)).collect()),
        }
    }

    /// Load a YAML snapshot written by definition discovery.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading task registry {}", path.display()))?;
        let snapshot: RegistrySnapshot = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing task registry {}", path.display()))?;
        tracing::info!(
            tasks = snapshot.tasks.len(),
            views = snapshot.views.len(),
            "loaded task registry"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub async fn register_task(&self, task: TaskEntry) {
        self.tasks.write().await.insert(task.slug.clone(), task);
    }

    pub async fn task(&self, slug: &str) -> Option<TaskEntry> {
        self.tasks.read().await.get(slug).cloned()
    }

    /// Entrypoints relative to `root_dir`, with the tasks and views defined in each.
    pub async fn entrypoints(&self, root_dir: &Path) -> BTreeMap<String, EntrypointUsage> {
        let mut usage: BTreeMap<String, EntrypointUsage> = BTreeMap::new();
        for task in self.tasks.read().await.values() {
            let key = relative_entrypoint(root_dir, &task.entrypoint);
            usage.entry(key).or_default().tasks.push(task.slug.clone());
        }
        for view in self.views.read().await.values() {
            let key = relative_entrypoint(root_dir, &view.entrypoint);
            usage.entry(key).or_default().views.push(view.slug.clone());
        }
        usage
    }
}

fn relative_entrypoint(root_dir: &Path, entrypoint: &str) -> String {
    let path = PathBuf::from(entrypoint);
    path.strip_prefix(root_dir)
        .unwrap_or(path.as_path())
        .to_string_lossy()
        .into_owned()
}

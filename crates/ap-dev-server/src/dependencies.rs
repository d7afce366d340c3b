// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Dependency wiring for the dev server

use std::sync::Arc;

use anyhow::Result;

use crate::command_executor::CommandExecutor;
use crate::config::ServerConfig;
use crate::dev_config::DevConfigStore;
use crate::dispatcher::Dispatcher;
use crate::executor::Executor;
use crate::prompts::PromptService;
use crate::registry::TaskRegistry;
use crate::resources::{NoRemoteResources, RemoteResources, ResourceMerger};
use crate::state::AppState;
use crate::store::RunStore;

/// Builder for the pieces that differ between the binary and tests
pub struct ServerDependencies {
    config: ServerConfig,
    registry: Arc<TaskRegistry>,
    executor: Arc<dyn Executor>,
    remote: Arc<dyn RemoteResources>,
}

impl ServerDependencies {
    /// Local processes, no remote environment, no registered tasks.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            registry: Arc::new(TaskRegistry::new()),
            executor: Arc::new(CommandExecutor::new()),
            remote: Arc::new(NoRemoteResources),
        }
    }

    pub fn with_registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteResources>) -> Self {
        self.remote = remote;
        self
    }

    /// Load the dev config file and wire the services together.
    pub async fn build(self) -> Result<DefaultServerDependencies> {
        let config = self.config;
        let dev_config = Arc::new(DevConfigStore::load(&config.dev_config_path).await?);
        let runs = Arc::new(RunStore::new());
        let merger = Arc::new(ResourceMerger::new(
            Arc::clone(&dev_config),
            self.remote,
            config.env.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&runs),
            Arc::clone(&self.registry),
            Arc::clone(&merger),
            Arc::clone(&dev_config),
            self.executor,
            config.clone(),
        ));
        let prompts = Arc::new(PromptService::new(Arc::clone(&runs), config.user_id.clone()));

        let state = AppState {
            config,
            runs,
            registry: self.registry,
            dev_config,
            merger,
            dispatcher,
            prompts,
        };
        Ok(DefaultServerDependencies { state })
    }
}

/// Default dependency set used by [`crate::Server::new`]
pub struct DefaultServerDependencies {
    state: AppState,
}

impl DefaultServerDependencies {
    pub async fn new(config: ServerConfig) -> Result<Self> {
        ServerDependencies::new(config).build().await
    }

    /// Consume the dependency builder and return the resulting app state
    pub fn into_state(self) -> AppState {
        self.state
    }
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Server state management

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::dev_config::DevConfigStore;
use crate::dispatcher::Dispatcher;
use crate::prompts::PromptService;
use crate::registry::TaskRegistry;
use crate::resources::ResourceMerger;
use crate::store::RunStore;

/// Shared server state
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,

    /// Runs and their log brokers
    pub runs: Arc<RunStore>,

    /// Tasks and views discovered under the dev root
    pub registry: Arc<TaskRegistry>,

    /// Local resources and config variables
    pub dev_config: Arc<DevConfigStore>,

    pub merger: Arc<ResourceMerger>,
    pub dispatcher: Arc<Dispatcher>,
    pub prompts: Arc<PromptService>,
}

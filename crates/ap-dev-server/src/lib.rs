// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Local development server
//!
//! Emulates the parts of the platform API that tasks, SDKs and the studio UI
//! talk to while a developer runs tasks on their own machine: task
//! execution, run queries, resources, prompts and log streaming.

pub mod command_executor;
pub mod config;
pub mod dependencies;
pub mod dev_config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod logs;
pub mod prompts;
pub mod registry;
pub mod resources;
pub mod server;
pub mod state;
pub mod store;

pub use config::{EnvironmentConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use server::Server;

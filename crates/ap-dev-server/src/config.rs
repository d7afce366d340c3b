// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;

/// Environment ID used when no remote environment is selected.
pub const LOCAL_ENV_ID: &str = "local";

/// Dev config file name looked up in the dev root.
pub const DEV_CONFIG_FILE_NAME: &str = "airplane.dev.yaml";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,

    /// Directory holding task and view definitions
    pub root_dir: PathBuf,

    /// Dev config file with local resources and config variables
    pub dev_config_path: PathBuf,

    /// Environment remote resources are pulled from
    pub env: EnvironmentConfig,

    /// Identity recorded as creator of runs and submitter of prompts
    pub user_id: String,

    /// Enable permissive CORS headers so a browser studio can call in
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let root_dir = PathBuf::from(".");
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 4000)),
            dev_config_path: root_dir.join(DEV_CONFIG_FILE_NAME),
            root_dir,
            env: EnvironmentConfig::default(),
            user_id: "usr-local".to_string(),
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    /// Base URL tasks use to call back into this server.
    pub fn api_host(&self) -> String {
        format!("http://{}", self.bind_addr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
    pub id: String,
    pub slug: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            id: LOCAL_ENV_ID.to_string(),
            slug: String::new(),
        }
    }
}

impl EnvironmentConfig {
    pub fn is_local(&self) -> bool {
        self.id == LOCAL_ENV_ID
    }

    /// Slug to send to the platform; `None` for the local pseudo-environment.
    pub fn remote_slug(&self) -> Option<&str> {
        if self.is_local() || self.slug.is_empty() {
            None
        } else {
            Some(&self.slug)
        }
    }
}

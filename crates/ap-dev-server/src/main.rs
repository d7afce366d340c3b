// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Local dev server binary

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use ap_dev_server::config::{DEV_CONFIG_FILE_NAME, LOCAL_ENV_ID};
use ap_dev_server::dependencies::ServerDependencies;
use ap_dev_server::dev_config::DevConfigStore;
use ap_dev_server::registry::TaskRegistry;
use ap_dev_server::{EnvironmentConfig, Server, ServerConfig};
use ap_logging::CliLoggingArgs;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address for the server
    #[arg(short, long, env = "AP_DEV_BIND", default_value = "127.0.0.1:4000")]
    bind: SocketAddr,

    /// Directory holding task and view definitions
    #[arg(long, env = "AP_DEV_ROOT", default_value = ".")]
    root: PathBuf,

    /// Dev config file [default: <root>/airplane.dev.yaml]
    #[arg(long, env = "AP_DEV_CONFIG")]
    config_path: Option<PathBuf>,

    /// Task registry snapshot produced by definition discovery
    #[arg(long, env = "AP_DEV_REGISTRY")]
    registry: Option<PathBuf>,

    /// Environment to pull remote resources from
    #[arg(long, env = "AP_DEV_ENV_ID", default_value = LOCAL_ENV_ID)]
    env_id: String,

    /// Slug of the remote environment
    #[arg(long, env = "AP_DEV_ENV_SLUG", default_value = "")]
    env_slug: String,

    /// User recorded as creator of runs
    #[arg(long, env = "AP_DEV_USER_ID", default_value = "usr-local")]
    user_id: String,

    /// Restrict CORS to the studio origin
    #[arg(long)]
    no_cors: bool,

    #[command(flatten)]
    logging: CliLoggingArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Edit the dev config file instead of serving
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Set a config variable
    SetVar { name: String, value: String },
    /// Remove a config variable
    RemoveVar { name: String },
}

async fn edit_config(path: PathBuf, command: ConfigCommand) -> anyhow::Result<()> {
    let store = DevConfigStore::load(&path)
        .await
        .with_context(|| format!("loading dev config {}", path.display()))?;
    match command {
        ConfigCommand::SetVar { name, value } => {
            store.set_config_var(&name, &value).await?;
            tracing::info!(name = %name, path = %path.display(), "set config variable");
        }
        ConfigCommand::RemoveVar { name } => match store.remove_config_var(&name).await? {
            Some(_) => tracing::info!(name = %name, path = %path.display(), "removed config variable"),
            None => tracing::warn!(name = %name, path = %path.display(), "config variable not set"),
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    args.logging.clone().init("ap-dev-server")?;

    let config = ServerConfig {
        bind_addr: args.bind,
        dev_config_path: args
            .config_path
            .clone()
            .unwrap_or_else(|| args.root.join(DEV_CONFIG_FILE_NAME)),
        root_dir: args.root.clone(),
        env: EnvironmentConfig {
            id: args.env_id.clone(),
            slug: args.env_slug.clone(),
        },
        user_id: args.user_id.clone(),
        enable_cors: !args.no_cors,
    };

    if let Some(Command::Config(command)) = args.command {
        return edit_config(config.dev_config_path, command).await;
    }

    let registry = match &args.registry {
        Some(path) => TaskRegistry::load(path).await?,
        None => TaskRegistry::new(),
    };

    tracing::info!(env = %config.env.id, dev_config = %config.dev_config_path.display(), "starting dev server");

    let state = ServerDependencies::new(config.clone())
        .with_registry(registry)
        .build()
        .await
        .context("loading dev config")?
        .into_state();

    Server::with_state(config, state)
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

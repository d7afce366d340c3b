// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Merging local and remote resources
//!
//! The effective resource set is the dev config file's resources, plus the
//! selected remote environment's resources for slugs not defined locally,
//! plus the built-in Slack resource when nothing else uses its slug.

use std::collections::BTreeMap;
use std::sync::Arc;

use ap_api_contract::{MergedResource, Resource, ResourceConfig, SlackConfig};
use async_trait::async_trait;
use tracing::debug;

use crate::config::EnvironmentConfig;
use crate::dev_config::DevConfigStore;

pub const SLACK_RESOURCE_ID: &str = "res00000000zteamslack";
pub const SLACK_RESOURCE_SLUG: &str = "team_slack";

/// Platform-side resources for an environment
#[async_trait]
pub trait RemoteResources: Send + Sync {
    /// Resources of the environment, secrets omitted.
    async fn list_resources(&self, env_slug: Option<String>) -> anyhow::Result<Vec<Resource>>;

    /// One resource including its secrets.
    async fn get_resource_with_credentials(
        &self,
        id: String,
        env_slug: Option<String>,
    ) -> anyhow::Result<Resource>;
}

/// Used when the dev server runs without platform access.
pub struct NoRemoteResources;

#[async_trait]
impl RemoteResources for NoRemoteResources {
    async fn list_resources(&self, _env_slug: Option<String>) -> anyhow::Result<Vec<Resource>> {
        Ok(Vec::new())
    }

    async fn get_resource_with_credentials(
        &self,
        id: String,
        _env_slug: Option<String>,
    ) -> anyhow::Result<Resource> {
        anyhow::bail!("resource {id} is not available without a remote environment")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Cannot find resource with slug {slug} in {}", searched_in(.searched_remote))]
    SlugNotFound { slug: String, searched_remote: bool },

    #[error("Cannot find resource with ID {0}")]
    IdNotFound(String),

    #[error("Failed to fetch remote resources: {0}")]
    Remote(#[source] anyhow::Error),
}

fn searched_in(searched_remote: &bool) -> &'static str {
    if *searched_remote {
        "dev config file or remotely"
    } else {
        "dev config file"
    }
}

pub fn slack_resource() -> Resource {
    Resource {
        id: SLACK_RESOURCE_ID.to_string(),
        slug: SLACK_RESOURCE_SLUG.to_string(),
        name: "Slack".to_string(),
        config: ResourceConfig::Slack(SlackConfig {}),
    }
}

/// Combine resource lists. Local entries win slug conflicts.
pub fn merge(local: Vec<Resource>, remote: Vec<Resource>) -> BTreeMap<String, MergedResource> {
    let mut merged = BTreeMap::new();
    for resource in local {
        merged.insert(resource.slug.clone(), MergedResource { resource, remote: false });
    }
    for resource in remote {
        merged
            .entry(resource.slug.clone())
            .or_insert(MergedResource { resource, remote: true });
    }
    merged
        .entry(SLACK_RESOURCE_SLUG.to_string())
        .or_insert_with(|| MergedResource {
            resource: slack_resource(),
            remote: true,
        });
    merged
}

pub struct ResourceMerger {
    dev_config: Arc<DevConfigStore>,
    remote: Arc<dyn RemoteResources>,
    env: EnvironmentConfig,
}

impl ResourceMerger {
    pub fn new(
        dev_config: Arc<DevConfigStore>,
        remote: Arc<dyn RemoteResources>,
        env: EnvironmentConfig,
    ) -> Self {
        Self { dev_config, remote, env }
    }

    /// Current slug to resource mapping.
    pub async fn merged(&self) -> Result<BTreeMap<String, MergedResource>, ResourceError> {
        let local = self.dev_config.resources().await;
        let remote = if self.env.is_local() {
            Vec::new()
        } else {
            self.remote
                .list_resources(self.env_slug())
                .await
                .map_err(ResourceError::Remote)?
        };
        debug!(local = local.len(), remote = remote.len(), "merging resources");
        Ok(merge(local, remote))
    }

    /// Bind each alias to the resource its slug names.
    pub async fn resolve_attachments(
        &self,
        attachments: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, Resource>, ResourceError> {
        if attachments.is_empty() {
            return Ok(BTreeMap::new());
        }
        let merged = self.merged().await?;
        let mut bound = BTreeMap::new();
        for (alias, slug) in attachments {
            let entry = merged.get(slug).ok_or_else(|| ResourceError::SlugNotFound {
                slug: slug.clone(),
                searched_remote: !self.env.is_local(),
            })?;
            bound.insert(alias.clone(), self.with_credentials(entry).await?);
        }
        Ok(bound)
    }

    /// Bindings for a built-in task.
    ///
    /// Without overrides every merged resource is bound under its own slug.
    /// Overrides map an alias to a resource ID.
    pub async fn resolve_builtin(
        &self,
        overrides: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, Resource>, ResourceError> {
        let merged = self.merged().await?;
        let mut bound = BTreeMap::new();
        if overrides.is_empty() {
            for (slug, entry) in &merged {
                bound.insert(slug.clone(), self.with_credentials(entry).await?);
            }
            return Ok(bound);
        }

        for (alias, id) in overrides {
            let entry = merged
                .values()
                .find(|entry| &entry.resource.id == id)
                .ok_or_else(|| ResourceError::IdNotFound(id.clone()))?;
            bound.insert(alias.clone(), self.with_credentials(entry).await?);
        }
        Ok(bound)
    }

    // Listed remote resources omit secrets; fetch the full record before handing
    // it to a task. The synthetic Slack entry has nothing to fetch.
    async fn with_credentials(&self, entry: &MergedResource) -> Result<Resource, ResourceError> {
        if !entry.remote || self.env.is_local() || entry.resource.id == SLACK_RESOURCE_ID {
            return Ok(entry.resource.clone());
        }
        self.remote
            .get_resource_with_credentials(entry.resource.id.clone(), self.env_slug())
            .await
            .map_err(ResourceError::Remote)
    }

    fn env_slug(&self) -> Option<String> {
        self.env.remote_slug().map(str::to_string)
    }
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Dev config file: local resources and config variables
//!
//! Every mutation rewrites the whole file. Mutations are serialised by an
//! async mutex held across the read-modify-write, and in-memory state is only
//! replaced once the write succeeded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ap_api_contract::{Resource, ResourceConfig, slug_from_resource_id, unique_slug};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum DevConfigError {
    #[error("Failed to read dev config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse dev config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Failed to write dev config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize dev config: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Resource with slug {0} already exists")]
    SlugTaken(String),

    #[error("Resource with ID {0} does not exist")]
    ResourceNotFound(String),

    #[error(transparent)]
    Contract(#[from] ap_api_contract::ApiContractError),
}

/// Contents of the dev config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevConfig {
    #[serde(rename = "configVars", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config_vars: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,
}

impl DevConfig {
    pub fn resource(&self, slug: &str) -> Option<&Resource> {
        self.resources.iter().find(|resource| resource.slug == slug)
    }

    /// Look a resource up by ID. IDs derived from a slug also match by slug.
    pub fn resource_by_id(&self, id: &str) -> Option<&Resource> {
        self.position(id).map(|index| &self.resources[index])
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.resources.iter().position(|resource| resource.id == id).or_else(|| {
            let slug = slug_from_resource_id(id).ok()?;
            self.resources.iter().position(|resource| resource.slug == slug)
        })
    }

    /// Add a resource. Without an explicit slug one is generated from `name`.
    pub fn create_resource(
        &mut self,
        name: &str,
        slug: Option<&str>,
        config: ResourceConfig,
    ) -> Result<Resource, DevConfigError> {
        let slug = match slug.filter(|slug| !slug.is_empty()) {
            Some(slug) if self.resource(slug).is_some() => {
                return Err(DevConfigError::SlugTaken(slug.to_string()));
            }
            Some(slug) => slug.to_string(),
            None => unique_slug(name, |candidate| self.resource(candidate).is_some()),
        };
        let resource = Resource::new(slug, name, config);
        self.resources.push(resource.clone());
        Ok(resource)
    }

    /// Rewrite the resource `id` under `slug`, keeping its position in the file.
    ///
    /// The ID follows the new slug. Secrets left blank in `incoming` keep their
    /// stored values.
    pub fn update_resource(
        &mut self,
        id: &str,
        slug: &str,
        name: &str,
        incoming: ResourceConfig,
    ) -> Result<Resource, DevConfigError> {
        let index = self
            .position(id)
            .ok_or_else(|| DevConfigError::ResourceNotFound(id.to_string()))?;
        let taken = self
            .resources
            .iter()
            .enumerate()
            .any(|(i, resource)| i != index && resource.slug == slug);
        if taken {
            return Err(DevConfigError::SlugTaken(slug.to_string()));
        }

        let mut config = self.resources[index].config.clone();
        config.update(incoming)?;
        let updated = Resource::new(slug, name, config);
        self.resources[index] = updated.clone();
        Ok(updated)
    }

    pub fn delete_resource(&mut self, id: &str) -> Result<Resource, DevConfigError> {
        let index = self
            .position(id)
            .ok_or_else(|| DevConfigError::ResourceNotFound(id.to_string()))?;
        Ok(self.resources.remove(index))
    }

    /// Insert or replace by slug, keeping file order stable.
    pub fn set_resource(&mut self, resource: Resource) {
        match self.resources.iter_mut().find(|existing| existing.slug == resource.slug) {
            Some(existing) => *existing = resource,
            None => self.resources.push(resource),
        }
    }

    pub fn remove_resource(&mut self, slug: &str) -> Option<Resource> {
        let index = self.resources.iter().position(|resource| resource.slug == slug)?;
        Some(self.resources.remove(index))
    }
}

pub struct DevConfigStore {
    path: PathBuf,
    config: Mutex<DevConfig>,
}

impl DevConfigStore {
    /// Read `path`. A missing file is an empty config.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, DevConfigError> {
        let path = path.into();
        let config = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => DevConfig::default(),
            Ok(contents) => serde_yaml::from_str(&contents).map_err(|source| DevConfigError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "dev config file not found, starting empty");
                DevConfig::default()
            }
            Err(source) => return Err(DevConfigError::Read { path, source }),
        };

        info!(
            path = %path.display(),
            resources = config.resources.len(),
            config_vars = config.config_vars.len(),
            "loaded dev config"
        );
        Ok(Self::new(path, config))
    }

    pub fn new(path: impl Into<PathBuf>, config: DevConfig) -> Self {
        Self {
            path: path.into(),
            config: Mutex::new(config),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> DevConfig {
        self.config.lock().await.clone()
    }

    pub async fn resources(&self) -> Vec<Resource> {
        self.config.lock().await.resources.clone()
    }

    pub async fn config_vars(&self) -> BTreeMap<String, String> {
        self.config.lock().await.config_vars.clone()
    }

    /// Run `apply` against a copy of the config, persist it, then commit it.
    pub async fn mutate<T, F>(&self, apply: F) -> Result<T, DevConfigError>
    where
        F: FnOnce(&mut DevConfig) -> Result<T, DevConfigError>,
    {
        let mut config = self.config.lock().await;
        let mut draft = config.clone();
        let value = apply(&mut draft)?;
        write_config(&self.path, &draft).await?;
        *config = draft;
        Ok(value)
    }

    pub async fn set_resource(&self, resource: Resource) -> Result<(), DevConfigError> {
        self.mutate(|config| {
            config.set_resource(resource);
            Ok(())
        })
        .await
    }

    pub async fn remove_resource(&self, slug: &str) -> Result<Option<Resource>, DevConfigError> {
        self.mutate(|config| Ok(config.remove_resource(slug))).await
    }

    pub async fn create_resource(
        &self,
        name: &str,
        slug: Option<&str>,
        config: ResourceConfig,
    ) -> Result<Resource, DevConfigError> {
        self.mutate(|dev| dev.create_resource(name, slug, config)).await
    }

    pub async fn update_resource(
        &self,
        id: &str,
        slug: &str,
        name: &str,
        incoming: ResourceConfig,
    ) -> Result<Resource, DevConfigError> {
        self.mutate(|dev| dev.update_resource(id, slug, name, incoming)).await
    }

    pub async fn delete_resource(&self, id: &str) -> Result<Resource, DevConfigError> {
        self.mutate(|dev| dev.delete_resource(id)).await
    }

    pub async fn set_config_var(&self, name: &str, value: &str) -> Result<(), DevConfigError> {
        self.mutate(|config| {
            config.config_vars.insert(name.to_string(), value.to_string());
            Ok(())
        })
        .await
    }

    pub async fn remove_config_var(&self, name: &str) -> Result<Option<String>, DevConfigError> {
        self.mutate(|config| Ok(config.config_vars.remove(name))).await
    }
}

async fn write_config(path: &Path, config: &DevConfig) -> Result<(), DevConfigError> {
    let contents = serde_yaml::to_string(config)?;
    let write_err = |source| DevConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let existed = tokio::fs::try_exists(path).await.map_err(write_err)?;
    tokio::fs::write(path, contents).await.map_err(write_err)?;

    if !existed {
        set_new_file_permissions(path).await.map_err(write_err)?;
    }

    debug!(path = %path.display(), "wrote dev config");
    Ok(())
}

#[cfg(unix)]
async fn set_new_file_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).await
}

#[cfg(not(unix))]
async fn set_new_file_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Resource kinds and their configurations
//!
//! Resources travel as flat objects: `id`, `slug`, `name` and `kind` sit next
//! to the kind-specific fields. Decoding reads the envelope first and then
//! decodes the remaining fields with the schema selected by `kind`.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ApiContractError;
use crate::slug::resource_id;

/// Supported resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Postgres,
    Mysql,
    Sqlserver,
    Redshift,
    Snowflake,
    Bigquery,
    Mongodb,
    Rest,
    Graphql,
    Slack,
    Smtp,
    Sendgrid,
    Mailgun,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 13] = [
        ResourceKind::Postgres,
        ResourceKind::Mysql,
        ResourceKind::Sqlserver,
        ResourceKind::Redshift,
        ResourceKind::Snowflake,
        ResourceKind::Bigquery,
        ResourceKind::Mongodb,
        ResourceKind::Rest,
        ResourceKind::Graphql,
        ResourceKind::Slack,
        ResourceKind::Smtp,
        ResourceKind::Sendgrid,
        ResourceKind::Mailgun,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Postgres => "postgres",
            ResourceKind::Mysql => "mysql",
            ResourceKind::Sqlserver => "sqlserver",
            ResourceKind::Redshift => "redshift",
            ResourceKind::Snowflake => "snowflake",
            ResourceKind::Bigquery => "bigquery",
            ResourceKind::Mongodb => "mongodb",
            ResourceKind::Rest => "rest",
            ResourceKind::Graphql => "graphql",
            ResourceKind::Slack => "slack",
            ResourceKind::Smtp => "smtp",
            ResourceKind::Sendgrid => "sendgrid",
            ResourceKind::Mailgun => "mailgun",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = ApiContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ApiContractError::UnknownResourceKind(s.to_string()))
    }
}

/// Per-kind handling of secret fields.
pub trait KindConfig: Serialize + DeserializeOwned {
    /// Fill secrets left blank in `self` from the previously stored value.
    fn keep_secrets(&mut self, previous: &Self);

    /// Blank every secret field.
    fn redact(&mut self);
}

fn keep_secret(incoming: &mut String, previous: &str) {
    if incoming.is_empty() {
        *incoming = previous.to_string();
    }
}

/// Shared by postgres, mysql, sqlserver and redshift
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SqlConfig {
    pub host: String,
    pub port: String,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(rename = "disableSSL")]
    pub disable_ssl: bool,
}

impl KindConfig for SqlConfig {
    fn keep_secrets(&mut self, previous: &Self) {
        keep_secret(&mut self.password, &previous.password);
    }

    fn redact(&mut self) {
        self.password.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnowflakeConfig {
    pub account: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    pub role: String,
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl KindConfig for SnowflakeConfig {
    fn keep_secrets(&mut self, previous: &Self) {
        keep_secret(&mut self.password, &previous.password);
    }

    fn redact(&mut self) {
        self.password.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BigQueryConfig {
    #[serde(rename = "projectID")]
    pub project_id: String,
    pub location: String,
    pub data_set: String,
    /// Service account key, base64 encoded.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub credentials: String,
}

impl KindConfig for BigQueryConfig {
    fn keep_secrets(&mut self, previous: &Self) {
        keep_secret(&mut self.credentials, &previous.credentials);
    }

    fn redact(&mut self) {
        self.credentials.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MongoConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub connection_string: String,
}

impl KindConfig for MongoConfig {
    fn keep_secrets(&mut self, previous: &Self) {
        keep_secret(&mut self.connection_string, &previous.connection_string);
    }

    fn redact(&mut self) {
        self.connection_string.clear();
    }
}

/// Shared by rest and graphql
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    #[serde(rename = "baseURL")]
    pub base_url: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub secret_headers: BTreeMap<String, String>,
}

impl KindConfig for HttpConfig {
    fn keep_secrets(&mut self, previous: &Self) {
        for (name, value) in self.secret_headers.iter_mut() {
            if let Some(old) = previous.secret_headers.get(name) {
                keep_secret(value, old);
            }
        }
    }

    fn redact(&mut self) {
        for value in self.secret_headers.values_mut() {
            value.clear();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlackConfig {}

impl KindConfig for SlackConfig {
    fn keep_secrets(&mut self, _previous: &Self) {}

    fn redact(&mut self) {}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SmtpConfig {
    pub host: String,
    pub port: String,
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl KindConfig for SmtpConfig {
    fn keep_secrets(&mut self, previous: &Self) {
        keep_secret(&mut self.password, &previous.password);
    }

    fn redact(&mut self) {
        self.password.clear();
    }
}

/// Shared by sendgrid and mailgun; `domain` is only meaningful for mailgun.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmailApiConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
}

impl KindConfig for EmailApiConfig {
    fn keep_secrets(&mut self, previous: &Self) {
        keep_secret(&mut self.api_key, &previous.api_key);
    }

    fn redact(&mut self) {
        self.api_key.clear();
    }
}

/// Kind-specific configuration, tagged with `kind` on the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResourceConfig {
    Postgres(SqlConfig),
    Mysql(SqlConfig),
    Sqlserver(SqlConfig),
    Redshift(SqlConfig),
    Snowflake(SnowflakeConfig),
    Bigquery(BigQueryConfig),
    Mongodb(MongoConfig),
    Rest(HttpConfig),
    Graphql(HttpConfig),
    Slack(SlackConfig),
    Smtp(SmtpConfig),
    Sendgrid(EmailApiConfig),
    Mailgun(EmailApiConfig),
}

impl ResourceConfig {
    /// Decode the kind-specific fields of `value` once the kind is known.
    pub fn decode(kind: ResourceKind, value: Value) -> Result<Self, ApiContractError> {
        // Requests may omit the config object entirely.
        let value = if value.is_null() { Value::Object(Default::default()) } else { value };
        let config = match kind {
            ResourceKind::Postgres => ResourceConfig::Postgres(serde_json::from_value(value)?),
            ResourceKind::Mysql => ResourceConfig::Mysql(serde_json::from_value(value)?),
            ResourceKind::Sqlserver => ResourceConfig::Sqlserver(serde_json::from_value(value)?),
            ResourceKind::Redshift => ResourceConfig::Redshift(serde_json::from_value(value)?),
            ResourceKind::Snowflake => ResourceConfig::Snowflake(serde_json::from_value(value)?),
            ResourceKind::Bigquery => ResourceConfig::Bigquery(serde_json::from_value(value)?),
            ResourceKind::Mongodb => ResourceConfig::Mongodb(serde_json::from_value(value)?),
            ResourceKind::Rest => ResourceConfig::Rest(serde_json::from_value(value)?),
            ResourceKind::Graphql => ResourceConfig::Graphql(serde_json::from_value(value)?),
            ResourceKind::Slack => ResourceConfig::Slack(serde_json::from_value(value)?),
            ResourceKind::Smtp => ResourceConfig::Smtp(serde_json::from_value(value)?),
            ResourceKind::Sendgrid => ResourceConfig::Sendgrid(serde_json::from_value(value)?),
            ResourceKind::Mailgun => ResourceConfig::Mailgun(serde_json::from_value(value)?),
        };
        Ok(config)
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceConfig::Postgres(_) => ResourceKind::Postgres,
            ResourceConfig::Mysql(_) => ResourceKind::Mysql,
            ResourceConfig::Sqlserver(_) => ResourceKind::Sqlserver,
            ResourceConfig::Redshift(_) => ResourceKind::Redshift,
            ResourceConfig::Snowflake(_) => ResourceKind::Snowflake,
            ResourceConfig::Bigquery(_) => ResourceKind::Bigquery,
            ResourceConfig::Mongodb(_) => ResourceKind::Mongodb,
            ResourceConfig::Rest(_) => ResourceKind::Rest,
            ResourceConfig::Graphql(_) => ResourceKind::Graphql,
            ResourceConfig::Slack(_) => ResourceKind::Slack,
            ResourceConfig::Smtp(_) => ResourceKind::Smtp,
            ResourceConfig::Sendgrid(_) => ResourceKind::Sendgrid,
            ResourceConfig::Mailgun(_) => ResourceKind::Mailgun,
        }
    }

    /// Replace `self` with `incoming`, keeping stored secrets the caller left blank.
    pub fn update(&mut self, mut incoming: ResourceConfig) -> Result<(), ApiContractError> {
        use ResourceConfig::*;
        match (&mut incoming, &*self) {
            (Postgres(new), Postgres(old))
            | (Mysql(new), Mysql(old))
            | (Sqlserver(new), Sqlserver(old))
            | (Redshift(new), Redshift(old)) => new.keep_secrets(old),
            (Snowflake(new), Snowflake(old)) => new.keep_secrets(old),
            (Bigquery(new), Bigquery(old)) => new.keep_secrets(old),
            (Mongodb(new), Mongodb(old)) => new.keep_secrets(old),
            (Rest(new), Rest(old)) | (Graphql(new), Graphql(old)) => new.keep_secrets(old),
            (Slack(new), Slack(old)) => new.keep_secrets(old),
            (Smtp(new), Smtp(old)) => new.keep_secrets(old),
            (Sendgrid(new), Sendgrid(old)) | (Mailgun(new), Mailgun(old)) => new.keep_secrets(old),
            (new, old) => {
                return Err(ApiContractError::KindMismatch {
                    existing: old.kind().to_string(),
                    incoming: new.kind().to_string(),
                })
            }
        }
        *self = incoming;
        Ok(())
    }

    pub fn redact(&mut self) {
        use ResourceConfig::*;
        match self {
            Postgres(c) | Mysql(c) | Sqlserver(c) | Redshift(c) => c.redact(),
            Snowflake(c) => c.redact(),
            Bigquery(c) => c.redact(),
            Mongodb(c) => c.redact(),
            Rest(c) | Graphql(c) => c.redact(),
            Slack(c) => c.redact(),
            Smtp(c) => c.redact(),
            Sendgrid(c) | Mailgun(c) => c.redact(),
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    kind: Option<String>,
}

/// A resource as stored in the dev config file or returned by the platform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(flatten)]
    pub config: ResourceConfig,
}

impl Resource {
    /// A resource whose ID is derived from its slug.
    pub fn new(slug: impl Into<String>, name: impl Into<String>, config: ResourceConfig) -> Self {
        let slug = slug.into();
        Self {
            id: resource_id(&slug),
            slug,
            name: name.into(),
            config,
        }
    }

    /// Two-phase decode: read the envelope, then the fields for its kind.
    pub fn from_value(value: Value) -> Result<Self, ApiContractError> {
        let envelope: Envelope = serde_json::from_value(value.clone())?;
        let kind = envelope.kind.filter(|k| !k.is_empty()).ok_or(ApiContractError::MissingField("kind"))?;
        let slug = envelope.slug.filter(|s| !s.is_empty()).ok_or(ApiContractError::MissingField("slug"))?;
        let kind: ResourceKind = kind.parse()?;
        let config = ResourceConfig::decode(kind, value)?;

        Ok(Self {
            id: envelope.id.filter(|id| !id.is_empty()).unwrap_or_else(|| resource_id(&slug)),
            name: envelope.name.unwrap_or_else(|| slug.clone()),
            slug,
            config,
        })
    }

    pub fn kind(&self) -> ResourceKind {
        self.config.kind()
    }

    /// Copy with every secret field blanked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.config.redact();
        copy
    }
}

impl<'de> Deserialize<'de> for Resource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Resource::from_value(value).map_err(D::Error::custom)
    }
}

/// A resource in the merged set, tagged with where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedResource {
    #[serde(flatten)]
    pub resource: Resource,
    /// True when fetched from the platform rather than the dev config file.
    pub remote: bool,
}

//! Configuration for the sync subsystem.
//!
//! Loaded from a JSON file; every field has a default so a partial file (or
//! none at all) is valid. `FIELDSYNC_BASE_URL` overrides the remote base URL.

use crate::error::{SyncError, SyncResult};
use fieldsync_types::EntityType;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Environment variable overriding [`RemoteConfig::base_url`].
pub const BASE_URL_ENV: &str = "FIELDSYNC_BASE_URL";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSyncConfig {
    /// SQLite database holding records, the queue and id mappings.
    pub database_path: PathBuf,
    pub remote: RemoteConfig,
    pub connectivity: ConnectivityConfig,
    /// What a facade does when an online mutation fails.
    pub online_failure_policy: OnlineFailurePolicy,
    /// Entity types to serve, with their endpoints and sync dependencies.
    pub entities: Vec<EntityConfig>,
}

impl Default for FieldSyncConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("fieldsync.db"),
            remote: RemoteConfig::default(),
            connectivity: ConnectivityConfig::default(),
            online_failure_policy: OnlineFailurePolicy::default(),
            entities: EntityConfig::defaults(),
        }
    }
}

impl FieldSyncConfig {
    /// Reads a JSON config file, applies environment overrides and validates.
    pub fn load(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config: Self = serde_json::from_str(&raw)
            .map_err(|e| SyncError::Config(format!("cannot parse {}: {e}", path.display())))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies `FIELDSYNC_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.remote.base_url = url.trim().to_string();
            }
        }
    }

    /// Checks the entity list and returns an error describing the first
    /// problem found.
    pub fn validate(&self) -> SyncResult<()> {
        if self.remote.base_url.trim().is_empty() {
            return Err(SyncError::Config("remote.base_url is empty".to_string()));
        }
        if self.remote.request_timeout_secs == 0 {
            return Err(SyncError::Config(
                "remote.request_timeout_secs must be positive".to_string(),
            ));
        }
        self.dependency_order().map(|_| ())
    }

    /// Looks up the entry for one entity type.
    pub fn entity(&self, entity_type: EntityType) -> Option<&EntityConfig> {
        self.entities.iter().find(|e| e.entity_type == entity_type)
    }

    /// Entity types ordered so that every type comes after the types it
    /// depends on. Ties keep configuration order.
    pub fn dependency_order(&self) -> SyncResult<Vec<EntityType>> {
        let deps: Vec<(EntityType, Vec<EntityType>)> = self
            .entities
            .iter()
            .map(|e| (e.entity_type, e.depends_on.clone()))
            .collect();
        dependency_order(&deps)
    }
}

/// Orders `(type, depends_on)` pairs so dependencies come first.
///
/// Fails on duplicate types, unknown dependencies and cycles.
pub fn dependency_order(
    entries: &[(EntityType, Vec<EntityType>)],
) -> SyncResult<Vec<EntityType>> {
    let mut seen = HashSet::new();
    for (entity_type, _) in entries {
        if !seen.insert(*entity_type) {
            return Err(SyncError::Config(format!(
                "entity type {entity_type} configured twice"
            )));
        }
    }

    let mut remaining: HashMap<EntityType, HashSet<EntityType>> = HashMap::new();
    for (entity_type, depends_on) in entries {
        for dep in depends_on {
            if !seen.contains(dep) {
                return Err(SyncError::Config(format!(
                    "{entity_type} depends on unconfigured entity type {dep}"
                )));
            }
            if dep == entity_type {
                return Err(SyncError::Config(format!("{entity_type} depends on itself")));
            }
        }
        remaining.insert(*entity_type, depends_on.iter().copied().collect());
    }

    let mut order = Vec::with_capacity(entries.len());
    while order.len() < entries.len() {
        let next = entries
            .iter()
            .map(|(t, _)| *t)
            .find(|t| !order.contains(t) && remaining.get(t).is_some_and(HashSet::is_empty));

        let Some(next) = next else {
            let stuck: Vec<String> = entries
                .iter()
                .map(|(t, _)| *t)
                .filter(|t| !order.contains(t))
                .map(|t| t.to_string())
                .collect();
            return Err(SyncError::Config(format!(
                "dependency cycle between: {}",
                stuck.join(", ")
            )));
        };

        for deps in remaining.values_mut() {
            deps.remove(&next);
        }
        order.push(next);
    }
    Ok(order)
}

/// Remote service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL; each entity endpoint is appended as a path segment.
    pub base_url: String,
    /// Transport timeout for every remote call.
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Connectivity monitor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// URL probed before declaring the link back online. Without one, the
    /// host's online signal is trusted as-is.
    pub probe_url: Option<String>,
    /// Timeout for a single probe.
    pub probe_timeout_ms: u64,
    /// Poll the probe at this interval when the host gives no signals.
    pub poll_interval_secs: Option<u64>,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_url: None,
            probe_timeout_ms: 3_000,
            poll_interval_secs: None,
        }
    }
}

/// One served entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub entity_type: EntityType,
    /// Path segment under the base URL.
    pub endpoint: String,
    /// Entity types whose pending operations must sync first.
    #[serde(default)]
    pub depends_on: Vec<EntityType>,
}

impl EntityConfig {
    pub fn new(entity_type: EntityType, depends_on: Vec<EntityType>) -> Self {
        Self {
            entity_type,
            endpoint: entity_type.default_endpoint().to_string(),
            depends_on,
        }
    }

    /// Accounts first; contacts and assessments reference accounts;
    /// checklists hang off assessments.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(EntityType::Account, vec![]),
            Self::new(EntityType::Contact, vec![EntityType::Account]),
            Self::new(EntityType::Assessment, vec![EntityType::Account]),
            Self::new(EntityType::Checklist, vec![EntityType::Assessment]),
        ]
    }
}

/// Whether a failed online mutation falls back to the offline path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnlineFailurePolicy {
    /// Return the remote error to the caller.
    #[default]
    Propagate,
    /// Write locally and queue the operation when the failure is transient.
    /// Authorization and validation failures still propagate.
    QueueOffline,
}

impl OnlineFailurePolicy {
    /// Returns true if `error` should be absorbed by queuing the mutation.
    pub fn should_queue(&self, error: &SyncError) -> bool {
        matches!(self, OnlineFailurePolicy::QueueOffline) && error.is_transient()
    }
}

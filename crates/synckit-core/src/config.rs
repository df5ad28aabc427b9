//! Configuration types for the sync framework
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::events::DEFAULT_EVENT_CHANNEL_CAPACITY;
use crate::traits::transport::ResourcePath;

/// Main configuration: collaborators plus every store to build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Transport configuration
    pub transport: TransportConfig,

    /// Snapshot provider configuration
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Settings stores, one per configuration domain
    #[serde(default)]
    pub settings: Vec<SettingsStoreConfig>,

    /// Read-only fetch stores
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,

    /// Event channel settings
    #[serde(default)]
    pub events: EventConfig,
}

impl SyncConfig {
    /// Create a configuration for a transport with no stores
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            snapshot: SnapshotConfig::default(),
            settings: Vec::new(),
            resources: Vec::new(),
            events: EventConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.settings.is_empty() && self.resources.is_empty() {
            return Err(crate::Error::configuration("No stores configured"));
        }

        self.transport.validate()?;
        self.snapshot.validate()?;

        let mut names = std::collections::HashSet::new();
        for store in &self.settings {
            store.validate()?;
            if !names.insert(store.name.as_str()) {
                return Err(crate::Error::configuration(format!(
                    "Duplicate store name: {}",
                    store.name
                )));
            }
        }
        for resource in &self.resources {
            resource.validate()?;
            if !names.insert(resource.operation.as_str()) {
                return Err(crate::Error::configuration(format!(
                    "Duplicate store name: {}",
                    resource.operation
                )));
            }
        }

        Ok(())
    }
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// REST transport over HTTP
    Http {
        /// Base URL the resource paths are appended to
        base_url: String,
        /// Request timeout in seconds
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
        /// Extra headers sent with every request (e.g. a nonce)
        #[serde(default)]
        headers: HashMap<String, String>,
    },

    /// Custom transport
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl TransportConfig {
    /// Validate the transport configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            TransportConfig::Http {
                base_url,
                timeout_secs,
                ..
            } => {
                if base_url.is_empty() {
                    return Err(crate::Error::configuration("HTTP transport base URL cannot be empty"));
                }
                if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
                    return Err(crate::Error::configuration(format!(
                        "HTTP transport base URL must use HTTP or HTTPS scheme. Got: {}",
                        base_url
                    )));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::configuration("HTTP transport timeout must be > 0"));
                }
                Ok(())
            }
            TransportConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::configuration(
                        "Custom transport factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the transport type name
    pub fn type_name(&self) -> &str {
        match self {
            TransportConfig::Http { .. } => "http",
            TransportConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Snapshot provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotConfig {
    /// No pre-seeded values
    #[default]
    None,

    /// Boot data loaded once from a JSON file
    File {
        /// Path to the snapshot file
        path: String,
    },

    /// Custom snapshot provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SnapshotConfig {
    /// Validate the snapshot configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SnapshotConfig::File { path } if path.is_empty() => {
                Err(crate::Error::configuration("Snapshot file path cannot be empty"))
            }
            SnapshotConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::configuration("Custom snapshot factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// Get the snapshot type name, `None` when no snapshot is configured
    pub fn type_name(&self) -> Option<&str> {
        match self {
            SnapshotConfig::None => None,
            SnapshotConfig::File { .. } => Some("file"),
            SnapshotConfig::Custom { factory, .. } => Some(factory),
        }
    }
}

/// What a save sends when no explicit payload is given
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavePayload {
    /// The full working copy
    #[default]
    All,
    /// Only the keys whose working value differs from the baseline
    Changed,
}

/// Settings store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsStoreConfig {
    /// Store name (e.g. "modules/analytics"), used in logs and events
    pub name: String,

    /// The settings resource
    pub path: ResourcePath,

    /// Setting names owned by the current actor
    #[serde(default)]
    pub owned_settings_slugs: Vec<String>,

    /// Payload sent by `save()` without an override
    #[serde(default)]
    pub save_payload: SavePayload,

    /// Named comparison predicate used for change detection
    #[serde(default)]
    pub compare_with: Option<String>,

    /// Operation name for loads, as recorded in the error ledger
    #[serde(default = "default_load_operation")]
    pub load_operation: String,

    /// Operation name for saves, as recorded in the error ledger
    #[serde(default = "default_save_operation")]
    pub save_operation: String,
}

impl SettingsStoreConfig {
    /// Create a settings store configuration with defaults
    pub fn new(name: impl Into<String>, path: ResourcePath) -> Self {
        Self {
            name: name.into(),
            path,
            owned_settings_slugs: Vec::new(),
            save_payload: SavePayload::default(),
            compare_with: None,
            load_operation: default_load_operation(),
            save_operation: default_save_operation(),
        }
    }

    /// Set the owned setting names
    pub fn with_owned_settings_slugs<I, S>(mut self, slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.owned_settings_slugs = slugs.into_iter().map(Into::into).collect();
        self
    }

    /// Set the default save payload
    pub fn with_save_payload(mut self, save_payload: SavePayload) -> Self {
        self.save_payload = save_payload;
        self
    }

    /// Compare settings with a named predicate
    pub fn with_compare_with(mut self, name: impl Into<String>) -> Self {
        self.compare_with = Some(name.into());
        self
    }

    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.is_empty() {
            return Err(crate::Error::configuration("Settings store name cannot be empty"));
        }
        self.path.validate()?;
        if self.load_operation.is_empty() || self.save_operation.is_empty() {
            return Err(crate::Error::configuration(format!(
                "Settings store {} has an empty operation name",
                self.name
            )));
        }
        if self.owned_settings_slugs.iter().any(String::is_empty) {
            return Err(crate::Error::configuration(format!(
                "Settings store {} has an empty owned setting name",
                self.name
            )));
        }
        Ok(())
    }
}

/// Read-only resource configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Operation name (e.g. "getAccounts"), used as store name and ledger key
    pub operation: String,

    /// The remote resource
    pub path: ResourcePath,

    /// Names of the query parameters, in key order
    #[serde(default)]
    pub params: Vec<String>,
}

impl ResourceConfig {
    /// Create a resource configuration
    pub fn new(operation: impl Into<String>, path: ResourcePath) -> Self {
        Self {
            operation: operation.into(),
            path,
            params: Vec::new(),
        }
    }

    /// Set the parameter names
    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the resource configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.operation.is_empty() {
            return Err(crate::Error::configuration("Resource operation cannot be empty"));
        }
        self.path.validate()?;

        let mut seen = std::collections::HashSet::new();
        for param in &self.params {
            if param.is_empty() || !seen.insert(param) {
                return Err(crate::Error::configuration(format!(
                    "Resource {} has an empty or duplicate parameter name",
                    self.operation
                )));
            }
        }
        Ok(())
    }
}

/// Event channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Capacity of each store's event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_load_operation() -> String {
    "getSettings".to_string()
}

fn default_save_operation() -> String {
    "saveSettings".to_string()
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

//! Collaborator registry
//!
//! The registry maps transport and snapshot type names to factories, so the
//! stores named in a [`SyncConfig`] can be built without hardcoding any
//! transport.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use synckit_core::registry::CollaboratorRegistry;
//!
//! let registry = CollaboratorRegistry::with_defaults();
//! synckit_transport_http::register(&registry);
//!
//! let mut stores = registry.build(&config).await?;
//! let analytics = stores.settings("modules/analytics").unwrap();
//! ```
//!
//! ## Registration
//!
//! Transport crates register themselves:
//!
//! ```rust,ignore
//! pub fn register(registry: &CollaboratorRegistry) {
//!     registry.register_transport("http", Box::new(HttpTransportFactory));
//! }
//! ```

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::{SnapshotConfig, SyncConfig, TransportConfig};
use crate::error::{Error, Result};
use crate::events::{EventSink, StoreEvent};
use crate::fetch_store::FetchStore;
use crate::ledger::ErrorLedger;
use crate::settings::SettingsStore;
use crate::snapshot::{FileSnapshotFactory, MemorySnapshotFactory};
use crate::traits::{SnapshotFactory, SnapshotProvider, Transport, TransportFactory};

/// Registry of transport and snapshot factories
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: concurrent lookups, exclusive
/// registration.
#[derive(Default)]
pub struct CollaboratorRegistry {
    /// Registered transport factories
    transports: RwLock<HashMap<String, Arc<dyn TransportFactory>>>,

    /// Registered snapshot factories
    snapshots: RwLock<HashMap<String, Arc<dyn SnapshotFactory>>>,
}

/// Every store built from one [`SyncConfig`]
pub struct SyncStores {
    /// Settings stores by name
    pub settings: HashMap<String, SettingsStore>,

    /// Fetch stores by operation name, decoding to raw JSON
    pub resources: HashMap<String, FetchStore<Value>>,

    /// Ledger shared by the fetch stores
    pub resource_ledger: Arc<ErrorLedger>,

    /// Events of every store
    pub events: mpsc::Receiver<StoreEvent>,
}

impl SyncStores {
    /// Settings store by name
    pub fn settings(&self, name: &str) -> Option<&SettingsStore> {
        self.settings.get(name)
    }

    /// Fetch store by operation name
    pub fn resource(&self, operation: &str) -> Option<&FetchStore<Value>> {
        self.resources.get(operation)
    }
}

impl CollaboratorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in snapshot factories
    ///
    /// Registers `memory` and `file`. Transports live in their own crates and
    /// are never registered here.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_snapshot("memory", Box::new(MemorySnapshotFactory));
        registry.register_snapshot("file", Box::new(FileSnapshotFactory));
        registry
    }

    /// Register a transport factory
    ///
    /// # Parameters
    ///
    /// - `name`: Transport type name (e.g., "http")
    /// - `factory`: Factory object for creating transport instances
    pub fn register_transport(&self, name: impl Into<String>, factory: Box<dyn TransportFactory>) {
        let name = name.into();
        debug!("Registering transport factory '{}'", name);
        self.transports
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Arc::from(factory));
    }

    /// Register a snapshot factory
    ///
    /// # Parameters
    ///
    /// - `name`: Snapshot type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating snapshot providers
    pub fn register_snapshot(&self, name: impl Into<String>, factory: Box<dyn SnapshotFactory>) {
        let name = name.into();
        debug!("Registering snapshot factory '{}'", name);
        self.snapshots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Arc::from(factory));
    }

    /// Create a transport from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn Transport>)`: Created transport
    /// - `Err(Error)`: If the transport type is not registered or creation fails
    pub fn create_transport(&self, config: &TransportConfig) -> Result<Arc<dyn Transport>> {
        let transport_type = config.type_name();

        let factory = self
            .transports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(transport_type)
            .cloned()
            .ok_or_else(|| Error::configuration(format!("Unknown transport type: {}", transport_type)))?;

        factory.create(config)
    }

    /// Create a snapshot provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(None)`: No snapshot configured
    /// - `Ok(Some(provider))`: Created provider
    /// - `Err(Error)`: If the snapshot type is not registered or creation fails
    pub async fn create_snapshot(
        &self,
        config: &SnapshotConfig,
    ) -> Result<Option<Arc<dyn SnapshotProvider>>> {
        let Some(snapshot_type) = config.type_name() else {
            return Ok(None);
        };

        // Clone out of the lock before awaiting
        let factory = self
            .snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(snapshot_type)
            .cloned()
            .ok_or_else(|| Error::configuration(format!("Unknown snapshot type: {}", snapshot_type)))?;

        let config_json = match config {
            SnapshotConfig::Custom { config, .. } => config.clone(),
            other => serde_json::to_value(other)?,
        };

        factory.create(&config_json).await.map(Some)
    }

    /// Build every store a configuration names
    ///
    /// All stores share one transport, one snapshot and one event channel.
    /// Fetch stores share a ledger; each settings store keeps its own, since
    /// every settings store records under the same operation names.
    pub async fn build(&self, config: &SyncConfig) -> Result<SyncStores> {
        config.validate()?;

        let transport = self.create_transport(&config.transport)?;
        let snapshot = self.create_snapshot(&config.snapshot).await?;
        let (events, rx) = EventSink::channel(config.events.channel_capacity);

        let mut settings = HashMap::new();
        for store_config in &config.settings {
            let mut builder = SettingsStore::builder(store_config.clone(), Arc::clone(&transport))
                .events(events.clone());
            if let Some(snapshot) = &snapshot {
                builder = builder.snapshot(Arc::clone(snapshot));
            }
            settings.insert(store_config.name.clone(), builder.build()?);
        }

        let resource_ledger = Arc::new(ErrorLedger::new());
        let mut resources = HashMap::new();
        for resource_config in &config.resources {
            let mut builder = FetchStore::builder(resource_config.clone(), Arc::clone(&transport))
                .ledger(Arc::clone(&resource_ledger))
                .events(events.clone());
            if let Some(snapshot) = &snapshot {
                builder = builder.snapshot(Arc::clone(snapshot));
            }
            resources.insert(resource_config.operation.clone(), builder.build()?);
        }

        info!(
            "Built {} settings store(s) and {} resource store(s) on {} transport",
            settings.len(),
            resources.len(),
            transport.transport_name()
        );

        Ok(SyncStores {
            settings,
            resources,
            resource_ledger,
            events: rx,
        })
    }

    /// List all registered transport types
    pub fn list_transports(&self) -> Vec<String> {
        self.transports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// List all registered snapshot types
    pub fn list_snapshots(&self) -> Vec<String> {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Check if a transport type is registered
    pub fn has_transport(&self, name: &str) -> bool {
        self.transports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Check if a snapshot type is registered
    pub fn has_snapshot(&self, name: &str) -> bool {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}

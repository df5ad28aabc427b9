// # Memory Snapshot
//
// In-memory implementation of SnapshotProvider.
//
// ## Purpose
//
// Holds the values a host injected at boot. Built once with `with(..)` and
// then shared read-only by every store that was handed it.
//
// ## When to Use
//
// - Embedding hosts that already have the boot data in memory
// - Tests
// - As the backing map of `FileSnapshot`

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::key::{Fingerprint, ResourceKey};
use crate::traits::snapshot::{SnapshotFactory, SnapshotProvider};
use crate::traits::transport::ResourcePath;
use crate::Error;

/// In-memory snapshot provider
///
/// # Example
///
/// ```rust
/// use synckit_core::key::ResourceKey;
/// use synckit_core::snapshot::MemorySnapshot;
/// use synckit_core::traits::{ResourcePath, SnapshotProvider};
/// use serde_json::json;
///
/// let settings = ResourcePath::new("modules", "analytics", "settings");
/// let snapshot = MemorySnapshot::new()
///     .with(settings.clone(), ResourceKey::empty(), json!({ "accountID": "12345" }));
///
/// assert!(snapshot.lookup(&settings, &ResourceKey::empty()).is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    resources: HashMap<String, HashMap<Fingerprint, Value>>,
}

impl MemorySnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a seeded value for a resource key
    pub fn with(mut self, resource: ResourcePath, key: ResourceKey, value: Value) -> Self {
        self.insert(&resource, &key, value);
        self
    }

    /// Add a seeded value for a resource key
    pub(crate) fn insert(&mut self, resource: &ResourcePath, key: &ResourceKey, value: Value) {
        self.resources
            .entry(resource.to_string())
            .or_default()
            .insert(key.fingerprint(), value);
    }

    /// Number of seeded values across all resources
    pub fn len(&self) -> usize {
        self.resources.values().map(HashMap::len).sum()
    }

    /// Whether nothing was seeded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotProvider for MemorySnapshot {
    fn lookup(&self, resource: &ResourcePath, key: &ResourceKey) -> Option<Value> {
        self.resources
            .get(&resource.to_string())?
            .get(&key.fingerprint())
            .cloned()
    }
}

/// Factory for an empty memory snapshot
pub struct MemorySnapshotFactory;

#[async_trait::async_trait]
impl SnapshotFactory for MemorySnapshotFactory {
    async fn create(&self, _config: &Value) -> Result<Arc<dyn SnapshotProvider>, Error> {
        Ok(Arc::new(MemorySnapshot::new()))
    }
}

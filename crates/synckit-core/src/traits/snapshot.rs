// # Snapshot Provider Trait
//
// Read-only values the hosting environment placed on the page before the
// stores booted.
//
// ## Purpose
//
// A resolver consults the snapshot before issuing a fetch. A value found for
// the exact `(resource, key)` is accepted as if it had been fetched and no
// network call happens for that key.
//
// ## Rules
//
// - The snapshot is injected at construction, never read from ambient state.
// - Stores never mutate or clear it: other readers of the same snapshot must
//   still see every value after it was consumed.
// - A value for one key says nothing about another key of the same resource.

use crate::key::ResourceKey;
use crate::traits::transport::ResourcePath;
use serde_json::Value;

/// Trait for snapshot provider implementations
///
/// Lookups are synchronous: snapshots are fully loaded before any store reads
/// from them.
pub trait SnapshotProvider: Send + Sync {
    /// Look up the pre-seeded value for a resource key
    ///
    /// # Returns
    ///
    /// - `Some(Value)`: The seeded value (may itself be `null`)
    /// - `None`: Nothing was seeded for this key
    fn lookup(&self, resource: &ResourcePath, key: &ResourceKey) -> Option<Value>;
}

/// Helper trait for constructing snapshot providers from configuration
#[async_trait::async_trait]
pub trait SnapshotFactory: Send + Sync {
    /// Create a SnapshotProvider instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this snapshot provider
    async fn create(
        &self,
        config: &serde_json::Value,
    ) -> Result<std::sync::Arc<dyn SnapshotProvider>, crate::Error>;
}

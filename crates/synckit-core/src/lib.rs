// # synckit-core
//
// Client-side state synchronization for server-owned settings and read-only
// remote resources.
//
// ## Architecture Overview
//
// - **ResourceCache**: per-key entries (value, fetching, resolved, error)
//   and the claim protocol deciding cache / snapshot / single fetch
// - **FetchStore**: cache + resolver bound to one remote read operation
// - **SettingsStore**: working copy over a persisted baseline with diffing,
//   rollback, owned-subset comparison and a save round-trip
// - **ErrorLedger**: (operation, argument fingerprint) -> last error
// - **resilient**: selector wrapper turning failures into fallbacks
// - **Transport** / **SnapshotProvider**: the injected collaborators
// - **CollaboratorRegistry**: factories by type name, builds stores from config
//
// ## Design Principles
//
// 1. **At most one load per key**: concurrent readers share one fetch
// 2. **Reads never fail on remote errors**: errors go to the ledger
// 3. **Caller misuse fails fast**: `Error::InvalidArgument` always propagates
// 4. **No ambient state**: snapshots and transports are injected
// 5. **Library-first**: the CLI is a thin layer over these types

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod fetch_store;
pub mod key;
pub mod ledger;
pub mod registry;
pub mod selector;
pub mod settings;
pub mod snapshot;
pub mod traits;

// Re-export core types for convenience
pub use cache::{ResourceCache, ResourceEntry};
pub use config::{
    EventConfig, ResourceConfig, SavePayload, SettingsStoreConfig, SnapshotConfig, SyncConfig,
    TransportConfig,
};
pub use error::{Error, ErrorPayload, Result};
pub use events::{EventSink, StoreEvent};
pub use fetch_store::FetchStore;
pub use key::{Fingerprint, ResourceKey};
pub use ledger::{ErrorLedger, ErrorRecord};
pub use registry::{CollaboratorRegistry, SyncStores};
pub use selector::resilient;
pub use settings::{LoadPhase, SaveOutcome, SavePhase, Settings, SettingsStore};
pub use snapshot::{FileSnapshot, MemorySnapshot};
pub use traits::{ResourcePath, SnapshotProvider, Transport, TransportResult};

// # File Snapshot
//
// Snapshot provider loaded once from a JSON file written by the host.
//
// ## Availability
//
// A snapshot is available-or-absent, never fatal:
//
// - Missing file: empty snapshot (debug log)
// - Unreadable or corrupt file: empty snapshot (warning)
// - Unknown format version: empty snapshot (warning)
// - Malformed entry: that entry is skipped (warning), the rest are kept
//
// The file is read exactly once; later changes on disk are not observed.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "resources": {
//     "modules/analytics/settings": [
//       { "key": [], "value": { "accountID": "12345" } }
//     ],
//     "modules/analytics/properties": [
//       { "key": ["12345"], "value": [{ "id": "UA-12345-1" }] }
//     ]
//   }
// }
// ```

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::key::ResourceKey;
use crate::snapshot::memory::MemorySnapshot;
use crate::traits::snapshot::{SnapshotFactory, SnapshotProvider};
use crate::traits::transport::ResourcePath;
use crate::Error;

/// Snapshot file format version
const SNAPSHOT_FILE_VERSION: &str = "1.0";

/// Serializable snapshot file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct SnapshotFileFormat {
    version: String,
    #[serde(default)]
    resources: HashMap<String, Vec<SnapshotFileEntry>>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct SnapshotFileEntry {
    #[serde(default)]
    key: ResourceKey,
    value: Value,
}

/// File-backed snapshot provider
///
/// # Example
///
/// ```rust,no_run
/// use synckit_core::snapshot::FileSnapshot;
///
/// #[tokio::main]
/// async fn main() {
///     let snapshot = FileSnapshot::load("/run/dashboard/boot.json").await;
///     println!("{} seeded value(s)", snapshot.len());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
    values: MemorySnapshot,
}

impl FileSnapshot {
    /// Load a snapshot file
    ///
    /// Never fails; see the module docs for how unusable files are treated.
    pub async fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();

        let values = match fs::read_to_string(&path).await {
            Ok(content) => match parse(&content) {
                Ok(values) => {
                    info!("Loaded {} snapshot value(s) from {}", values.len(), path.display());
                    values
                }
                Err(e) => {
                    warn!("Ignoring snapshot file {}: {}", path.display(), e);
                    MemorySnapshot::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No snapshot file at {}", path.display());
                MemorySnapshot::new()
            }
            Err(e) => {
                warn!("Failed to read snapshot file {}: {}", path.display(), e);
                MemorySnapshot::new()
            }
        };

        Self { path, values }
    }

    /// Path the snapshot was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of seeded values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing was seeded
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SnapshotProvider for FileSnapshot {
    fn lookup(&self, resource: &ResourcePath, key: &ResourceKey) -> Option<Value> {
        self.values.lookup(resource, key)
    }
}

/// Parse snapshot file content into a memory snapshot
fn parse(content: &str) -> Result<MemorySnapshot, Error> {
    let file: SnapshotFileFormat = serde_json::from_str(content)?;

    if file.version != SNAPSHOT_FILE_VERSION {
        return Err(Error::snapshot(format!(
            "Unsupported snapshot version {} (expected {})",
            file.version, SNAPSHOT_FILE_VERSION
        )));
    }

    let mut values = MemorySnapshot::new();
    for (resource, entries) in file.resources {
        let Some(path) = parse_resource(&resource) else {
            warn!("Skipping snapshot entries for malformed resource '{}'", resource);
            continue;
        };

        for entry in entries {
            values.insert(&path, &entry.key, entry.value);
        }
    }

    Ok(values)
}

/// Parse `namespace/identifier/datapoint`
fn parse_resource(resource: &str) -> Option<ResourcePath> {
    let mut parts = resource.split('/');
    let path = ResourcePath::new(parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || path.validate().is_err() {
        return None;
    }
    Some(path)
}

/// Factory for creating file snapshots
///
/// Expects the serialized `SnapshotConfig::File` form: `{ "type": "file", "path": ".." }`.
pub struct FileSnapshotFactory;

#[async_trait::async_trait]
impl SnapshotFactory for FileSnapshotFactory {
    async fn create(&self, config: &Value) -> Result<Arc<dyn SnapshotProvider>, Error> {
        let path = config
            .get("path")
            .and_then(Value::as_str)
            .filter(|path| !path.is_empty())
            .ok_or_else(|| Error::configuration("File snapshot requires a non-empty 'path'"))?;

        Ok(Arc::new(FileSnapshot::load(path).await))
    }
}

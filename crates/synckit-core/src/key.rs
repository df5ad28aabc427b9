//! Resource keys and their structural fingerprints
//!
//! A resource is requested with an ordered tuple of JSON arguments. Two
//! tuples that serialize to the same canonical JSON (object keys sorted at
//! every depth) address the same cache slot and the same error record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Ordered argument tuple used to request a resource
///
/// The empty tuple addresses singleton resources such as a module's settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(Vec<Value>);

impl ResourceKey {
    /// Key for a singleton resource
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Key from an argument list
    pub fn new(args: Vec<Value>) -> Self {
        Self(args)
    }

    /// Arguments in order
    pub fn args(&self) -> &[Value] {
        &self.0
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the singleton key
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Structural fingerprint of this key
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.0)
    }
}

impl From<Vec<Value>> for ResourceKey {
    fn from(args: Vec<Value>) -> Self {
        Self(args)
    }
}

impl<const N: usize> From<[Value; N]> for ResourceKey {
    fn from(args: [Value; N]) -> Self {
        Self(args.into())
    }
}

/// Canonical serialization of an argument tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The canonical JSON text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint an argument tuple
pub fn fingerprint(args: &[Value]) -> Fingerprint {
    let canonical = Value::Array(args.iter().map(canonicalize).collect());
    Fingerprint(canonical.to_string())
}

/// Rebuild a value with every object's keys inserted in sorted order
///
/// `serde_json::Map` keeps insertion order when the `preserve_order` feature
/// is unified in by another crate, so sorting is done here rather than relied
/// upon.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut keys: Vec<&String> = object.keys().collect();
            keys.sort();

            let mut sorted = Map::with_capacity(object.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&object[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

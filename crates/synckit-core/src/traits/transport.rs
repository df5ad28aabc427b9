// # Transport Trait
//
// Defines how a store reaches the server.
//
// ## Convention
//
// Every resource is addressed by `(namespace, identifier, datapoint)`:
//
// - reads are idempotent retrievals of that resource with query parameters
// - writes submit a payload shaped `{ "data": { ... } }`
//
// A non-2xx response resolves to an `ErrorPayload` instead of failing the
// call in some other way, so stores can route every failure into the
// error ledger uniformly.
//
// ## Implementations
//
// - HTTP (REST): `synckit-transport-http` crate
// - In-process: anything implementing the trait (tests, embedded hosts)
//
// ## Usage
//
// ```rust,ignore
// use synckit_core::traits::{ResourcePath, Transport};
//
// let path = ResourcePath::new("modules", "analytics", "settings");
// match transport.get(&path, &serde_json::Map::new()).await {
//     Ok(settings) => println!("{settings}"),
//     Err(error) => eprintln!("{} ({:?})", error.message, error.data.status),
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::ErrorPayload;

/// Outcome of a transport call
pub type TransportResult = std::result::Result<Value, ErrorPayload>;

/// Identity of a remote resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourcePath {
    /// Resource namespace (e.g. "core", "modules")
    pub namespace: String,
    /// Resource identifier within the namespace (e.g. "site", "analytics")
    pub identifier: String,
    /// Datapoint of the resource (e.g. "settings", "accounts")
    pub datapoint: String,
}

impl ResourcePath {
    /// Create a resource path
    pub fn new(
        namespace: impl Into<String>,
        identifier: impl Into<String>,
        datapoint: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            identifier: identifier.into(),
            datapoint: datapoint.into(),
        }
    }

    /// Validate that no segment is empty or contains a slash
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (name, segment) in [
            ("namespace", &self.namespace),
            ("identifier", &self.identifier),
            ("datapoint", &self.datapoint),
        ] {
            if segment.is_empty() {
                return Err(crate::Error::configuration(format!(
                    "Resource {} cannot be empty",
                    name
                )));
            }
            if segment.contains('/') {
                return Err(crate::Error::configuration(format!(
                    "Resource {} cannot contain '/': {}",
                    name, segment
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.identifier, self.datapoint)
    }
}

/// Trait for transport implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Contract
///
/// - Exactly one remote call per invocation. Stores own deduplication;
///   transports must not cache or retry.
/// - Never panic on a failed request: every failure, including a request
///   that produced no response at all, is an `Err(ErrorPayload)`.
/// - Never log credentials or header values.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Retrieve a resource
    ///
    /// # Parameters
    ///
    /// - `path`: The resource to read
    /// - `params`: Query parameters derived from the resource key
    ///
    /// # Returns
    ///
    /// - `Ok(Value)`: The response body
    /// - `Err(ErrorPayload)`: Non-2xx response or transport failure
    async fn get(&self, path: &ResourcePath, params: &Map<String, Value>) -> TransportResult;

    /// Submit a payload to a resource
    ///
    /// The transport wraps `data` as `{ "data": data }` on the wire.
    ///
    /// # Returns
    ///
    /// - `Ok(Value)`: The server's canonical response
    /// - `Err(ErrorPayload)`: Non-2xx response or transport failure
    async fn set(&self, path: &ResourcePath, data: &Value) -> TransportResult;

    /// Get the transport name (e.g., "http")
    fn transport_name(&self) -> &'static str;
}

/// Helper trait for constructing transports from configuration
pub trait TransportFactory: Send + Sync {
    /// Create a Transport instance from configuration
    fn create(
        &self,
        config: &crate::config::TransportConfig,
    ) -> Result<std::sync::Arc<dyn Transport>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display() {
        let path = ResourcePath::new("modules", "analytics", "settings");
        assert_eq!(path.to_string(), "modules/analytics/settings");
    }

    #[test]
    fn test_path_validation() {
        assert!(ResourcePath::new("core", "site", "connection").validate().is_ok());
        assert!(ResourcePath::new("", "site", "connection").validate().is_err());
        assert!(ResourcePath::new("core", "si/te", "connection").validate().is_err());
    }
}

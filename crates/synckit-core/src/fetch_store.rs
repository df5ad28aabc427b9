//! Fetch-cache store
//!
//! A [`FetchStore`] binds one remote read operation (e.g. "list accounts for
//! an integration") to a [`ResourceCache`] and the resolver protocol:
//!
//! 1. Check the cache (resolved keys are served as-is, including empty ones)
//! 2. Join an in-flight fetch for the same key
//! 3. Accept a snapshot value for exactly this key
//! 4. Otherwise issue one transport call on a spawned task
//!
//! ## Event Flow
//!
//! ```text
//! resolve(key) ──► claim ──► spawn fetch ──► Transport::get
//!                    │                            │
//!                    │        ┌───────────────────┴──────────┐
//!                    │        ▼                              ▼
//!                    │   decode + hook                ledger.record_error
//!                    │        └──────────┬───────────────────┘
//!                    ▼                   ▼
//!               wait(rx) ◄────── ticket.complete
//! ```
//!
//! Failures never escape: a failed key is resolved with no value, and the
//! error is kept in the [`ErrorLedger`] under `(operation, key)`. There is no
//! automatic retry.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{self, Claim, FetchTicket, ResourceCache, ResourceEntry};
use crate::config::ResourceConfig;
use crate::error::{Error, ErrorPayload, Result};
use crate::events::{EventSink, StoreEvent};
use crate::key::ResourceKey;
use crate::ledger::ErrorLedger;
use crate::traits::{ResourcePath, SnapshotProvider, Transport};

/// Callback run once for every value a store receives, before waiters wake
///
/// A seeded value is handed to the hook while the cache is locked; the hook
/// must not call back into the store.
pub type ReceiveHook<T> = Arc<dyn Fn(&ResourceKey, &T) + Send + Sync>;

/// Cache + resolver for one remote read operation
///
/// Cloning is cheap; clones share the cache, the ledger and the hook.
pub struct FetchStore<T> {
    inner: Arc<FetchInner<T>>,
}

struct FetchInner<T> {
    config: ResourceConfig,
    transport: Arc<dyn Transport>,
    snapshot: Option<Arc<dyn SnapshotProvider>>,
    cache: Arc<ResourceCache<T>>,
    ledger: Arc<ErrorLedger>,
    events: EventSink,
    on_receive: Option<ReceiveHook<T>>,
}

impl<T> Clone for FetchStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for FetchStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchStore")
            .field("operation", &self.inner.config.operation)
            .field("path", &self.inner.config.path)
            .field("transport", &self.inner.transport.transport_name())
            .field("snapshot", &self.inner.snapshot.is_some())
            .finish()
    }
}

/// Builder for [`FetchStore`]
pub struct FetchStoreBuilder<T> {
    config: ResourceConfig,
    transport: Arc<dyn Transport>,
    snapshot: Option<Arc<dyn SnapshotProvider>>,
    ledger: Option<Arc<ErrorLedger>>,
    events: EventSink,
    on_receive: Option<ReceiveHook<T>>,
}

impl<T> FetchStoreBuilder<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Consult a snapshot before fetching
    pub fn snapshot(mut self, snapshot: Arc<dyn SnapshotProvider>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Record errors in a shared ledger instead of a private one
    pub fn ledger(mut self, ledger: Arc<ErrorLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Emit store events to a sink
    pub fn events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Run a callback for every received value
    pub fn on_receive(mut self, hook: ReceiveHook<T>) -> Self {
        self.on_receive = Some(hook);
        self
    }

    /// Validate the configuration and build the store
    pub fn build(self) -> Result<FetchStore<T>> {
        self.config.validate()?;

        Ok(FetchStore {
            inner: Arc::new(FetchInner {
                config: self.config,
                transport: self.transport,
                snapshot: self.snapshot,
                cache: Arc::new(ResourceCache::new()),
                ledger: self.ledger.unwrap_or_default(),
                events: self.events,
                on_receive: self.on_receive,
            }),
        })
    }
}

impl<T> FetchStore<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create a store with a private ledger, no snapshot and no events
    pub fn new(config: ResourceConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::builder(config, transport).build()
    }

    /// Start building a store
    pub fn builder(config: ResourceConfig, transport: Arc<dyn Transport>) -> FetchStoreBuilder<T> {
        FetchStoreBuilder {
            config,
            transport,
            snapshot: None,
            ledger: None,
            events: EventSink::disabled(),
            on_receive: None,
        }
    }

    /// Operation name (ledger key)
    pub fn operation(&self) -> &str {
        &self.inner.config.operation
    }

    /// The remote resource
    pub fn path(&self) -> &ResourcePath {
        &self.inner.config.path
    }

    /// The error ledger this store records into
    pub fn ledger(&self) -> &Arc<ErrorLedger> {
        &self.inner.ledger
    }

    /// Read a key, scheduling resolution if it is not resolved yet
    ///
    /// Returns the value when resolved, `None` while loading or when the
    /// load failed. A snapshot value is returned on the first call. Only an
    /// `InvalidArgument` for a malformed key is returned as an error.
    ///
    /// Scheduling needs a tokio runtime; without one nothing is fetched.
    pub fn read(&self, key: &ResourceKey) -> Result<Option<T>> {
        self.validate_key(key)?;

        match self.claim(key) {
            Claim::Ready => Ok(self.inner.cache.read(key)),
            Claim::Wait(_) => Ok(None),
            Claim::Seeded(value) => Ok(Some(value)),
            Claim::Fetch(ticket, _rx) => {
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(run_fetch(Arc::clone(&self.inner), key.clone(), ticket));
                    }
                    Err(_) => {
                        debug!("No async runtime, not scheduling {} for {}", self.operation(), ticket.fingerprint());
                    }
                }
                Ok(None)
            }
        }
    }

    /// Value for a key without scheduling anything
    pub fn peek(&self, key: &ResourceKey) -> Option<T> {
        self.inner.cache.read(key)
    }

    /// Resolve a key and return its value
    ///
    /// Concurrent calls for the same key share one transport call. Once a key
    /// resolved (with a value or an error), later calls return immediately.
    /// The fetch runs on its own task and completes even if this future is
    /// dropped.
    pub async fn resolve(&self, key: &ResourceKey) -> Result<Option<T>> {
        self.validate_key(key)?;

        match self.claim(key) {
            Claim::Ready => {}
            Claim::Seeded(value) => return Ok(Some(value)),
            Claim::Wait(rx) => cache::wait_for(rx).await,
            Claim::Fetch(ticket, rx) => {
                let task = run_fetch(Arc::clone(&self.inner), key.clone(), ticket);
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(task);
                        cache::wait_for(rx).await;
                    }
                    Err(_) => task.await,
                }
            }
        }

        Ok(self.inner.cache.read(key))
    }

    /// Install a value for a key, resolving it
    pub fn receive(&self, key: &ResourceKey, value: T) -> Result<()> {
        self.validate_key(key)?;
        if let Some(hook) = &self.inner.on_receive {
            hook(key, &value);
        }
        self.inner.cache.receive(key, value);
        Ok(())
    }

    /// Snapshot of the cache entry for a key
    pub fn entry(&self, key: &ResourceKey) -> Option<ResourceEntry<T>> {
        self.inner.cache.entry(key)
    }

    /// Whether a fetch is outstanding for a key
    pub fn is_fetching(&self, key: &ResourceKey) -> bool {
        self.inner.cache.is_fetching(key)
    }

    /// Whether a load attempt completed for a key
    pub fn is_resolved(&self, key: &ResourceKey) -> bool {
        self.inner.cache.is_resolved(key)
    }

    /// Last recorded error for a key
    pub fn error(&self, key: &ResourceKey) -> Option<ErrorPayload> {
        self.inner.ledger.get_error(self.operation(), key.args())
    }

    fn claim(&self, key: &ResourceKey) -> Claim<T> {
        // The hook runs under the cache lock, so no reader sees the key
        // resolved before the hook applied the seeded value
        let claim = self.inner.cache.claim(key, || {
            let value = self.seed(key)?;
            if let Some(hook) = &self.inner.on_receive {
                hook(key, &value);
            }
            Some(value)
        });

        if let Claim::Seeded(_) = &claim {
            debug!("Resolved {} for {} from snapshot", self.operation(), key.fingerprint());
            self.inner.events.emit(StoreEvent::LoadSucceeded {
                operation: self.operation().to_string(),
                fingerprint: key.fingerprint().to_string(),
                from_snapshot: true,
            });
        }

        claim
    }

    fn seed(&self, key: &ResourceKey) -> Option<T> {
        let value = self.inner.snapshot.as_ref()?.lookup(self.path(), key)?;
        match serde_json::from_value(value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring snapshot value for {} ({}): {}", self.path(), key.fingerprint(), e);
                None
            }
        }
    }

    fn validate_key(&self, key: &ResourceKey) -> Result<()> {
        let params = &self.inner.config.params;
        if key.len() != params.len() {
            return Err(Error::invalid_argument(format!(
                "{} expects {} argument(s) ({}), got {}",
                self.operation(),
                params.len(),
                params.join(", "),
                key.len()
            )));
        }

        if let Some((name, _)) = params
            .iter()
            .zip(key.args())
            .find(|(_, arg)| arg.is_null() || arg.as_str().is_some_and(str::is_empty))
        {
            return Err(Error::invalid_argument(format!(
                "{} requires {}",
                self.operation(),
                name
            )));
        }

        Ok(())
    }
}

impl<T> FetchInner<T> {
    fn params_for(&self, key: &ResourceKey) -> Map<String, Value> {
        self.config
            .params
            .iter()
            .cloned()
            .zip(key.args().iter().cloned())
            .collect()
    }
}

/// Perform the single transport call for a claimed key
async fn run_fetch<T>(inner: Arc<FetchInner<T>>, key: ResourceKey, ticket: FetchTicket<T>)
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let operation = inner.config.operation.as_str();
    let fingerprint = ticket.fingerprint().to_string();

    inner.events.emit(StoreEvent::LoadStarted {
        operation: operation.to_string(),
        fingerprint: fingerprint.clone(),
    });
    debug!("Fetching {} for {}", operation, fingerprint);

    let params = inner.params_for(&key);
    let outcome = match inner.transport.get(&inner.config.path, &params).await {
        Ok(body) => serde_json::from_value::<T>(body).map_err(ErrorPayload::invalid_response),
        Err(error) => Err(error),
    };

    match &outcome {
        Ok(value) => {
            inner.ledger.clear_error(operation, key.args());
            if let Some(hook) = &inner.on_receive {
                hook(&key, value);
            }
            info!("Resolved {} for {}", operation, fingerprint);
            inner.events.emit(StoreEvent::LoadSucceeded {
                operation: operation.to_string(),
                fingerprint,
                from_snapshot: false,
            });
        }
        Err(error) => {
            warn!("Failed to resolve {} for {}: {}", operation, fingerprint, error);
            inner.ledger.record_error(operation, key.args(), error.clone());
            inner.events.emit(StoreEvent::LoadFailed {
                operation: operation.to_string(),
                fingerprint,
                error: error.clone(),
            });
        }
    }

    ticket.complete(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MemorySnapshot;
    use crate::traits::TransportResult;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn get(&self, _path: &ResourcePath, params: &Map<String, Value>) -> TransportResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match params.get("accountID").and_then(Value::as_str) {
                Some("missing") => Err(ErrorPayload::new("not_found", "No such account").with_status(404)),
                Some(id) => Ok(json!([{ "id": format!("{}-1", id) }])),
                None => Ok(json!([])),
            }
        }

        async fn set(&self, _path: &ResourcePath, data: &Value) -> TransportResult {
            Ok(data.clone())
        }

        fn transport_name(&self) -> &'static str {
            "echo"
        }
    }

    fn properties() -> ResourceConfig {
        ResourceConfig::new(
            "getProperties",
            ResourcePath::new("modules", "analytics", "properties"),
        )
        .with_params(["accountID"])
    }

    fn transport() -> Arc<EchoTransport> {
        Arc::new(EchoTransport {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_resolve_fetches_once() {
        let transport = transport();
        let store: FetchStore<Value> = FetchStore::new(properties(), transport.clone()).unwrap();
        let key = ResourceKey::from([json!("12345")]);

        let first = store.resolve(&key).await.unwrap();
        let second = store.resolve(&key).await.unwrap();

        assert_eq!(first, Some(json!([{ "id": "12345-1" }])));
        assert_eq!(first, second);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_arity_is_checked() {
        let store: FetchStore<Value> = FetchStore::new(properties(), transport()).unwrap();

        let err = store.resolve(&ResourceKey::empty()).await.unwrap_err();
        assert!(err.is_invalid_argument());

        let err = store.read(&ResourceKey::from([json!("")])).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_failed_load_is_resolved_and_recorded() {
        let transport = transport();
        let store: FetchStore<Value> = FetchStore::new(properties(), transport.clone()).unwrap();
        let key = ResourceKey::from([json!("missing")]);

        assert_eq!(store.resolve(&key).await.unwrap(), None);
        assert!(store.is_resolved(&key));
        assert_eq!(store.error(&key).unwrap().data.status, Some(404));

        // No automatic retry
        assert_eq!(store.resolve(&key).await.unwrap(), None);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_undecodable_response_is_recorded() {
        let transport = transport();
        let store: FetchStore<Vec<String>> = FetchStore::new(properties(), transport).unwrap();
        let key = ResourceKey::from([json!("12345")]);

        assert_eq!(store.resolve(&key).await.unwrap(), None);
        assert_eq!(store.error(&key).unwrap().code, "invalid_response");
    }

    #[tokio::test]
    async fn test_snapshot_is_used_for_matching_key_only() {
        let transport = transport();
        let snapshot = MemorySnapshot::new().with(
            ResourcePath::new("modules", "analytics", "properties"),
            ResourceKey::from([json!("12345")]),
            json!([{ "id": "seeded" }]),
        );
        let store: FetchStore<Value> = FetchStore::builder(properties(), transport.clone())
            .snapshot(Arc::new(snapshot))
            .build()
            .unwrap();

        let seeded = store.read(&ResourceKey::from([json!("12345")])).unwrap();
        assert_eq!(seeded, Some(json!([{ "id": "seeded" }])));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);

        let other = store.resolve(&ResourceKey::from([json!("67890")])).await.unwrap();
        assert_eq!(other, Some(json!([{ "id": "67890-1" }])));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_receive_installs_value() {
        let transport = transport();
        let store: FetchStore<Value> = FetchStore::new(properties(), transport.clone()).unwrap();
        let key = ResourceKey::from([json!("12345")]);

        store.receive(&key, json!([{ "id": "created" }])).unwrap();

        assert_eq!(store.resolve(&key).await.unwrap(), Some(json!([{ "id": "created" }])));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_seed_hook_runs_before_key_is_visible() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Barrier;

        let key = ResourceKey::from([json!("12345")]);
        let snapshot = MemorySnapshot::new().with(
            ResourcePath::new("modules", "analytics", "properties"),
            key.clone(),
            json!([{ "id": "seeded" }]),
        );
        let hook_ran = Arc::new(AtomicBool::new(false));
        let hook_calls = Arc::new(AtomicUsize::new(0));
        let hook: ReceiveHook<Value> = {
            let hook_ran = Arc::clone(&hook_ran);
            let hook_calls = Arc::clone(&hook_calls);
            Arc::new(move |_: &ResourceKey, _: &Value| {
                std::thread::sleep(std::time::Duration::from_millis(5));
                hook_calls.fetch_add(1, Ordering::SeqCst);
                hook_ran.store(true, Ordering::SeqCst);
            })
        };
        let store: FetchStore<Value> = FetchStore::builder(properties(), transport())
            .snapshot(Arc::new(snapshot))
            .on_receive(hook)
            .build()
            .unwrap();

        let barrier = Arc::new(Barrier::new(8));
        let readers: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                let barrier = Arc::clone(&barrier);
                let hook_ran = Arc::clone(&hook_ran);
                std::thread::spawn(move || {
                    barrier.wait();
                    let value = store.read(&key).unwrap();
                    value.is_none() || hook_ran.load(Ordering::SeqCst)
                })
            })
            .collect();

        for reader in readers {
            assert!(reader.join().unwrap(), "value visible before the hook ran");
        }
        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_read_without_runtime_schedules_nothing() {
        let store: FetchStore<Value> = FetchStore::new(properties(), transport()).unwrap();
        let key = ResourceKey::from([json!("12345")]);

        assert_eq!(store.read(&key).unwrap(), None);
        assert!(!store.is_fetching(&key));
        assert!(!store.is_resolved(&key));
    }
}

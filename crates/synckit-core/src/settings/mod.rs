//! Settings sync store
//!
//! A [`SettingsStore`] binds one server-owned settings resource to a locally
//! edited working copy. It is built on a [`FetchStore`] for the singleton
//! load and adds:
//!
//! - a baseline (`saved_settings`) holding the last persisted value
//! - shallow-merge edits, full and per-key rollback
//! - change detection, optionally restricted to the owned subset
//! - a save round-trip that treats the server response as canonical
//!
//! ## State Machines
//!
//! ```text
//! load:  Unloaded ──► Loading ──► Loaded
//! save:  Idle ──► Saving ──► Idle
//! ```
//!
//! The two are independent; a save may be issued while a load is pending.
//!
//! ## Failure Behavior
//!
//! Remote failures never come back as `Err`. A failed load leaves the store
//! loaded-empty with [`load_error`](SettingsStore::load_error) set; a failed
//! save leaves both maps untouched and records the error under the save
//! operation and the payload that was sent. `Err` is reserved for caller
//! misuse and, on the `check_*` accessors, misconfiguration.

mod compare;
mod state;

pub use compare::{builtins, unordered_eq, Comparator, STRICT, UNORDERED_ARRAYS};
pub use state::SettingsState;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{ResourceConfig, SavePayload, SettingsStoreConfig};
use crate::error::{Error, ErrorPayload, Result};
use crate::events::{EventSink, StoreEvent, DEFAULT_EVENT_CHANNEL_CAPACITY};
use crate::fetch_store::{FetchStore, ReceiveHook};
use crate::key::ResourceKey;
use crate::ledger::ErrorLedger;
use crate::selector::resilient;
use crate::traits::{SnapshotProvider, Transport};

/// Settings payload: setting name to value
pub type Settings = Map<String, Value>;

/// Load state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// No load attempt yet
    Unloaded,
    /// The singleton load is in flight
    Loading,
    /// A load attempt completed (possibly with an error)
    Loaded,
}

/// Save state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavePhase {
    /// No save in flight
    Idle,
    /// At least one save is in flight
    Saving,
}

/// Result of a save round-trip
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The server accepted the payload; contains its canonical response
    Saved(Settings),
    /// The server rejected the payload or could not be reached
    Failed(ErrorPayload),
}

impl SaveOutcome {
    /// Whether the save succeeded
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved(_))
    }

    /// The error of a failed save
    pub fn error(&self) -> Option<&ErrorPayload> {
        match self {
            SaveOutcome::Saved(_) => None,
            SaveOutcome::Failed(error) => Some(error),
        }
    }
}

/// Store binding a remote settings resource to local, editable state
///
/// Cloning is cheap; clones share all state.
///
/// # Example
///
/// ```rust,ignore
/// let (store, mut events) = SettingsStore::new(config, transport)?;
///
/// store.load().await?;
/// store.set(json!({ "accountID": "12345" }))?;
/// if store.have_changed(None) {
///     store.save(None).await?;
/// }
/// ```
#[derive(Clone)]
pub struct SettingsStore {
    inner: Arc<SettingsInner>,
}

struct SettingsInner {
    config: SettingsStoreConfig,
    transport: Arc<dyn Transport>,
    loader: FetchStore<Settings>,
    state: Arc<RwLock<SettingsState>>,
    owned: BTreeSet<String>,
    saving: Arc<AtomicUsize>,
    comparators: RwLock<HashMap<String, Comparator>>,
    ledger: Arc<ErrorLedger>,
    events: EventSink,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("name", &self.inner.config.name)
            .field("path", &self.inner.config.path)
            .field("owned", &self.inner.owned)
            .field("load_phase", &self.load_phase())
            .field("save_phase", &self.save_phase())
            .finish()
    }
}

/// Builder for [`SettingsStore`]
pub struct SettingsStoreBuilder {
    config: SettingsStoreConfig,
    transport: Arc<dyn Transport>,
    snapshot: Option<Arc<dyn SnapshotProvider>>,
    ledger: Option<Arc<ErrorLedger>>,
    events: EventSink,
}

impl SettingsStoreBuilder {
    /// Seed the settings from a snapshot
    pub fn snapshot(mut self, snapshot: Arc<dyn SnapshotProvider>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Record errors in a shared ledger
    pub fn ledger(mut self, ledger: Arc<ErrorLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Emit store events to a sink
    pub fn events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Validate the configuration and build the store
    pub fn build(self) -> Result<SettingsStore> {
        self.config.validate()?;

        let ledger = self.ledger.unwrap_or_default();
        let state = Arc::new(RwLock::new(SettingsState::default()));

        let loaded = Arc::clone(&state);
        let hook: ReceiveHook<Settings> = Arc::new(move |_: &ResourceKey, values: &Settings| {
            write(&loaded).receive_loaded(values);
        });

        let resource = ResourceConfig::new(self.config.load_operation.clone(), self.config.path.clone());
        let mut loader = FetchStore::builder(resource, Arc::clone(&self.transport))
            .ledger(Arc::clone(&ledger))
            .events(self.events.clone())
            .on_receive(hook);
        if let Some(snapshot) = self.snapshot {
            loader = loader.snapshot(snapshot);
        }

        let owned = self.config.owned_settings_slugs.iter().cloned().collect();

        Ok(SettingsStore {
            inner: Arc::new(SettingsInner {
                loader: loader.build()?,
                config: self.config,
                transport: self.transport,
                state,
                owned,
                saving: Arc::new(AtomicUsize::new(0)),
                comparators: RwLock::new(compare::builtins()),
                ledger,
                events: self.events,
            }),
        })
    }
}

impl SettingsStore {
    /// Create a settings store with its own event channel
    ///
    /// # Parameters
    ///
    /// - `config`: Store configuration
    /// - `transport`: Transport used for load and save
    ///
    /// # Returns
    ///
    /// A tuple of (store, event_receiver) where event_receiver yields store events
    pub fn new(
        config: SettingsStoreConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<(Self, mpsc::Receiver<StoreEvent>)> {
        let (events, rx) = EventSink::channel(DEFAULT_EVENT_CHANNEL_CAPACITY);
        let store = Self::builder(config, transport).events(events).build()?;
        Ok((store, rx))
    }

    /// Start building a store
    pub fn builder(config: SettingsStoreConfig, transport: Arc<dyn Transport>) -> SettingsStoreBuilder {
        SettingsStoreBuilder {
            config,
            transport,
            snapshot: None,
            ledger: None,
            events: EventSink::disabled(),
        }
    }

    /// Store name
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Store configuration
    pub fn config(&self) -> &SettingsStoreConfig {
        &self.inner.config
    }

    /// The error ledger this store records into
    pub fn ledger(&self) -> &Arc<ErrorLedger> {
        &self.inner.ledger
    }

    /// Setting names owned by the current actor
    pub fn owned_settings_slugs(&self) -> impl Iterator<Item = &str> {
        self.inner.owned.iter().map(String::as_str)
    }

    // --- Reads -------------------------------------------------------------

    /// Working copy of the settings
    ///
    /// Schedules the initial load on first call. Returns `None` until the
    /// load completed, unless the settings were seeded from a snapshot or
    /// edited locally.
    pub fn get_all(&self) -> Option<Settings> {
        self.ensure_loading();
        read(&self.inner.state).settings.clone()
    }

    /// One setting, `Value::Null` when never present
    pub fn get(&self, name: &str) -> Value {
        self.ensure_loading();
        read(&self.inner.state)
            .settings
            .as_ref()
            .and_then(|settings| settings.get(name))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// One setting decoded into `T`; `None` when absent, null, or not a `T`
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        resilient(&self.inner.events, "get_as", None, || self.try_get_as(name))
    }

    /// One setting decoded into `T`, failing when the value is not a `T`
    pub fn try_get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.get(name) {
            Value::Null => Ok(None),
            value => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// The whole working copy decoded into `S`; `None` when not loaded or not an `S`
    pub fn settings_as<S: DeserializeOwned>(&self) -> Option<S> {
        resilient(&self.inner.events, "settings_as", None, || self.try_settings_as())
    }

    /// The whole working copy decoded into `S`, failing when it is not an `S`
    pub fn try_settings_as<S: DeserializeOwned>(&self) -> Result<Option<S>> {
        self.get_all()
            .map(|settings| serde_json::from_value(Value::Object(settings)))
            .transpose()
            .map_err(Error::from)
    }

    /// Baseline, the last value known to be persisted
    pub fn saved_settings(&self) -> Option<Settings> {
        read(&self.inner.state).saved_settings.clone()
    }

    /// Copy of the full state
    pub fn state(&self) -> SettingsState {
        read(&self.inner.state).clone()
    }

    // --- Local edits -------------------------------------------------------

    /// Shallow-merge `partial` into the working copy
    ///
    /// `partial` must be a JSON object; anything else (arrays included) is
    /// `InvalidArgument`.
    pub fn set(&self, partial: Value) -> Result<()> {
        let partial = as_settings("set", partial)?;
        debug!("{}: setting {} value(s) locally", self.name(), partial.len());
        write(&self.inner.state).set(partial);
        Ok(())
    }

    /// Apply server values as a load would
    ///
    /// Resolves the singleton load, so no network load follows.
    pub fn receive_loaded(&self, values: Settings) {
        if let Err(e) = self.inner.loader.receive(&ResourceKey::empty(), values) {
            warn!("{}: failed to receive settings: {}", self.name(), e);
        }
    }

    /// Reset the working copy to the baseline
    pub fn rollback_all(&self) {
        write(&self.inner.state).rollback_all();
    }

    /// Reset one setting to its baseline value
    pub fn rollback_one(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::invalid_argument("rollback_one requires a setting name"));
        }
        write(&self.inner.state).rollback_one(name);
        Ok(())
    }

    // --- Change detection --------------------------------------------------

    /// Register a named comparison predicate
    pub fn register_comparator(&self, name: impl Into<String>, comparator: Comparator) {
        let name = name.into();
        debug!("{}: registering comparator '{}'", self.name(), name);
        self.inner
            .comparators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, comparator);
    }

    /// Whether any of `keys` changed, failing on misconfiguration
    ///
    /// `None` compares every key in either map; `Some(&[])` compares nothing
    /// and is always `false`.
    pub fn check_changed(&self, keys: Option<&[&str]>) -> Result<bool> {
        let equal = self.comparator()?;
        Ok(read(&self.inner.state).have_changed(keys, equal.as_ref()))
    }

    /// Whether any of `keys` changed; `false` if the comparison fails
    pub fn have_changed(&self, keys: Option<&[&str]>) -> bool {
        resilient(&self.inner.events, "have_changed", false, || self.check_changed(keys))
    }

    /// Whether any owned setting changed, failing on misconfiguration
    pub fn check_owned_changed(&self) -> Result<bool> {
        let owned: Vec<&str> = self.owned_settings_slugs().collect();
        self.check_changed(Some(owned.as_slice()))
    }

    /// Whether any owned setting changed; `false` if the comparison fails
    pub fn have_owned_changed(&self) -> bool {
        resilient(&self.inner.events, "have_owned_changed", false, || {
            self.check_owned_changed()
        })
    }

    fn comparator(&self) -> Result<Comparator> {
        let name = self.inner.config.compare_with.as_deref().unwrap_or(STRICT);
        self.inner
            .comparators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| {
                Error::configuration(format!(
                    "{}: unknown comparison predicate '{}'",
                    self.name(),
                    name
                ))
            })
    }

    // --- Status ------------------------------------------------------------

    /// Whether the settings load is in flight
    pub fn is_fetching(&self) -> bool {
        self.inner.loader.is_fetching(&ResourceKey::empty())
    }

    /// Whether at least one save is in flight
    pub fn is_saving(&self) -> bool {
        self.inner.saving.load(Ordering::SeqCst) > 0
    }

    /// Whether a load delivered server values
    ///
    /// Saves never count: only the singleton load (network, snapshot or
    /// `receive_loaded`) resolving with a value does.
    pub fn is_loaded(&self) -> bool {
        self.inner
            .loader
            .entry(&ResourceKey::empty())
            .is_some_and(|entry| entry.resolved && entry.value.is_some())
    }

    /// Current load phase
    pub fn load_phase(&self) -> LoadPhase {
        if self.is_fetching() {
            LoadPhase::Loading
        } else if self.inner.loader.is_resolved(&ResourceKey::empty()) {
            LoadPhase::Loaded
        } else {
            LoadPhase::Unloaded
        }
    }

    /// Current save phase
    pub fn save_phase(&self) -> SavePhase {
        if self.is_saving() {
            SavePhase::Saving
        } else {
            SavePhase::Idle
        }
    }

    /// Error of the last load attempt
    pub fn load_error(&self) -> Option<ErrorPayload> {
        self.inner
            .ledger
            .get_error(&self.inner.config.load_operation, &[])
    }

    /// Error of the last failed save of exactly `payload`
    pub fn save_error(&self, payload: &Value) -> Option<ErrorPayload> {
        self.inner
            .ledger
            .get_error(&self.inner.config.save_operation, std::slice::from_ref(payload))
    }

    /// Whether a save makes sense now: loaded, not saving, something changed
    pub fn can_submit_changes(&self) -> bool {
        resilient(&self.inner.events, "can_submit_changes", false, || {
            Ok(self.is_loaded() && !self.is_saving() && self.check_changed(None)?)
        })
    }

    // --- Round-trips -------------------------------------------------------

    /// Load the settings and return the working copy
    ///
    /// Resolves once; later calls return the current working copy without a
    /// network call. A failed load returns `Ok(None)` unless something was
    /// edited locally; see [`load_error`](Self::load_error).
    pub async fn load(&self) -> Result<Option<Settings>> {
        self.inner.loader.resolve(&ResourceKey::empty()).await?;
        Ok(read(&self.inner.state).settings.clone())
    }

    /// Save settings and reconcile with the server response
    ///
    /// # Parameters
    ///
    /// - `values`: Explicit payload; `None` sends what the store's
    ///   `save_payload` selects (the full working copy or only changed keys)
    ///
    /// # Returns
    ///
    /// - `Ok(SaveOutcome::Saved)`: Response keys replaced the same keys in
    ///   working copy and baseline; omitted keys were left as they were
    /// - `Ok(SaveOutcome::Failed)`: Nothing changed locally; the error is
    ///   recorded for this payload
    /// - `Err`: `values` is not an object, or the store is misconfigured
    ///
    /// The round-trip runs on its own task and completes even if this future
    /// is dropped.
    pub async fn save(&self, values: Option<Value>) -> Result<SaveOutcome> {
        let payload = match values {
            Some(values) => as_settings("save", values)?,
            None => self.default_payload()?,
        };

        let guard = SavingGuard::acquire(&self.inner.saving);
        let task = run_save(Arc::clone(&self.inner), payload, guard);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle
                .spawn(task)
                .await
                .map_err(|e| Error::Other(format!("Save task for {} failed: {}", self.name(), e))),
            Err(_) => Ok(task.await),
        }
    }

    fn default_payload(&self) -> Result<Settings> {
        match self.inner.config.save_payload {
            SavePayload::All => Ok(read(&self.inner.state).settings.clone().unwrap_or_default()),
            SavePayload::Changed => {
                let equal = self.comparator()?;
                Ok(read(&self.inner.state).changed_settings(equal.as_ref()))
            }
        }
    }

    fn ensure_loading(&self) {
        if let Err(e) = self.inner.loader.read(&ResourceKey::empty()) {
            warn!("{}: failed to schedule settings load: {}", self.name(), e);
        }
    }
}

/// Keeps `is_saving` raised while a round-trip is outstanding
struct SavingGuard(Arc<AtomicUsize>);

impl SavingGuard {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for SavingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn run_save(inner: Arc<SettingsInner>, payload: Settings, _guard: SavingGuard) -> SaveOutcome {
    let store = inner.config.name.clone();
    let operation = inner.config.save_operation.as_str();
    let sent = [Value::Object(payload)];

    inner.events.emit(StoreEvent::SaveStarted { store: store.clone() });
    debug!("{}: saving settings to {}", store, inner.config.path);

    let response = match inner.transport.set(&inner.config.path, &sent[0]).await {
        Ok(Value::Object(response)) => Ok(response),
        Ok(other) => Err(ErrorPayload::invalid_response(format!(
            "expected an object of settings, got {}",
            other
        ))),
        Err(error) => Err(error),
    };

    match response {
        Ok(response) => {
            write(&inner.state).receive_saved(&response);
            inner.ledger.clear_error(operation, &sent);
            info!("{}: saved {} setting(s)", store, response.len());
            inner.events.emit(StoreEvent::SaveSucceeded { store });
            SaveOutcome::Saved(response)
        }
        Err(error) => {
            warn!("{}: failed to save settings: {}", store, error);
            inner.ledger.record_error(operation, &sent, error.clone());
            inner.events.emit(StoreEvent::SaveFailed {
                store,
                error: error.clone(),
            });
            SaveOutcome::Failed(error)
        }
    }
}

fn as_settings(action: &str, value: Value) -> Result<Settings> {
    match value {
        Value::Object(settings) => Ok(settings),
        Value::Array(_) => Err(Error::invalid_argument(format!(
            "{} expects an object of settings, got an array",
            action
        ))),
        other => Err(Error::invalid_argument(format!(
            "{} expects an object of settings, got {}",
            action, other
        ))),
    }
}

fn read(state: &RwLock<SettingsState>) -> RwLockReadGuard<'_, SettingsState> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(state: &RwLock<SettingsState>) -> RwLockWriteGuard<'_, SettingsState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ResourcePath, TransportResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves fixed settings and echoes saves back
    struct FakeServer {
        settings: Mutex<Value>,
        fail_saves: bool,
    }

    #[async_trait]
    impl Transport for FakeServer {
        async fn get(&self, _path: &ResourcePath, _params: &Map<String, Value>) -> TransportResult {
            Ok(self.settings.lock().unwrap().clone())
        }

        async fn set(&self, _path: &ResourcePath, data: &Value) -> TransportResult {
            if self.fail_saves {
                return Err(ErrorPayload::new("internal_server_error", "Internal server error")
                    .with_status(500));
            }
            let mut settings = self.settings.lock().unwrap();
            if let (Value::Object(current), Value::Object(update)) = (&mut *settings, data) {
                current.extend(update.clone());
            }
            Ok(settings.clone())
        }

        fn transport_name(&self) -> &'static str {
            "fake"
        }
    }

    fn store_with(config: SettingsStoreConfig, settings: Value, fail_saves: bool) -> SettingsStore {
        let transport = Arc::new(FakeServer {
            settings: Mutex::new(settings),
            fail_saves,
        });
        SettingsStore::builder(config, transport).build().unwrap()
    }

    fn config() -> SettingsStoreConfig {
        SettingsStoreConfig::new("modules/test", ResourcePath::new("modules", "test", "settings"))
    }

    #[tokio::test]
    async fn test_set_rejects_non_objects() {
        let store = store_with(config(), json!({}), false);

        assert!(store.set(json!(["a"])).unwrap_err().is_invalid_argument());
        assert!(store.set(json!("a")).unwrap_err().is_invalid_argument());
        assert!(store.save(Some(json!([1]))).await.unwrap_err().is_invalid_argument());
    }

    #[tokio::test]
    async fn test_rollback_one_requires_name() {
        let store = store_with(config(), json!({}), false);
        assert!(store.rollback_one("").unwrap_err().is_invalid_argument());
    }

    #[tokio::test]
    async fn test_load_phases() {
        let store = store_with(config(), json!({ "enabled": true }), false);
        assert_eq!(store.load_phase(), LoadPhase::Unloaded);

        store.load().await.unwrap();

        assert_eq!(store.load_phase(), LoadPhase::Loaded);
        assert_eq!(store.get("enabled"), json!(true));
        assert_eq!(store.get("missing"), Value::Null);
        assert_eq!(store.get_as::<bool>("enabled"), Some(true));
        assert_eq!(store.try_get_as::<bool>("missing").unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_changed_payload() {
        let config = config().with_save_payload(SavePayload::Changed);
        let store = store_with(config, json!({ "a": 1, "b": 2 }), true);
        store.load().await.unwrap();
        store.set(json!({ "b": 3 })).unwrap();

        let outcome = store.save(None).await.unwrap();

        assert!(!outcome.is_saved());
        assert!(store.save_error(&json!({ "b": 3 })).is_some());
        assert!(store.save_error(&json!({ "a": 1, "b": 3 })).is_none());
    }

    #[tokio::test]
    async fn test_unknown_comparator_paths_differ() {
        let store = store_with(config().with_compare_with("deepish"), json!({ "a": 1 }), false);
        store.load().await.unwrap();
        store.set(json!({ "a": 2 })).unwrap();

        assert!(matches!(store.check_changed(None), Err(Error::Configuration(_))));
        assert!(!store.have_changed(None));

        store.register_comparator("deepish", Arc::new(|_: &str, a: &Value, b: &Value| a == b));
        assert!(store.have_changed(None));
    }

    #[tokio::test]
    async fn test_unordered_arrays_comparator() {
        let config = config().with_compare_with(UNORDERED_ARRAYS);
        let store = store_with(config, json!({ "ids": [1, 2, 3] }), false);
        store.load().await.unwrap();

        store.set(json!({ "ids": [3, 2, 1] })).unwrap();
        assert!(!store.have_changed(None));

        store.set(json!({ "ids": [3, 2] })).unwrap();
        assert!(store.have_changed(None));
    }

    #[tokio::test]
    async fn test_can_submit_changes() {
        let store = store_with(config(), json!({ "a": 1 }), false);
        assert!(!store.can_submit_changes());

        store.load().await.unwrap();
        assert!(!store.can_submit_changes());

        store.set(json!({ "a": 2 })).unwrap();
        assert!(store.can_submit_changes());

        store.save(None).await.unwrap();
        assert!(!store.can_submit_changes());
    }

    #[tokio::test]
    async fn test_save_before_load_keeps_store_unloaded() {
        let store = store_with(config(), json!({ "a": 1 }), false);

        assert!(store.save(Some(json!({ "a": 5 }))).await.unwrap().is_saved());

        assert_eq!(store.load_phase(), LoadPhase::Unloaded);
        assert!(!store.is_loaded());
        assert!(!store.can_submit_changes());
    }

    #[tokio::test]
    async fn test_receive_loaded_resolves_the_load() {
        let store = store_with(config(), json!({ "a": 1 }), false);

        store.receive_loaded(json!({ "a": 2 }).as_object().cloned().unwrap());

        assert!(store.is_loaded());
        assert_eq!(store.load_phase(), LoadPhase::Loaded);
        assert_eq!(store.load().await.unwrap(), json!({ "a": 2 }).as_object().cloned());
    }

    #[derive(Debug, serde::Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct TestSettings {
        account_id: String,
        use_snippet: bool,
    }

    #[tokio::test]
    async fn test_typed_view() {
        let store = store_with(config(), json!({ "accountId": "12345", "useSnippet": true }), false);
        assert_eq!(store.try_settings_as::<TestSettings>().unwrap(), None);

        store.load().await.unwrap();

        assert_eq!(
            store.settings_as::<TestSettings>(),
            Some(TestSettings {
                account_id: "12345".to_string(),
                use_snippet: true,
            })
        );
    }
}

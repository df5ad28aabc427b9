//! Test doubles and common utilities for store contract tests
//!
//! The mock transport counts calls, records save payloads, answers from a
//! script and can hold calls at a gate until the test releases them.

#![allow(dead_code)]

use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use synckit_core::config::SettingsStoreConfig;
use synckit_core::error::ErrorPayload;
use synckit_core::events::StoreEvent;
use synckit_core::traits::{ResourcePath, Transport, TransportResult};
use tokio::sync::{mpsc, Semaphore};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

/// A scripted Transport that tracks calls
pub struct MockTransport {
    /// Call counter for get()
    get_call_count: Arc<AtomicUsize>,
    /// Call counter for set()
    set_call_count: Arc<AtomicUsize>,
    /// Responses for get(), by "path" or "path?params"
    gets: Mutex<HashMap<String, TransportResult>>,
    /// Queued responses for set(); when empty the payload is echoed
    saves: Mutex<VecDeque<TransportResult>>,
    /// Payloads received by set()
    sent: Mutex<Vec<Value>>,
    /// Gate get() calls wait on after being counted
    get_gate: Option<Arc<Semaphore>>,
    /// Gate set() calls wait on after being counted
    set_gate: Option<Arc<Semaphore>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            get_call_count: Arc::new(AtomicUsize::new(0)),
            set_call_count: Arc::new(AtomicUsize::new(0)),
            gets: Mutex::new(HashMap::new()),
            saves: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            get_gate: None,
            set_gate: None,
        }
    }

    /// Answer every get() of `path` with `response`
    pub fn with_get(self, path: &ResourcePath, response: TransportResult) -> Self {
        self.gets.lock().unwrap().insert(path.to_string(), response);
        self
    }

    /// Answer get() of `path` with exactly `params` with `response`
    pub fn with_get_for(self, path: &ResourcePath, params: Value, response: TransportResult) -> Self {
        self.gets
            .lock()
            .unwrap()
            .insert(format!("{}?{}", path, params), response);
        self
    }

    /// Queue a response for the next set()
    pub fn with_save_response(self, response: TransportResult) -> Self {
        self.saves.lock().unwrap().push_back(response);
        self
    }

    /// Hold get() calls until permits are added to the returned gate
    pub fn gate_gets(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.get_gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Hold set() calls until permits are added to the returned gate
    pub fn gate_sets(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.set_gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Get the number of times get() was called
    pub fn get_call_count(&self) -> usize {
        self.get_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times set() was called
    pub fn set_call_count(&self) -> usize {
        self.set_call_count.load(Ordering::SeqCst)
    }

    /// Get the payloads set() received, in call order
    pub fn sent_payloads(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn get(&self, path: &ResourcePath, params: &Map<String, Value>) -> TransportResult {
        self.get_call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.get_gate {
            // Each released permit lets exactly one call through
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let exact = format!("{}?{}", path, Value::Object(params.clone()));
        let gets = self.gets.lock().unwrap();
        gets.get(&exact)
            .or_else(|| gets.get(&path.to_string()))
            .cloned()
            .unwrap_or_else(|| Err(no_route()))
    }

    async fn set(&self, _path: &ResourcePath, data: &Value) -> TransportResult {
        self.set_call_count.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(data.clone());

        if let Some(gate) = &self.set_gate {
            // Each released permit lets exactly one call through
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.saves
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(data.clone()))
    }

    fn transport_name(&self) -> &'static str {
        "mock"
    }
}

pub fn no_route() -> ErrorPayload {
    ErrorPayload::new("rest_no_route", "No route was found matching the URL and request method")
        .with_status(404)
}

pub fn server_error() -> ErrorPayload {
    ErrorPayload::new("internal_server_error", "Internal server error").with_status(500)
}

pub fn settings_path() -> ResourcePath {
    ResourcePath::new("modules", "test-module", "settings")
}

pub fn settings_config() -> SettingsStoreConfig {
    SettingsStoreConfig::new("modules/test-module", settings_path())
}

/// Unwrap a JSON object literal
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

/// Sky-blue settings as the server returns them
pub fn server_settings() -> Value {
    json!({ "isSkyBlue": "serverside", "isGroundGreen": "serverside" })
}

/// Poll `condition` until it holds, failing after a second
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached within 1s");
}

/// Take every event currently queued
pub fn drain_events(rx: &mut mpsc::Receiver<StoreEvent>) -> Vec<StoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Collect the next `count` events, failing after a second
pub async fn collect_events(rx: mpsc::Receiver<StoreEvent>, count: usize) -> Vec<StoreEvent> {
    let events = tokio::time::timeout(
        Duration::from_secs(1),
        ReceiverStream::new(rx).take(count).collect::<Vec<_>>(),
    )
    .await
    .expect("events not received within 1s");
    assert_eq!(events.len(), count, "event channel closed early");
    events
}

//! Minimal embedding example for synckit-core
//!
//! This example drives a settings store and a fetch store against an
//! in-process transport. No network or registry is involved: the application
//! builds the stores itself and owns their lifecycle.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use synckit_core::traits::{ResourcePath, Transport, TransportResult};
use synckit_core::{
    ErrorPayload, EventSink, FetchStore, MemorySnapshot, ResourceConfig, ResourceKey, Result,
    SettingsStore, SettingsStoreConfig,
};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

/// In-process "server" holding one settings object per path
struct EmbeddedServer {
    settings: Mutex<HashMap<String, Map<String, Value>>>,
    calls: AtomicUsize,
}

impl EmbeddedServer {
    fn new() -> Self {
        let mut settings = HashMap::new();
        settings.insert(
            "modules/analytics/settings".to_string(),
            json!({ "accountID": "", "useSnippet": true })
                .as_object()
                .cloned()
                .unwrap_or_default(),
        );
        Self {
            settings: Mutex::new(settings),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transport for EmbeddedServer {
    async fn get(&self, path: &ResourcePath, params: &Map<String, Value>) -> TransportResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        println!("[Server] GET {} {:?}", path, params);

        if path.datapoint == "properties" {
            let account = params.get("accountID").and_then(Value::as_str).unwrap_or("");
            return Ok(json!([
                { "id": format!("{}-1", account), "name": "Main site" },
                { "id": format!("{}-2", account), "name": "Staging" },
            ]));
        }

        let settings = self.settings.lock().unwrap_or_else(|e| e.into_inner());
        settings
            .get(&path.to_string())
            .cloned()
            .map(Value::Object)
            .ok_or_else(|| ErrorPayload::new("rest_no_route", "No route").with_status(404))
    }

    async fn set(&self, path: &ResourcePath, data: &Value) -> TransportResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        println!("[Server] POST {} {}", path, data);

        let Some(update) = data.as_object() else {
            return Err(ErrorPayload::new("invalid_params", "Expected an object").with_status(400));
        };

        let mut settings = self.settings.lock().unwrap_or_else(|e| e.into_inner());
        let stored = settings.entry(path.to_string()).or_default();
        stored.extend(update.clone());
        Ok(Value::Object(stored.clone()))
    }

    fn transport_name(&self) -> &'static str {
        "embedded"
    }
}

#[derive(Debug, Deserialize, Clone)]
struct Property {
    id: String,
    name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    println!("=== Embedded synckit-core Example ===\n");

    let server = Arc::new(EmbeddedServer::new());
    let (events, event_rx) = EventSink::channel(64);

    let event_listener = tokio::spawn(async move {
        let mut stream = ReceiverStream::new(event_rx);
        while let Some(event) = stream.next().await {
            println!("[Event] {:?}", event);
        }
    });

    // 1. Settings store: load, edit, save
    println!("1. Loading analytics settings...");
    let analytics = SettingsStore::builder(
        SettingsStoreConfig::new(
            "modules/analytics",
            ResourcePath::new("modules", "analytics", "settings"),
        )
        .with_owned_settings_slugs(["accountID"]),
        server.clone(),
    )
    .events(events.clone())
    .build()?;

    analytics.load().await?;
    println!("   loaded: {:?}", analytics.get_all());

    println!("\n2. Editing accountID...");
    analytics.set(json!({ "accountID": "12345" }))?;
    println!("   have_changed: {}", analytics.have_changed(None));
    println!("   have_owned_changed: {}", analytics.have_owned_changed());

    println!("\n3. Saving...");
    let outcome = analytics.save(None).await?;
    println!("   saved: {}", outcome.is_saved());
    println!("   have_changed after save: {}", analytics.have_changed(None));

    // 2. Fetch store: typed values, deduplicated by key
    println!("\n4. Fetching properties for the account...");
    let properties: FetchStore<Vec<Property>> = FetchStore::builder(
        ResourceConfig::new(
            "getProperties",
            ResourcePath::new("modules", "analytics", "properties"),
        )
        .with_params(["accountID"]),
        server.clone(),
    )
    .events(events.clone())
    .build()?;

    let key = ResourceKey::from([json!("12345")]);
    let (first, second) = tokio::join!(properties.resolve(&key), properties.resolve(&key));
    for property in first?.unwrap_or_default() {
        println!("   {} ({})", property.name, property.id);
    }
    println!("   second caller got {} item(s)", second?.map_or(0, |p| p.len()));

    // 3. Snapshot: seeded values never touch the server
    println!("\n5. Building a store seeded from a snapshot...");
    let calls_before = server.call_count();
    let seeded = SettingsStore::builder(
        SettingsStoreConfig::new("core/site", ResourcePath::new("core", "site", "settings")),
        server.clone(),
    )
    .snapshot(Arc::new(MemorySnapshot::new().with(
        ResourcePath::new("core", "site", "settings"),
        ResourceKey::empty(),
        json!({ "adminBarToggle": true }),
    )))
    .events(events)
    .build()?;
    println!("   adminBarToggle: {}", seeded.get("adminBarToggle"));
    println!("   server calls made: {}", server.call_count() - calls_before);

    // Dropping the stores closes the event channel
    drop((analytics, properties, seeded));
    let _ = tokio::time::timeout(std::time::Duration::from_millis(100), event_listener).await;

    println!("\n=== Embedding Successful ===");
    println!("Key Points:");
    println!("- Concurrent reads of one key share a single request");
    println!("- Seeded values are served without a request");
    println!("- Edits stay local until saved");

    Ok(())
}

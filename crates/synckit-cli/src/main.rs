// # synckit - Settings Sync Client
//
// Thin command-line layer over synckit-core:
// 1. Read configuration from environment variables
// 2. Register the HTTP transport and default snapshot providers
// 3. Load one settings store, optionally edit and save it
// 4. Print the resulting settings as JSON
//
// All sync logic lives in synckit-core. This binary never retries.
//
// ## Usage
//
// ```bash
// synckit <namespace>/<identifier> [key=value ...]
// ```
//
// Without assignments the current settings are printed. With assignments
// they are applied to the working copy and saved. A value that parses as
// JSON is sent as JSON, anything else as a string.
//
// ## Configuration
//
// - `SYNCKIT_BASE_URL`: Base URL of the REST API (required)
// - `SYNCKIT_TIMEOUT_SECS`: Request timeout in seconds (default 30)
// - `SYNCKIT_HEADERS`: Extra headers, `Name:value` pairs separated by commas
// - `SYNCKIT_SNAPSHOT_PATH`: Snapshot file used to seed the store
// - `SYNCKIT_OWNED_SLUGS`: Comma-separated settings owned by this client
// - `SYNCKIT_LOG_LEVEL`: trace, debug, info, warn, error (default warn)
//
// ## Example
//
// ```bash
// export SYNCKIT_BASE_URL=https://example.com/wp-json/google-site-kit/v1
// export SYNCKIT_HEADERS="X-WP-Nonce:abc123"
//
// synckit modules/analytics accountID=12345 useSnippet=true
// ```

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::env;
use std::process::ExitCode;
use synckit_core::config::{SnapshotConfig, SyncConfig, TransportConfig};
use synckit_core::events::StoreEvent;
use synckit_core::{CollaboratorRegistry, ResourcePath, SaveOutcome, SettingsStoreConfig};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes
///
/// - 0: Success
/// - 1: Configuration or usage error
/// - 2: Runtime error, including a failed load or save
#[derive(Debug, Clone, Copy)]
enum SynckitExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<SynckitExitCode> for ExitCode {
    fn from(code: SynckitExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Environment configuration
struct Config {
    base_url: String,
    timeout_secs: u64,
    headers: HashMap<String, String>,
    snapshot_path: Option<String>,
    owned_slugs: Vec<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let timeout_secs = match env::var("SYNCKIT_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("SYNCKIT_TIMEOUT_SECS is not a number: {}", raw))?,
            Err(_) => 30,
        };

        Ok(Self {
            base_url: env::var("SYNCKIT_BASE_URL").unwrap_or_default(),
            timeout_secs,
            headers: parse_headers(&env::var("SYNCKIT_HEADERS").unwrap_or_default())?,
            snapshot_path: env::var("SYNCKIT_SNAPSHOT_PATH")
                .ok()
                .filter(|path| !path.is_empty()),
            owned_slugs: split_list(&env::var("SYNCKIT_OWNED_SLUGS").unwrap_or_default()),
            log_level: env::var("SYNCKIT_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            anyhow::bail!(
                "SYNCKIT_BASE_URL is required. \
                Set it via: export SYNCKIT_BASE_URL=https://example.com/wp-json/google-site-kit/v1"
            );
        }

        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            anyhow::bail!(
                "SYNCKIT_BASE_URL must use HTTP or HTTPS scheme. Got: {}",
                self.base_url
            );
        }

        if !(1..=300).contains(&self.timeout_secs) {
            anyhow::bail!(
                "SYNCKIT_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                self.timeout_secs
            );
        }

        if let Some(ref path) = self.snapshot_path
            && !std::path::Path::new(path).is_file()
        {
            anyhow::bail!("SYNCKIT_SNAPSHOT_PATH does not point to a file: {}", path);
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "SYNCKIT_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn sync_config(&self, store: SettingsStoreConfig) -> SyncConfig {
        let mut config = SyncConfig::new(TransportConfig::Http {
            base_url: self.base_url.clone(),
            timeout_secs: self.timeout_secs,
            headers: self.headers.clone(),
        });
        if let Some(ref path) = self.snapshot_path {
            config.snapshot = SnapshotConfig::File { path: path.clone() };
        }
        config.settings.push(store);
        config
    }
}

/// Parsed command line
#[derive(Debug, PartialEq)]
struct Invocation {
    namespace: String,
    identifier: String,
    assignments: Map<String, Value>,
}

impl Invocation {
    fn parse<I>(mut args: I) -> Result<Self>
    where
        I: Iterator<Item = String>,
    {
        let target = args
            .next()
            .context("Usage: synckit <namespace>/<identifier> [key=value ...]")?;
        let (namespace, identifier) = target
            .split_once('/')
            .filter(|(namespace, identifier)| {
                !namespace.is_empty() && !identifier.is_empty() && !identifier.contains('/')
            })
            .with_context(|| format!("Target must look like namespace/identifier. Got: {}", target))?;

        let mut assignments = Map::new();
        for arg in args {
            let (key, raw) = arg
                .split_once('=')
                .filter(|(key, _)| !key.is_empty())
                .with_context(|| format!("Assignment must look like key=value. Got: {}", arg))?;
            assignments.insert(key.to_string(), parse_value(raw));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            identifier: identifier.to_string(),
            assignments,
        })
    }

    fn store_name(&self) -> String {
        format!("{}/{}", self.namespace, self.identifier)
    }

    fn store_config(&self, owned_slugs: &[String]) -> SettingsStoreConfig {
        SettingsStoreConfig::new(
            self.store_name(),
            ResourcePath::new(&self.namespace, &self.identifier, "settings"),
        )
        .with_owned_settings_slugs(owned_slugs.iter().cloned())
    }
}

/// JSON when it parses as JSON, otherwise the raw string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_headers(raw: &str) -> Result<HashMap<String, String>> {
    split_list(raw)
        .into_iter()
        .map(|pair| -> Result<(String, String)> {
            let (name, value) = pair
                .split_once(':')
                .filter(|(name, _)| !name.trim().is_empty())
                .with_context(|| "SYNCKIT_HEADERS entries must look like Name:value")?;
            Ok((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SynckitExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SynckitExitCode::ConfigError.into();
    }

    let invocation = match Invocation::parse(env::args().skip(1)) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("{}", e);
            return SynckitExitCode::ConfigError.into();
        }
    };

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SynckitExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SynckitExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run(config, invocation).await {
            Ok(settings) => {
                println!("{}", settings);
                SynckitExitCode::Success
            }
            Err(e) => {
                error!("{:#}", e);
                eprintln!("Error: {:#}", e);
                SynckitExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Load the store, apply and save any assignments, return the settings to print
async fn run(config: Config, invocation: Invocation) -> Result<String> {
    let registry = CollaboratorRegistry::with_defaults();
    synckit_transport_http::register(&registry);

    let store_name = invocation.store_name();
    let sync_config = config.sync_config(invocation.store_config(&config.owned_slugs));
    let mut stores = registry
        .build(&sync_config)
        .await
        .context("Failed to build stores")?;

    let mut events = stores.events;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let store = stores
        .settings
        .remove(&store_name)
        .with_context(|| format!("Store {} was not built", store_name))?;

    info!("Loading {}", store_name);
    if store.load().await?.is_none() {
        let reason = store
            .load_error()
            .map(|payload| payload.to_string())
            .unwrap_or_else(|| "no settings returned".to_string());
        anyhow::bail!("Failed to load {}: {}", store_name, reason);
    }

    if !invocation.assignments.is_empty() {
        store.set(Value::Object(invocation.assignments))?;

        if !store.have_changed(None) {
            info!("No changes to save");
        } else {
            if store.config().owned_settings_slugs.is_empty() || store.have_owned_changed() {
                debug!("Saving {}", store_name);
            } else {
                warn!("Saving changes outside the owned settings");
            }

            match store.save(None).await? {
                SaveOutcome::Saved(_) => info!("Saved {}", store_name),
                SaveOutcome::Failed(payload) => {
                    anyhow::bail!("Failed to save {}: {}", store_name, payload)
                }
            }
        }
    }

    let settings = store.get_all().unwrap_or_default();
    Ok(serde_json::to_string_pretty(&settings)?)
}

fn log_event(event: &StoreEvent) {
    match event {
        StoreEvent::LoadFailed { .. } | StoreEvent::SaveFailed { .. } => warn!("{:?}", event),
        StoreEvent::SelectorFailed { .. } => error!("{:?}", event),
        _ => debug!("{:?}", event),
    }
}

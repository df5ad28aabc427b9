// # HTTP Transport
//
// REST implementation of the synckit `Transport` trait.
//
// ## Wire Convention
//
// - Read:  `GET  {base}/{namespace}/{identifier}/data/{datapoint}?{params}`
// - Write: `POST {base}/{namespace}/{identifier}/data/{datapoint}` with
//   body `{ "data": { ... } }`
//
// String parameters are sent as-is; any other parameter value is sent as
// its JSON text.
//
// ## Errors
//
// Every failure resolves to an `ErrorPayload`, never a panic:
//
// - Request never produced a response: `fetch_error`
// - Non-2xx with an error body (`code` + `message`): that body, with the
//   HTTP status filled in when the body has none
// - Non-2xx without one: 401/403 `rest_forbidden`, 404 `rest_no_route`,
//   429 `rate_limited`, 5xx `server_error`, anything else `http_error`
// - 2xx whose body is not JSON: `invalid_response`
//
// ## Constraints
//
// - One request per call: no retry, no caching (stores own deduplication)
// - Header values (nonces, credentials) never appear in logs or `Debug`

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use synckit_core::config::TransportConfig;
use synckit_core::error::ErrorPayload;
use synckit_core::registry::CollaboratorRegistry;
use synckit_core::traits::{ResourcePath, Transport, TransportFactory, TransportResult};
use synckit_core::{Error, Result};
use tracing::debug;

/// Default HTTP timeout for requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Body of a write request
#[derive(Serialize)]
struct WriteEnvelope<'a> {
    data: &'a Value,
}

/// REST transport
///
/// # Security
///
/// The Debug implementation lists header names only.
pub struct HttpTransport {
    /// Base URL without trailing slash
    base_url: String,

    /// Extra headers sent with every request
    /// ⚠️ NEVER log the values
    headers: HashMap<String, String>,

    /// HTTP client (timeout and headers applied)
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut header_names: Vec<&str> = self.headers.keys().map(String::as_str).collect();
        header_names.sort_unstable();

        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("headers", &header_names)
            .finish()
    }
}

impl HttpTransport {
    /// Create a new HTTP transport
    ///
    /// # Parameters
    ///
    /// - `base_url`: URL the resource paths are appended to
    /// - `timeout`: Per-request timeout
    /// - `headers`: Extra headers sent with every request
    ///
    /// # Returns
    ///
    /// - `Err(Error::Transport)`: A header name or value is not valid HTTP,
    ///   or the client could not be built
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        headers: HashMap<String, String>,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let mut header_map = reqwest::header::HeaderMap::new();
        for (name, value) in &headers {
            let header_name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::transport(format!("Invalid header name: {}", name)))?;
            let mut header_value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|_| Error::transport(format!("Invalid value for header {}", name)))?;
            header_value.set_sensitive(true);
            header_map.insert(header_name, header_value);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(header_map)
            .build()
            .map_err(|e| Error::transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            headers,
            client,
        })
    }

    /// URL of a resource
    pub fn url(&self, path: &ResourcePath) -> String {
        format!(
            "{}/{}/{}/data/{}",
            self.base_url, path.namespace, path.identifier, path.datapoint
        )
    }

    async fn read_response(response: reqwest::Response) -> TransportResult {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ErrorPayload::fetch_error(format!("Failed to read response: {}", e)))?;

        let body = if text.trim().is_empty() {
            Some(Value::Null)
        } else {
            serde_json::from_str::<Value>(&text).ok()
        };

        if (200..300).contains(&status) {
            return body.ok_or_else(|| {
                ErrorPayload::invalid_response("body is not JSON").with_status(status)
            });
        }

        Err(error_for_status(status, body.as_ref()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &ResourcePath, params: &Map<String, Value>) -> TransportResult {
        let url = self.url(path);
        debug!("GET {} ({} param(s))", url, params.len());

        let response = self
            .client
            .get(&url)
            .query(&query_pairs(params))
            .send()
            .await
            .map_err(|e| ErrorPayload::fetch_error(format!("HTTP request failed: {}", e)))?;

        Self::read_response(response).await
    }

    async fn set(&self, path: &ResourcePath, data: &Value) -> TransportResult {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&WriteEnvelope { data })
            .send()
            .await
            .map_err(|e| ErrorPayload::fetch_error(format!("HTTP request failed: {}", e)))?;

        Self::read_response(response).await
    }

    fn transport_name(&self) -> &'static str {
        "http"
    }
}

/// Query string pairs for read parameters
pub fn query_pairs(params: &Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect()
}

/// Error payload for a non-2xx response
pub fn error_for_status(status: u16, body: Option<&Value>) -> ErrorPayload {
    if let Some(mut payload) = body.and_then(ErrorPayload::from_body) {
        payload.data.status.get_or_insert(status);
        return payload;
    }

    let (code, message) = match status {
        401 | 403 => ("rest_forbidden", "Sorry, you are not allowed to do that.".to_string()),
        404 => (
            "rest_no_route",
            "No route was found matching the URL and request method.".to_string(),
        ),
        429 => ("rate_limited", "Too many requests. Please retry later.".to_string()),
        500..=599 => ("server_error", format!("Server error (status {})", status)),
        _ => ("http_error", format!("Request failed with status {}", status)),
    };

    ErrorPayload::new(code, message).with_status(status)
}

/// Factory for creating HTTP transports
pub struct HttpTransportFactory;

impl TransportFactory for HttpTransportFactory {
    fn create(&self, config: &TransportConfig) -> Result<std::sync::Arc<dyn Transport>> {
        match config {
            TransportConfig::Http {
                base_url,
                timeout_secs,
                headers,
            } => {
                config.validate()?;
                Ok(std::sync::Arc::new(HttpTransport::new(
                    base_url.clone(),
                    Duration::from_secs(*timeout_secs),
                    headers.clone(),
                )?))
            }
            _ => Err(Error::configuration("Invalid config for HTTP transport")),
        }
    }
}

/// Register the HTTP transport with a registry
///
/// # Example
///
/// ```rust
/// use synckit_core::CollaboratorRegistry;
///
/// let registry = CollaboratorRegistry::with_defaults();
/// synckit_transport_http::register(&registry);
/// assert!(registry.has_transport("http"));
/// ```
pub fn register(registry: &CollaboratorRegistry) {
    registry.register_transport("http", Box::new(HttpTransportFactory));
}

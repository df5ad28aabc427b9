//! Error ledger
//!
//! Side-map from `(operation, argument fingerprint)` to the last error that
//! operation produced. Resilient selectors consult the ledger instead of
//! raising, so a UI can tell "still loading" apart from "loaded empty
//! because the request failed".

use crate::error::ErrorPayload;
use crate::key::{Fingerprint, fingerprint};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// One recorded error
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorRecord {
    /// Operation that failed (e.g. `getSettings`, `saveSettings`)
    pub operation: String,
    /// Arguments the operation was called with
    pub args: Vec<Value>,
    /// The error payload
    pub error: ErrorPayload,
    /// When the error was recorded
    pub recorded_at: DateTime<Utc>,
}

/// Thread-safe error ledger shared by the components of a store
#[derive(Debug, Default)]
pub struct ErrorLedger {
    records: RwLock<HashMap<(String, Fingerprint), ErrorRecord>>,
}

impl ErrorLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the error for an operation call, replacing any previous one
    pub fn record_error(&self, operation: &str, args: &[Value], error: ErrorPayload) {
        let record = ErrorRecord {
            operation: operation.to_string(),
            args: args.to_vec(),
            error,
            recorded_at: Utc::now(),
        };

        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((operation.to_string(), fingerprint(args)), record);
    }

    /// Last error for an operation call
    pub fn get_error(&self, operation: &str, args: &[Value]) -> Option<ErrorPayload> {
        self.get_record(operation, args).map(|record| record.error)
    }

    /// Full record for an operation call
    pub fn get_record(&self, operation: &str, args: &[Value]) -> Option<ErrorRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(operation.to_string(), fingerprint(args)))
            .cloned()
    }

    /// Remove the error for an operation call
    ///
    /// Returns `true` if an error was present.
    pub fn clear_error(&self, operation: &str, args: &[Value]) -> bool {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(operation.to_string(), fingerprint(args)))
            .is_some()
    }

    /// Remove every error, or every error of one operation
    pub fn clear_errors(&self, operation: Option<&str>) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match operation {
            Some(operation) => records.retain(|(op, _), _| op != operation),
            None => records.clear(),
        }
    }

    /// All recorded errors, oldest first
    pub fn errors(&self) -> Vec<ErrorRecord> {
        let mut records: Vec<ErrorRecord> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        records.sort_by_key(|record| record.recorded_at);
        records
    }

    /// Number of recorded errors
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

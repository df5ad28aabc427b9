//! Resource cache and resolver protocol
//!
//! The cache holds one [`ResourceEntry`] per key fingerprint. Whether a read
//! is served from cache, from the snapshot, or by a fetch is decided
//! atomically by [`ResourceCache::claim`]:
//!
//! ```text
//!            claim(key)
//!                │
//!     ┌──────────┼───────────────┬────────────────┐
//!     ▼          ▼               ▼                ▼
//!  resolved   fetching       seed found        otherwise
//!     │          │               │                │
//!   Ready     Wait(rx)     Seeded(value)    Fetch(ticket, rx)
//!                │                                │
//!                └──── woken by ticket.complete ◄─┘
//! ```
//!
//! Exactly one caller per key ever holds a [`FetchTicket`]. Everyone else
//! arriving while it is outstanding waits on the same watch channel.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::debug;

use crate::error::ErrorPayload;
use crate::key::{Fingerprint, ResourceKey};

/// One cached remote value
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEntry<T> {
    /// The argument tuple used to request it
    pub key: ResourceKey,
    /// The last received payload
    pub value: Option<T>,
    /// Whether a network call is outstanding
    pub is_fetching: bool,
    /// Whether a load attempt (success or failure) completed
    pub resolved: bool,
    /// Last error for this key
    pub error: Option<ErrorPayload>,
    /// When the entry resolved
    pub resolved_at: Option<DateTime<Utc>>,
}

impl<T> ResourceEntry<T> {
    fn new(key: ResourceKey) -> Self {
        Self {
            key,
            value: None,
            is_fetching: false,
            resolved: false,
            error: None,
            resolved_at: None,
        }
    }
}

/// Outcome of claiming a key
pub(crate) enum Claim<T> {
    /// Already resolved; read from the cache
    Ready,
    /// Another caller is fetching; wait for it
    Wait(watch::Receiver<bool>),
    /// Resolved from the snapshot just now
    Seeded(T),
    /// The caller must fetch and complete the ticket
    Fetch(FetchTicket<T>, watch::Receiver<bool>),
}

struct Slot<T> {
    entry: ResourceEntry<T>,
    in_flight: Option<watch::Receiver<bool>>,
}

/// Per-resource cache, shared by every clone of its store
#[derive(Debug)]
pub struct ResourceCache<T> {
    slots: Mutex<HashMap<Fingerprint, Slot<T>>>,
}

impl<T> std::fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("is_fetching", &self.entry.is_fetching)
            .field("resolved", &self.entry.resolved)
            .finish()
    }
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> ResourceCache<T> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for a key, if resolved
    ///
    /// A resolved key without a value (failed load, or a seeded `None`)
    /// reads as `None` just like an unresolved one; use [`entry`](Self::entry)
    /// to tell them apart.
    pub fn read(&self, key: &ResourceKey) -> Option<T> {
        let slots = self.lock();
        let slot = slots.get(&key.fingerprint())?;
        if !slot.entry.resolved {
            return None;
        }
        slot.entry.value.clone()
    }

    /// Snapshot of the entry for a key
    pub fn entry(&self, key: &ResourceKey) -> Option<ResourceEntry<T>> {
        self.lock()
            .get(&key.fingerprint())
            .map(|slot| slot.entry.clone())
    }

    /// Whether a fetch is outstanding for a key
    pub fn is_fetching(&self, key: &ResourceKey) -> bool {
        self.lock()
            .get(&key.fingerprint())
            .is_some_and(|slot| slot.entry.is_fetching)
    }

    /// Whether a load attempt completed for a key
    pub fn is_resolved(&self, key: &ResourceKey) -> bool {
        self.lock()
            .get(&key.fingerprint())
            .is_some_and(|slot| slot.entry.resolved)
    }

    /// Number of entries (never shrinks)
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no key was ever touched
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Install a value directly, resolving the key
    ///
    /// An outstanding fetch for the key still completes afterwards and its
    /// outcome replaces this value.
    pub(crate) fn receive(&self, key: &ResourceKey, value: T) {
        let mut slots = self.lock();
        let slot = slots
            .entry(key.fingerprint())
            .or_insert_with(|| Slot::new(key.clone()));

        slot.entry.value = Some(value);
        slot.entry.error = None;
        slot.entry.resolved = true;
        slot.entry.resolved_at = Some(Utc::now());
    }

    /// Decide how a key gets its value
    ///
    /// `seed` is consulted only when the key is neither resolved nor being
    /// fetched.
    pub(crate) fn claim(
        self: &Arc<Self>,
        key: &ResourceKey,
        seed: impl FnOnce() -> Option<T>,
    ) -> Claim<T> {
        let fingerprint = key.fingerprint();
        let mut slots = self.lock();
        let slot = slots
            .entry(fingerprint.clone())
            .or_insert_with(|| Slot::new(key.clone()));

        if slot.entry.resolved {
            return Claim::Ready;
        }

        if slot.entry.is_fetching
            && let Some(rx) = &slot.in_flight
        {
            debug!("Joining in-flight fetch for {}", fingerprint);
            return Claim::Wait(rx.clone());
        }

        if let Some(value) = seed() {
            slot.entry.value = Some(value.clone());
            slot.entry.resolved = true;
            slot.entry.resolved_at = Some(Utc::now());
            return Claim::Seeded(value);
        }

        let (tx, rx) = watch::channel(false);
        slot.entry.is_fetching = true;
        slot.in_flight = Some(rx.clone());

        let ticket = FetchTicket {
            cache: Arc::clone(self),
            fingerprint,
            done: Some(tx),
        };
        Claim::Fetch(ticket, rx)
    }
}

impl<T> ResourceCache<T> {
    fn finish(&self, fingerprint: &Fingerprint, outcome: Result<T, ErrorPayload>) {
        let mut slots = self.lock();
        let Some(slot) = slots.get_mut(fingerprint) else {
            return;
        };

        match outcome {
            Ok(value) => {
                slot.entry.value = Some(value);
                slot.entry.error = None;
            }
            Err(error) => {
                slot.entry.value = None;
                slot.entry.error = Some(error);
            }
        }
        slot.entry.resolved = true;
        slot.entry.is_fetching = false;
        slot.entry.resolved_at = Some(Utc::now());
        slot.in_flight = None;
    }

    fn abandon(&self, fingerprint: &Fingerprint) {
        let mut slots = self.lock();
        if let Some(slot) = slots.get_mut(fingerprint) {
            slot.entry.is_fetching = false;
            slot.in_flight = None;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Fingerprint, Slot<T>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Slot<T> {
    fn new(key: ResourceKey) -> Self {
        Self {
            entry: ResourceEntry::new(key),
            in_flight: None,
        }
    }
}

/// Exclusive right to fetch one key
///
/// Completing the ticket resolves the key and wakes every waiter. A ticket
/// dropped without completing (its task panicked) returns the key to
/// "unresolved, not fetching" so a later resolve can try again.
pub(crate) struct FetchTicket<T> {
    cache: Arc<ResourceCache<T>>,
    fingerprint: Fingerprint,
    done: Option<watch::Sender<bool>>,
}

impl<T> FetchTicket<T> {
    /// Fingerprint of the claimed key
    pub(crate) fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Resolve the key and wake waiters
    pub(crate) fn complete(mut self, outcome: Result<T, ErrorPayload>) {
        self.cache.finish(&self.fingerprint, outcome);
        if let Some(done) = self.done.take() {
            done.send_replace(true);
        }
    }
}

impl<T> Drop for FetchTicket<T> {
    fn drop(&mut self) {
        if self.done.is_some() {
            self.cache.abandon(&self.fingerprint);
        }
    }
}

/// Wait for an in-flight fetch to finish or be abandoned
pub(crate) async fn wait_for(mut rx: watch::Receiver<bool>) {
    // Err means the ticket was dropped; either way the fetch is over
    let _ = rx.wait_for(|done| *done).await;
}

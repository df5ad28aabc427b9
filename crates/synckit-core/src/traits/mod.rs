//! Core traits for the sync framework
//!
//! This module defines the interfaces of the two external collaborators the
//! stores consume.
//!
//! - [`Transport`]: turn a logical get/set of a resource into a remote call
//! - [`SnapshotProvider`]: read-only pre-seeded values supplied by the host

pub mod snapshot;
pub mod transport;

pub use snapshot::{SnapshotFactory, SnapshotProvider};
pub use transport::{ResourcePath, Transport, TransportFactory, TransportResult};

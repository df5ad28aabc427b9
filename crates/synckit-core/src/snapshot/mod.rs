// # Snapshot Provider Implementations
//
// This module provides implementations of the SnapshotProvider trait for
// the ways a host can hand boot data to the stores.

pub mod file;
pub mod memory;

pub use file::{FileSnapshot, FileSnapshotFactory};
pub use memory::{MemorySnapshot, MemorySnapshotFactory};

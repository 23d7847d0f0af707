//! Durability layer for tracerec
//!
//! This crate handles everything that touches disk:
//!
//! - Trace log: segmented, checksummed log with one record per port call
//! - Durability modes: Always, Standard (default)
//! - Recovery: torn-tail truncation when a store is reopened
//! - Replay: grouping stored entries back into per-run histories
//! - An in-memory store for tests and embedding

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config; // Store configuration (StoreConfig)
pub mod error;
pub mod format; // Binary on-disk formats (segments, records, entries)
pub mod memory; // Shared in-memory store
pub mod store; // Segmented-log store (WalTraceStore)
pub mod trace_log; // Replay into RunHistory
pub mod wal; // Segment writer/reader, durability modes

// === Re-exports ===
pub use config::{ConfigError, StoreConfig};
pub use error::StoreError;
pub use format::{EntryCodecError, SnapshotEntry, StoreEntry};
pub use memory::MemoryTraceStore;
pub use store::{RecoveryInfo, WalTraceStore};
pub use trace_log::{RunHistory, TraceLog};
pub use wal::{DurabilityMode, WalConfig, WalCounters};

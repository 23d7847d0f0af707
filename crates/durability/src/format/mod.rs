//! On-disk formats for the trace log
//!
//! - `wal_record`: segment files and CRC-framed records
//! - `entry`: the logical entries carried inside records

pub mod entry;
pub mod wal_record;

pub use entry::{EntryCodecError, SnapshotEntry, StoreEntry};
pub use wal_record::{
    SegmentHeader, WalRecord, WalRecordError, WalSegment, SEGMENT_FORMAT_VERSION,
    SEGMENT_HEADER_SIZE, SEGMENT_MAGIC, WAL_RECORD_FORMAT_VERSION,
};

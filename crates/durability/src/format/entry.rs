//! Logical entries carried inside trace log records.
//!
//! One [`StoreEntry`] is written per persistence port call. Entries are
//! encoded with MessagePack (`rmp-serde`); snapshot bodies are written as
//! MessagePack binary rather than as an integer array.

use serde::{Deserialize, Serialize};
use tracerec_core::{FileSnapshot, RunEnd, RunStart, TraceEvent};

/// A persisted port call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreEntry {
    /// `begin_run`
    RunBegin(RunStart),
    /// `finalize_run`
    RunEnd(RunEnd),
    /// `record_event`
    Event(TraceEvent),
    /// `store_file_snapshot`
    FileSnapshot(SnapshotEntry),
}

impl StoreEntry {
    /// Encode to MessagePack bytes.
    pub fn encode(&self) -> Result<Vec<u8>, EntryCodecError> {
        rmp_serde::to_vec(self).map_err(|e| EntryCodecError::Encode(e.to_string()))
    }

    /// Decode from MessagePack bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, EntryCodecError> {
        rmp_serde::from_slice(bytes).map_err(|e| EntryCodecError::Decode(e.to_string()))
    }

    /// Short name of the entry kind, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            StoreEntry::RunBegin(_) => "run_begin",
            StoreEntry::RunEnd(_) => "run_end",
            StoreEntry::Event(_) => "event",
            StoreEntry::FileSnapshot(_) => "file_snapshot",
        }
    }
}

/// Stored file body with binary-friendly serialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Run the snapshot belongs to
    pub run_id: tracerec_core::RunId,
    /// Filename as referenced by the triggering message
    pub filename: String,
    /// Raw file content
    #[serde(with = "raw_bytes")]
    pub body: Vec<u8>,
}

impl From<SnapshotEntry> for FileSnapshot {
    fn from(entry: SnapshotEntry) -> Self {
        FileSnapshot {
            run_id: entry.run_id,
            filename: entry.filename,
            body: entry.body,
        }
    }
}

/// Entry encoding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryCodecError {
    /// Serialization failed
    #[error("Failed to encode entry: {0}")]
    Encode(String),
    /// Deserialization failed
    #[error("Failed to decode entry: {0}")]
    Decode(String),
}

mod raw_bytes {
    use serde::de::{Error, SeqAccess, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        deserializer.deserialize_byte_buf(BytesVisitor)
    }

    struct BytesVisitor;

    impl<'de> Visitor<'de> for BytesVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a byte buffer")
        }

        fn visit_bytes<E: Error>(self, v: &[u8]) -> Result<Vec<u8>, E> {
            Ok(v.to_vec())
        }

        fn visit_byte_buf<E: Error>(self, v: Vec<u8>) -> Result<Vec<u8>, E> {
            Ok(v)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<u8>, A::Error> {
            let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(byte) = seq.next_element::<u8>()? {
                out.push(byte);
            }
            Ok(out)
        }
    }
}

//! Trace log segment file and record format.
//!
//! Segments are named `trace-NNNNNN.seg` where `NNNNNN` is a zero-padded segment number.
//!
//! # Segment Layout
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │ Segment Header (32 bytes)          │
//! ├────────────────────────────────────┤
//! │ Record 1                           │
//! ├────────────────────────────────────┤
//! │ Record 2                           │
//! ├────────────────────────────────────┤
//! │ ...                                │
//! └────────────────────────────────────┘
//! ```
//!
//! # Record Layout
//!
//! ```text
//! ┌─────────────────┬──────────────────┬─────────────────────────┬──────────┐
//! │ Length (4 bytes)│ Format Ver (1)   │ Payload (variable)      │ CRC32 (4)│
//! └─────────────────┴──────────────────┴─────────────────────────┴──────────┘
//!
//! Payload:
//! ┌──────────────┬──────────────┬─────────────────────────────┐
//! │ Sequence (8) │ Timestamp (8)│ Entry (variable)            │
//! └──────────────┴──────────────┴─────────────────────────────┘
//! ```

use crc32fast::Hasher;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Magic bytes identifying a trace segment file: "TREC"
pub const SEGMENT_MAGIC: [u8; 4] = *b"TREC";

/// Current segment format version
pub const SEGMENT_FORMAT_VERSION: u32 = 1;

/// Size of segment header in bytes
pub const SEGMENT_HEADER_SIZE: usize = 32;

/// Current record format version
pub const WAL_RECORD_FORMAT_VERSION: u8 = 1;

/// Fixed payload prefix: version (1) + sequence (8) + timestamp (8)
const RECORD_PREFIX_SIZE: usize = 17;

/// Segment header (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Magic bytes: "TREC"
    pub magic: [u8; 4],

    /// Format version for forward compatibility
    pub format_version: u32,

    /// Segment number (monotonically increasing)
    pub segment_number: u64,

    /// Store UUID (for integrity checking across segments)
    pub store_uuid: [u8; 16],
}

impl SegmentHeader {
    /// Create a new segment header.
    pub fn new(segment_number: u64, store_uuid: [u8; 16]) -> Self {
        SegmentHeader {
            magic: SEGMENT_MAGIC,
            format_version: SEGMENT_FORMAT_VERSION,
            segment_number,
            store_uuid,
        }
    }

    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; SEGMENT_HEADER_SIZE] {
        let mut bytes = [0u8; SEGMENT_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.format_version.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.segment_number.to_le_bytes());
        bytes[16..32].copy_from_slice(&self.store_uuid);
        bytes
    }

    /// Deserialize header from bytes.
    pub fn from_bytes(bytes: &[u8; SEGMENT_HEADER_SIZE]) -> Option<Self> {
        Some(SegmentHeader {
            magic: bytes[0..4].try_into().ok()?,
            format_version: u32::from_le_bytes(bytes[4..8].try_into().ok()?),
            segment_number: u64::from_le_bytes(bytes[8..16].try_into().ok()?),
            store_uuid: bytes[16..32].try_into().ok()?,
        })
    }

    /// Validate magic bytes and format version.
    pub fn is_valid(&self) -> bool {
        self.magic == SEGMENT_MAGIC && self.format_version == SEGMENT_FORMAT_VERSION
    }
}

/// Segment file handle.
///
/// Only the active segment is writable; closed segments are immutable.
pub struct WalSegment {
    file: File,
    segment_number: u64,
    write_position: u64,
    path: PathBuf,
    closed: bool,
    store_uuid: [u8; 16],
    #[cfg(test)]
    short_write: Option<usize>,
    #[cfg(test)]
    truncate_fails: bool,
}

impl WalSegment {
    /// Create a new segment and write its header.
    pub fn create(dir: &Path, segment_number: u64, store_uuid: [u8; 16]) -> std::io::Result<Self> {
        let path = Self::segment_path(dir, segment_number);

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .read(true)
            .open(&path)?;

        let header = SegmentHeader::new(segment_number, store_uuid);
        file.write_all(&header.to_bytes())?;

        Ok(WalSegment {
            file,
            segment_number,
            write_position: SEGMENT_HEADER_SIZE as u64,
            path,
            closed: false,
            store_uuid,
            #[cfg(test)]
            short_write: None,
            #[cfg(test)]
            truncate_fails: false,
        })
    }

    /// Open an existing segment for reading.
    pub fn open_read(dir: &Path, segment_number: u64) -> std::io::Result<Self> {
        let path = Self::segment_path(dir, segment_number);
        let file = OpenOptions::new().read(true).open(&path)?;
        Self::open_with(file, path, segment_number, true)
    }

    /// Open an existing segment for appending.
    ///
    /// Used when resuming writes to the last segment after a restart.
    pub fn open_append(dir: &Path, segment_number: u64) -> std::io::Result<Self> {
        let path = Self::segment_path(dir, segment_number);
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Self::open_with(file, path, segment_number, false)
    }

    fn open_with(
        mut file: File,
        path: PathBuf,
        segment_number: u64,
        closed: bool,
    ) -> std::io::Result<Self> {
        let mut header_bytes = [0u8; SEGMENT_HEADER_SIZE];
        file.read_exact(&mut header_bytes)?;

        let header = SegmentHeader::from_bytes(&header_bytes).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "Invalid segment header")
        })?;

        if !header.is_valid() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Invalid segment magic bytes or version",
            ));
        }

        if header.segment_number != segment_number {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Segment number mismatch: expected {}, got {}",
                    segment_number, header.segment_number
                ),
            ));
        }

        let write_position = file.seek(SeekFrom::End(0))?;

        Ok(WalSegment {
            file,
            segment_number,
            write_position,
            path,
            closed,
            store_uuid: header.store_uuid,
            #[cfg(test)]
            short_write: None,
            #[cfg(test)]
            truncate_fails: false,
        })
    }

    /// Generate segment file path.
    pub fn segment_path(dir: &Path, segment_number: u64) -> PathBuf {
        dir.join(format!("trace-{:06}.seg", segment_number))
    }

    /// Parse a segment number out of a file name like `trace-000042.seg`.
    pub fn parse_segment_name(name: &str) -> Option<u64> {
        let digits = name.strip_prefix("trace-")?.strip_suffix(".seg")?;
        if digits.len() < 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Get segment number.
    pub fn segment_number(&self) -> u64 {
        self.segment_number
    }

    /// Get current segment size in bytes.
    pub fn size(&self) -> u64 {
        self.write_position
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get store UUID.
    pub fn store_uuid(&self) -> [u8; 16] {
        self.store_uuid
    }

    /// Write bytes to segment and update write position.
    ///
    /// Returns an error if the segment is closed.
    pub fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        if self.closed {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "Cannot write to closed segment",
            ));
        }

        #[cfg(test)]
        if let Some(limit) = self.short_write.take() {
            self.file.write_all(&data[..limit.min(data.len())])?;
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "No space left on device",
            ));
        }

        self.file.write_all(data)?;
        self.write_position += data.len() as u64;
        Ok(())
    }

    /// Make the next write stop after `bytes` bytes and fail.
    #[cfg(test)]
    pub(crate) fn fail_next_write_after(&mut self, bytes: usize) {
        self.short_write = Some(bytes);
    }

    /// Make every later truncation fail.
    #[cfg(test)]
    pub(crate) fn fail_truncation(&mut self) {
        self.truncate_fails = true;
    }

    /// Sync segment data to disk.
    pub fn sync(&mut self) -> std::io::Result<()> {
        self.file.sync_all()
    }

    /// Mark segment as closed (immutable). Syncs first.
    pub fn close(&mut self) -> std::io::Result<()> {
        if !self.closed {
            self.file.sync_all()?;
            self.closed = true;
        }
        Ok(())
    }

    /// Check if segment is closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read every byte after the header.
    pub fn read_records_region(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.file.seek(SeekFrom::Start(SEGMENT_HEADER_SIZE as u64))?;
        self.file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    /// Truncate segment at the given position.
    ///
    /// Used during recovery to remove partial records.
    pub fn truncate(&mut self, position: u64) -> std::io::Result<()> {
        if self.closed {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "Cannot truncate closed segment",
            ));
        }

        #[cfg(test)]
        if self.truncate_fails {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "Input/output error",
            ));
        }

        self.file.set_len(position)?;
        self.file.sync_all()?;
        self.write_position = position;
        self.file.seek(SeekFrom::Start(position))?;
        Ok(())
    }
}

/// One framed entry in the trace log.
///
/// Each record is self-delimiting with a length prefix and CRC32 checksum.
/// Records are immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// Position of the record in the log, assigned by the store
    pub sequence: u64,

    /// Write timestamp (microseconds since epoch)
    pub timestamp: u64,

    /// Encoded [`StoreEntry`](crate::format::StoreEntry)
    pub entry: Vec<u8>,
}

impl WalRecord {
    /// Create a new record.
    pub fn new(sequence: u64, timestamp: u64, entry: Vec<u8>) -> Self {
        WalRecord {
            sequence,
            timestamp,
            entry,
        }
    }

    /// Serialize record to bytes.
    ///
    /// Format: length (4) + format_version (1) + payload + crc32 (4)
    ///
    /// The length field contains the size of (format_version + payload + crc32).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(RECORD_PREFIX_SIZE + self.entry.len());
        payload.push(WAL_RECORD_FORMAT_VERSION);
        payload.extend_from_slice(&self.sequence.to_le_bytes());
        payload.extend_from_slice(&self.timestamp.to_le_bytes());
        payload.extend_from_slice(&self.entry);

        let crc = Self::compute_crc(&payload);

        let total_len = payload.len() + 4;
        let mut record = Vec::with_capacity(4 + total_len);
        record.extend_from_slice(&(total_len as u32).to_le_bytes());
        record.extend_from_slice(&payload);
        record.extend_from_slice(&crc.to_le_bytes());

        record
    }

    /// Deserialize record from bytes.
    ///
    /// Returns (record, bytes_consumed) on success.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), WalRecordError> {
        let length = read_length(bytes)?;

        if length == 0 {
            return Err(WalRecordError::InvalidFormat);
        }

        if bytes.len() < 4 + length {
            return Err(WalRecordError::InsufficientData);
        }

        if length < 5 {
            // Minimum: 1 byte format version + 4 bytes CRC
            return Err(WalRecordError::InvalidFormat);
        }

        let payload_with_crc = &bytes[4..4 + length];
        let (payload, crc_bytes) = payload_with_crc.split_at(length - 4);
        let stored_crc = u32::from_le_bytes(le_array(crc_bytes)?);

        let computed_crc = Self::compute_crc(payload);
        if computed_crc != stored_crc {
            return Err(WalRecordError::ChecksumMismatch {
                expected: stored_crc,
                computed: computed_crc,
            });
        }

        if payload.len() < RECORD_PREFIX_SIZE {
            return Err(WalRecordError::InvalidFormat);
        }

        let format_version = payload[0];
        if format_version != WAL_RECORD_FORMAT_VERSION {
            return Err(WalRecordError::UnsupportedVersion(format_version));
        }

        let sequence = u64::from_le_bytes(le_array(&payload[1..9])?);
        let timestamp = u64::from_le_bytes(le_array(&payload[9..17])?);
        let entry = payload[RECORD_PREFIX_SIZE..].to_vec();

        Ok((
            WalRecord {
                sequence,
                timestamp,
                entry,
            },
            4 + length,
        ))
    }

    /// Length prefix of the record starting at `bytes`, if readable.
    pub fn peek_length(bytes: &[u8]) -> Option<usize> {
        read_length(bytes).ok()
    }

    fn compute_crc(data: &[u8]) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(data);
        hasher.finalize()
    }
}

fn read_length(bytes: &[u8]) -> Result<usize, WalRecordError> {
    if bytes.len() < 4 {
        return Err(WalRecordError::InsufficientData);
    }
    Ok(u32::from_le_bytes(le_array(&bytes[0..4])?) as usize)
}

fn le_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], WalRecordError> {
    bytes.try_into().map_err(|_| WalRecordError::InvalidFormat)
}

/// Record parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalRecordError {
    /// Not enough data to parse record
    #[error("Insufficient data to parse record")]
    InsufficientData,

    /// Record format is invalid
    #[error("Invalid record format")]
    InvalidFormat,

    /// Checksum verification failed
    #[error("Checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Expected checksum from record
        expected: u32,
        /// Computed checksum
        computed: u32,
    },

    /// Unsupported format version
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u8),
}

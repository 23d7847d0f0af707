//! Trace log reader for recovery and replay.

use crate::format::{WalRecord, WalRecordError, WalSegment, SEGMENT_HEADER_SIZE};
use crate::wal::writer::list_segment_numbers;
use std::path::Path;

/// Trace log reader.
///
/// Reads individual segments or scans all segments in order.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalReader;

impl WalReader {
    /// Create a new reader.
    pub fn new() -> Self {
        WalReader
    }

    /// Read all records from a single segment.
    ///
    /// Records are returned in order, stopping at the first incomplete record.
    /// A record whose checksum fails but whose length is plausible is skipped.
    pub fn read_segment(
        &self,
        wal_dir: &Path,
        segment_number: u64,
    ) -> Result<SegmentRead, WalReaderError> {
        let mut segment = WalSegment::open_read(wal_dir, segment_number)
            .map_err(|e| WalReaderError::IoError(e.to_string()))?;
        let buffer = segment
            .read_records_region()
            .map_err(|e| WalReaderError::IoError(e.to_string()))?;

        let header_size = SEGMENT_HEADER_SIZE as u64;
        let mut records = Vec::new();
        let mut valid_end = header_size;
        let mut offset = 0;
        let mut stop_reason = ReadStopReason::EndOfData;
        let mut skipped_corrupted = 0usize;

        while offset < buffer.len() {
            let remaining = &buffer[offset..];

            match WalRecord::from_bytes(remaining) {
                Ok((record, consumed)) => {
                    records.push(record);
                    offset += consumed;
                    valid_end = header_size + offset as u64;
                }
                Err(WalRecordError::InsufficientData) => {
                    // Partial record at end: expected after a crash mid-append
                    stop_reason = ReadStopReason::PartialRecord;
                    break;
                }
                Err(WalRecordError::ChecksumMismatch { .. }) => {
                    match WalRecord::peek_length(remaining) {
                        Some(len) if len > 0 && len < MAX_RECORD_LEN && remaining.len() >= 4 + len => {
                            tracing::warn!(
                                segment = segment_number,
                                offset = offset,
                                "Skipping corrupted trace record (checksum mismatch)"
                            );
                            offset += 4 + len;
                            valid_end = header_size + offset as u64;
                            skipped_corrupted += 1;
                        }
                        _ => {
                            stop_reason = ReadStopReason::ChecksumMismatch { offset };
                            break;
                        }
                    }
                }
                Err(WalRecordError::InvalidFormat) => {
                    // Zeroed or garbage length prefix
                    stop_reason = ReadStopReason::InvalidRecord { offset };
                    break;
                }
                Err(e) => {
                    // CRC was valid but the payload could not be parsed:
                    // format version mismatch, not corruption.
                    stop_reason = ReadStopReason::ParseError {
                        offset,
                        detail: e.to_string(),
                    };
                    break;
                }
            }
        }

        Ok(SegmentRead {
            records,
            valid_end,
            size: segment.size(),
            stop_reason,
            skipped_corrupted,
        })
    }

    /// Read all records from all segments in a directory, in order.
    ///
    /// Only the last segment may need truncation; earlier segments were closed
    /// before the next one was created.
    pub fn read_all(&self, wal_dir: &Path) -> Result<WalReadResult, WalReaderError> {
        let segments = self.list_segments(wal_dir)?;

        let mut records = Vec::new();
        let mut truncate_info = None;
        let mut stop_reason = ReadStopReason::EndOfData;
        let mut skipped_corrupted = 0usize;
        let mut unreadable_segment = None;

        for (idx, &segment_number) in segments.iter().enumerate() {
            let is_last = idx + 1 == segments.len();
            let read = match self.read_segment(wal_dir, segment_number) {
                Ok(read) => read,
                Err(e) if is_last => {
                    // A crash between creating the file and writing its header
                    tracing::warn!(
                        segment = segment_number,
                        error = %e,
                        "Ignoring unreadable last trace segment"
                    );
                    unreadable_segment = Some(segment_number);
                    break;
                }
                Err(e) => return Err(e),
            };

            records.extend(read.records);
            skipped_corrupted += read.skipped_corrupted;
            stop_reason = read.stop_reason;

            if is_last && read.valid_end < read.size {
                truncate_info = Some(TruncateInfo {
                    segment_number,
                    valid_end: read.valid_end,
                    original_size: read.size,
                });
            }
        }

        Ok(WalReadResult {
            records,
            truncate_info,
            stop_reason,
            skipped_corrupted,
            unreadable_segment,
        })
    }

    /// List all segment numbers in the directory, ascending.
    pub fn list_segments(&self, wal_dir: &Path) -> Result<Vec<u64>, WalReaderError> {
        list_segment_numbers(wal_dir).map_err(|e| WalReaderError::IoError(e.to_string()))
    }
}

/// Upper bound used to decide whether a corrupted record's length is trustworthy
const MAX_RECORD_LEN: usize = 256 * 1024 * 1024;

/// Records read from one segment.
#[derive(Debug)]
pub struct SegmentRead {
    /// Valid records in order
    pub records: Vec<WalRecord>,
    /// Position where valid data ends
    pub valid_end: u64,
    /// Segment size on disk
    pub size: u64,
    /// Why reading stopped
    pub stop_reason: ReadStopReason,
    /// Corrupted records skipped
    pub skipped_corrupted: usize,
}

/// Reason why record reading stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStopReason {
    /// Read all records to end of data
    EndOfData,
    /// Partial record at end of segment (expected after crash)
    PartialRecord,
    /// CRC mismatch with no usable length to skip past
    ChecksumMismatch {
        /// Byte offset after the header where the mismatch was detected
        offset: usize,
    },
    /// Length prefix that cannot start a record
    InvalidRecord {
        /// Byte offset after the header where the bad prefix was found
        offset: usize,
    },
    /// CRC was valid but the record could not be parsed
    ParseError {
        /// Byte offset after the header where parsing failed
        offset: usize,
        /// Human-readable error description
        detail: String,
    },
}

/// Result of reading all segments.
#[derive(Debug)]
pub struct WalReadResult {
    /// All valid records in order
    pub records: Vec<WalRecord>,
    /// Truncation needed on the last segment (if any)
    pub truncate_info: Option<TruncateInfo>,
    /// Why reading of the last segment stopped
    pub stop_reason: ReadStopReason,
    /// Number of corrupted records that were skipped
    pub skipped_corrupted: usize,
    /// Last segment whose header could not be read (if any)
    pub unreadable_segment: Option<u64>,
}

/// Information about a segment that needs truncation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncateInfo {
    /// Segment number
    pub segment_number: u64,
    /// Position where valid data ends
    pub valid_end: u64,
    /// Original file size
    pub original_size: u64,
}

impl TruncateInfo {
    /// Get the number of bytes that need to be truncated.
    pub fn bytes_to_truncate(&self) -> u64 {
        self.original_size - self.valid_end
    }
}

/// Reader errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalReaderError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),
}

//! Trace log writer with durability mode support.
//!
//! The writer appends records to the active segment, rotates segments when
//! they reach the configured size, and fsyncs according to the durability
//! mode.

use super::DurabilityMode;
use crate::format::{WalRecord, WalSegment};
use crate::wal::config::WalConfig;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Cumulative writer counters.
///
/// These accumulate over the lifetime of the writer and are never reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalCounters {
    /// Total record appends
    pub appends: u64,
    /// Total fsync calls
    pub sync_calls: u64,
    /// Total bytes written to segments
    pub bytes_written: u64,
    /// Total nanoseconds spent in fsync
    pub sync_nanos: u64,
    /// Segments created by rotation
    pub rotations: u64,
}

/// Trace log writer.
pub struct WalWriter {
    segment: WalSegment,
    durability: DurabilityMode,
    wal_dir: PathBuf,
    store_uuid: [u8; 16],
    config: WalConfig,
    writes_since_sync: usize,
    has_unsynced_data: bool,
    poisoned: bool,
    counters: WalCounters,
}

impl WalWriter {
    /// Create a new writer.
    ///
    /// If the directory contains segments, the last one is opened for
    /// appending; if it cannot be opened, a fresh segment follows it.
    pub fn new(
        wal_dir: PathBuf,
        store_uuid: [u8; 16],
        durability: DurabilityMode,
        config: WalConfig,
    ) -> std::io::Result<Self> {
        std::fs::create_dir_all(&wal_dir)?;

        let segment = match list_segment_numbers(&wal_dir)?.last().copied() {
            Some(num) => match WalSegment::open_append(&wal_dir, num) {
                Ok(seg) => seg,
                Err(e) => {
                    tracing::warn!(
                        segment = num,
                        error = %e,
                        "Cannot append to last trace segment, starting a new one"
                    );
                    WalSegment::create(&wal_dir, num + 1, store_uuid)?
                }
            },
            None => WalSegment::create(&wal_dir, 1, store_uuid)?,
        };

        Ok(WalWriter {
            segment,
            durability,
            wal_dir,
            store_uuid,
            config,
            writes_since_sync: 0,
            has_unsynced_data: false,
            poisoned: false,
            counters: WalCounters::default(),
        })
    }

    /// Append a record.
    ///
    /// - `Always`: writes and fsyncs before returning
    /// - `Standard`: writes, fsyncs once `batch_size` records are pending
    ///
    /// A failed append is rolled back: the segment is truncated to its size
    /// before the append, so a later record never follows partial bytes. If
    /// the rollback itself fails the writer is poisoned and refuses every
    /// further append.
    pub fn append(&mut self, record: &WalRecord) -> std::io::Result<()> {
        if self.poisoned {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!(
                    "trace segment {} holds a partial record that could not be removed",
                    self.segment.segment_number()
                ),
            ));
        }

        let bytes = record.to_bytes();

        // An empty segment always takes the record, however large
        let has_records = self.segment.size() > crate::format::SEGMENT_HEADER_SIZE as u64;
        if has_records && self.segment.size() + bytes.len() as u64 > self.config.segment_size {
            self.rotate_segment()?;
        }

        let rollback_to = self.segment.size();
        if let Err(e) = self.write_record(&bytes) {
            self.roll_back(rollback_to);
            return Err(e);
        }

        self.counters.appends += 1;
        self.counters.bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn write_record(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.segment.write(bytes)?;
        self.writes_since_sync += 1;
        self.has_unsynced_data = true;
        self.maybe_sync()
    }

    fn roll_back(&mut self, position: u64) {
        match self.segment.truncate(position) {
            Ok(()) => {
                // truncate syncs the segment
                self.writes_since_sync = 0;
                self.has_unsynced_data = false;
                tracing::warn!(
                    segment = self.segment.segment_number(),
                    position,
                    "Rolled back failed trace append"
                );
            }
            Err(e) => {
                self.poisoned = true;
                tracing::error!(
                    segment = self.segment.segment_number(),
                    position,
                    error = %e,
                    "Cannot roll back failed trace append, refusing further writes"
                );
            }
        }
    }

    /// True once a failed append could not be rolled back
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Make the next segment write stop after `bytes` bytes and fail.
    #[cfg(test)]
    pub(crate) fn fail_next_write_after(&mut self, bytes: usize) {
        self.segment.fail_next_write_after(bytes);
    }

    /// Make the next segment write fail and its rollback fail too.
    #[cfg(test)]
    pub(crate) fn fail_next_write_and_rollback(&mut self) {
        self.segment.fail_next_write_after(0);
        self.segment.fail_truncation();
    }

    fn maybe_sync(&mut self) -> std::io::Result<()> {
        let due = match self.durability {
            DurabilityMode::Always => true,
            DurabilityMode::Standard { batch_size } => self.writes_since_sync >= batch_size.max(1),
        };
        if due {
            self.sync()?;
        }
        Ok(())
    }

    fn sync(&mut self) -> std::io::Result<()> {
        let start = Instant::now();
        self.segment.sync()?;
        self.counters.sync_calls += 1;
        self.counters.sync_nanos += start.elapsed().as_nanos() as u64;
        self.writes_since_sync = 0;
        self.has_unsynced_data = false;
        Ok(())
    }

    /// Close the current segment (making it immutable) and create the next one.
    fn rotate_segment(&mut self) -> std::io::Result<()> {
        self.segment.close()?;
        let next = self.segment.segment_number() + 1;
        self.segment = WalSegment::create(&self.wal_dir, next, self.store_uuid)?;
        self.counters.rotations += 1;
        self.writes_since_sync = 0;
        self.has_unsynced_data = false;
        tracing::debug!(segment = next, "Rotated trace segment");
        Ok(())
    }

    /// Force pending records to disk regardless of durability mode.
    pub fn flush(&mut self) -> std::io::Result<()> {
        if self.has_unsynced_data {
            self.sync()?;
        }
        Ok(())
    }

    /// Get the current segment number.
    pub fn current_segment(&self) -> u64 {
        self.segment.segment_number()
    }

    /// Get the current segment size in bytes.
    pub fn current_segment_size(&self) -> u64 {
        self.segment.size()
    }

    /// Get a snapshot of cumulative counters.
    pub fn counters(&self) -> WalCounters {
        self.counters.clone()
    }

    /// Get the log directory path.
    pub fn wal_dir(&self) -> &Path {
        &self.wal_dir
    }

    /// Close the writer, ensuring all data is flushed.
    pub fn close(mut self) -> std::io::Result<()> {
        self.flush()?;
        self.segment.close()
    }
}

impl Drop for WalWriter {
    fn drop(&mut self) {
        if self.has_unsynced_data {
            let _ = self.segment.sync();
        }
    }
}

/// List segment numbers in a log directory, ascending.
pub fn list_segment_numbers(dir: &Path) -> std::io::Result<Vec<u64>> {
    let mut segments = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(num) = name.to_str().and_then(WalSegment::parse_segment_name) {
            segments.push(num);
        }
    }
    segments.sort_unstable();
    Ok(segments)
}

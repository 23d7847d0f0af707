//! Segmented-log trace store
//!
//! [`WalTraceStore`] implements the persistence port on top of the segmented
//! trace log. Every port call becomes one framed, checksummed record; the
//! durability mode decides when records are fsynced.
//!
//! Opening a store recovers the directory first: a torn record at the tail of
//! the last segment is truncated away and a last segment whose header never
//! made it to disk is removed, so new records always follow valid data.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::format::{SnapshotEntry, StoreEntry, WalRecord, WalSegment};
use crate::wal::{ReadStopReason, WalCounters, WalReader, WalWriter};
use std::path::{Path, PathBuf};
use tracerec_core::{PersistenceError, RunEnd, RunId, RunStart, Timestamp, TraceEvent, TraceStore};
use uuid::Uuid;

/// What recovery found when the store was opened
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryInfo {
    /// Valid records already in the log
    pub records_recovered: usize,
    /// Bytes removed from a torn tail
    pub bytes_truncated: u64,
    /// Corrupted records skipped during the scan
    pub skipped_corrupted: usize,
    /// Last segment removed because its header was unreadable
    pub removed_segment: Option<u64>,
}

/// Durable trace store backed by a segmented log directory
pub struct WalTraceStore {
    dir: PathBuf,
    writer: WalWriter,
    store_uuid: [u8; 16],
    next_sequence: u64,
    recovery: RecoveryInfo,
}

impl WalTraceStore {
    /// Open (or create) a store in `dir`.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, the directory cannot be
    /// prepared, or the log holds records from an incompatible format.
    pub fn open(dir: impl AsRef<Path>, config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::io("creating store directory", &dir, e))?;

        let reader = WalReader::new();
        let scan = reader.read_all(&dir)?;

        if let ReadStopReason::ParseError { detail, .. } = &scan.stop_reason {
            let segment = scan
                .truncate_info
                .as_ref()
                .map(|t| t.segment_number)
                .unwrap_or_default();
            return Err(StoreError::Incompatible {
                segment,
                detail: detail.clone(),
            });
        }

        let mut recovery = RecoveryInfo {
            records_recovered: scan.records.len(),
            skipped_corrupted: scan.skipped_corrupted,
            ..Default::default()
        };

        if let Some(segment_number) = scan.unreadable_segment {
            let path = WalSegment::segment_path(&dir, segment_number);
            tracing::warn!(segment = segment_number, "Removing trace segment with no valid header");
            std::fs::remove_file(&path)
                .map_err(|e| StoreError::io("removing unreadable segment", &path, e))?;
            recovery.removed_segment = Some(segment_number);
        }

        if let Some(truncate) = &scan.truncate_info {
            let path = WalSegment::segment_path(&dir, truncate.segment_number);
            tracing::warn!(
                segment = truncate.segment_number,
                valid_end = truncate.valid_end,
                bytes = truncate.bytes_to_truncate(),
                "Truncating torn tail of trace log"
            );
            let mut segment = WalSegment::open_append(&dir, truncate.segment_number)
                .map_err(|e| StoreError::io("opening segment for truncation", &path, e))?;
            segment
                .truncate(truncate.valid_end)
                .map_err(|e| StoreError::io("truncating segment", &path, e))?;
            recovery.bytes_truncated = truncate.bytes_to_truncate();
        }

        let store_uuid = match reader.list_segments(&dir)?.first() {
            Some(&first) => {
                let path = WalSegment::segment_path(&dir, first);
                WalSegment::open_read(&dir, first)
                    .map_err(|e| StoreError::io("reading segment header", &path, e))?
                    .store_uuid()
            }
            None => Uuid::new_v4().into_bytes(),
        };

        let next_sequence = scan
            .records
            .iter()
            .map(|r| r.sequence)
            .max()
            .map_or(1, |max| max + 1);

        let writer = WalWriter::new(
            dir.clone(),
            store_uuid,
            config.durability,
            config.wal_config,
        )
        .map_err(|e| StoreError::io("opening trace log writer", &dir, e))?;

        tracing::debug!(
            dir = %dir.display(),
            records = recovery.records_recovered,
            segment = writer.current_segment(),
            durability = config.durability.description(),
            "Opened trace store"
        );

        Ok(WalTraceStore {
            dir,
            writer,
            store_uuid,
            next_sequence,
            recovery,
        })
    }

    fn append(&mut self, entry: &StoreEntry) -> Result<(), StoreError> {
        let bytes = entry.encode()?;
        let record = WalRecord::new(self.next_sequence, Timestamp::now().as_micros(), bytes);
        self.writer.append(&record).map_err(|e| {
            StoreError::io("appending trace record", self.writer.wal_dir(), e)
        })?;
        self.next_sequence += 1;
        Ok(())
    }

    /// Store directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Identifier written into every segment header
    pub fn store_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.store_uuid)
    }

    /// Sequence number the next record will carry
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Recovery report from [`open`](Self::open)
    pub fn recovery_info(&self) -> &RecoveryInfo {
        &self.recovery
    }

    /// Writer counters
    pub fn counters(&self) -> WalCounters {
        self.writer.counters()
    }

    /// Flush pending records and close the active segment.
    pub fn close(self) -> Result<(), StoreError> {
        let dir = self.dir;
        self.writer
            .close()
            .map_err(|e| StoreError::io("closing trace log", &dir, e))
    }
}

impl TraceStore for WalTraceStore {
    fn begin_run(&mut self, start: &RunStart) -> Result<(), PersistenceError> {
        self.append(&StoreEntry::RunBegin(start.clone()))
            .map_err(|e| PersistenceError::new("begin_run", e))
    }

    fn finalize_run(&mut self, end: &RunEnd) -> Result<(), PersistenceError> {
        self.append(&StoreEntry::RunEnd(end.clone()))
            .map_err(|e| PersistenceError::new("finalize_run", e))
    }

    fn record_event(&mut self, event: &TraceEvent) -> Result<(), PersistenceError> {
        self.append(&StoreEntry::Event(event.clone()))
            .map_err(|e| PersistenceError::new("record_event", e))
    }

    fn store_file_snapshot(
        &mut self,
        run_id: &RunId,
        filename: &str,
        body: &[u8],
    ) -> Result<(), PersistenceError> {
        let entry = StoreEntry::FileSnapshot(SnapshotEntry {
            run_id: run_id.clone(),
            filename: filename.to_string(),
            body: body.to_vec(),
        });
        self.append(&entry)
            .map_err(|e| PersistenceError::new("store_file_snapshot", e))
    }

    fn flush(&mut self) -> Result<(), PersistenceError> {
        let dir = self.dir.clone();
        self.writer
            .flush()
            .map_err(|e| PersistenceError::new("flush", StoreError::io("syncing trace log", &dir, e)))
    }
}

impl std::fmt::Debug for WalTraceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalTraceStore")
            .field("dir", &self.dir)
            .field("segment", &self.writer.current_segment())
            .field("next_sequence", &self.next_sequence)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::DurabilityMode;
    use std::io::Write;
    use tempfile::tempdir;

    fn start(run_id: &str) -> RunStart {
        RunStart {
            run_id: RunId::new(run_id),
            cwd: "/work/".to_string(),
            description: vec!["script.py".to_string()],
            start_time: None,
        }
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("traces");
        let store = WalTraceStore::open(&path, StoreConfig::for_testing()).unwrap();
        assert!(path.is_dir());
        assert_eq!(store.next_sequence(), 1);
        assert_eq!(store.recovery_info(), &RecoveryInfo::default());
    }

    #[test]
    fn test_sequence_resumes_after_reopen() {
        let dir = tempdir().unwrap();
        let uuid = {
            let mut store = WalTraceStore::open(dir.path(), StoreConfig::for_testing()).unwrap();
            store.begin_run(&start("r1")).unwrap();
            store
                .store_file_snapshot(&RunId::new("r1"), "a.py", b"x = 1\n")
                .unwrap();
            store.store_uuid()
        };

        let store = WalTraceStore::open(dir.path(), StoreConfig::for_testing()).unwrap();
        assert_eq!(store.next_sequence(), 3);
        assert_eq!(store.recovery_info().records_recovered, 2);
        assert_eq!(store.store_uuid(), uuid);
    }

    #[test]
    fn test_torn_tail_is_truncated() {
        let dir = tempdir().unwrap();
        {
            let mut store = WalTraceStore::open(dir.path(), StoreConfig::for_testing()).unwrap();
            store.begin_run(&start("r1")).unwrap();
        }
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(WalSegment::segment_path(dir.path(), 1))
            .unwrap();
        file.write_all(&[0x40, 0, 0, 0, 1, 2]).unwrap();
        drop(file);

        let mut store = WalTraceStore::open(dir.path(), StoreConfig::for_testing()).unwrap();
        assert_eq!(store.recovery_info().bytes_truncated, 6);
        store.begin_run(&start("r2")).unwrap();
        drop(store);

        let scan = WalReader::new().read_all(dir.path()).unwrap();
        assert_eq!(scan.records.len(), 2);
        assert_eq!(scan.stop_reason, ReadStopReason::EndOfData);
    }

    #[test]
    fn test_headerless_last_segment_is_removed() {
        let dir = tempdir().unwrap();
        {
            let mut store = WalTraceStore::open(dir.path(), StoreConfig::for_testing()).unwrap();
            store.begin_run(&start("r1")).unwrap();
        }
        std::fs::write(WalSegment::segment_path(dir.path(), 2), b"TR").unwrap();

        let store = WalTraceStore::open(dir.path(), StoreConfig::for_testing()).unwrap();
        assert_eq!(store.recovery_info().removed_segment, Some(2));
        drop(store);

        assert!(WalReader::new().read_all(dir.path()).unwrap().unreadable_segment.is_none());
    }

    #[test]
    fn test_failed_append_does_not_take_later_writes_with_it() {
        let dir = tempdir().unwrap();
        {
            let mut store = WalTraceStore::open(dir.path(), StoreConfig::for_testing()).unwrap();
            store.begin_run(&start("r1")).unwrap();

            store.writer.fail_next_write_after(64);
            let err = store
                .store_file_snapshot(&RunId::new("r1"), "big.py", &[b'x'; 10_000])
                .unwrap_err();
            assert_eq!(err.operation, "store_file_snapshot");

            let end = RunEnd {
                run_id: RunId::new("r1"),
                end_time: None,
                message: Some("ok".to_string()),
                traceback: None,
            };
            store.finalize_run(&end).unwrap();
        }

        let store = WalTraceStore::open(dir.path(), StoreConfig::for_testing()).unwrap();
        assert_eq!(store.recovery_info().bytes_truncated, 0);
        assert_eq!(store.recovery_info().records_recovered, 2);
        drop(store);

        let log = crate::TraceLog::load(dir.path()).unwrap();
        let run = log.run(&RunId::new("r1")).unwrap();
        assert_eq!(run.status, tracerec_core::RunStatus::Completed);
        assert_eq!(run.run.exit_message.as_deref(), Some("ok"));
        assert!(run.snapshots.is_empty());
    }

    #[test]
    fn test_unrecoverable_append_refuses_later_writes() {
        let dir = tempdir().unwrap();
        let mut store = WalTraceStore::open(dir.path(), StoreConfig::for_testing()).unwrap();
        store.begin_run(&start("r1")).unwrap();

        store.writer.fail_next_write_and_rollback();
        assert!(store.begin_run(&start("r2")).is_err());
        assert!(store.begin_run(&start("r3")).is_err());
        assert_eq!(store.next_sequence(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::default().with_segment_size(1);
        assert!(matches!(
            WalTraceStore::open(dir.path(), config),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_standard_mode_flush() {
        let dir = tempdir().unwrap();
        let config =
            StoreConfig::for_testing().with_durability(DurabilityMode::Standard { batch_size: 100 });
        let mut store = WalTraceStore::open(dir.path(), config).unwrap();
        store.begin_run(&start("r1")).unwrap();
        assert_eq!(store.counters().sync_calls, 0);
        store.flush().unwrap();
        assert_eq!(store.counters().sync_calls, 1);
    }
}

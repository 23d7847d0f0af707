//! Corruption and crash-tail tests
//!
//! These tests verify that damaged trace logs are handled gracefully:
//! - CRC32 detects bit flips and the damaged record is skipped
//! - A torn final record is truncated when the store reopens
//! - Records before the damage are never lost

use proptest::prelude::*;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::TempDir;
use tracerec_core::{CallId, RunId, RunStart, TraceEvent, TraceStore};
use tracerec_durability::format::{WalSegment, SEGMENT_HEADER_SIZE};
use tracerec_durability::wal::WalReader;
use tracerec_durability::{StoreConfig, TraceLog, WalTraceStore};

fn start(run_id: &str) -> RunStart {
    RunStart {
        run_id: RunId::new(run_id),
        cwd: String::new(),
        description: Vec::new(),
        start_time: None,
    }
}

fn event(line_no: u64) -> TraceEvent {
    TraceEvent {
        run_id: RunId::new("r1"),
        call_id: CallId::new("c1"),
        event: "line".to_string(),
        func_name: None,
        line_no: Some(line_no),
        filename: None,
        trace_arg: None,
        local_vars: None,
        timestamp: None,
    }
}

/// Write a run with `events` line events and return segment 1's size
fn write_run(dir: &Path, events: u64) -> u64 {
    let mut store = WalTraceStore::open(dir, StoreConfig::for_testing()).unwrap();
    store.begin_run(&start("r1")).unwrap();
    for line in 1..=events {
        store.record_event(&event(line)).unwrap();
    }
    drop(store);
    std::fs::metadata(WalSegment::segment_path(dir, 1)).unwrap().len()
}

#[test]
fn test_crc_detects_bit_flip() {
    let temp_dir = TempDir::new().unwrap();
    write_run(temp_dir.path(), 3);

    // Flip a byte inside the first record's payload (the RunBegin)
    {
        let path = WalSegment::segment_path(temp_dir.path(), 1);
        let mut file = OpenOptions::new().read(true).write(true).open(path).unwrap();
        let offset = SEGMENT_HEADER_SIZE as u64 + 10;
        file.seek(SeekFrom::Start(offset)).unwrap();
        let mut buf = [0u8; 1];
        file.read_exact(&mut buf).unwrap();
        buf[0] ^= 0xFF;
        file.seek(SeekFrom::Start(offset)).unwrap();
        file.write_all(&buf).unwrap();
    }

    let scan = WalReader::new().read_all(temp_dir.path()).unwrap();
    assert_eq!(scan.skipped_corrupted, 1);
    assert_eq!(scan.records.len(), 3);

    // The events now have no run to attach to
    let log = TraceLog::load(temp_dir.path()).unwrap();
    assert!(log.is_empty());
    assert_eq!(log.dangling_entries(), 3);
}

#[test]
fn test_reopen_after_torn_write_appends_cleanly() {
    let temp_dir = TempDir::new().unwrap();
    let size = write_run(temp_dir.path(), 2);

    // Crash mid-append: only a length prefix and a few payload bytes
    {
        let path = WalSegment::segment_path(temp_dir.path(), 1);
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(&[0x80, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03]).unwrap();
    }

    let mut store = WalTraceStore::open(temp_dir.path(), StoreConfig::for_testing()).unwrap();
    assert_eq!(store.recovery_info().bytes_truncated, 7);
    assert_eq!(store.next_sequence(), 4);
    store.record_event(&event(3)).unwrap();
    drop(store);

    let log = TraceLog::load(temp_dir.path()).unwrap();
    let lines: Vec<u64> = log.runs()[0].events.iter().filter_map(|e| e.line_no).collect();
    assert_eq!(lines, vec![1, 2, 3]);

    let grown = std::fs::metadata(WalSegment::segment_path(temp_dir.path(), 1))
        .unwrap()
        .len();
    assert!(grown > size);
}

#[test]
fn test_load_does_not_modify_torn_log() {
    let temp_dir = TempDir::new().unwrap();
    write_run(temp_dir.path(), 1);
    let path = WalSegment::segment_path(temp_dir.path(), 1);
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0xFF, 0x00]).unwrap();
    }
    let before = std::fs::metadata(&path).unwrap().len();

    let log = TraceLog::load(temp_dir.path()).unwrap();
    assert_eq!(log.runs()[0].events.len(), 1);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), before);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Cutting the last segment anywhere keeps every record that ends before the cut
    #[test]
    fn prop_truncation_keeps_complete_prefix(events in 1u64..20, cut_fraction in 0.0f64..1.0) {
        let temp_dir = TempDir::new().unwrap();
        write_run(temp_dir.path(), events);

        let path = WalSegment::segment_path(temp_dir.path(), 1);
        let full = WalReader::new().read_segment(temp_dir.path(), 1).unwrap();
        let region = full.size - SEGMENT_HEADER_SIZE as u64;
        let cut = SEGMENT_HEADER_SIZE as u64 + (region as f64 * cut_fraction) as u64;

        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(cut).unwrap();
        drop(file);

        let mut expected = 0usize;
        let mut end = SEGMENT_HEADER_SIZE as u64;
        for record in &full.records {
            end += record.to_bytes().len() as u64;
            if end <= cut {
                expected += 1;
            }
        }

        let store = WalTraceStore::open(temp_dir.path(), StoreConfig::for_testing()).unwrap();
        prop_assert_eq!(store.recovery_info().records_recovered, expected);
        prop_assert_eq!(store.next_sequence(), expected as u64 + 1);
    }
}

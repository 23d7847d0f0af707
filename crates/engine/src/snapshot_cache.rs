//! Per-run file snapshot cache
//!
//! Tracks which source files already have a stored snapshot in the current
//! run, and reads file bodies through a [`FileSource`]. A filename is marked
//! only after its snapshot was stored, so a failed read or write leaves the
//! file eligible for capture on the next event that references it.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tracerec_core::{Error, Result};

/// Where file bodies are read from
pub trait FileSource {
    /// Read the whole file, bytes verbatim
    fn read_body(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads files from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileSource;

impl FileSource for FsFileSource {
    fn read_body(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

impl<F: FileSource + ?Sized> FileSource for &F {
    fn read_body(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read_body(path)
    }
}

/// Filenames captured in the current run
#[derive(Debug, Default)]
pub struct SnapshotCache<F: FileSource = FsFileSource> {
    captured: HashSet<String>,
    source: F,
}

impl SnapshotCache<FsFileSource> {
    /// Create an empty cache reading from the filesystem
    pub fn new() -> Self {
        Self::with_source(FsFileSource)
    }
}

impl<F: FileSource> SnapshotCache<F> {
    /// Create an empty cache reading through `source`
    pub fn with_source(source: F) -> Self {
        SnapshotCache {
            captured: HashSet::new(),
            source,
        }
    }

    /// True iff `filename` is non-empty and not yet captured in this run
    pub fn should_capture(&self, filename: &str) -> bool {
        !filename.is_empty() && !self.captured.contains(filename)
    }

    /// Record that `filename` has a stored snapshot
    pub fn mark_captured(&mut self, filename: &str) {
        self.captured.insert(filename.to_string());
    }

    /// Whether `filename` has been captured in this run
    pub fn is_captured(&self, filename: &str) -> bool {
        self.captured.contains(filename)
    }

    /// Forget every capture; called when a new run starts
    pub fn reset(&mut self) {
        self.captured.clear();
    }

    /// Number of captured files
    pub fn len(&self) -> usize {
        self.captured.len()
    }

    /// True if nothing has been captured
    pub fn is_empty(&self) -> bool {
        self.captured.is_empty()
    }

    /// Read the body of `filename`.
    ///
    /// # Errors
    ///
    /// `Error::FileCapture` if the file cannot be read.
    pub fn read_body(&self, filename: &str) -> Result<Vec<u8>> {
        let path = PathBuf::from(filename);
        self.source
            .read_body(&path)
            .map_err(|source| Error::FileCapture { path, source })
    }

    /// The file source
    pub fn source(&self) -> &F {
        &self.source
    }
}

//! Run session tracking
//!
//! This module provides the RunSession struct for tracking the run currently
//! being recorded. Only one run is open at a time; the session keeps no
//! history of earlier runs. Run metadata is persisted through the store, the
//! session only holds what the recorder needs while the run is open.

use std::path::MAIN_SEPARATOR;
use tracerec_core::{RunId, RunStart, Timestamp};

/// Normalize a working directory to end in exactly one path separator
///
/// Trailing separators are stripped and one is appended. An empty directory
/// stays empty and the root directory stays the root directory.
///
/// # Arguments
///
/// * `cwd` - The working directory as reported by the tracer
///
/// # Returns
///
/// The normalized directory string
pub fn normalize_cwd(cwd: &str) -> String {
    if cwd.is_empty() {
        return String::new();
    }
    let mut normalized = cwd.trim_end_matches(MAIN_SEPARATOR).to_string();
    normalized.push(MAIN_SEPARATOR);
    normalized
}

/// State of the run currently being recorded
///
/// Holds the normalized copy of the `start_run` data for the open run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSession {
    open: Option<RunStart>,
}

impl RunSession {
    /// Create a session with no open run
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a run
    ///
    /// Replaces any previously open run. The working directory is normalized
    /// before it is stored.
    ///
    /// # Arguments
    ///
    /// * `run_id` - The run being opened
    /// * `cwd` - Working directory of the traced program
    /// * `description` - Command line tokens
    /// * `start_time` - When the run started, if known
    ///
    /// # Returns
    ///
    /// The stored run data, with the normalized working directory
    pub fn begin(
        &mut self,
        run_id: RunId,
        cwd: &str,
        description: Vec<String>,
        start_time: Option<Timestamp>,
    ) -> &RunStart {
        self.open.insert(RunStart {
            run_id,
            cwd: normalize_cwd(cwd),
            description,
            start_time,
        })
    }

    /// Close the open run
    ///
    /// # Returns
    ///
    /// The run data if a run was open, None otherwise
    pub fn end(&mut self) -> Option<RunStart> {
        self.open.take()
    }

    /// Check if a run is open
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// The open run's identifier
    pub fn run_id(&self) -> Option<&RunId> {
        self.open.as_ref().map(|run| &run.run_id)
    }

    /// The open run's normalized working directory
    pub fn cwd(&self) -> Option<&str> {
        self.open.as_ref().map(|run| run.cwd.as_str())
    }

    /// The open run's data
    pub fn current(&self) -> Option<&RunStart> {
        self.open.as_ref()
    }
}

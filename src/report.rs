//! Generation reports and generator statistics.
//!
//! Reports are returned to callers and printed by the CLI; they are never
//! written into generated files, which must stay reproducible.

use crate::emit::ArtifactKind;
use crate::error::ExportError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of writing one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteOutcome {
    /// File did not exist or its content differed
    Written,
    /// File already had the rendered content
    Unchanged,
}

/// Freshness of an artifact on disk relative to a fresh render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactState {
    /// Content matches
    UpToDate,
    /// File does not exist
    Missing,
    /// Content differs
    Stale,
}

impl std::fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactState::UpToDate => write!(f, "up to date"),
            ArtifactState::Missing => write!(f, "missing"),
            ArtifactState::Stale => write!(f, "stale"),
        }
    }
}

/// Status of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactStatus {
    /// What the file is
    pub kind: ArtifactKind,
    /// File name inside the output directory
    pub file_name: String,
    /// Freshness
    pub state: ArtifactState,
}

impl ArtifactStatus {
    /// Whether the artifact needs regenerating
    pub fn is_outdated(&self) -> bool {
        self.state != ArtifactState::UpToDate
    }
}

/// Result of a `write` run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    /// `DUK_VERSION` of the scanned header
    pub engine_version: Option<u32>,
    /// Digest of the scanned headers
    pub header_digest: String,
    /// Constants materialized
    pub constants: usize,
    /// Functions materialized
    pub functions: usize,
    /// Exports skipped in lenient mode
    pub skipped: Vec<ExportError>,
    /// Files whose content changed
    pub files_written: Vec<String>,
    /// Files left untouched
    pub files_unchanged: Vec<String>,
    /// Wall time in microseconds
    pub duration_us: u64,
    /// When the run finished
    pub generated_at: DateTime<Utc>,
}

impl GenerationReport {
    /// Create an empty report for a header
    pub fn new(engine_version: Option<u32>, header_digest: impl Into<String>) -> Self {
        Self {
            engine_version,
            header_digest: header_digest.into(),
            constants: 0,
            functions: 0,
            skipped: Vec::new(),
            files_written: Vec::new(),
            files_unchanged: Vec::new(),
            duration_us: 0,
            generated_at: Utc::now(),
        }
    }

    /// Record the number of materialized exports
    pub fn with_counts(mut self, constants: usize, functions: usize) -> Self {
        self.constants = constants;
        self.functions = functions;
        self
    }

    /// Record skipped exports
    pub fn with_skipped(mut self, skipped: Vec<ExportError>) -> Self {
        self.skipped = skipped;
        self
    }

    /// Record the run duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_us = duration.as_micros() as u64;
        self
    }

    /// Record the outcome for one file
    pub fn record(&mut self, file_name: &str, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Written => self.files_written.push(file_name.to_string()),
            WriteOutcome::Unchanged => self.files_unchanged.push(file_name.to_string()),
        }
    }

    /// Whether any file was written
    pub fn changed(&self) -> bool {
        !self.files_written.is_empty()
    }
}

/// Counters for a generator instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorStats {
    /// Header scans served from cache
    pub cache_hits: u64,
    /// Header scans performed
    pub cache_misses: u64,
    /// Distinct header sets cached
    pub cached_headers: usize,
    /// Completed generate runs
    pub generations: u64,
    /// Files written across all runs
    pub files_written: u64,
}

impl GeneratorStats {
    /// Fraction of scans served from cache (0-1)
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

//! Shim generation and header caching.
//!
//! [`ShimGenerator`] ties the pieces together: it scans the engine headers
//! (caching the index of the latest content digest), selects and validates the export
//! table, renders the artifacts and writes the ones whose content changed.

use crate::config::ShimConfig;
use crate::emit::rust::ClangOptions;
use crate::emit::{self, Artifact, ArtifactKind, Banner, EmitOptions};
use crate::error::{ExportError, Result};
use crate::export::{builtin, ExportTable};
use crate::header::{self, HeaderIndex, HeaderSource, MacroDefinition};
use crate::lock::{self, ExportLock, LockChange};
use crate::report::{
    ArtifactState, ArtifactStatus, GenerationReport, GeneratorStats, WriteOutcome,
};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// An export table checked against a header
#[derive(Debug, Clone)]
pub struct ValidatedTable {
    /// Exports that will be materialized
    pub table: ExportTable,
    /// Exports dropped because their macro is missing (lenient mode only)
    pub skipped: Vec<ExportError>,
}

/// Everything produced by one render
#[derive(Debug, Clone)]
pub struct Rendered {
    /// The scanned headers
    pub index: Arc<HeaderIndex>,
    /// The validated table
    pub validated: ValidatedTable,
    /// Golden values for the validated constants
    pub lock: ExportLock,
    /// Files to write, lock last
    pub artifacts: Vec<Artifact>,
}

/// Result of comparing a fresh render with the output directory
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// One entry per artifact
    pub statuses: Vec<ArtifactStatus>,
    /// Differences between the lock on disk and the fresh one
    pub lock_changes: Vec<LockChange>,
}

impl CheckOutcome {
    /// Whether every artifact is up to date
    pub fn is_clean(&self) -> bool {
        self.statuses.iter().all(|s| !s.is_outdated())
    }
}

/// Shim generator with header caching
pub struct ShimGenerator {
    /// Configuration
    config: ShimConfig,
    /// Latest scanned headers and their digest
    cache: RwLock<Option<(String, Arc<HeaderIndex>)>>,
    /// Cache hits
    cache_hits: AtomicU64,
    /// Cache misses
    cache_misses: AtomicU64,
    /// Completed write runs
    generations: AtomicU64,
    /// Files written across runs
    files_written: AtomicU64,
}

impl ShimGenerator {
    /// Create a generator
    pub fn new(config: ShimConfig) -> Result<Self> {
        config.validate()?;

        info!(
            header = %config.engine_header.display(),
            extras = config.extra_headers.len(),
            strict = config.strict,
            "Initialized shim generator"
        );

        Ok(Self {
            config,
            cache: RwLock::new(None),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            generations: AtomicU64::new(0),
            files_written: AtomicU64::new(0),
        })
    }

    /// The generator's configuration
    pub fn config(&self) -> &ShimConfig {
        &self.config
    }

    /// Read and scan the configured headers
    ///
    /// Headers are re-read on every call; scanning is skipped when their
    /// content digest matches the previous scan. Only the latest index is
    /// kept, so a long-running watcher does not accumulate old headers.
    pub fn scan(&self) -> Result<Arc<HeaderIndex>> {
        let sources = self
            .config
            .headers()
            .map(|path| {
                HeaderSource::from_file(path).map_err(|e| ExportError::header_unreadable(path, e))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let key = header::digest_sources(&sources);

        if let Some((digest, index)) = self.cache.read().as_ref() {
            if *digest == key {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!(digest = %short(&key), "Header cache hit");
                return Ok(Arc::clone(index));
            }
        }

        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        debug!(digest = %short(&key), "Header cache miss, scanning");

        let index = Arc::new(HeaderIndex::scan(sources));
        if let Some((old, _)) = self.cache.write().replace((key, Arc::clone(&index))) {
            debug!(digest = %short(&old), "Evicted previous header scan");
        }
        Ok(index)
    }

    /// The export table for a scanned header
    ///
    /// Uses the configured table file if any, otherwise the built-in table
    /// covering the header's `DUK_VERSION`.
    pub fn resolve_table(&self, index: &HeaderIndex) -> Result<ExportTable> {
        let version = index.engine_version();

        let Some(path) = &self.config.table else {
            let table = builtin::for_version(version)?;
            debug!(version = ?version, "Selected built-in export table");
            return Ok(table.clone());
        };

        let table = ExportTable::from_file(path)?;
        if let Some(v) = version {
            let ranged = table.min_version.is_some() || table.max_version.is_some();
            if ranged && !table.covers(v) {
                warn!(
                    table = %path.display(),
                    version = v,
                    "Export table does not declare support for this engine version"
                );
            }
        }
        Ok(table)
    }

    /// Check a table against a header
    pub fn validate_against(&self, table: &ExportTable, index: &HeaderIndex) -> Result<ValidatedTable> {
        validate_exports(table, index, self.config.strict)
    }

    /// Rendering options for a scanned header
    pub fn emit_options(&self, index: &HeaderIndex) -> EmitOptions {
        let engine_includes = self
            .config
            .headers()
            .map(|path| {
                if self.config.include_by_path {
                    path.display().to_string()
                } else {
                    file_name(path)
                }
            })
            .collect();

        EmitOptions {
            header_name: self.config.header_name.clone(),
            engine_includes,
            prelude: self.config.prelude.clone(),
            debug_write_hook: self.config.debug_write_hook,
            banner: Banner {
                engine_header: file_name(&self.config.engine_header),
                engine_version: index.engine_version(),
                digest: index.digest().to_string(),
            },
        }
    }

    /// Clang arguments for the Rust bindings
    pub fn clang_options(&self) -> ClangOptions {
        ClangOptions {
            include_dirs: self.config.include_dirs(),
            extra_args: self.config.clang_args.clone(),
        }
    }

    /// Render every artifact in memory
    pub fn render(&self) -> Result<Rendered> {
        let index = self.scan()?;
        let table = self.resolve_table(&index)?;
        let validated = self.validate_against(&table, &index)?;
        let opts = self.emit_options(&index);
        let mut lock = ExportLock::from_index(&validated.table, &index);

        let header = emit::c::render_header(&validated.table, &opts)?;
        let bindings = match &self.config.rust_bindings_name {
            Some(name) => {
                let rust = emit::rust::render_rust(
                    &validated.table,
                    &header,
                    &opts,
                    &self.clang_options(),
                )?;
                lock = lock.with_compiler_values(&rust.macro_values);
                Some(Artifact::new(ArtifactKind::RustBindings, name, rust.contents))
            }
            None => None,
        };

        let mut artifacts = vec![
            Artifact::new(ArtifactKind::Header, &self.config.header_name, header),
            Artifact::new(
                ArtifactKind::Source,
                &self.config.source_name,
                emit::c::render_source(&validated.table, &opts)?,
            ),
        ];
        artifacts.extend(bindings);
        artifacts.push(Artifact::new(
            ArtifactKind::Lock,
            &self.config.lock_name,
            lock.to_json()?,
        ));

        Ok(Rendered {
            index,
            validated,
            lock,
            artifacts,
        })
    }

    /// Render and write every artifact whose content changed
    pub fn write(&self) -> Result<GenerationReport> {
        let start = Instant::now();
        let rendered = self.render()?;

        let mut report = GenerationReport::new(
            rendered.index.engine_version(),
            rendered.index.digest(),
        )
        .with_counts(
            rendered.validated.table.constants.len(),
            rendered.validated.table.functions.len(),
        )
        .with_skipped(rendered.validated.skipped.clone());

        for artifact in &rendered.artifacts {
            let path = self.artifact_path(artifact);
            let outcome = write_if_changed(&path, &artifact.contents)?;
            if outcome == WriteOutcome::Written {
                self.files_written.fetch_add(1, Ordering::Relaxed);
                debug!(file = %path.display(), kind = %artifact.kind, "Wrote artifact");
            }
            report.record(&artifact.file_name, outcome);
        }

        self.generations.fetch_add(1, Ordering::Relaxed);
        let report = report.with_duration(start.elapsed());

        info!(
            constants = report.constants,
            functions = report.functions,
            skipped = report.skipped.len(),
            written = report.files_written.len(),
            unchanged = report.files_unchanged.len(),
            duration_us = report.duration_us,
            "Generated shim"
        );

        Ok(report)
    }

    /// Compare a fresh render with the output directory without writing
    pub fn check(&self) -> Result<CheckOutcome> {
        let rendered = self.render()?;

        let statuses = rendered
            .artifacts
            .iter()
            .map(|artifact| {
                let state = artifact_state(&self.artifact_path(artifact), &artifact.contents)?;
                Ok(ArtifactStatus {
                    kind: artifact.kind,
                    file_name: artifact.file_name.clone(),
                    state,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let lock_path = self.config.output_dir.join(&self.config.lock_name);
        let lock_changes = match std::fs::read_to_string(&lock_path) {
            Ok(raw) => match ExportLock::from_json(&raw) {
                Ok(old) => lock::diff(&old, &rendered.lock),
                Err(e) => {
                    warn!(file = %lock_path.display(), error = %e, "Ignoring unreadable lock file");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        let outdated = statuses.iter().filter(|s| s.is_outdated()).count();
        info!(
            artifacts = statuses.len(),
            outdated,
            lock_changes = lock_changes.len(),
            "Checked shim"
        );

        Ok(CheckOutcome {
            statuses,
            lock_changes,
        })
    }

    /// Get generator statistics
    pub fn get_stats(&self) -> GeneratorStats {
        GeneratorStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cached_headers: usize::from(self.cache.read().is_some()),
            generations: self.generations.load(Ordering::Relaxed),
            files_written: self.files_written.load(Ordering::Relaxed),
        }
    }

    /// Drop all cached header scans
    pub fn clear_cache(&self) {
        *self.cache.write() = None;
        info!("Cleared header cache");
    }

    fn artifact_path(&self, artifact: &Artifact) -> PathBuf {
        self.config.output_dir.join(&artifact.file_name)
    }
}

/// Check every export in `table` against the macros in `index`
///
/// Missing macros fail in strict mode and are skipped (with a warning)
/// otherwise. Kind and arity mismatches always fail. Function exports whose
/// macro is object-like are accepted: the forwarding call expands through
/// the alias.
pub fn validate_exports(table: &ExportTable, index: &HeaderIndex, strict: bool) -> Result<ValidatedTable> {
    table.validate()?;

    let mut kept = ExportTable::new(table.engine.clone())
        .with_versions(table.min_version, table.max_version);
    let mut skipped = Vec::new();

    for constant in &table.constants {
        match index.get(&constant.name) {
            None => skipped.push(ExportError::missing_macro(&constant.name)),
            Some(def) if def.is_function_like() => {
                return Err(locate(ExportError::kind_mismatch(&constant.name), index, def).into());
            }
            Some(_) => kept.constants.push(constant.clone()),
        }
    }

    for function in &table.functions {
        match index.get(&function.name) {
            None => skipped.push(ExportError::missing_macro(&function.name)),
            Some(def) if !def.accepts(function.arity()) => {
                let err = ExportError::arity_mismatch(
                    &function.name,
                    def.named_params(),
                    function.arity(),
                );
                return Err(locate(err, index, def).into());
            }
            Some(_) => kept.functions.push(function.clone()),
        }
    }

    if let Some(first) = skipped.first() {
        if strict {
            return Err(first.clone().into());
        }
        for err in &skipped {
            warn!(export = %err.export, "Skipping export without a macro definition");
        }
    }

    Ok(ValidatedTable {
        table: kept,
        skipped,
    })
}

/// Engine API macros the table does not export
pub fn uncovered_macros<'a>(table: &ExportTable, index: &'a HeaderIndex) -> Vec<&'a MacroDefinition> {
    index
        .api_macros()
        .filter(|def| !table.contains(&def.name))
        .collect()
}

/// Write `contents` to `path` unless the file already holds it
pub fn write_if_changed(path: &Path, contents: &str) -> Result<WriteOutcome> {
    if artifact_state(path, contents)? == ArtifactState::UpToDate {
        return Ok(WriteOutcome::Unchanged);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(WriteOutcome::Written)
}

fn artifact_state(path: &Path, contents: &str) -> Result<ArtifactState> {
    let existing = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ArtifactState::Missing),
        Err(e) => return Err(e.into()),
    };
    if Sha256::digest(&existing) == Sha256::digest(contents.as_bytes()) {
        Ok(ArtifactState::UpToDate)
    } else {
        Ok(ArtifactState::Stale)
    }
}

fn locate(err: ExportError, index: &HeaderIndex, def: &MacroDefinition) -> ExportError {
    let err = match index.source_of(def) {
        Some(source) => err.with_location(source.name.clone(), def.line),
        None => err,
    };
    match index.snippet_for(def) {
        Some(snippet) if !snippet.is_empty() => err.with_snippet(snippet),
        _ => err,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn short(digest: &str) -> &str {
    &digest[..digest.len().min(12)]
}

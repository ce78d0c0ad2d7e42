//! # duk-shim
//!
//! Duktape exposes a large part of its public API as preprocessor macros:
//! constants such as `DUK_VERSION` or `DUK_TYPE_MASK_NONE`, and convenience
//! entry points such as `duk_create_heap_default()` or `duk_peval_file()`.
//! Macros have no linker symbol, so they are invisible to binding generators
//! and foreign-function interfaces. This crate generates a small C shim that
//! materializes every such export as a real symbol with the same name.
//!
//! ## Architecture
//!
//! ```text
//! duktape.h (+ extras)          export table (JSON, keyed by DUK_VERSION)
//!       │                                 │
//!       ▼                                 ▼
//!   header scan ──────────────────▶ validation
//!                                         │
//!                                         ▼
//!                 wrapper.h / wrapper.c / bindgen module / lock
//! ```
//!
//! ## Features
//!
//! - **Version-keyed tables**: built-in tables for Duktape 1.x and 2.x
//! - **Header validation**: missing macros, kind and arity mismatches are
//!   reported with the header location
//! - **Golden values**: constant values are recorded in a lock file and
//!   diffed on engine upgrades; with Rust bindings enabled, clang's
//!   evaluation of each macro fills in what the header scan cannot
//! - **Build scripts**: generate into `OUT_DIR` and compile the shim with `cc`
//! - **Idempotent output**: files are only rewritten when their content
//!   changes
//! - **Debug sink**: `duk_shim_debug_write` forwards engine debug logs to
//!   `tracing`

#![deny(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod build_support;
pub mod config;
pub mod debug_write;
pub mod emit;
pub mod error;
pub mod export;
pub mod generator;
pub mod header;
pub mod lock;
pub mod report;

// Re-export commonly used types
pub use config::ShimConfig;
pub use emit::{Artifact, ArtifactKind};
pub use error::{ErrorCode, ExportError, Result, ShimError};
pub use export::{ConstantExport, ExportTable, FunctionExport, Param};
pub use generator::{CheckOutcome, ShimGenerator};
pub use header::{HeaderIndex, MacroValue};
pub use lock::{ExportLock, LockChange};
pub use report::{ArtifactState, GenerationReport, GeneratorStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Error types for the shim generator.
//!
//! This module defines error codes, export error details, and the main error
//! type used throughout the generator. Generated C code has no error taxonomy
//! of its own; everything here concerns building the shim, not running it.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Error codes for categorizing export errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// An exported name has no macro definition in the scanned headers
    MissingMacro,
    /// A constant export names a function-like macro
    KindMismatch,
    /// A function export disagrees with the macro's parameter count
    ArityMismatch,
    /// The same name appears twice in an export table
    DuplicateExport,
    /// An export entry is malformed (bad identifier, empty type)
    InvalidExport,
    /// No built-in table covers the scanned engine version
    NoTableForVersion,
    /// The engine header could not be read
    HeaderUnreadable,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::MissingMacro => write!(f, "MISSING_MACRO"),
            ErrorCode::KindMismatch => write!(f, "KIND_MISMATCH"),
            ErrorCode::ArityMismatch => write!(f, "ARITY_MISMATCH"),
            ErrorCode::DuplicateExport => write!(f, "DUPLICATE_EXPORT"),
            ErrorCode::InvalidExport => write!(f, "INVALID_EXPORT"),
            ErrorCode::NoTableForVersion => write!(f, "NO_TABLE_FOR_VERSION"),
            ErrorCode::HeaderUnreadable => write!(f, "HEADER_UNREADABLE"),
        }
    }
}

/// Location of a macro definition in a scanned header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderLocation {
    /// Header file the definition came from
    pub file: String,
    /// Line number (1-indexed)
    pub line: u32,
}

/// Error details for a single export
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportError {
    /// Error code
    pub code: ErrorCode,

    /// Name of the export the error is about
    pub export: String,

    /// Human-readable message
    pub message: String,

    /// Where the offending macro is defined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<HeaderLocation>,

    /// Header lines around the definition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl ExportError {
    /// Create a new export error
    pub fn new(code: ErrorCode, export: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            export: export.into(),
            message: message.into(),
            location: None,
            snippet: None,
        }
    }

    /// The export names a macro that is not defined
    pub fn missing_macro(name: impl Into<String>) -> Self {
        let name = name.into();
        let message = format!("'{}' is not defined as a macro by the engine headers", name);
        Self::new(ErrorCode::MissingMacro, name, message)
    }

    /// A constant names a function-like macro
    pub fn kind_mismatch(name: impl Into<String>) -> Self {
        let name = name.into();
        let message = format!("'{}' is a function-like macro but is exported as a constant", name);
        Self::new(ErrorCode::KindMismatch, name, message)
    }

    /// A function export's parameter count differs from its macro
    pub fn arity_mismatch(name: impl Into<String>, expected: usize, declared: usize) -> Self {
        let name = name.into();
        let message = format!(
            "'{}' takes {} argument(s) in the engine header but the export declares {}",
            name, expected, declared
        );
        Self::new(ErrorCode::ArityMismatch, name, message)
    }

    /// A name appears more than once in a table
    pub fn duplicate_export(name: impl Into<String>) -> Self {
        let name = name.into();
        let message = format!("'{}' is exported more than once", name);
        Self::new(ErrorCode::DuplicateExport, name, message)
    }

    /// A malformed export entry
    pub fn invalid_export(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let name = name.into();
        let message = format!("invalid export '{}': {}", name, reason.into());
        Self::new(ErrorCode::InvalidExport, name, message)
    }

    /// No table covers the engine version
    pub fn no_table_for_version(version: Option<u32>) -> Self {
        let message = match version {
            Some(v) => format!("no built-in export table covers DUK_VERSION {}", v),
            None => "engine header does not define DUK_VERSION; pass an explicit table".to_string(),
        };
        Self::new(ErrorCode::NoTableForVersion, "DUK_VERSION", message)
    }

    /// The header could not be read
    pub fn header_unreadable(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::HeaderUnreadable,
            path.display().to_string(),
            format!("cannot read {}: {}", path.display(), reason),
        )
    }

    /// Add the macro location
    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.location = Some(HeaderLocation {
            file: file.into(),
            line,
        });
        self
    }

    /// Add a code snippet
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(loc) = &self.location {
            write!(f, " at {}:{}", loc.file, loc.line)?;
        }
        if let Some(snippet) = &self.snippet {
            write!(f, "\n{}", snippet)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExportError {}

/// Main error type for the generator
#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    /// Export validation error
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Export table could not be loaded
    #[error("Table error: {0}")]
    Table(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Rust bindings could not be generated
    #[error("Bindgen error: {0}")]
    Bindgen(String),

    /// Compiling the shim failed
    #[error("Compile error: {0}")]
    Compile(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl ShimError {
    /// The export error carried by this error, if any
    pub fn export_error(&self) -> Option<&ExportError> {
        match self {
            ShimError::Export(e) => Some(e),
            _ => None,
        }
    }
}

impl From<String> for ShimError {
    fn from(s: String) -> Self {
        ShimError::General(s)
    }
}

impl From<&str> for ShimError {
    fn from(s: &str) -> Self {
        ShimError::General(s.to_string())
    }
}

impl From<serde_json::Error> for ShimError {
    fn from(e: serde_json::Error) -> Self {
        ShimError::Serialization(e.to_string())
    }
}

/// Result type alias for generator operations
pub type Result<T> = std::result::Result<T, ShimError>;

//! Generator configuration types and defaults.
//!
//! This module defines where the engine header lives, which artifacts are
//! produced and how strictly the export table is checked against the header.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default file name of the generated declarations header
pub const DEFAULT_HEADER_NAME: &str = "wrapper.h";

/// Default file name of the generated C unit
pub const DEFAULT_SOURCE_NAME: &str = "wrapper.c";

/// Default file name of the golden-value lock
pub const DEFAULT_LOCK_NAME: &str = "exports.lock.json";

/// Default output directory
pub const DEFAULT_OUTPUT_DIR: &str = "shim";

/// Configuration for the shim generator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShimConfig {
    /// Path to the engine's public header (`duktape.h`)
    pub engine_header: PathBuf,

    /// Extra headers scanned and included after the engine header
    /// (e.g. `duk_logging.h`, `duk_module_node.h`)
    #[serde(default)]
    pub extra_headers: Vec<PathBuf>,

    /// Directory the artifacts are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File name of the generated header
    #[serde(default = "default_header_name")]
    pub header_name: String,

    /// File name of the generated C unit
    #[serde(default = "default_source_name")]
    pub source_name: String,

    /// File name of the generated Rust declarations (none: not generated)
    #[serde(default)]
    pub rust_bindings_name: Option<String>,

    /// File name of the golden-value lock
    #[serde(default = "default_lock_name")]
    pub lock_name: String,

    /// Custom export table (uses the built-in table for the scanned
    /// engine version if not provided)
    #[serde(default)]
    pub table: Option<PathBuf>,

    /// Fail on exports whose macro is missing (default: true)
    #[serde(default = "default_true")]
    pub strict: bool,

    /// Include engine headers by full path instead of by file name
    #[serde(default)]
    pub include_by_path: bool,

    /// Lines emitted verbatim before the engine include
    #[serde(default)]
    pub prelude: Vec<String>,

    /// Declare `duk_shim_debug_write` in the generated header
    #[serde(default)]
    pub debug_write_hook: bool,

    /// Extra clang arguments for the Rust bindings (e.g. `-DDUK_USE_...`)
    #[serde(default)]
    pub clang_args: Vec<String>,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            engine_header: PathBuf::from("duktape.h"),
            extra_headers: Vec::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            header_name: DEFAULT_HEADER_NAME.to_string(),
            source_name: DEFAULT_SOURCE_NAME.to_string(),
            rust_bindings_name: None,
            lock_name: DEFAULT_LOCK_NAME.to_string(),
            table: None,
            strict: true,
            include_by_path: false,
            prelude: Vec::new(),
            debug_write_hook: false,
            clang_args: Vec::new(),
        }
    }
}

impl ShimConfig {
    /// Create a configuration for the given engine header
    pub fn new(engine_header: impl Into<PathBuf>) -> Self {
        Self {
            engine_header: engine_header.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Add an extra header
    pub fn with_extra_header(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_headers.push(path.into());
        self
    }

    /// Set the output directory
    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    /// Generate Rust declarations into the given file name
    pub fn with_rust_bindings(mut self, name: impl Into<String>) -> Self {
        self.rust_bindings_name = Some(name.into());
        self
    }

    /// Use a custom export table
    pub fn with_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.table = Some(path.into());
        self
    }

    /// Enable or disable strict checking
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Add a prelude line
    pub fn with_prelude_line(mut self, line: impl Into<String>) -> Self {
        self.prelude.push(line.into());
        self
    }

    /// Enable or disable the debug-write hook declaration
    pub fn with_debug_write_hook(mut self, enable: bool) -> Self {
        self.debug_write_hook = enable;
        self
    }

    /// Add a clang argument for the Rust bindings
    pub fn with_clang_arg(mut self, arg: impl Into<String>) -> Self {
        self.clang_args.push(arg.into());
        self
    }

    /// All headers to scan, engine header first
    pub fn headers(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.engine_header).chain(self.extra_headers.iter())
    }

    /// Directories holding the headers, in header order without duplicates
    ///
    /// These go on the include path wherever the generated header is parsed
    /// or compiled, since it includes the engine headers by file name.
    pub fn include_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        for header in self.headers() {
            let dir = match header.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        dirs
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine_header.as_os_str().is_empty() {
            return Err(ConfigError::MissingField {
                field: "engine_header".into(),
            });
        }

        if !self.header_name.ends_with(".h") {
            return Err(ConfigError::InvalidValue {
                field: "header_name".into(),
                reason: "must end with .h".into(),
            });
        }

        if !self.source_name.ends_with(".c") {
            return Err(ConfigError::InvalidValue {
                field: "source_name".into(),
                reason: "must end with .c".into(),
            });
        }

        if let Some(rust) = &self.rust_bindings_name {
            if !rust.ends_with(".rs") {
                return Err(ConfigError::InvalidValue {
                    field: "rust_bindings_name".into(),
                    reason: "must end with .rs".into(),
                });
            }
        }

        let names = [
            Some(&self.header_name),
            Some(&self.source_name),
            Some(&self.lock_name),
            self.rust_bindings_name.as_ref(),
        ];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                if let (Some(a), Some(b)) = (a, b) {
                    if a == b {
                        return Err(ConfigError::InvalidValue {
                            field: "output names".into(),
                            reason: format!("'{}' is used for more than one artifact", a),
                        });
                    }
                }
            }
        }

        if self.prelude.iter().any(|l| l.contains('\n')) {
            return Err(ConfigError::InvalidValue {
                field: "prelude".into(),
                reason: "each entry must be a single line".into(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// The field name
        field: String,
        /// The reason it's invalid
        reason: String,
    },

    /// Missing required field
    #[error("Missing required configuration field: {field}")]
    MissingField {
        /// The field name
        field: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Default value functions for serde
fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_header_name() -> String {
    DEFAULT_HEADER_NAME.to_string()
}

fn default_source_name() -> String {
    DEFAULT_SOURCE_NAME.to_string()
}

fn default_lock_name() -> String {
    DEFAULT_LOCK_NAME.to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ShimConfig::default();
        assert_eq!(config.header_name, DEFAULT_HEADER_NAME);
        assert_eq!(config.source_name, DEFAULT_SOURCE_NAME);
        assert!(config.strict);
        assert!(config.rust_bindings_name.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ShimConfig::new("vendor/duktape.h")
            .with_extra_header("vendor/duk_logging.h")
            .with_rust_bindings("shim.rs")
            .with_strict(false);

        let headers: Vec<_> = config.headers().collect();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0], &PathBuf::from("vendor/duktape.h"));
        assert_eq!(config.rust_bindings_name.as_deref(), Some("shim.rs"));
        assert!(!config.strict);
    }

    #[test]
    fn test_include_dirs() {
        let config = ShimConfig::new("vendor/duktape/src/duktape.h")
            .with_extra_header("vendor/duktape/extras/logging/duk_logging.h")
            .with_extra_header("vendor/duktape/src/duk_config.h")
            .with_extra_header("duk_module_node.h")
            .with_clang_arg("-DDUK_USE_DEBUG");

        assert_eq!(
            config.include_dirs(),
            vec![
                PathBuf::from("vendor/duktape/src"),
                PathBuf::from("vendor/duktape/extras/logging"),
                PathBuf::from("."),
            ]
        );
        assert_eq!(config.clang_args, vec!["-DDUK_USE_DEBUG".to_string()]);
    }

    #[test]
    fn test_config_validation() {
        assert!(ShimConfig::default().validate().is_ok());

        let mut bad = ShimConfig::default();
        bad.source_name = "wrapper.cpp".into();
        assert!(bad.validate().is_err());

        let clash = ShimConfig::default().with_rust_bindings("wrapper.rs");
        assert!(clash.validate().is_ok());
        let mut clash = clash;
        clash.lock_name = "wrapper.h".into();
        assert!(clash.validate().is_err());

        let bad = ShimConfig::new("");
        assert!(matches!(bad.validate(), Err(ConfigError::MissingField { .. })));

        let bad = ShimConfig::default().with_prelude_line("#define A\n#define B");
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_deserialization_defaults() {
        let config: ShimConfig =
            serde_json::from_str(r#"{"engineHeader": "duktape/src/duktape.h"}"#).unwrap();
        assert_eq!(config.engine_header, PathBuf::from("duktape/src/duktape.h"));
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(config.lock_name, DEFAULT_LOCK_NAME);
        assert!(config.strict);
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shim.json");
        std::fs::write(
            &path,
            r#"{"engineHeader": "duktape.h", "rustBindingsName": "ffi_shim.rs", "strict": false}"#,
        )
        .unwrap();

        let config = ShimConfig::from_file(&path).unwrap();
        assert_eq!(config.rust_bindings_name.as_deref(), Some("ffi_shim.rs"));
        assert!(!config.strict);

        assert!(ShimConfig::from_file(&dir.path().join("missing.json")).is_err());
    }
}

//! Helpers for `build.rs` scripts.
//!
//! ```no_run
//! // build.rs
//! fn main() {
//!     let config = duk_shim::ShimConfig::new("vendor/duktape/duktape.h");
//!     let out = duk_shim::build_support::generate_into_out_dir(config).unwrap();
//!     duk_shim::build_support::compile(&out, &[]).unwrap();
//! }
//! ```
//!
//! [`compile`] builds only the shim; the engine itself (`duktape.c`) is
//! compiled by the caller, or added with [`CompilePlan::with_file`].

use crate::config::ShimConfig;
use crate::error::{Result, ShimError};
use crate::generator::ShimGenerator;
use crate::report::GenerationReport;
use std::path::{Path, PathBuf};
use tracing::info;

/// Static library produced by [`compile`]
pub const DEFAULT_LIB_NAME: &str = "duk_shim_wrapper";

/// Where the artifacts of a build-script run ended up
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Output directory
    pub dir: PathBuf,
    /// Generated header file name
    pub header_name: String,
    /// Generated C unit file name
    pub source_name: String,
    /// Generated Rust declarations file name, if enabled
    pub rust_bindings_name: Option<String>,
    /// Directories holding the engine headers
    pub include_dirs: Vec<PathBuf>,
    /// Report of the run
    pub report: GenerationReport,
}

impl BuildOutput {
    /// Path of the generated header
    pub fn header(&self) -> PathBuf {
        self.dir.join(&self.header_name)
    }

    /// Path of the generated C unit
    pub fn source(&self) -> PathBuf {
        self.dir.join(&self.source_name)
    }

    /// Path of the generated Rust declarations
    pub fn rust_bindings(&self) -> Option<PathBuf> {
        self.rust_bindings_name.as_ref().map(|n| self.dir.join(n))
    }
}

/// Generate into `$OUT_DIR` and register the inputs with cargo
pub fn generate_into_out_dir(config: ShimConfig) -> Result<BuildOutput> {
    let out_dir = std::env::var_os("OUT_DIR")
        .ok_or_else(|| ShimError::General("OUT_DIR is not set; call from build.rs".into()))?;
    generate_into(config, Path::new(&out_dir))
}

/// Generate into `dir` and register the inputs with cargo
pub fn generate_into(config: ShimConfig, dir: &Path) -> Result<BuildOutput> {
    let config = config.with_output_dir(dir);
    for line in rerun_directives(&config) {
        println!("{}", line);
    }

    let generator = ShimGenerator::new(config)?;
    let report = generator.write()?;
    let config = generator.config();

    Ok(BuildOutput {
        dir: dir.to_path_buf(),
        header_name: config.header_name.clone(),
        source_name: config.source_name.clone(),
        rust_bindings_name: config.rust_bindings_name.clone(),
        include_dirs: config.include_dirs(),
        report,
    })
}

/// Sources and include path for compiling the shim with `cc`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilePlan {
    /// Library name passed to `cc`
    pub lib_name: String,
    /// C units to compile
    pub files: Vec<PathBuf>,
    /// Include path, output directory first
    pub include_dirs: Vec<PathBuf>,
    /// Preprocessor definitions
    pub defines: Vec<(String, Option<String>)>,
}

impl CompilePlan {
    /// Plan for the generated unit of `out`
    ///
    /// The include path is the output directory, then the engine header
    /// directories, then `include_dirs`.
    pub fn new(out: &BuildOutput, include_dirs: &[PathBuf]) -> Self {
        let mut dirs = vec![out.dir.clone()];
        for dir in out.include_dirs.iter().chain(include_dirs) {
            if !dirs.contains(dir) {
                dirs.push(dir.clone());
            }
        }
        Self {
            lib_name: DEFAULT_LIB_NAME.to_string(),
            files: vec![out.source()],
            include_dirs: dirs,
            defines: Vec::new(),
        }
    }

    /// Set the library name
    pub fn with_lib_name(mut self, name: impl Into<String>) -> Self {
        self.lib_name = name.into();
        self
    }

    /// Compile another C unit into the same library (e.g. `duktape.c`)
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Add a preprocessor definition
    pub fn with_define(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.defines.push((name.into(), value.map(str::to_string)));
        self
    }

    /// Configured `cc` builder
    pub fn build(&self) -> cc::Build {
        let mut build = cc::Build::new();
        build
            .files(&self.files)
            .includes(&self.include_dirs)
            .flag_if_supported("-std=c99")
            .warnings(false);
        for (name, value) in &self.defines {
            build.define(name, value.as_deref());
        }
        build
    }

    /// Compile and emit the cargo link directives
    pub fn compile(&self) -> Result<()> {
        self.build()
            .try_compile(&self.lib_name)
            .map_err(|e| ShimError::Compile(e.to_string()))?;
        info!(lib = %self.lib_name, files = self.files.len(), "Compiled shim");
        Ok(())
    }
}

/// Compile the generated C unit into a static library
///
/// Must run inside a build script, where `cc` finds the target and output
/// directory in the environment.
pub fn compile(out: &BuildOutput, include_dirs: &[PathBuf]) -> Result<()> {
    CompilePlan::new(out, include_dirs).compile()
}

/// `cargo:rerun-if-changed` lines for every input of a generation
pub fn rerun_directives(config: &ShimConfig) -> Vec<String> {
    config
        .headers()
        .chain(config.table.as_ref())
        .map(|p| format!("cargo:rerun-if-changed={}", p.display()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rerun_directives() {
        let config = ShimConfig::new("vendor/duktape.h")
            .with_extra_header("vendor/duk_logging.h")
            .with_table("exports.json");
        assert_eq!(
            rerun_directives(&config),
            vec![
                "cargo:rerun-if-changed=vendor/duktape.h",
                "cargo:rerun-if-changed=vendor/duk_logging.h",
                "cargo:rerun-if-changed=exports.json",
            ]
        );
    }

    #[test]
    fn test_generate_into() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("duktape.h");
        std::fs::write(
            &header,
            "typedef struct duk_hthread duk_context;\n#define DUK_VERSION 20500L\n#define duk_create_heap_default() duk_create_heap(0, 0, 0, 0, 0)\n",
        )
        .unwrap();
        let table = dir.path().join("table.json");
        std::fs::write(
            &table,
            r#"{"engine":"duktape","constants":[{"name":"DUK_VERSION","type":"long"}],
               "functions":[{"name":"duk_create_heap_default","returns":"duk_context *"}]}"#,
        )
        .unwrap();

        let out_dir = dir.path().join("out");
        let config = ShimConfig::new(&header)
            .with_table(&table)
            .with_rust_bindings("duk_shim.rs");
        let out = generate_into(config, &out_dir).unwrap();

        assert!(out.header().exists());
        assert!(out.source().exists());
        assert!(out.rust_bindings().unwrap().exists());
        assert_eq!(out.report.files_written.len(), 4);
        assert_eq!(out.include_dirs, vec![dir.path().to_path_buf()]);
    }

    fn output() -> BuildOutput {
        BuildOutput {
            dir: PathBuf::from("target/out"),
            header_name: "wrapper.h".into(),
            source_name: "wrapper.c".into(),
            rust_bindings_name: None,
            include_dirs: vec![PathBuf::from("vendor/duktape/src")],
            report: GenerationReport::new(Some(20500), "0".repeat(64)),
        }
    }

    #[test]
    fn test_compile_plan() {
        let plan = CompilePlan::new(
            &output(),
            &[
                PathBuf::from("vendor/duktape/extras/logging"),
                PathBuf::from("vendor/duktape/src"),
            ],
        );
        assert_eq!(plan.lib_name, DEFAULT_LIB_NAME);
        assert_eq!(plan.files, vec![PathBuf::from("target/out/wrapper.c")]);
        assert_eq!(
            plan.include_dirs,
            vec![
                PathBuf::from("target/out"),
                PathBuf::from("vendor/duktape/src"),
                PathBuf::from("vendor/duktape/extras/logging"),
            ]
        );
    }

    #[test]
    fn test_compile_plan_with_engine() {
        let plan = CompilePlan::new(&output(), &[])
            .with_lib_name("duktape")
            .with_file("vendor/duktape/src/duktape.c")
            .with_define("DUK_USE_DEBUG", None)
            .with_define("DUK_USE_DEBUG_LEVEL", Some("0"));
        assert_eq!(plan.lib_name, "duktape");
        assert_eq!(
            plan.files,
            vec![
                PathBuf::from("target/out/wrapper.c"),
                PathBuf::from("vendor/duktape/src/duktape.c"),
            ]
        );
        assert_eq!(plan.defines[1], ("DUK_USE_DEBUG_LEVEL".to_string(), Some("0".to_string())));
        // Builder construction needs no build-script environment
        let _ = plan.build();
    }
}

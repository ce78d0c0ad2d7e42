//! Rust FFI bindings for the generated header.
//!
//! The header is handed to bindgen with the engine headers on the include
//! path, filtered to the engine namespace. Two passes run over it:
//!
//! - a values pass over the engine headers alone, which records every integer
//!   and string macro clang could evaluate;
//! - a codegen pass over the rendered header, with the exported constants'
//!   macro forms skipped so each one appears once, as a `pub static`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use bindgen::callbacks::{IntKind, MacroParsingBehavior, ParseCallbacks};
use parking_lot::Mutex;
use tracing::debug;

use super::{c, EmitOptions};
use crate::error::{Result, ShimError};
use crate::export::ExportTable;
use crate::header::MacroValue;

/// Items bindgen keeps
const ENGINE_NAMESPACE: &str = "duk_.*|DUK_.*";

/// Rendered bindings plus the macro values clang evaluated
#[derive(Debug, Clone)]
pub struct RustBindings {
    /// Rust module source
    pub contents: String,
    /// Engine macros clang evaluated, by name
    pub macro_values: BTreeMap<String, MacroValue>,
}

/// Arguments passed to clang
#[derive(Debug, Clone, Default)]
pub struct ClangOptions {
    /// Directories searched for the engine headers
    pub include_dirs: Vec<PathBuf>,
    /// Extra arguments, after the include path
    pub extra_args: Vec<String>,
}

impl ClangOptions {
    /// Full argument list
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["-std=c99".to_string()];
        args.extend(
            self.include_dirs
                .iter()
                .map(|dir| format!("-I{}", dir.display())),
        );
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[derive(Debug)]
struct MacroCollector {
    skip: BTreeSet<String>,
    values: Arc<Mutex<BTreeMap<String, MacroValue>>>,
}

impl MacroCollector {
    fn record(&self, name: &str, value: MacroValue) {
        if name.starts_with("duk_") || name.starts_with("DUK_") {
            self.values.lock().insert(name.to_string(), value);
        }
    }
}

impl ParseCallbacks for MacroCollector {
    fn will_parse_macro(&self, name: &str) -> MacroParsingBehavior {
        if self.skip.contains(name) {
            MacroParsingBehavior::Ignore
        } else {
            MacroParsingBehavior::Default
        }
    }

    fn int_macro(&self, name: &str, value: i64) -> Option<IntKind> {
        self.record(name, MacroValue::Integer(value));
        None
    }

    fn str_macro(&self, name: &str, value: &[u8]) {
        self.record(name, MacroValue::String(String::from_utf8_lossy(value).into_owned()));
    }
}

/// Generate Rust bindings for the rendered header
///
/// `header` is the output of [`c::render_header`] for the same table and
/// options.
pub fn render_rust(
    table: &ExportTable,
    header: &str,
    opts: &EmitOptions,
    clang: &ClangOptions,
) -> Result<RustBindings> {
    let values = Arc::new(Mutex::new(BTreeMap::new()));

    let mut engine = String::new();
    for prelude in &opts.prelude {
        engine.push_str(prelude);
        engine.push('\n');
    }
    for include in &opts.engine_includes {
        engine.push_str(&format!("#include {}\n", c::quote(include)));
    }

    builder(clang)
        .header_contents("duk_shim_values.h", &engine)
        .parse_callbacks(Box::new(MacroCollector {
            skip: BTreeSet::new(),
            values: values.clone(),
        }))
        .generate()
        .map_err(|e| ShimError::Bindgen(e.to_string()))?;

    let skip = table
        .constants
        .iter()
        .map(|constant| constant.name.clone())
        .collect();
    let bindings = builder(clang)
        .header_contents(&opts.header_name, header)
        .raw_line(format!("// {}", opts.banner.text()))
        .parse_callbacks(Box::new(MacroCollector {
            skip,
            values: Arc::new(Mutex::new(BTreeMap::new())),
        }))
        .generate()
        .map_err(|e| ShimError::Bindgen(e.to_string()))?;

    let macro_values = std::mem::take(&mut *values.lock());
    debug!(
        header = %opts.header_name,
        macro_values = macro_values.len(),
        "Generated Rust bindings"
    );

    Ok(RustBindings {
        contents: bindings.to_string(),
        macro_values,
    })
}

fn builder(clang: &ClangOptions) -> bindgen::Builder {
    bindgen::Builder::default()
        .clang_args(clang.args())
        .allowlist_function(ENGINE_NAMESPACE)
        .allowlist_var(ENGINE_NAMESPACE)
        .allowlist_type(ENGINE_NAMESPACE)
        .derive_debug(true)
        .layout_tests(false)
        .disable_header_comment()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::{Banner, DEBUG_WRITE_SYMBOL};
    use crate::export::{ConstantExport, FunctionExport, Param};

    const ENGINE: &str = r#"#if !defined(DUKTAPE_H_INCLUDED)
#define DUKTAPE_H_INCLUDED
typedef int duk_int_t;
typedef unsigned int duk_uint_t;
typedef duk_int_t duk_idx_t;
typedef struct duk_hthread duk_context;
#define DUK_VERSION 20500L
#define DUK_GIT_COMMIT "6001888"
#define DUK_TYPE_MASK_ALL (~0U)
#define DUK_INT_MIN (-2147483647 - 1)
#define DUK_INVALID_INDEX DUK_INT_MIN
void duk_eval_raw(duk_context *ctx, const char *src_buffer, duk_uint_t flags);
duk_context *duk_create_heap_raw(void *udata);
#define duk_create_heap_default() duk_create_heap_raw((void *) 0)
#define duk_eval_string(ctx,src) duk_eval_raw((ctx), (src), 0)
#endif
"#;

    fn opts(hook: bool) -> EmitOptions {
        EmitOptions {
            header_name: "wrapper.h".into(),
            engine_includes: vec!["duktape.h".into()],
            prelude: vec![],
            debug_write_hook: hook,
            banner: Banner {
                engine_header: "duktape.h".into(),
                engine_version: Some(20500),
                digest: "abcd".into(),
            },
        }
    }

    fn table() -> ExportTable {
        ExportTable::new("duktape")
            .with_constant(ConstantExport::new("DUK_VERSION", "duk_uint_t"))
            .with_constant(ConstantExport::new("DUK_GIT_COMMIT", "char *const"))
            .with_function(FunctionExport::new("duk_create_heap_default", "duk_context *", vec![]))
            .with_function(FunctionExport::new(
                "duk_eval_string",
                "void",
                vec![Param::new("duk_context *", "ctx"), Param::new("const char *", "src")],
            ))
    }

    /// Renders the header and bindings against `ENGINE` in a temp dir
    fn bindings(hook: bool) -> RustBindings {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("duktape.h"), ENGINE).unwrap();
        let opts = opts(hook);
        let header = c::render_header(&table(), &opts).unwrap();
        let clang = ClangOptions {
            include_dirs: vec![dir.path().to_path_buf()],
            extra_args: vec![],
        };
        render_rust(&table(), &header, &opts, &clang).unwrap()
    }

    fn squash(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_statics_and_functions() {
        let rust = bindings(false);
        assert!(rust.contents.starts_with("// Generated by duk-shim"));

        let body = squash(&rust.contents);
        assert!(body.contains("pubstaticDUK_VERSION:duk_uint_t;"));
        assert!(body.contains("pubstaticDUK_GIT_COMMIT:*const::std::os::raw::c_char;"));
        assert!(body.contains("pubfnduk_create_heap_default()->*mutduk_context;"));
        assert!(body.contains("pubfnduk_eval_string(ctx:*mutduk_context,src:*const::std::os::raw::c_char);"));
        assert!(!body.contains("pubconstDUK_VERSION"));
        assert!(!body.contains(DEBUG_WRITE_SYMBOL));
    }

    #[test]
    fn test_unexported_macros_stay_consts() {
        let body = squash(&bindings(false).contents);
        assert!(body.contains("pubconstDUK_TYPE_MASK_ALL"));
        assert!(!body.contains("DUKTAPE_H_INCLUDED"));
    }

    #[test]
    fn test_macro_values() {
        let rust = bindings(false);
        assert_eq!(rust.macro_values.get("DUK_VERSION"), Some(&MacroValue::Integer(20500)));
        assert_eq!(
            rust.macro_values.get("DUK_GIT_COMMIT"),
            Some(&MacroValue::String("6001888".into()))
        );
        assert_eq!(
            rust.macro_values.get("DUK_INVALID_INDEX"),
            Some(&MacroValue::Integer(i64::from(i32::MIN)))
        );
        let mask = rust.macro_values["DUK_TYPE_MASK_ALL"].clone();
        assert_eq!(mask.convert_to("duk_uint_t"), MacroValue::Integer(4294967295));
        assert!(!rust.macro_values.contains_key("DUKTAPE_H_INCLUDED"));
    }

    #[test]
    fn test_debug_hook_declared() {
        let body = squash(&bindings(true).contents);
        assert!(body.contains("pubfnduk_shim_debug_write(level:::std::os::raw::c_long"));
    }

    #[test]
    fn test_missing_engine_header_fails() {
        let opts = opts(false);
        let header = c::render_header(&table(), &opts).unwrap();
        let clang = ClangOptions {
            include_dirs: vec![PathBuf::from("/nonexistent/duktape")],
            extra_args: vec![],
        };
        let err = render_rust(&table(), &header, &opts, &clang).unwrap_err();
        assert!(matches!(err, ShimError::Bindgen(_)));
    }

    #[test]
    fn test_clang_args() {
        let clang = ClangOptions {
            include_dirs: vec![PathBuf::from("duktape/src"), PathBuf::from("duktape/extras/logging")],
            extra_args: vec!["-DDUK_USE_DEBUG".into()],
        };
        assert_eq!(
            clang.args(),
            vec!["-std=c99", "-Iduktape/src", "-Iduktape/extras/logging", "-DDUK_USE_DEBUG"]
        );
    }
}

//! The built-in tables against full Duktape 1.x and 2.x headers.

use std::fs;
use std::path::{Path, PathBuf};

use duk_shim::lock::{self, LockChange};
use duk_shim::{ExportLock, HeaderIndex, MacroValue, ShimConfig, ShimGenerator};
use tempfile::TempDir;

fn fixture(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(path)
}

fn duktape_1(out: &Path) -> ShimConfig {
    ShimConfig::new(fixture("duktape-1/duktape.h")).with_output_dir(out)
}

fn duktape_2(out: &Path) -> ShimConfig {
    ShimConfig::new(fixture("duktape-2/duktape.h"))
        .with_extra_header(fixture("duktape-2/duk_logging.h"))
        .with_output_dir(out)
}

fn lock_of(out: &Path) -> ExportLock {
    ExportLock::from_json(&fs::read_to_string(out.join("exports.lock.json")).unwrap()).unwrap()
}

fn value(lock: &ExportLock, name: &str) -> Option<MacroValue> {
    lock.constant(name).unwrap().value.clone()
}

#[test]
fn test_duktape_1_exports_everything() {
    let dir = TempDir::new().unwrap();
    let config = duktape_1(dir.path());
    assert!(config.strict);

    let report = ShimGenerator::new(config).unwrap().write().unwrap();
    assert_eq!(report.engine_version, Some(10500));
    assert_eq!(report.constants, 103);
    assert_eq!(report.functions, 57);
    assert_eq!(report.constants + report.functions, 160);
    assert!(report.skipped.is_empty());

    let lock = lock_of(dir.path());
    assert_eq!(value(&lock, "DUK_COMPILE_EVAL"), Some(MacroValue::Integer(1)));
    assert_eq!(value(&lock, "DUK_ERR_TYPE_ERROR"), Some(MacroValue::Integer(105)));
    assert_eq!(value(&lock, "DUK_RET_TYPE_ERROR"), Some(MacroValue::Integer(-105)));
    assert_eq!(value(&lock, "DUK_LOG_FATAL"), Some(MacroValue::Integer(5)));
    assert_eq!(value(&lock, "DUK_VARARGS"), Some(MacroValue::Integer(-1)));
}

#[test]
fn test_duktape_2_exports_everything() {
    let dir = TempDir::new().unwrap();
    let report = ShimGenerator::new(duktape_2(dir.path()))
        .unwrap()
        .write()
        .unwrap();
    assert_eq!(report.engine_version, Some(20500));
    assert_eq!(report.constants, 91);
    assert_eq!(report.functions, 58);
    assert_eq!(report.constants + report.functions, 149);
    assert!(report.skipped.is_empty());

    let lock = lock_of(dir.path());
    assert_eq!(value(&lock, "DUK_COMPILE_EVAL"), Some(MacroValue::Integer(8)));
    assert_eq!(value(&lock, "DUK_TYPE_MASK_THROW"), Some(MacroValue::Integer(1024)));
    assert_eq!(value(&lock, "DUK_ENUM_INCLUDE_INTERNAL"), Some(MacroValue::Integer(2)));
    assert_eq!(value(&lock, "DUK_API_ENTRY_STACK"), Some(MacroValue::Integer(64)));
    assert_eq!(value(&lock, "DUK_LEVEL_DDDEBUG"), Some(MacroValue::Integer(2)));
    assert_eq!(value(&lock, "DUK_LOG_WARN"), Some(MacroValue::Integer(3)));
    assert_eq!(
        value(&lock, "DUK_GIT_DESCRIBE"),
        Some(MacroValue::String("v2.5.0".into()))
    );
    // INT_MIN lives in <limits.h>, which is not scanned
    assert_eq!(value(&lock, "DUK_INVALID_INDEX"), None);
}

#[test]
fn test_duktape_2_variadic_error_object() {
    let dir = TempDir::new().unwrap();
    ShimGenerator::new(duktape_2(dir.path()))
        .unwrap()
        .write()
        .unwrap();

    let header = fs::read_to_string(dir.path().join("wrapper.h")).unwrap();
    assert!(header.contains(
        "duk_idx_t duk_push_error_object(duk_context *ctx, duk_errcode_t err_code, const char *fmt);\n"
    ));
    let source = fs::read_to_string(dir.path().join("wrapper.c")).unwrap();
    assert!(source.contains("  return duk_push_error_object(ctx, err_code, fmt);\n}\n"));

    let index = HeaderIndex::from_files(&[fixture("duktape-2/duktape.h")]).unwrap();
    let def = index.get("duk_push_error_object").unwrap();
    assert!(def.variadic);
    assert_eq!(def.named_params(), 2);
    assert_eq!(index.shape_conflicts(), 1);
}

#[test]
fn test_upgrade_from_1_to_2_shows_renumbered_constants() {
    let dir = TempDir::new().unwrap();
    let old_dir = dir.path().join("v1");
    let new_dir = dir.path().join("v2");
    ShimGenerator::new(duktape_1(&old_dir)).unwrap().write().unwrap();
    ShimGenerator::new(duktape_2(&new_dir)).unwrap().write().unwrap();

    let changes = lock::diff(&lock_of(&old_dir), &lock_of(&new_dir));
    let rendered: Vec<String> = changes.iter().map(ToString::to_string).collect();

    assert!(rendered.contains(&"~ DUK_ERR_TYPE_ERROR: 105 -> 6".to_string()));
    assert!(rendered.contains(&"~ DUK_COMPILE_SAFE: 8 -> 128".to_string()));
    assert!(changes.iter().any(|c| matches!(
        c,
        LockChange::Removed { name, .. } if name == "DUK_ERR_API_ERROR"
    )));
    assert!(changes.iter().any(|c| matches!(
        c,
        LockChange::Added { name, .. } if name == "DUK_LEVEL_DEBUG"
    )));
}

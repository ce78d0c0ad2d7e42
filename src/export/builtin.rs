//! Export tables shipped with the crate, keyed by engine version.

use super::ExportTable;
use crate::error::{ExportError, Result, ShimError};
use once_cell::sync::Lazy;

/// Duktape 1.x table (`DUK_VERSION < 20000`)
pub const DUKTAPE_1_JSON: &str = include_str!("tables/duktape-1.json");

/// Duktape 2.x table (`DUK_VERSION >= 20000`), including the logging extras
pub const DUKTAPE_2_JSON: &str = include_str!("tables/duktape-2.json");

static BUILTIN: Lazy<std::result::Result<Vec<ExportTable>, String>> = Lazy::new(|| {
    [DUKTAPE_1_JSON, DUKTAPE_2_JSON]
        .iter()
        .map(|raw| ExportTable::from_json(raw).map_err(|e| e.to_string()))
        .collect()
});

/// All built-in tables
pub fn tables() -> Result<&'static [ExportTable]> {
    BUILTIN
        .as_ref()
        .map(Vec::as_slice)
        .map_err(|e| ShimError::Table(format!("built-in table is corrupt: {}", e)))
}

/// The built-in table covering an engine version
pub fn for_version(version: Option<u32>) -> Result<&'static ExportTable> {
    let version = version.ok_or_else(|| ExportError::no_table_for_version(None))?;
    tables()?
        .iter()
        .find(|t| t.covers(version))
        .ok_or_else(|| ExportError::no_table_for_version(Some(version)).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_load() {
        let tables = tables().unwrap();
        assert_eq!(tables.len(), 2);
        for table in tables {
            assert_eq!(table.engine, "duktape");
            assert!(!table.is_empty());
        }
    }

    #[test]
    fn test_version_selection() {
        let v1 = for_version(Some(10500)).unwrap();
        assert!(v1.contains("DUK_ERR_UNIMPLEMENTED_ERROR"));
        assert!(v1.contains("DUK_STRING_PUSH_SAFE"));

        let v2 = for_version(Some(20500)).unwrap();
        assert!(v2.contains("DUK_LEVEL_DEBUG"));
        assert!(v2.contains("duk_push_error_object"));
        assert!(!v2.contains("DUK_ERR_UNIMPLEMENTED_ERROR"));
    }

    #[test]
    fn test_no_version() {
        assert!(for_version(None).is_err());
    }

    #[test]
    fn test_entry_points_present() {
        let v2 = for_version(Some(20000)).unwrap();
        let create = v2.function("duk_create_heap_default").unwrap();
        assert_eq!(create.returns, "duk_context *");
        assert!(create.params.is_empty());

        let peval_file = v2.function("duk_peval_file").unwrap();
        assert_eq!(peval_file.returns, "duk_int_t");
        assert_eq!(peval_file.arity(), 2);

        let commit = v2.constant("DUK_GIT_COMMIT").unwrap();
        assert_eq!(commit.c_type, "char *const");
    }
}

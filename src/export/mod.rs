//! Export table data model.
//!
//! An export table lists every constant and function that the engine only
//! defines as a preprocessor macro. Tables are plain data (JSON) and are keyed
//! by the engine version range they were written against.

pub mod builtin;
pub mod ctype;

pub use ctype::CType;

use crate::error::{ExportError, Result, ShimError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A macro-defined constant to materialize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantExport {
    /// Macro name, reused as the symbol name
    pub name: String,
    /// Declared C type (without the top-level `const`)
    #[serde(rename = "type")]
    pub c_type: String,
}

impl ConstantExport {
    /// Create a constant export
    pub fn new(name: impl Into<String>, c_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            c_type: c_type.into(),
        }
    }

    /// The storage type of the materialized constant, `const`-qualified
    pub fn storage_type(&self) -> Result<CType> {
        Ok(CType::parse(&self.c_type)?.with_const_base())
    }
}

/// A single function parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter C type
    #[serde(rename = "type")]
    pub c_type: String,
    /// Parameter name
    pub name: String,
}

impl Param {
    /// Create a parameter
    pub fn new(c_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            c_type: c_type.into(),
            name: name.into(),
        }
    }
}

/// A function-like macro to materialize as a real function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionExport {
    /// Macro name, reused as the symbol name
    pub name: String,
    /// Return C type
    pub returns: String,
    /// Parameters in call order
    #[serde(default)]
    pub params: Vec<Param>,
}

impl FunctionExport {
    /// Create a function export
    pub fn new(name: impl Into<String>, returns: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            name: name.into(),
            returns: returns.into(),
            params,
        }
    }

    /// Number of declared parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Whether the function returns nothing
    pub fn returns_void(&self) -> bool {
        CType::parse(&self.returns).map_or(false, |t| t.is_void())
    }
}

/// A versioned list of macro-based exports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportTable {
    /// Engine the table was written for
    pub engine: String,
    /// First engine version covered (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<u32>,
    /// First engine version no longer covered (exclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<u32>,
    /// Constants to materialize
    #[serde(default)]
    pub constants: Vec<ConstantExport>,
    /// Functions to materialize
    #[serde(default)]
    pub functions: Vec<FunctionExport>,
}

impl ExportTable {
    /// Create an empty table for an engine
    pub fn new(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            min_version: None,
            max_version: None,
            constants: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Parse a table from JSON and check it is well formed
    pub fn from_json(raw: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(raw)?;
        table.validate()?;
        Ok(table)
    }

    /// Load a table from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ShimError::Table(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    /// Add a constant
    pub fn with_constant(mut self, constant: ConstantExport) -> Self {
        self.constants.push(constant);
        self
    }

    /// Add a function
    pub fn with_function(mut self, function: FunctionExport) -> Self {
        self.functions.push(function);
        self
    }

    /// Restrict the table to a version range
    pub fn with_versions(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_version = min;
        self.max_version = max;
        self
    }

    /// Whether this table applies to the given engine version
    pub fn covers(&self, version: u32) -> bool {
        self.min_version.map_or(true, |min| version >= min)
            && self.max_version.map_or(true, |max| version < max)
    }

    /// Total number of exports
    pub fn len(&self) -> usize {
        self.constants.len() + self.functions.len()
    }

    /// Whether the table has no exports
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a constant by name
    pub fn constant(&self, name: &str) -> Option<&ConstantExport> {
        self.constants.iter().find(|c| c.name == name)
    }

    /// Look up a function by name
    pub fn function(&self, name: &str) -> Option<&FunctionExport> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Whether the table exports the given name
    pub fn contains(&self, name: &str) -> bool {
        self.constant(name).is_some() || self.function(name).is_some()
    }

    /// Check names are unique identifiers and every type parses
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for constant in &self.constants {
            check_identifier(&constant.name)?;
            if !seen.insert(constant.name.as_str()) {
                return Err(ExportError::duplicate_export(&constant.name).into());
            }
            CType::parse(&constant.c_type)
                .map_err(|e| ExportError::invalid_export(&constant.name, e.to_string()))?;
        }

        for function in &self.functions {
            check_identifier(&function.name)?;
            if !seen.insert(function.name.as_str()) {
                return Err(ExportError::duplicate_export(&function.name).into());
            }
            CType::parse(&function.returns)
                .map_err(|e| ExportError::invalid_export(&function.name, e.to_string()))?;

            let mut params = HashSet::new();
            for param in &function.params {
                check_identifier(&param.name)
                    .map_err(|_| ExportError::invalid_export(&function.name, format!("bad parameter name '{}'", param.name)))?;
                if !params.insert(param.name.as_str()) {
                    return Err(ExportError::invalid_export(
                        &function.name,
                        format!("parameter '{}' repeated", param.name),
                    )
                    .into());
                }
                let ty = CType::parse(&param.c_type)
                    .map_err(|e| ExportError::invalid_export(&function.name, e.to_string()))?;
                if ty.is_void() {
                    return Err(ExportError::invalid_export(
                        &function.name,
                        format!("parameter '{}' has type void", param.name),
                    )
                    .into());
                }
            }
        }

        Ok(())
    }
}

/// Whether `s` is a valid C identifier
pub fn is_c_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn check_identifier(name: &str) -> std::result::Result<(), ExportError> {
    if is_c_identifier(name) {
        Ok(())
    } else {
        Err(ExportError::invalid_export(name, "not a C identifier"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn sample() -> ExportTable {
        ExportTable::new("duktape")
            .with_constant(ConstantExport::new("DUK_VERSION", "duk_uint_t"))
            .with_function(FunctionExport::new(
                "duk_eval_string",
                "void",
                vec![Param::new("duk_context *", "ctx"), Param::new("const char *", "src")],
            ))
    }

    #[test]
    fn test_lookup() {
        let table = sample();
        assert_eq!(table.len(), 2);
        assert!(table.contains("DUK_VERSION"));
        assert!(table.contains("duk_eval_string"));
        assert!(!table.contains("duk_eval"));
        assert_eq!(table.function("duk_eval_string").unwrap().arity(), 2);
        assert!(table.function("duk_eval_string").unwrap().returns_void());
    }

    #[test]
    fn test_version_range() {
        let table = sample().with_versions(Some(20000), Some(30000));
        assert!(!table.covers(10500));
        assert!(table.covers(20000));
        assert!(table.covers(20500));
        assert!(!table.covers(30000));
        assert!(sample().covers(1));
    }

    #[test]
    fn test_duplicate_rejected() {
        let table = sample().with_constant(ConstantExport::new("duk_eval_string", "duk_int_t"));
        let err = table.validate().unwrap_err();
        assert_eq!(err.export_error().unwrap().code, ErrorCode::DuplicateExport);
    }

    #[test]
    fn test_bad_identifier_rejected() {
        let table = sample().with_constant(ConstantExport::new("1DUK", "duk_int_t"));
        assert_eq!(
            table.validate().unwrap_err().export_error().unwrap().code,
            ErrorCode::InvalidExport
        );
    }

    #[test]
    fn test_void_param_rejected() {
        let table = sample().with_function(FunctionExport::new(
            "duk_bad",
            "void",
            vec![Param::new("void", "x")],
        ));
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_repeated_param_rejected() {
        let table = sample().with_function(FunctionExport::new(
            "duk_bad",
            "void",
            vec![Param::new("duk_context *", "ctx"), Param::new("duk_idx_t", "ctx")],
        ));
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("repeated"));
    }

    #[test]
    fn test_json_shape() {
        let table = ExportTable::from_json(
            r#"{
                "engine": "duktape",
                "minVersion": 20000,
                "constants": [{"name": "DUK_VARARGS", "type": "duk_int_t"}],
                "functions": [{"name": "duk_create_heap_default", "returns": "duk_context *"}]
            }"#,
        )
        .unwrap();
        assert_eq!(table.min_version, Some(20000));
        assert!(table.max_version.is_none());
        assert!(table.function("duk_create_heap_default").unwrap().params.is_empty());
    }

    #[test]
    fn test_identifier() {
        assert!(is_c_identifier("duk_push_thread"));
        assert!(is_c_identifier("_x1"));
        assert!(!is_c_identifier(""));
        assert!(!is_c_identifier("a-b"));
        assert!(!is_c_identifier("9lives"));
    }
}

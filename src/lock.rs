//! Golden-value lock.
//!
//! The lock records, for one scanned header, the macro body and evaluated
//! value of every exported constant. Diffing two locks makes an engine
//! upgrade that silently changes a constant visible in review.
//!
//! Values come from the header evaluator. When Rust bindings are generated,
//! the macro values clang computed are merged in as a second source (see
//! [`ExportLock::with_compiler_values`]).

use crate::error::{Result, ShimError};
use crate::export::ExportTable;
use crate::header::{HeaderIndex, MacroValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// A constant as recorded in the lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedConstant {
    /// Macro name
    pub name: String,
    /// C type of the exported definition
    #[serde(rename = "type")]
    pub c_type: String,
    /// Macro replacement list, if the macro was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Value converted to `type`, if the evaluator or clang could compute it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<MacroValue>,
}

/// Golden values for one header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportLock {
    /// Engine name from the export table
    pub engine: String,
    /// `DUK_VERSION` of the scanned header
    pub engine_version: Option<u32>,
    /// Digest of the scanned headers
    pub header_digest: String,
    /// Exported constants, in table order
    pub constants: Vec<LockedConstant>,
}

impl ExportLock {
    /// Record the constants of `table` as defined by `index`
    pub fn from_index(table: &ExportTable, index: &HeaderIndex) -> Self {
        let constants = table
            .constants
            .iter()
            .map(|c| LockedConstant {
                name: c.name.clone(),
                c_type: c.c_type.clone(),
                body: index.get(&c.name).map(|d| d.body.clone()),
                value: index.evaluate_as(&c.name, &c.c_type),
            })
            .collect();

        Self {
            engine: table.engine.clone(),
            engine_version: index.engine_version(),
            header_digest: index.digest().to_string(),
            constants,
        }
    }

    /// Merge macro values computed by clang
    ///
    /// Fills constants the evaluator could not compute. Where both sources
    /// have a value and they differ, clang's value is kept and a warning is
    /// logged.
    pub fn with_compiler_values(mut self, values: &BTreeMap<String, MacroValue>) -> Self {
        for constant in &mut self.constants {
            let Some(value) = values.get(&constant.name) else {
                continue;
            };
            let value = value.clone().convert_to(&constant.c_type);
            match &constant.value {
                None => {
                    debug!(name = %constant.name, value = %value, "Constant value taken from clang");
                    constant.value = Some(value);
                }
                Some(own) if *own != value => {
                    warn!(
                        name = %constant.name,
                        scanned = %own,
                        clang = %value,
                        "Header scan and clang disagree on a constant value"
                    );
                    constant.value = Some(value);
                }
                Some(_) => {}
            }
        }
        self
    }

    /// Pretty JSON with a trailing newline
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Parse a lock file
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| ShimError::Serialization(format!("Invalid lock file: {}", e)))
    }

    /// Look up a constant
    pub fn constant(&self, name: &str) -> Option<&LockedConstant> {
        self.constants.iter().find(|c| c.name == name)
    }
}

/// One difference between two locks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "camelCase")]
pub enum LockChange {
    /// Constant present only in the new lock
    Added {
        /// Constant name
        name: String,
        /// New value
        value: Option<MacroValue>,
    },
    /// Constant present only in the old lock
    Removed {
        /// Constant name
        name: String,
        /// Old value
        value: Option<MacroValue>,
    },
    /// Constant whose type, body or value changed
    Changed {
        /// Constant name
        name: String,
        /// Old value
        old: Option<MacroValue>,
        /// New value
        new: Option<MacroValue>,
        /// Old macro body
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_body: Option<String>,
        /// New macro body
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_body: Option<String>,
    },
}

impl fmt::Display for LockChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockChange::Added { name, value } => write!(f, "+ {} = {}", name, show(value)),
            LockChange::Removed { name, value } => write!(f, "- {} = {}", name, show(value)),
            // Equal values (typically both unknown): the bodies are what moved
            LockChange::Changed {
                name,
                old,
                new,
                old_body,
                new_body,
            } if old == new => write!(
                f,
                "~ {}: {} -> {}",
                name,
                show_body(old_body),
                show_body(new_body)
            ),
            LockChange::Changed { name, old, new, .. } => {
                write!(f, "~ {}: {} -> {}", name, show(old), show(new))
            }
        }
    }
}

fn show(value: &Option<MacroValue>) -> String {
    value
        .as_ref()
        .map_or_else(|| "<unknown>".to_string(), MacroValue::to_string)
}

fn show_body(body: &Option<String>) -> String {
    body.clone().unwrap_or_else(|| "<undefined>".to_string())
}

/// Differences from `old` to `new`, sorted by constant name
pub fn diff(old: &ExportLock, new: &ExportLock) -> Vec<LockChange> {
    let before: BTreeMap<&str, &LockedConstant> =
        old.constants.iter().map(|c| (c.name.as_str(), c)).collect();
    let after: BTreeMap<&str, &LockedConstant> =
        new.constants.iter().map(|c| (c.name.as_str(), c)).collect();

    let mut changes = Vec::new();

    for (name, prev) in &before {
        match after.get(name) {
            None => changes.push(LockChange::Removed {
                name: name.to_string(),
                value: prev.value.clone(),
            }),
            Some(next)
                if next.value != prev.value
                    || next.c_type != prev.c_type
                    || next.body != prev.body =>
            {
                changes.push(LockChange::Changed {
                    name: name.to_string(),
                    old: prev.value.clone(),
                    new: next.value.clone(),
                    old_body: prev.body.clone(),
                    new_body: next.body.clone(),
                })
            }
            Some(_) => {}
        }
    }

    for (name, next) in &after {
        if !before.contains_key(name) {
            changes.push(LockChange::Added {
                name: name.to_string(),
                value: next.value.clone(),
            });
        }
    }

    changes.sort_by(|a, b| change_name(a).cmp(change_name(b)));
    changes
}

fn change_name(change: &LockChange) -> &str {
    match change {
        LockChange::Added { name, .. }
        | LockChange::Removed { name, .. }
        | LockChange::Changed { name, .. } => name,
    }
}

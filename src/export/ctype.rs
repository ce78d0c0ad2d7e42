//! C type spellings used in export tables.
//!
//! Only the subset of C declarators that appear in macro-based API entry
//! points is supported: a base type (keyword list or typedef name) with an
//! optional `const`, followed by any number of pointer levels, each of which
//! may itself be `const`. Arrays and function pointers are rejected.

use crate::error::ExportError;
use std::fmt;

/// A parsed C type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CType {
    base: Vec<String>,
    base_const: bool,
    /// One entry per `*`, true when that pointer is itself `const`
    pointers: Vec<bool>,
}

impl CType {
    /// Parse a C type spelling such as `const char *` or `char *const`
    pub fn parse(spelling: &str) -> Result<Self, ExportError> {
        let invalid = |reason: &str| ExportError::invalid_export(spelling, reason.to_string());

        let mut base = Vec::new();
        let mut base_const = false;
        let mut pointers: Vec<bool> = Vec::new();

        for token in tokenize(spelling) {
            match token {
                "*" => pointers.push(false),
                "const" => match pointers.last_mut() {
                    Some(last) => *last = true,
                    None => base_const = true,
                },
                "volatile" | "restrict" => {}
                word => {
                    if !pointers.is_empty() {
                        return Err(invalid("identifier after pointer declarator"));
                    }
                    if !super::is_c_identifier(word) {
                        return Err(invalid("unsupported declarator"));
                    }
                    base.push(word.to_string());
                }
            }
        }

        if base.is_empty() {
            return Err(invalid("missing base type"));
        }

        Ok(Self {
            base,
            base_const,
            pointers,
        })
    }

    /// Same type with a `const` base
    pub fn with_const_base(mut self) -> Self {
        self.base_const = true;
        self
    }

    /// Whether this is plain `void`
    pub fn is_void(&self) -> bool {
        self.pointers.is_empty() && self.base_name() == "void"
    }

    /// Whether this is a pointer type
    pub fn is_pointer(&self) -> bool {
        !self.pointers.is_empty()
    }

    /// The base type words joined by spaces
    pub fn base_name(&self) -> String {
        self.base.join(" ")
    }

    /// Render a C declaration of `name` with this type
    pub fn declare(&self, name: &str) -> String {
        let ty = self.to_string();
        if ty.ends_with('*') {
            format!("{}{}", ty, name)
        } else {
            format!("{} {}", ty, name)
        }
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.base_const {
            write!(f, "const ")?;
        }
        write!(f, "{}", self.base_name())?;
        for &is_const in &self.pointers {
            write!(f, " *")?;
            if is_const {
                write!(f, "const")?;
            }
        }
        Ok(())
    }
}

fn tokenize(spelling: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for word in spelling.split_whitespace() {
        let mut rest = word;
        while !rest.is_empty() {
            if let Some(stripped) = rest.strip_prefix('*') {
                tokens.push("*");
                rest = stripped;
                continue;
            }
            let end = rest.find('*').unwrap_or(rest.len());
            tokens.push(&rest[..end]);
            rest = &rest[end..];
        }
    }
    tokens
}

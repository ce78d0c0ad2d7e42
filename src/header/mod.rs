//! Engine header scanning.
//!
//! The scanner does not run a preprocessor. It records every `#define` it
//! sees (honouring `#undef`) so the export table can be checked against what
//! the engine actually defines, and so object-like macro values can be
//! evaluated for the golden-value lock. Conditional blocks are not evaluated;
//! the first definition of a name wins until it is `#undef`ed.

pub mod eval;
pub mod source;

pub use eval::MacroValue;
pub use source::HeaderSource;

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Lines of context shown around a definition in diagnostics
const SNIPPET_CONTEXT: usize = 2;

/// SHA-256 over the header texts, in order
///
/// Equal to [`HeaderIndex::digest`] of the index scanned from `sources`, so
/// it can key a cache before scanning.
pub fn digest_sources(sources: &[HeaderSource]) -> String {
    let mut hasher = Sha256::new();
    for source in sources {
        hasher.update(source.text.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// A `#define` directive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroDefinition {
    /// Macro name
    pub name: String,
    /// Named parameters, `None` for object-like macros
    pub params: Option<Vec<String>>,
    /// Whether the parameter list ends with `...`
    pub variadic: bool,
    /// Replacement list with whitespace collapsed
    pub body: String,
    /// Index of the source the definition came from
    pub source: usize,
    /// Line of the `#define` (1-indexed)
    pub line: u32,
}

impl MacroDefinition {
    /// Whether this is a function-like macro
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    /// Whether a call with `arity` arguments matches this macro's parameters
    pub fn accepts(&self, arity: usize) -> bool {
        match &self.params {
            None => true,
            Some(params) if self.variadic => arity >= params.len(),
            Some(params) => arity == params.len(),
        }
    }

    /// Number of named parameters (0 for object-like macros)
    pub fn named_params(&self) -> usize {
        self.params.as_ref().map_or(0, Vec::len)
    }
}

/// Every macro defined by a set of headers
#[derive(Clone, Debug)]
pub struct HeaderIndex {
    sources: Vec<HeaderSource>,
    macros: BTreeMap<String, MacroDefinition>,
    redefinitions: usize,
    shape_conflicts: usize,
    digest: String,
}

impl HeaderIndex {
    /// Scan header sources in order
    pub fn scan(sources: Vec<HeaderSource>) -> Self {
        let mut macros = BTreeMap::new();
        let mut redefinitions = 0;
        let mut shape_conflicts = 0;
        let digest = digest_sources(&sources);

        for (idx, source) in sources.iter().enumerate() {
            for line in logical_lines(&strip_comments(&source.text)) {
                match parse_directive(&line.text) {
                    Some(Directive::Define(mut def)) => {
                        def.source = idx;
                        def.line = line.number;
                        if let Some(kept) = macros.get(&def.name) {
                            redefinitions += 1;
                            if !same_shape(kept, &def) {
                                debug!(
                                    name = %def.name,
                                    kept_params = ?kept.params.as_ref().map(Vec::len),
                                    kept_variadic = kept.variadic,
                                    ignored_params = ?def.params.as_ref().map(Vec::len),
                                    ignored_variadic = def.variadic,
                                    header = %source.name,
                                    line = def.line,
                                    "Ignoring redefinition with a different parameter list"
                                );
                                shape_conflicts += 1;
                            }
                        } else {
                            macros.insert(def.name.clone(), def);
                        }
                    }
                    Some(Directive::Undef(name)) => {
                        macros.remove(&name);
                    }
                    None => {}
                }
            }
        }

        debug!(
            headers = sources.len(),
            macros = macros.len(),
            redefinitions,
            shape_conflicts,
            "Scanned engine headers"
        );

        Self {
            sources,
            macros,
            redefinitions,
            shape_conflicts,
            digest,
        }
    }

    /// Read and scan header files in order
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> std::io::Result<Self> {
        let sources = paths
            .iter()
            .map(|p| HeaderSource::from_file(p.as_ref()))
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self::scan(sources))
    }

    /// Look up a macro
    pub fn get(&self, name: &str) -> Option<&MacroDefinition> {
        self.macros.get(name)
    }

    /// Whether a macro is defined
    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Number of macros currently defined
    pub fn len(&self) -> usize {
        self.macros.len()
    }

    /// Whether no macros were found
    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Macros in name order
    pub fn iter(&self) -> impl Iterator<Item = &MacroDefinition> {
        self.macros.values()
    }

    /// Number of definitions ignored because the name was already defined
    pub fn redefinitions(&self) -> usize {
        self.redefinitions
    }

    /// Ignored redefinitions whose parameter list differs from the kept one
    ///
    /// Typical for `#if`/`#else` pairs such as the variadic and the stash
    /// forms of `duk_push_error_object`.
    pub fn shape_conflicts(&self) -> usize {
        self.shape_conflicts
    }

    /// SHA-256 of the scanned header texts
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Scanned sources, engine header first
    pub fn sources(&self) -> &[HeaderSource] {
        &self.sources
    }

    /// The header a definition came from
    pub fn source_of(&self, def: &MacroDefinition) -> Option<&HeaderSource> {
        self.sources.get(def.source)
    }

    /// Header lines around a definition
    pub fn snippet_for(&self, def: &MacroDefinition) -> Option<String> {
        self.source_of(def)
            .map(|s| s.get_snippet(def.line as usize, SNIPPET_CONTEXT))
    }

    /// Evaluate an object-like macro
    pub fn evaluate(&self, name: &str) -> Option<MacroValue> {
        eval::evaluate(self, name)
    }

    /// Evaluate an object-like macro as an initializer of `c_type`
    pub fn evaluate_as(&self, name: &str, c_type: &str) -> Option<MacroValue> {
        eval::evaluate_as(self, name, c_type)
    }

    /// The engine version from `DUK_VERSION`
    pub fn engine_version(&self) -> Option<u32> {
        u32::try_from(self.evaluate("DUK_VERSION")?.as_int()?).ok()
    }

    /// Macros in the engine's public `duk_`/`DUK_` namespace
    ///
    /// Internal helpers (`DUK_USE_*`, `DUK__*`, header guards) are skipped.
    pub fn api_macros(&self) -> impl Iterator<Item = &MacroDefinition> {
        self.iter().filter(|def| {
            let name = def.name.as_str();
            (name.starts_with("duk_") || name.starts_with("DUK_"))
                && !name.starts_with("DUK_USE_")
                && !name.starts_with("DUK__")
                && !name.ends_with("_H_INCLUDED")
        })
    }
}

fn same_shape(a: &MacroDefinition, b: &MacroDefinition) -> bool {
    a.params.as_ref().map(Vec::len) == b.params.as_ref().map(Vec::len) && a.variadic == b.variadic
}

enum Directive {
    Define(MacroDefinition),
    Undef(String),
}

struct LogicalLine {
    number: u32,
    text: String,
}

/// Replace comments by a space, keeping newlines so line numbers survive.
fn strip_comments(text: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        Str(char),
        Line,
        Block,
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Code;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push(' ');
                    state = State::Line;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push(' ');
                    state = State::Block;
                }
                '"' | '\'' => {
                    out.push(c);
                    state = State::Str(c);
                }
                _ => out.push(c),
            },
            State::Str(quote) => {
                out.push(c);
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else if c == quote || c == '\n' {
                    state = State::Code;
                }
            }
            State::Line => {
                // a backslash-newline continues a line comment
                if c == '\\' && chars.peek() == Some(&'\n') {
                    chars.next();
                    out.push('\n');
                } else if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                }
            }
            State::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                } else if c == '\n' {
                    out.push('\n');
                }
            }
        }
    }

    out
}

/// Join backslash-continued lines, remembering where each logical line starts.
fn logical_lines(text: &str) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut current: Option<LogicalLine> = None;

    for (i, raw) in text.lines().enumerate() {
        let raw = raw.trim_end_matches('\r');
        let (content, continued) = match raw.trim_end().strip_suffix('\\') {
            Some(head) => (head, true),
            None => (raw, false),
        };

        let line = current.get_or_insert_with(|| LogicalLine {
            number: (i + 1) as u32,
            text: String::new(),
        });
        if !line.text.is_empty() {
            line.text.push(' ');
        }
        line.text.push_str(content);

        if !continued {
            if let Some(done) = current.take() {
                lines.push(done);
            }
        }
    }

    if let Some(done) = current.take() {
        lines.push(done);
    }
    lines
}

fn parse_directive(line: &str) -> Option<Directive> {
    let rest = line.trim_start().strip_prefix('#')?.trim_start();
    let (keyword, rest) = split_identifier(rest)?;

    match keyword {
        "define" => parse_define(rest.trim_start()).map(Directive::Define),
        "undef" => {
            let (name, _) = split_identifier(rest.trim_start())?;
            Some(Directive::Undef(name.to_string()))
        }
        _ => None,
    }
}

fn parse_define(rest: &str) -> Option<MacroDefinition> {
    let (name, rest) = split_identifier(rest)?;

    let (params, variadic, body) = match rest.strip_prefix('(') {
        Some(args) => {
            let close = args.find(')')?;
            let mut params = Vec::new();
            let mut variadic = false;
            for param in args[..close].split(',').map(str::trim) {
                if param.is_empty() {
                    continue;
                }
                if param == "..." {
                    variadic = true;
                } else if let Some(named) = param.strip_suffix("...") {
                    // GNU named variadic: `args...`
                    variadic = true;
                    params.push(named.trim().to_string());
                } else {
                    params.push(param.to_string());
                }
            }
            (Some(params), variadic, &args[close + 1..])
        }
        None => (None, false, rest),
    };

    Some(MacroDefinition {
        name: name.to_string(),
        params,
        variadic,
        body: body.split_whitespace().collect::<Vec<_>>().join(" "),
        source: 0,
        line: 0,
    })
}

fn split_identifier(s: &str) -> Option<(&str, &str)> {
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit())))
        .map_or(s.len(), |(i, _)| i);
    if end == 0 {
        None
    } else {
        Some((&s[..end], &s[end..]))
    }
}

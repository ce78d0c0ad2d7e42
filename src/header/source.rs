//! Header text and diagnostic snippets.

use std::path::Path;

/// A scanned header file
#[derive(Clone, Debug)]
pub struct HeaderSource {
    /// Display name (the path as given)
    pub name: String,
    /// Full header text
    pub text: String,
}

impl HeaderSource {
    /// Create a header source from text
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Read a header source from disk
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Self::from_text(path.display().to_string(), text))
    }

    /// Get a code snippet around a line
    pub fn get_snippet(&self, line: usize, context_lines: usize) -> String {
        let lines: Vec<&str> = self.text.lines().collect();
        let start = line.saturating_sub(context_lines + 1);
        let end = (line + context_lines).min(lines.len());
        if start >= end {
            return String::new();
        }

        lines[start..end]
            .iter()
            .enumerate()
            .map(|(i, l)| {
                let line_num = start + i + 1;
                let marker = if line_num == line { ">" } else { " " };
                format!("{} {:4} | {}", marker, line_num, l)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet() {
        let src = HeaderSource::from_text("t.h", "a\nb\nc\nd\ne\n");
        let snippet = src.get_snippet(3, 1);
        assert_eq!(snippet, "     2 | b\n>    3 | c\n     4 | d");
        assert_eq!(src.get_snippet(1, 0), ">    1 | a");
        assert!(src.get_snippet(99, 0).is_empty());
    }

    #[test]
    fn test_crlf_snippet() {
        let src = HeaderSource::from_text("duk_logging.h", "#define DUK_LOG_INFO 2\r\n");
        assert_eq!(src.name, "duk_logging.h");
        assert_eq!(src.get_snippet(1, 0), ">    1 | #define DUK_LOG_INFO 2");
    }

    #[test]
    fn test_from_file_lossy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duktape.h");
        std::fs::write(&path, b"#define DUK_X 1 /* \xff */\n").unwrap();
        let src = HeaderSource::from_file(&path).unwrap();
        assert!(src.text.starts_with("#define DUK_X 1"));
        assert!(src.name.ends_with("duktape.h"));
    }
}

//! Module source text with rope-backed line bookkeeping.
//!
//! All coordinates handed out here refer to the text as it was parsed.
//! Lines are 1-based, columns are 0-based byte offsets within the line.

use crate::symbol::{Extent, ModuleId, ModuleKind, Span};
use ropey::Rope;

/// Read access to the current lines of a module.
///
/// This is the `GetModuleText` contract of the host. The rewriter only ever
/// reads through it.
pub trait ModuleText {
    /// Ordered lines of a module without line terminators, or `None` when the
    /// module is unknown.
    fn module_lines(&self, module: &ModuleId) -> Option<Vec<String>>;

    /// Line terminator used by the module.
    fn line_ending(&self, _module: &ModuleId) -> &'static str {
        "\n"
    }

    /// Whether the module text ends with a line terminator.
    fn has_trailing_newline(&self, _module: &ModuleId) -> bool {
        false
    }
}

/// Text of one code module.
#[derive(Debug, Clone)]
pub struct ModuleSource {
    id: ModuleId,
    kind: ModuleKind,
    text: String,
    rope: Rope,
}

impl ModuleSource {
    /// Wrap module text.
    pub fn new(id: ModuleId, kind: ModuleKind, text: impl Into<String>) -> Self {
        let text = text.into();
        let rope = Rope::from_str(&text);
        Self {
            id,
            kind,
            text,
            rope,
        }
    }

    /// Module identity.
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Module kind.
    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    /// Full text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of lines, counting a final unterminated line.
    pub fn line_count(&self) -> usize {
        let lines = self.rope.len_lines();
        if self.has_trailing_newline() {
            lines - 1
        } else {
            lines
        }
    }

    /// Line terminator used by the module (`\r\n` when any line uses it).
    pub fn line_ending(&self) -> &'static str {
        if self.text.contains("\r\n") {
            "\r\n"
        } else {
            "\n"
        }
    }

    /// True when the text ends with a line terminator.
    pub fn has_trailing_newline(&self) -> bool {
        self.text.ends_with('\n')
    }

    /// 1-based line containing `byte`.
    pub fn line_of(&self, byte: usize) -> usize {
        self.rope.byte_to_line(byte.min(self.text.len())) + 1
    }

    /// Byte offset where 1-based `line` starts.
    pub fn line_start(&self, line: usize) -> usize {
        self.rope.line_to_byte(line.saturating_sub(1).min(self.rope.len_lines()))
    }

    /// Byte offset where 1-based `line` ends, excluding its terminator.
    pub fn line_end(&self, line: usize) -> usize {
        let start = self.line_start(line);
        let rest = &self.text[start..];
        match rest.find('\n') {
            Some(pos) if pos > 0 && rest.as_bytes()[pos - 1] == b'\r' => start + pos - 1,
            Some(pos) => start + pos,
            None => self.text.len(),
        }
    }

    /// Text of 1-based `line` without its terminator.
    pub fn line_text(&self, line: usize) -> &str {
        &self.text[self.line_start(line)..self.line_end(line)]
    }

    /// Lines without terminators.
    pub fn lines(&self) -> Vec<String> {
        (1..=self.line_count())
            .map(|line| self.line_text(line).to_string())
            .collect()
    }

    /// Byte span covering whole lines `first..=last`, terminators excluded.
    pub fn lines_span(&self, first: usize, last: usize) -> Span {
        Span::new(self.line_start(first), self.line_end(last))
    }

    /// Convert a byte span into an extent.
    pub fn extent(&self, span: Span) -> Extent {
        let line_start = self.line_of(span.start);
        let line_end = self.line_of(span.end);
        Extent {
            span,
            line_start,
            line_end,
            col_start: span.start - self.line_start(line_start),
            col_end: span.end - self.line_start(line_end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(text: &str) -> ModuleSource {
        ModuleSource::new(ModuleId::new("P", "M"), ModuleKind::Standard, text)
    }

    #[test]
    fn test_lines_without_trailing_newline() {
        let source = module("a\nbb\nccc");
        assert_eq!(source.line_count(), 3);
        assert_eq!(source.line_text(2), "bb");
        assert_eq!(source.lines(), vec!["a", "bb", "ccc"]);
        assert!(!source.has_trailing_newline());
    }

    #[test]
    fn test_crlf_lines() {
        let source = module("Sub A()\r\nEnd Sub\r\n");
        assert_eq!(source.line_count(), 2);
        assert_eq!(source.line_text(1), "Sub A()");
        assert_eq!(source.line_ending(), "\r\n");
        assert!(source.has_trailing_newline());
    }

    #[test]
    fn test_extent_columns() {
        let source = module("x\n  Foo 1\n");
        let extent = source.extent(Span::new(4, 7));
        assert_eq!(extent.line_start, 2);
        assert_eq!(extent.col_start, 2);
        assert_eq!(extent.col_end, 5);
    }
}

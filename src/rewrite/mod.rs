//! Buffered line-range rewriter.
//!
//! The rewriter is the only component that produces module text. Edits are
//! queued per module against the pre-edit line numbers and applied in one
//! linear pass at [`Rewriter::commit`]. Conflicting edits are rejected when
//! queued, so a commit never fails halfway.

mod slots;

pub use slots::{queue_slot_rewrites, Fill, SlotRewrite};

use crate::error::{RefactorError, Result};
use crate::source::ModuleText;
use crate::symbol::ModuleId;
use serde::Serialize;
use std::collections::BTreeMap;

/// 1-based inclusive line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LineRange {
    /// First line.
    pub start: usize,
    /// Last line.
    pub end: usize,
}

impl LineRange {
    /// Create a range.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Single-line range.
    pub fn line(line: usize) -> Self {
        Self::new(line, line)
    }

    /// True when the ranges share at least one line.
    pub fn overlaps(&self, other: &LineRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// True when `other` lies fully inside this range.
    pub fn contains(&self, other: &LineRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    fn as_tuple(&self) -> (usize, usize) {
        (self.start, self.end)
    }
}

/// A queued edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PendingEdit {
    /// Replace the lines with `text` (which may span several lines).
    Replace {
        /// Lines replaced.
        range: LineRange,
        /// Replacement text, lines separated by `\n`.
        text: String,
    },
    /// Remove the lines.
    Delete {
        /// Lines removed.
        range: LineRange,
    },
    /// Insert `text` before a line; `line_count + 1` appends.
    Insert {
        /// Line the text goes before.
        before_line: usize,
        /// Inserted text, lines separated by `\n`.
        text: String,
    },
}

impl PendingEdit {
    fn range(&self) -> Option<LineRange> {
        match self {
            PendingEdit::Replace { range, .. } | PendingEdit::Delete { range } => Some(*range),
            PendingEdit::Insert { .. } => None,
        }
    }
}

/// Outcome of a commit or an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RefactorResult {
    /// No module text changed.
    Unchanged,
    /// New full text per changed module.
    Rewritten(BTreeMap<ModuleId, String>),
}

impl RefactorResult {
    /// True when nothing changed.
    pub fn is_unchanged(&self) -> bool {
        matches!(self, RefactorResult::Unchanged)
    }

    /// New text of a module, if it changed.
    pub fn module_text(&self, module: &ModuleId) -> Option<&str> {
        match self {
            RefactorResult::Unchanged => None,
            RefactorResult::Rewritten(texts) => texts.get(module).map(String::as_str),
        }
    }

    /// Changed modules, in order.
    pub fn modules(&self) -> Vec<&ModuleId> {
        match self {
            RefactorResult::Unchanged => Vec::new(),
            RefactorResult::Rewritten(texts) => texts.keys().collect(),
        }
    }
}

struct ModuleBuffer {
    lines: Vec<String>,
    line_ending: &'static str,
    trailing_newline: bool,
    edits: Vec<PendingEdit>,
}

impl ModuleBuffer {
    fn original_text(&self) -> String {
        join_lines(&self.lines, self.line_ending, self.trailing_newline)
    }

    fn apply(&self) -> String {
        let mut replaced: Vec<&PendingEdit> =
            self.edits.iter().filter(|e| e.range().is_some()).collect();
        replaced.sort_by_key(|e| e.range().map(|r| r.start));

        let mut output: Vec<String> = Vec::with_capacity(self.lines.len());
        let mut edits = replaced.into_iter().peekable();
        let mut line = 1;
        while line <= self.lines.len() {
            self.push_inserts(line, &mut output);
            match edits.peek().copied() {
                Some(edit) if edit.range().is_some_and(|r| r.start == line) => {
                    edits.next();
                    if let PendingEdit::Replace { range, text } = edit {
                        output.extend(split_lines(text));
                        line = range.end + 1;
                    } else if let Some(range) = edit.range() {
                        line = range.end + 1;
                    }
                }
                _ => {
                    output.push(self.lines[line - 1].clone());
                    line += 1;
                }
            }
        }
        self.push_inserts(self.lines.len() + 1, &mut output);

        join_lines(&output, self.line_ending, self.trailing_newline)
    }

    fn push_inserts(&self, line: usize, output: &mut Vec<String>) {
        for edit in &self.edits {
            if let PendingEdit::Insert { before_line, text } = edit {
                if *before_line == line {
                    output.extend(split_lines(text));
                }
            }
        }
    }
}

fn split_lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
}

fn join_lines(lines: &[String], ending: &str, trailing: bool) -> String {
    let mut text = lines.join(ending);
    if trailing && !lines.is_empty() {
        text.push_str(ending);
    }
    text
}

/// Per-module buffer of pending line edits over a host.
pub struct Rewriter<'h> {
    host: &'h dyn ModuleText,
    modules: BTreeMap<ModuleId, ModuleBuffer>,
}

impl<'h> Rewriter<'h> {
    /// Create a rewriter reading module lines from `host`.
    pub fn new(host: &'h dyn ModuleText) -> Self {
        Self {
            host,
            modules: BTreeMap::new(),
        }
    }

    fn buffer(&mut self, module: &ModuleId) -> Result<&mut ModuleBuffer> {
        if !self.modules.contains_key(module) {
            let lines = self
                .host
                .module_lines(module)
                .ok_or_else(|| RefactorError::ModuleNotFound(module.to_string()))?;
            self.modules.insert(
                module.clone(),
                ModuleBuffer {
                    lines,
                    line_ending: self.host.line_ending(module),
                    trailing_newline: self.host.has_trailing_newline(module),
                    edits: Vec::new(),
                },
            );
        }
        self.modules
            .get_mut(module)
            .ok_or_else(|| RefactorError::ModuleNotFound(module.to_string()))
    }

    /// Queue replacement of `range` with `text`.
    ///
    /// # Errors
    /// - `InvalidLineRange` - the range lies outside the module
    /// - `OverlappingEdits` - the range overlaps a different queued edit
    pub fn queue_replace(&mut self, module: &ModuleId, range: LineRange, text: impl Into<String>) -> Result<()> {
        self.queue(
            module,
            PendingEdit::Replace {
                range,
                text: text.into(),
            },
        )
    }

    /// Queue deletion of `range`.
    ///
    /// A delete that lies inside an already queued delete or replace is
    /// absorbed.
    pub fn queue_delete(&mut self, module: &ModuleId, range: LineRange) -> Result<()> {
        self.queue(module, PendingEdit::Delete { range })
    }

    /// Queue insertion of `text` before `before_line` (`line_count + 1` appends).
    ///
    /// Several inserts at the same line are emitted in queue order.
    pub fn queue_insert(&mut self, module: &ModuleId, before_line: usize, text: impl Into<String>) -> Result<()> {
        self.queue(
            module,
            PendingEdit::Insert {
                before_line,
                text: text.into(),
            },
        )
    }

    fn queue(&mut self, module: &ModuleId, edit: PendingEdit) -> Result<()> {
        let name = module.to_string();
        let buffer = self.buffer(module)?;
        let line_count = buffer.lines.len();

        match &edit {
            PendingEdit::Insert { before_line, .. } => {
                if *before_line == 0 || *before_line > line_count + 1 {
                    return Err(RefactorError::InvalidLineRange {
                        module: name,
                        start: *before_line,
                        end: *before_line,
                    });
                }
                // Inserting inside a replaced block has no defined position.
                if let Some(existing) = buffer.edits.iter().filter_map(PendingEdit::range).find(|r| {
                    r.start < *before_line && *before_line <= r.end
                }) {
                    return Err(RefactorError::OverlappingEdits {
                        module: name,
                        first: existing.as_tuple(),
                        second: (*before_line, *before_line),
                    });
                }
            }
            PendingEdit::Replace { range, .. } | PendingEdit::Delete { range } => {
                if range.start == 0 || range.start > range.end || range.end > line_count {
                    return Err(RefactorError::InvalidLineRange {
                        module: name,
                        start: range.start,
                        end: range.end,
                    });
                }
                for existing in &buffer.edits {
                    if existing == &edit {
                        log::debug!("absorbed duplicate edit {:?} in {}", edit, name);
                        return Ok(());
                    }
                    match existing {
                        PendingEdit::Insert { before_line, .. } => {
                            if range.start < *before_line && *before_line <= range.end {
                                return Err(RefactorError::OverlappingEdits {
                                    module: name,
                                    first: (*before_line, *before_line),
                                    second: range.as_tuple(),
                                });
                            }
                        }
                        PendingEdit::Replace { range: taken, .. } | PendingEdit::Delete { range: taken } => {
                            if !taken.overlaps(range) {
                                continue;
                            }
                            if matches!(edit, PendingEdit::Delete { .. }) && taken.contains(range) {
                                log::debug!("absorbed delete {:?} inside {:?} in {}", range, taken, name);
                                return Ok(());
                            }
                            return Err(RefactorError::OverlappingEdits {
                                module: name,
                                first: taken.as_tuple(),
                                second: range.as_tuple(),
                            });
                        }
                    }
                }
            }
        }

        buffer.edits.push(edit);
        Ok(())
    }

    /// Edits queued for a module and not yet committed.
    pub fn pending(&self, module: &ModuleId) -> &[PendingEdit] {
        self.modules
            .get(module)
            .map(|b| b.edits.as_slice())
            .unwrap_or_default()
    }

    /// Drop every queued edit.
    pub fn discard(&mut self) {
        for buffer in self.modules.values_mut() {
            buffer.edits.clear();
        }
    }

    /// Apply every queued edit and return the new texts.
    ///
    /// Modules whose text comes out identical are omitted. Queued edits are
    /// consumed, so a second commit without new edits returns `Unchanged`.
    pub fn commit(&mut self) -> RefactorResult {
        let mut changed = BTreeMap::new();
        for (module, buffer) in self.modules.iter_mut() {
            if buffer.edits.is_empty() {
                continue;
            }
            let text = buffer.apply();
            log::debug!("commit {}: {} edits", module, buffer.edits.len());
            if text != buffer.original_text() {
                changed.insert(module.clone(), text);
            }
            buffer.edits.clear();
        }
        if changed.is_empty() {
            RefactorResult::Unchanged
        } else {
            RefactorResult::Rewritten(changed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Host(HashMap<ModuleId, (Vec<String>, &'static str, bool)>);

    impl ModuleText for Host {
        fn module_lines(&self, module: &ModuleId) -> Option<Vec<String>> {
            self.0.get(module).map(|(lines, _, _)| lines.clone())
        }

        fn line_ending(&self, module: &ModuleId) -> &'static str {
            self.0.get(module).map(|(_, e, _)| *e).unwrap_or("\n")
        }

        fn has_trailing_newline(&self, module: &ModuleId) -> bool {
            self.0.get(module).is_some_and(|(_, _, t)| *t)
        }
    }

    fn host(lines: &[&str], ending: &'static str) -> (Host, ModuleId) {
        let id = ModuleId::new("P", "M");
        let mut map = HashMap::new();
        map.insert(
            id.clone(),
            (lines.iter().map(|l| l.to_string()).collect(), ending, true),
        );
        (Host(map), id)
    }

    #[test]
    fn test_replace_delete_insert_single_pass() {
        let (host, id) = host(&["a", "b", "c", "d"], "\n");
        let mut rewriter = Rewriter::new(&host);
        rewriter.queue_replace(&id, LineRange::line(2), "B1\nB2").unwrap();
        rewriter.queue_delete(&id, LineRange::new(3, 3)).unwrap();
        rewriter.queue_insert(&id, 5, "e").unwrap();
        rewriter.queue_insert(&id, 1, "top").unwrap();
        let result = rewriter.commit();
        assert_eq!(result.module_text(&id), Some("top\na\nB1\nB2\nd\ne\n"));
    }

    #[test]
    fn test_crlf_preserved() {
        let (host, id) = host(&["Sub A()", "End Sub"], "\r\n");
        let mut rewriter = Rewriter::new(&host);
        rewriter.queue_replace(&id, LineRange::line(1), "Sub B()").unwrap();
        let result = rewriter.commit();
        assert_eq!(result.module_text(&id), Some("Sub B()\r\nEnd Sub\r\n"));
    }

    #[test]
    fn test_overlap_policy() {
        let (host, id) = host(&["a", "b", "c", "d"], "\n");
        let mut rewriter = Rewriter::new(&host);
        rewriter.queue_replace(&id, LineRange::new(1, 3), "x").unwrap();
        // identical duplicate
        rewriter.queue_replace(&id, LineRange::new(1, 3), "x").unwrap();
        // delete inside
        rewriter.queue_delete(&id, LineRange::new(2, 3)).unwrap();
        let err = rewriter
            .queue_replace(&id, LineRange::new(3, 4), "y")
            .unwrap_err();
        assert_eq!(err.kind(), "OverlappingEdits");
        assert_eq!(rewriter.pending(&id).len(), 1);
    }

    #[test]
    fn test_invalid_range() {
        let (host, id) = host(&["a"], "\n");
        let mut rewriter = Rewriter::new(&host);
        let err = rewriter.queue_delete(&id, LineRange::new(1, 2)).unwrap_err();
        assert_eq!(err.kind(), "InvalidLineRange");
        let err = rewriter
            .queue_delete(&ModuleId::new("P", "Nope"), LineRange::line(1))
            .unwrap_err();
        assert_eq!(err.kind(), "ModuleNotFound");
    }

    #[test]
    fn test_second_commit_is_unchanged() {
        let (host, id) = host(&["a"], "\n");
        let mut rewriter = Rewriter::new(&host);
        rewriter.queue_replace(&id, LineRange::line(1), "b").unwrap();
        assert!(!rewriter.commit().is_unchanged());
        assert!(rewriter.commit().is_unchanged());
    }

    #[test]
    fn test_no_op_replace_is_omitted() {
        let (host, id) = host(&["a"], "\n");
        let mut rewriter = Rewriter::new(&host);
        rewriter.queue_replace(&id, LineRange::line(1), "a").unwrap();
        assert!(rewriter.commit().is_unchanged());
    }
}

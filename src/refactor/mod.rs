//! Refactoring actions and the collaborators they call back into.
//!
//! Actions take a read-only [`ParseSnapshot`](crate::index::ParseSnapshot),
//! validate every precondition, plan all edits in one pass and only then
//! queue and commit them. Any error leaves every module untouched.

pub mod encapsulate;
pub mod model;
pub mod reorder;
pub mod state_udt;

pub use crate::rewrite::RefactorResult;
pub use encapsulate::encapsulate_fields;
pub use model::{EncapsulateFieldModel, FieldEncapsulation, Permutation, ReorderParametersModel};
pub use reorder::reorder_parameters;
pub use state_udt::ObjectStateUdt;

use crate::symbol::{Declaration, DeclarationId, ModuleId};
use serde::Serialize;

/// Yes/no confirmation asked before retargeting an interface member.
pub trait Confirm {
    /// `true` to proceed.
    fn confirm(&self, message: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}

/// Choice among several interface members a target implements.
pub trait ChooseTarget {
    /// The chosen declaration, or `None` to abort.
    fn choose(&self, message: &str, candidates: &[&Declaration]) -> Option<DeclarationId>;
}

impl<F: Fn(&str, &[&Declaration]) -> Option<DeclarationId>> ChooseTarget for F {
    fn choose(&self, message: &str, candidates: &[&Declaration]) -> Option<DeclarationId> {
        self(message, candidates)
    }
}

/// Indentation of generated code blocks.
pub trait Indenter {
    /// Indent a block given as lines.
    fn indent(&self, lines: Vec<String>) -> Vec<String>;
}

impl<F: Fn(Vec<String>) -> Vec<String>> Indenter for F {
    fn indent(&self, lines: Vec<String>) -> Vec<String> {
        self(lines)
    }
}

/// Indents every line between a block's first and last line.
#[derive(Debug, Clone, Copy)]
pub struct BlockIndenter {
    width: usize,
}

impl BlockIndenter {
    /// Indenter using `width` spaces.
    pub fn new(width: usize) -> Self {
        Self { width }
    }
}

impl Default for BlockIndenter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Indenter for BlockIndenter {
    fn indent(&self, lines: Vec<String>) -> Vec<String> {
        let last = lines.len().saturating_sub(1);
        let pad = " ".repeat(self.width);
        lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| {
                let trimmed = line.trim_start();
                if i == 0 || i == last || trimmed.is_empty() {
                    trimmed.to_string()
                } else {
                    format!("{}{}", pad, trimmed)
                }
            })
            .collect()
    }
}

/// A call site left untouched because its syntax could not be handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSite {
    /// Module containing the site.
    pub module: ModuleId,
    /// 1-based line of the site.
    pub line: usize,
    /// Why it was skipped.
    pub reason: String,
}

/// Result of an action plus the sites it had to skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefactorOutcome {
    /// New module texts.
    pub result: RefactorResult,
    /// Sites that were not rewritten.
    pub skipped: Vec<SkippedSite>,
}

impl RefactorOutcome {
    /// Outcome without changes.
    pub fn unchanged() -> Self {
        Self {
            result: RefactorResult::Unchanged,
            skipped: Vec::new(),
        }
    }
}

/// `fizz` → `Fizz`.
pub(crate) fn capitalize_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_indenter_keeps_framing_lines() {
        let lines = vec![
            "Private Type TModule1".to_string(),
            "Name As String".to_string(),
            "End Type".to_string(),
        ];
        let indented = BlockIndenter::default().indent(lines);
        assert_eq!(indented, vec!["Private Type TModule1", "    Name As String", "End Type"]);
    }

    #[test]
    fn test_closures_are_collaborators() {
        let yes = |_: &str| true;
        assert!(yes.confirm("go?"));
        let upper = |lines: Vec<String>| -> Vec<String> {
            lines.into_iter().map(|l| l.to_uppercase()).collect()
        };
        assert_eq!(upper.indent(vec!["a".to_string()]), vec!["A".to_string()]);
    }

    #[test]
    fn test_capitalize_first() {
        assert_eq!(capitalize_first("fizz"), "Fizz");
        assert_eq!(capitalize_first(""), "");
    }
}

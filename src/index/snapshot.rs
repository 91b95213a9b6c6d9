use super::DeclarationIndex;
use crate::ast::{MemberNode, ModuleAst};
use crate::error::{RefactorError, Result};
use crate::source::{ModuleSource, ModuleText};
use crate::symbol::{Declaration, DeclarationId, ModuleId};
use std::collections::BTreeMap;

/// A module as seen by one parse cycle.
#[derive(Debug, Clone)]
pub struct ParsedModule {
    /// Source text the AST was built from.
    pub source: ModuleSource,
    /// Syntax tree.
    pub ast: ModuleAst,
}

/// Read-only parse result handed to every refactoring action.
///
/// Supplied fresh before each request and never mutated by the core.
#[derive(Debug, Clone)]
pub struct ParseSnapshot {
    index: DeclarationIndex,
    modules: BTreeMap<ModuleId, ParsedModule>,
}

impl ParseSnapshot {
    /// Assemble a snapshot from an index and its parsed modules.
    pub fn new(index: DeclarationIndex, modules: BTreeMap<ModuleId, ParsedModule>) -> Self {
        Self { index, modules }
    }

    /// The declaration index.
    pub fn index(&self) -> &DeclarationIndex {
        &self.index
    }

    /// Parsed modules keyed by identity.
    pub fn modules(&self) -> &BTreeMap<ModuleId, ParsedModule> {
        &self.modules
    }

    /// Parsed module by identity.
    pub fn module(&self, id: &ModuleId) -> Option<&ParsedModule> {
        self.modules.get(id)
    }

    /// Parsed module by identity, as an error when absent.
    pub fn require_module(&self, id: &ModuleId) -> Result<&ParsedModule> {
        self.module(id)
            .ok_or_else(|| RefactorError::ModuleNotFound(id.to_string()))
    }

    /// Parsed module by component name (case-insensitive).
    pub fn module_named(&self, name: &str) -> Option<&ParsedModule> {
        self.modules
            .values()
            .find(|m| m.source.id().component().eq_ignore_ascii_case(name))
    }

    /// Declaration by handle, as an error when absent.
    pub fn declaration(&self, id: DeclarationId) -> Result<&Declaration> {
        self.index
            .get(id)
            .ok_or_else(|| RefactorError::DeclarationNotFound(format!("#{}", id.0)))
    }

    /// Member syntax node of a declaration.
    pub fn member_node(&self, id: DeclarationId) -> Option<&MemberNode> {
        let declaration = self.index.get(id)?;
        self.module(&declaration.module)?.ast.member(id)
    }

    /// Original texts of every module.
    pub fn texts(&self) -> BTreeMap<ModuleId, String> {
        self.modules
            .iter()
            .map(|(id, module)| (id.clone(), module.source.text().to_string()))
            .collect()
    }
}

impl ModuleText for ParseSnapshot {
    fn module_lines(&self, module: &ModuleId) -> Option<Vec<String>> {
        self.module(module).map(|m| m.source.lines())
    }

    fn line_ending(&self, module: &ModuleId) -> &'static str {
        self.module(module)
            .map(|m| m.source.line_ending())
            .unwrap_or("\n")
    }

    fn has_trailing_newline(&self, module: &ModuleId) -> bool {
        self.module(module)
            .is_some_and(|m| m.source.has_trailing_newline())
    }
}

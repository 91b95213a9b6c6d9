//! Source text → declarations → references ingestion pipeline.
//!
//! Every module is tokenized and parsed for declarations first; references
//! are resolved in a second pass once the whole project is declared, so
//! cross-module calls bind regardless of module order.

pub mod detect;
pub mod lexer;
mod resolver;
mod vba;

use crate::error::Result;
use crate::index::{DeclarationIndex, ParseSnapshot, ParsedModule};
use crate::source::ModuleSource;
use crate::symbol::{ModuleId, ModuleKind};
use resolver::Resolver;
use std::collections::{BTreeMap, HashMap};
use vba::ModuleParser;

/// Parse a set of modules of one project into a snapshot.
///
/// # Arguments
/// * `project` - Project name shared by every module
/// * `modules` - `(component name, kind, text)` triples
///
/// # Errors
/// Returns `Parse` when a module has an unterminated block or a malformed
/// member header.
pub fn build_snapshot(project: &str, modules: &[(&str, ModuleKind, &str)]) -> Result<ParseSnapshot> {
    let sources: Vec<ModuleSource> = modules
        .iter()
        .map(|(name, kind, text)| ModuleSource::new(ModuleId::new(project, *name), *kind, *text))
        .collect();
    snapshot_from_sources(sources)
}

/// Parse already-loaded module sources into a snapshot.
pub fn snapshot_from_sources(sources: Vec<ModuleSource>) -> Result<ParseSnapshot> {
    let mut declarations = Vec::new();
    let mut parses = Vec::with_capacity(sources.len());
    for source in &sources {
        let parse = ModuleParser::parse(source, &mut declarations)?;
        log::debug!(
            "parsed {}: {} items, {} body statements",
            source.id(),
            parse.ast.items.len(),
            parse.bodies.len()
        );
        parses.push(parse);
    }

    let module_kinds: HashMap<ModuleId, ModuleKind> = sources
        .iter()
        .map(|source| (source.id().clone(), source.kind()))
        .collect();
    let resolver = Resolver::new(&declarations, module_kinds);
    let mut references = Vec::new();
    for (source, parse) in sources.iter().zip(&parses) {
        resolver.resolve_module(source, &parse.bodies, &mut references);
    }
    drop(resolver);

    let mut implements = BTreeMap::new();
    let mut modules = BTreeMap::new();
    for (source, parse) in sources.into_iter().zip(parses) {
        if !parse.implements.is_empty() {
            implements.insert(source.id().clone(), parse.implements);
        }
        modules.insert(
            source.id().clone(),
            ParsedModule {
                source,
                ast: parse.ast,
            },
        );
    }

    log::debug!(
        "snapshot: {} modules, {} declarations, {} references",
        modules.len(),
        declarations.len(),
        references.len()
    );
    let index = DeclarationIndex::new(declarations, references, implements);
    Ok(ParseSnapshot::new(index, modules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::DeclarationKind;

    #[test]
    fn test_cross_module_call_binds_regardless_of_order() {
        let caller = "Public Sub Main()\n    Helper 1\nEnd Sub\n";
        let callee = "Public Sub Helper(ByVal x As Long)\nEnd Sub\n";
        let snap = build_snapshot(
            "VBAProject",
            &[
                ("A", ModuleKind::Standard, caller),
                ("B", ModuleKind::Standard, callee),
            ],
        )
        .unwrap();
        let helper = snap.index().resolve_member(Some("B"), "Helper", None).unwrap();
        let refs = snap.index().references_of(helper.id);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].module.component(), "A");
    }

    #[test]
    fn test_module_declarations() {
        let snap = build_snapshot("VBAProject", &[("Class1", ModuleKind::Class, "")]).unwrap();
        let module = snap.index().module_named("class1").unwrap();
        assert_eq!(module.kind, DeclarationKind::Module);
        assert!(snap.module_named("Class1").is_some());
    }

    #[test]
    fn test_private_members_do_not_leak() {
        let a = "Private Sub Hidden()\nEnd Sub\n";
        let b = "Public Sub Main()\n    Hidden\nEnd Sub\n";
        let snap = build_snapshot(
            "VBAProject",
            &[("A", ModuleKind::Standard, a), ("B", ModuleKind::Standard, b)],
        )
        .unwrap();
        let hidden = snap.index().resolve_member(None, "Hidden", None).unwrap();
        assert!(snap.index().references_of(hidden.id).is_empty());
    }
}

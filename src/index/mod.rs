//! Declaration index: immutable view of every named entity of a parse cycle.
//!
//! The index is built once by the front end and handed to actions read-only.
//! Lookups never fail on absence: an empty result is a normal outcome.

mod snapshot;

pub use snapshot::{ParseSnapshot, ParsedModule};

use crate::ast::ArgumentList;
use crate::error::{RefactorError, Result};
use crate::symbol::{Declaration, DeclarationId, DeclarationKind, Extent, ModuleId};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// How an identifier is used at a reference site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReferenceContext {
    /// Invocation, with or without arguments.
    Call,
    /// Left-hand side of an assignment (`x.Prop(1) = v`).
    Assignment,
    /// `RaiseEvent Name(...)`.
    RaiseEvent,
    /// Assignment to a function's own return value inside its body.
    ReturnValue,
    /// Any other mention (`AddressOf Foo`, field reads).
    Bare,
}

/// One concrete usage site of a declaration.
#[derive(Debug, Clone, Serialize)]
pub struct IdentifierReference {
    /// Referenced declaration.
    pub declaration: DeclarationId,
    /// Module containing the usage.
    pub module: ModuleId,
    /// Member whose body contains the usage.
    pub parent_member: Option<DeclarationId>,
    /// Extent of the identifier itself.
    pub selection: Extent,
    /// Extent including any `qualifier.` prefix.
    pub qualified: Extent,
    /// Usage context.
    pub context: ReferenceContext,
    /// Arguments supplied at this site.
    pub arguments: Option<ArgumentList>,
}

impl IdentifierReference {
    /// Argument list of the enclosing call, if one could be located.
    pub fn argument_list(&self) -> Option<&ArgumentList> {
        self.arguments.as_ref()
    }

    /// True when the identifier is preceded by a `qualifier.`.
    pub fn is_qualified(&self) -> bool {
        self.qualified.span != self.selection.span
    }
}

/// The get/let/set accessors sharing a property name and scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessorSiblings<'a> {
    /// `Property Get`.
    pub get: Option<&'a Declaration>,
    /// `Property Let`.
    pub let_: Option<&'a Declaration>,
    /// `Property Set`.
    pub set: Option<&'a Declaration>,
}

impl<'a> AccessorSiblings<'a> {
    /// Present accessors in get, let, set order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Declaration> {
        [self.get, self.let_, self.set].into_iter().flatten()
    }

    /// True when no accessor was found.
    pub fn is_empty(&self) -> bool {
        self.get.is_none() && self.let_.is_none() && self.set.is_none()
    }
}

/// Immutable snapshot of declarations and references.
#[derive(Debug, Clone, Default)]
pub struct DeclarationIndex {
    declarations: Vec<Declaration>,
    references: Vec<IdentifierReference>,
    by_name: HashMap<String, Vec<DeclarationId>>,
    references_by_declaration: HashMap<DeclarationId, Vec<usize>>,
    implements: BTreeMap<ModuleId, Vec<String>>,
}

impl DeclarationIndex {
    /// Build the index from a finished parse/resolve pass.
    ///
    /// `declarations[i].id` must equal `DeclarationId(i)`.
    pub fn new(
        declarations: Vec<Declaration>,
        references: Vec<IdentifierReference>,
        implements: BTreeMap<ModuleId, Vec<String>>,
    ) -> Self {
        let mut by_name: HashMap<String, Vec<DeclarationId>> = HashMap::new();
        for declaration in &declarations {
            by_name
                .entry(declaration.name.to_ascii_lowercase())
                .or_default()
                .push(declaration.id);
        }

        let mut references_by_declaration: HashMap<DeclarationId, Vec<usize>> = HashMap::new();
        for (position, reference) in references.iter().enumerate() {
            references_by_declaration
                .entry(reference.declaration)
                .or_default()
                .push(position);
        }

        Self {
            declarations,
            references,
            by_name,
            references_by_declaration,
            implements,
        }
    }

    /// All declarations.
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Declaration by handle.
    pub fn get(&self, id: DeclarationId) -> Option<&Declaration> {
        self.declarations.get(id.0)
    }

    /// Every declaration with this name (case-insensitive).
    pub fn find(&self, name: &str) -> Vec<&Declaration> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .map(|ids| ids.iter().filter_map(|id| self.get(*id)).collect())
            .unwrap_or_default()
    }

    /// Module-level declarations of `module` named `name`.
    pub fn find_in_module(&self, module: &ModuleId, name: &str) -> Vec<&Declaration> {
        let module_decl = self.module_declaration(module).map(|d| d.id);
        self.find(name)
            .into_iter()
            .filter(|d| &d.module == module && d.parent_scope == module_decl)
            .collect()
    }

    /// The declaration representing the module itself.
    pub fn module_declaration(&self, module: &ModuleId) -> Option<&Declaration> {
        self.declarations
            .iter()
            .find(|d| d.kind == DeclarationKind::Module && &d.module == module)
    }

    /// Module declaration by component name.
    pub fn module_named(&self, name: &str) -> Option<&Declaration> {
        self.find(name)
            .into_iter()
            .find(|d| d.kind == DeclarationKind::Module)
    }

    /// Module-level declarations of `module` in source order.
    pub fn members_of<'a>(&'a self, module: &ModuleId) -> Vec<&'a Declaration> {
        let Some(module_decl) = self.module_declaration(module).map(|d| d.id) else {
            return Vec::new();
        };
        self.declarations
            .iter()
            .filter(|d| d.parent_scope == Some(module_decl))
            .collect()
    }

    /// All references to a declaration, in source order per module.
    pub fn references_of(&self, id: DeclarationId) -> Vec<&IdentifierReference> {
        self.references_by_declaration
            .get(&id)
            .map(|positions| positions.iter().map(|p| &self.references[*p]).collect())
            .unwrap_or_default()
    }

    /// All references of the snapshot.
    pub fn references(&self) -> &[IdentifierReference] {
        &self.references
    }

    /// Property accessors sharing the name and scope of `id`.
    ///
    /// The declaration itself is included in its own slot. Non-property
    /// declarations have no siblings.
    pub fn accessor_siblings_of(&self, id: DeclarationId) -> AccessorSiblings<'_> {
        let mut siblings = AccessorSiblings::default();
        let Some(target) = self.get(id) else {
            return siblings;
        };
        if !target.kind.is_property() {
            return siblings;
        }
        for candidate in self.property_accessors_named(target) {
            let slot = match candidate.kind {
                DeclarationKind::PropertyGet => &mut siblings.get,
                DeclarationKind::PropertyLet => &mut siblings.let_,
                DeclarationKind::PropertySet => &mut siblings.set,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(candidate);
            }
        }
        siblings
    }

    /// Every accessor with the same name and scope, duplicates included.
    pub fn property_accessors_named<'a>(&'a self, target: &Declaration) -> Vec<&'a Declaration> {
        self.find(&target.name)
            .into_iter()
            .filter(|d| {
                d.kind.is_property()
                    && d.module == target.module
                    && d.parent_scope == target.parent_scope
            })
            .collect()
    }

    /// Interfaces named in `Implements` statements of `module`.
    pub fn implemented_interfaces(&self, module: &ModuleId) -> &[String] {
        self.implements
            .get(module)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Modules whose `Implements` names `interface`.
    pub fn implementers_of(&self, interface: &ModuleId) -> Vec<&ModuleId> {
        self.implements
            .iter()
            .filter(|(module, interfaces)| {
                module.project().eq_ignore_ascii_case(interface.project())
                    && interfaces
                        .iter()
                        .any(|name| type_name_matches(name, interface.component()))
            })
            .map(|(module, _)| module)
            .collect()
    }

    /// True when some module implements `module`.
    pub fn is_interface(&self, module: &ModuleId) -> bool {
        !self.implementers_of(module).is_empty()
    }

    /// Implementations of an interface member: `<Interface>_<Member>` in
    /// every implementing module, with the same member kind.
    pub fn interface_mirrors_of(&self, id: DeclarationId) -> Vec<&Declaration> {
        let Some(member) = self.get(id) else {
            return Vec::new();
        };
        if !member.kind.is_member() {
            return Vec::new();
        }
        let mirror_name = format!("{}_{}", member.module.component(), member.name);
        self.implementers_of(&member.module)
            .into_iter()
            .flat_map(|implementer| self.find_in_module(implementer, &mirror_name))
            .filter(|candidate| candidate.kind == member.kind)
            .collect()
    }

    /// Interface members that `id` implements (reverse of
    /// [`Self::interface_mirrors_of`]).
    pub fn interface_members_of(&self, id: DeclarationId) -> Vec<&Declaration> {
        let Some(implementation) = self.get(id) else {
            return Vec::new();
        };
        if !implementation.kind.is_member() {
            return Vec::new();
        }
        let lowered = implementation.name.to_ascii_lowercase();
        let mut found = Vec::new();
        for interface in self.implemented_interfaces(&implementation.module) {
            let prefix = format!("{}_", bare_type_name(interface).to_ascii_lowercase());
            let Some(member_name) = lowered.strip_prefix(&prefix) else {
                continue;
            };
            let Some(interface_module) = self.module_named(bare_type_name(interface)) else {
                continue;
            };
            found.extend(
                self.find_in_module(&interface_module.module, member_name)
                    .into_iter()
                    .filter(|candidate| candidate.kind == implementation.kind),
            );
        }
        found
    }

    /// `WithEvents` fields declared with `module` as their type.
    pub fn with_events_fields_of(&self, module: &ModuleId) -> Vec<&Declaration> {
        self.declarations
            .iter()
            .filter(|d| {
                d.kind == DeclarationKind::Variable
                    && d.is_with_events
                    && d.as_type_name
                        .as_deref()
                        .is_some_and(|ty| type_name_matches(ty, module.component()))
            })
            .collect()
    }

    /// Handlers bound to an event through `WithEvents` fields.
    ///
    /// Handlers are bound by name (`<field>_<event>`); their parameter lists
    /// are compared by the caller.
    pub fn event_handler_mirrors_of(&self, id: DeclarationId) -> Vec<&Declaration> {
        let Some(event) = self.get(id) else {
            return Vec::new();
        };
        if event.kind != DeclarationKind::Event {
            return Vec::new();
        }
        self.with_events_fields_of(&event.module)
            .into_iter()
            .flat_map(|field| {
                let handler_name = format!("{}_{}", field.name, event.name);
                self.find_in_module(&field.module, &handler_name)
            })
            .filter(|candidate| candidate.kind == DeclarationKind::Procedure)
            .collect()
    }

    /// Resolve a member by module and name, optionally filtered by kind.
    ///
    /// # Errors
    /// - `DeclarationNotFound` - no member matches
    /// - `AmbiguousDeclaration` - several members match and no kind was given
    pub fn resolve_member(
        &self,
        module: Option<&str>,
        name: &str,
        kind: Option<DeclarationKind>,
    ) -> Result<&Declaration> {
        let matches: Vec<&Declaration> = self
            .find(name)
            .into_iter()
            .filter(|d| d.kind != DeclarationKind::Module)
            .filter(|d| module.map_or(true, |m| d.module.component().eq_ignore_ascii_case(m)))
            .filter(|d| kind.map_or(true, |k| d.kind == k))
            .collect();

        match matches.as_slice() {
            [] => Err(RefactorError::DeclarationNotFound(match module {
                Some(module) => format!("{}.{}", module, name),
                None => name.to_string(),
            })),
            [single] => Ok(*single),
            [first, rest @ ..] => {
                // A property trio resolves to its getter when no kind is given.
                if kind.is_none() && matches.iter().all(|d| d.kind.is_property()) {
                    if let Some(get) = matches.iter().find(|d| d.kind == DeclarationKind::PropertyGet) {
                        return Ok(*get);
                    }
                }
                let mut candidates = vec![format!("{} ({})", first.qualified_name(), first.kind)];
                candidates.extend(
                    rest.iter()
                        .map(|d| format!("{} ({})", d.qualified_name(), d.kind)),
                );
                Err(RefactorError::AmbiguousDeclaration {
                    name: name.to_string(),
                    candidates,
                })
            }
        }
    }
}

/// `Project.Class` → `Class`.
pub(crate) fn bare_type_name(type_name: &str) -> &str {
    type_name.rsplit('.').next().unwrap_or(type_name)
}

fn type_name_matches(type_name: &str, component: &str) -> bool {
    bare_type_name(type_name).eq_ignore_ascii_case(component)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::build_snapshot;
    use crate::symbol::ModuleKind;

    fn snapshot(modules: &[(&str, ModuleKind, &str)]) -> ParseSnapshot {
        build_snapshot("VBAProject", modules).expect("snapshot")
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let snap = snapshot(&[(
            "Module1",
            ModuleKind::Standard,
            "Public Sub DoWork()\nEnd Sub\n",
        )]);
        let found = snap.index().find("dowork");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DeclarationKind::Procedure);
        assert!(snap.index().find("Missing").is_empty());
    }

    #[test]
    fn test_accessor_siblings() {
        let code = "\
Public Property Get Item(ByVal i As Long) As String
End Property

Public Property Let Item(ByVal i As Long, ByVal v As String)
End Property
";
        let snap = snapshot(&[("Class1", ModuleKind::Class, code)]);
        let get = snap
            .index()
            .resolve_member(Some("Class1"), "Item", Some(DeclarationKind::PropertyGet))
            .unwrap();
        let siblings = snap.index().accessor_siblings_of(get.id);
        assert!(siblings.get.is_some());
        assert!(siblings.let_.is_some());
        assert!(siblings.set.is_none());
        assert_eq!(siblings.iter().count(), 2);
    }

    #[test]
    fn test_interface_mirrors_both_directions() {
        let interface = "Public Sub Run(ByVal a As Long, ByVal b As Long)\nEnd Sub\n";
        let implementation = "\
Implements IRunner

Private Sub IRunner_Run(ByVal a As Long, ByVal b As Long)
End Sub
";
        let snap = snapshot(&[
            ("IRunner", ModuleKind::Class, interface),
            ("Runner", ModuleKind::Class, implementation),
        ]);
        let index = snap.index();
        let member = index.resolve_member(Some("IRunner"), "Run", None).unwrap();
        let mirrors = index.interface_mirrors_of(member.id);
        assert_eq!(mirrors.len(), 1);
        assert_eq!(mirrors[0].name, "IRunner_Run");

        let back = index.interface_members_of(mirrors[0].id);
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].id, member.id);
        assert!(index.is_interface(&member.module));
    }

    #[test]
    fn test_event_handler_mirrors() {
        let source = "Public Event Changed(ByVal oldValue As Long, ByVal newValue As Long)\n";
        let listener = "\
Private WithEvents mSource As Source

Private Sub mSource_Changed(ByVal oldValue As Long, ByVal newValue As Long)
End Sub
";
        let snap = snapshot(&[
            ("Source", ModuleKind::Class, source),
            ("Listener", ModuleKind::Class, listener),
        ]);
        let event = snap.index().resolve_member(Some("Source"), "Changed", None).unwrap();
        let handlers = snap.index().event_handler_mirrors_of(event.id);
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].name, "mSource_Changed");
    }

    #[test]
    fn test_resolve_member_ambiguity() {
        let snap = snapshot(&[
            ("A", ModuleKind::Standard, "Public Sub Go()\nEnd Sub\n"),
            ("B", ModuleKind::Standard, "Public Sub Go()\nEnd Sub\n"),
        ]);
        let err = snap.index().resolve_member(None, "Go", None).unwrap_err();
        assert_eq!(err.kind(), "AmbiguousDeclaration");
        assert!(snap.index().resolve_member(Some("B"), "Go", None).is_ok());
    }
}

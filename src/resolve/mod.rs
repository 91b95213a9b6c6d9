//! Reference location and target resolution.
//!
//! The locator walks outward from a target member to every declaration that
//! must change with it (accessor siblings, interface implementations, event
//! handlers) and lists the usage sites of each. Name resolution for
//! requests is deterministic: an ambiguous name is an error, never a guess.

use crate::error::{RefactorError, Result};
use crate::index::{DeclarationIndex, IdentifierReference};
use crate::symbol::{Declaration, DeclarationId, DeclarationKind};
use crate::validate::accessor_signatures_match;
use serde::Serialize;
use std::collections::HashSet;

/// Why a declaration or site is affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SiteRole {
    /// The target itself, or a call to an affected member.
    DirectCall,
    /// Get/Let/Set accessor sharing the property name.
    AccessorSibling,
    /// `<Interface>_<Member>` in an implementing module.
    InterfaceMirror,
    /// `<field>_<Event>` handler bound through `WithEvents`.
    EventHandlerMirror,
}

/// One place that changes together with the target.
#[derive(Debug, Clone, Copy)]
pub struct UsageSite<'s> {
    /// Declaration affected.
    pub declaration: &'s Declaration,
    /// Role of the site.
    pub role: SiteRole,
    /// The usage, or `None` for the declaration's own signature.
    pub reference: Option<&'s IdentifierReference>,
}

/// Enumerates the declarations and usages affected by a member change.
pub struct ReferenceLocator<'s> {
    index: &'s DeclarationIndex,
}

impl<'s> ReferenceLocator<'s> {
    /// Locator over an index.
    pub fn new(index: &'s DeclarationIndex) -> Self {
        Self { index }
    }

    /// The target and every declaration whose parameter list must change with it.
    ///
    /// # Errors
    /// - `AmbiguousAccessorState` - duplicate accessors, or a sibling whose
    ///   parameter list differs from the accessor it mirrors
    /// - `MirrorMismatch` - an interface implementation or event handler with
    ///   a different parameter count
    pub fn affected_declarations(&self, target: &'s Declaration) -> Result<Vec<(&'s Declaration, SiteRole)>> {
        let mut affected = vec![(target, SiteRole::DirectCall)];
        let mut seen: HashSet<DeclarationId> = HashSet::from([target.id]);
        let mut queue = vec![target];

        while let Some(current) = queue.pop() {
            let mut found: Vec<(&'s Declaration, SiteRole)> = Vec::new();

            if current.kind.is_property() {
                let accessors = self.index.property_accessors_named(current);
                for kind in [
                    DeclarationKind::PropertyGet,
                    DeclarationKind::PropertyLet,
                    DeclarationKind::PropertySet,
                ] {
                    if accessors.iter().filter(|d| d.kind == kind).count() > 1 {
                        return Err(RefactorError::AmbiguousAccessorState {
                            name: current.qualified_name(),
                            accessor: kind.as_str().to_string(),
                        });
                    }
                }
                for sibling in accessors.into_iter().filter(|d| d.id != current.id) {
                    if !accessor_signatures_match(current, sibling) {
                        return Err(RefactorError::AmbiguousAccessorState {
                            name: current.qualified_name(),
                            accessor: sibling.kind.as_str().to_string(),
                        });
                    }
                    found.push((sibling, SiteRole::AccessorSibling));
                }
            }

            for mirror in self.index.interface_mirrors_of(current.id) {
                check_parameter_count(current, mirror)?;
                found.push((mirror, SiteRole::InterfaceMirror));
            }

            if current.kind == DeclarationKind::Event {
                for handler in self.index.event_handler_mirrors_of(current.id) {
                    check_parameter_count(current, handler)?;
                    found.push((handler, SiteRole::EventHandlerMirror));
                }
            }

            for (declaration, role) in found {
                if seen.insert(declaration.id) {
                    log::debug!("affected: {} ({:?})", declaration.qualified_name(), role);
                    affected.push((declaration, role));
                    queue.push(declaration);
                }
            }
        }

        Ok(affected)
    }

    /// Signatures and usages of every affected declaration.
    pub fn usage_sites(&self, target: &'s Declaration) -> Result<Vec<UsageSite<'s>>> {
        let mut sites = Vec::new();
        for (declaration, role) in self.affected_declarations(target)? {
            sites.push(UsageSite {
                declaration,
                role,
                reference: None,
            });
            sites.extend(self.index.references_of(declaration.id).into_iter().map(|reference| {
                UsageSite {
                    declaration,
                    role: SiteRole::DirectCall,
                    reference: Some(reference),
                }
            }));
        }
        Ok(sites)
    }
}

fn check_parameter_count(member: &Declaration, mirror: &Declaration) -> Result<()> {
    if member.parameters.len() != mirror.parameters.len() {
        return Err(RefactorError::MirrorMismatch {
            name: mirror.qualified_name(),
            expected: member.parameters.len(),
            found: mirror.parameters.len(),
        });
    }
    Ok(())
}

/// Parse a declaration kind name as accepted on the command line and in plans.
///
/// # Errors
/// Returns `Other` for unknown kind names.
pub fn parse_kind(s: &str) -> Result<DeclarationKind> {
    match s.to_ascii_lowercase().as_str() {
        "sub" | "procedure" => Ok(DeclarationKind::Procedure),
        "function" => Ok(DeclarationKind::Function),
        "get" | "property-get" => Ok(DeclarationKind::PropertyGet),
        "let" | "property-let" => Ok(DeclarationKind::PropertyLet),
        "set" | "property-set" => Ok(DeclarationKind::PropertySet),
        "event" => Ok(DeclarationKind::Event),
        "field" | "variable" => Ok(DeclarationKind::Variable),
        _ => Err(RefactorError::Other(format!("Unknown declaration kind: {}", s))),
    }
}

/// Resolve `[Module.]Name` to one declaration.
///
/// # Arguments
/// * `index` - Declaration index of the snapshot
/// * `qualified` - `Name` or `Module.Name`
/// * `kind` - Optional kind filter
///
/// # Errors
/// - `DeclarationNotFound` - no declaration matches
/// - `AmbiguousDeclaration` - several declarations match
pub fn resolve_target<'s>(
    index: &'s DeclarationIndex,
    qualified: &str,
    kind: Option<DeclarationKind>,
) -> Result<&'s Declaration> {
    match qualified.split_once('.') {
        Some((module, name)) => index.resolve_member(Some(module), name, kind),
        None => index.resolve_member(None, qualified, kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::build_snapshot;
    use crate::symbol::ModuleKind;

    #[test]
    fn test_closure_covers_siblings_and_interface_mirrors() {
        let interface = "\
Public Property Get Item(ByVal a As Long, ByVal b As Long) As String
End Property
Public Property Let Item(ByVal a As Long, ByVal b As Long, ByVal v As String)
End Property
";
        let implementation = "\
Implements IStore
Private Property Get IStore_Item(ByVal a As Long, ByVal b As Long) As String
End Property
Private Property Let IStore_Item(ByVal a As Long, ByVal b As Long, ByVal v As String)
End Property
";
        let snap = build_snapshot(
            "P",
            &[
                ("IStore", ModuleKind::Class, interface),
                ("Store", ModuleKind::Class, implementation),
            ],
        )
        .unwrap();
        let target = resolve_target(snap.index(), "IStore.Item", Some(DeclarationKind::PropertyGet)).unwrap();
        let locator = ReferenceLocator::new(snap.index());
        let affected = locator.affected_declarations(target).unwrap();
        assert_eq!(affected.len(), 4);
        assert!(affected.iter().any(|(d, role)| d.name == "IStore_Item"
            && d.kind == DeclarationKind::PropertyLet
            && matches!(role, SiteRole::InterfaceMirror | SiteRole::AccessorSibling)));
    }

    #[test]
    fn test_mismatched_sibling_is_ambiguous() {
        let code = "\
Public Property Get Item(ByVal a As Long) As String
End Property
Public Property Let Item(ByVal other As String, ByVal v As String)
End Property
";
        let snap = build_snapshot("P", &[("Class1", ModuleKind::Class, code)]).unwrap();
        let target = resolve_target(snap.index(), "Item", Some(DeclarationKind::PropertyGet)).unwrap();
        let err = ReferenceLocator::new(snap.index())
            .affected_declarations(target)
            .unwrap_err();
        assert_eq!(err.kind(), "AmbiguousAccessorState");
    }

    #[test]
    fn test_duplicate_accessor_is_ambiguous() {
        let code = "\
Public Property Get Item(ByVal a As Long) As String
End Property
Public Property Get Item(ByVal a As Long) As String
End Property
Public Property Let Item(ByVal a As Long, ByVal v As String)
End Property
";
        let snap = build_snapshot("P", &[("Class1", ModuleKind::Class, code)]).unwrap();
        let target = resolve_target(snap.index(), "Item", Some(DeclarationKind::PropertyLet)).unwrap();
        let err = ReferenceLocator::new(snap.index())
            .affected_declarations(target)
            .unwrap_err();
        match err {
            RefactorError::AmbiguousAccessorState { accessor, .. } => {
                assert_eq!(accessor, DeclarationKind::PropertyGet.as_str())
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_event_handler_count_mismatch() {
        let source = "Public Event Changed(ByVal a As Long, ByVal b As Long)\n";
        let listener = "\
Private WithEvents mSource As Source
Private Sub mSource_Changed(ByVal a As Long)
End Sub
";
        let snap = build_snapshot(
            "P",
            &[
                ("Source", ModuleKind::Class, source),
                ("Listener", ModuleKind::Class, listener),
            ],
        )
        .unwrap();
        let event = resolve_target(snap.index(), "Source.Changed", None).unwrap();
        let err = ReferenceLocator::new(snap.index())
            .affected_declarations(event)
            .unwrap_err();
        assert_eq!(err.kind(), "MirrorMismatch");
    }

    #[test]
    fn test_usage_sites_include_calls() {
        let code = "\
Public Sub Foo(ByVal a As Long, ByVal b As Long)
End Sub
Public Sub Bar()
    Foo 1, 2
End Sub
";
        let snap = build_snapshot("P", &[("Module1", ModuleKind::Standard, code)]).unwrap();
        let target = resolve_target(snap.index(), "Module1.Foo", None).unwrap();
        let sites = ReferenceLocator::new(snap.index()).usage_sites(target).unwrap();
        assert_eq!(sites.len(), 2);
        assert!(sites[0].reference.is_none());
        assert!(sites[1].reference.is_some());
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("Get").unwrap(), DeclarationKind::PropertyGet);
        assert!(parse_kind("class").is_err());
    }
}

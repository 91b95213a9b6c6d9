//! Private record type aggregating encapsulated fields.

use super::{capitalize_first, Indenter};
use crate::error::{RefactorError, Result};
use crate::index::{bare_type_name, DeclarationIndex};
use crate::symbol::{Accessibility, DeclarationId, DeclarationKind, ModuleId};

const TYPE_PREFIX: &str = "T";
const DEFAULT_FIELD_NAME: &str = "this";

/// An existing private UDT field, or a type to synthesize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStateUdt {
    module: ModuleId,
    type_name: String,
    field_name: String,
    existing: Option<ExistingState>,
    members: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExistingState {
    field: DeclarationId,
    type_declaration: DeclarationId,
}

impl ObjectStateUdt {
    /// New type `T<Module>` with backing field `this`.
    pub fn new(module: &ModuleId) -> Self {
        Self {
            module: module.clone(),
            type_name: format!("{}{}", TYPE_PREFIX, capitalize_first(module.component())),
            field_name: DEFAULT_FIELD_NAME.to_string(),
            existing: None,
            members: Vec::new(),
        }
    }

    /// Wrap an existing module-level field of a user-defined type.
    ///
    /// # Errors
    /// `InvalidObjectState` when the field is not a private module-level
    /// variable, or its type is not a user-defined type of the same module.
    pub fn from_field(index: &DeclarationIndex, field: DeclarationId) -> Result<Self> {
        let declaration = index
            .get(field)
            .ok_or_else(|| RefactorError::DeclarationNotFound(format!("#{}", field.0)))?;
        if declaration.kind != DeclarationKind::Variable {
            return Err(RefactorError::InvalidObjectState(format!(
                "'{}' is a {}, not a field",
                declaration.name, declaration.kind
            )));
        }
        if declaration.accessibility != Accessibility::Private {
            return Err(RefactorError::InvalidObjectState(format!(
                "'{}' must be Private",
                declaration.name
            )));
        }
        let type_name = declaration.as_type_name.as_deref().unwrap_or("Variant");
        let type_declaration = index
            .find_in_module(&declaration.module, bare_type_name(type_name))
            .into_iter()
            .find(|d| d.kind == DeclarationKind::UserDefinedType)
            .ok_or_else(|| {
                RefactorError::InvalidObjectState(format!(
                    "'{}' is not a user-defined type of {}",
                    type_name,
                    declaration.module.component()
                ))
            })?;

        Ok(Self {
            module: declaration.module.clone(),
            type_name: type_declaration.name.clone(),
            field_name: declaration.name.clone(),
            existing: Some(ExistingState {
                field,
                type_declaration: type_declaration.id,
            }),
            members: Vec::new(),
        })
    }

    /// Module owning the record.
    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    /// Record type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Backing field name.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// True when wrapping a declaration that already exists.
    pub fn is_existing(&self) -> bool {
        self.existing.is_some()
    }

    /// Field declaration wrapped, when existing.
    pub fn existing_field(&self) -> Option<DeclarationId> {
        self.existing.map(|e| e.field)
    }

    /// Type declaration wrapped, when existing.
    pub fn existing_type(&self) -> Option<DeclarationId> {
        self.existing.map(|e| e.type_declaration)
    }

    /// Append member declarations in insertion order.
    pub fn add_members(&mut self, members: impl IntoIterator<Item = String>) {
        self.members.extend(members);
    }

    /// `Private this As TModule`.
    pub fn field_declaration(&self) -> String {
        format!(
            "{} {} As {}",
            Accessibility::Private.token(),
            self.field_name,
            self.type_name
        )
    }

    /// `Private Type ...`, one member per line, `End Type`.
    ///
    /// Lines are left unindented unless an indenter is supplied.
    pub fn type_block(&self, indenter: Option<&dyn Indenter>) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.members.len() + 2);
        lines.push(format!("{} Type {}", Accessibility::Private.token(), self.type_name));
        lines.extend(self.members.iter().cloned());
        lines.push("End Type".to_string());
        match indenter {
            Some(indenter) => indenter.indent(lines),
            None => lines,
        }
    }

    /// Expression reaching a member of the record.
    pub fn member_access(&self, member: &str) -> String {
        format!("{}.{}", self.field_name, member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::build_snapshot;
    use crate::refactor::BlockIndenter;
    use crate::symbol::ModuleKind;

    #[test]
    fn test_new_state_names() {
        let mut state = ObjectStateUdt::new(&ModuleId::new("P", "module1"));
        assert_eq!(state.type_name(), "TModule1");
        assert_eq!(state.field_name(), "this");
        assert_eq!(state.field_declaration(), "Private this As TModule1");

        state.add_members(["Fizz As Integer".to_string()]);
        assert_eq!(
            state.type_block(None),
            vec!["Private Type TModule1", "Fizz As Integer", "End Type"]
        );
        assert_eq!(
            state.type_block(Some(&BlockIndenter::default())),
            vec!["Private Type TModule1", "    Fizz As Integer", "End Type"]
        );
    }

    #[test]
    fn test_existing_state_must_be_private() {
        let code = "\
Private Type TState
    Name As String
End Type
Private mState As TState
Public mShared As TState
";
        let snap = build_snapshot("P", &[("Class1", ModuleKind::Class, code)]).unwrap();
        let index = snap.index();
        let private = index.resolve_member(None, "mState", None).unwrap();
        let state = ObjectStateUdt::from_field(index, private.id).unwrap();
        assert!(state.is_existing());
        assert_eq!(state.type_name(), "TState");
        assert_eq!(state.member_access("Name"), "mState.Name");

        let public = index.resolve_member(None, "mShared", None).unwrap();
        let err = ObjectStateUdt::from_field(index, public.id).unwrap_err();
        assert_eq!(err.kind(), "InvalidObjectState");
    }
}

//! Declarations and parameters shared by every component.
//!
//! A [`Declaration`] is created once per parse cycle and never mutated
//! afterwards. Components refer to declarations through [`DeclarationId`]
//! handles into the owning [`crate::index::DeclarationIndex`].

use serde::Serialize;
use std::fmt;

/// Qualified module name: project plus component name.
///
/// VBA identifiers are case-insensitive, so equality and ordering use the
/// lowercased names while the original spelling is kept for display.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleId {
    project: String,
    component: String,
}

impl ModuleId {
    /// Create a module identity.
    pub fn new(project: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            component: component.into(),
        }
    }

    /// Project name.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Component (module) name.
    pub fn component(&self) -> &str {
        &self.component
    }

    fn key(&self) -> (String, String) {
        (
            self.project.to_ascii_lowercase(),
            self.component.to_ascii_lowercase(),
        )
    }
}

impl PartialEq for ModuleId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ModuleId {}

impl std::hash::Hash for ModuleId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for ModuleId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModuleId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.project, self.component)
    }
}

/// Kind of code module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModuleKind {
    /// Standard (procedural) module, `.bas`.
    Standard,
    /// Class module, `.cls`. Also used as interfaces through `Implements`.
    Class,
}

/// Byte range within a module's text (end exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Zero-width span at `at`.
    pub fn empty(at: usize) -> Self {
        Self { start: at, end: at }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True for zero-width spans.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when `other` lies fully inside this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest span covering both.
    pub fn cover(&self, other: &Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Slice `text` with this span.
    pub fn text<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// Syntactic extent of a construct: byte span plus line/column positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Extent {
    /// Byte span.
    pub span: Span,
    /// Start line (1-based).
    pub line_start: usize,
    /// End line (1-based).
    pub line_end: usize,
    /// Start column (0-based, in bytes).
    pub col_start: usize,
    /// End column (0-based, in bytes).
    pub col_end: usize,
}

/// Handle of a declaration inside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DeclarationId(pub usize);

/// Kind of named program entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeclarationKind {
    /// A code module.
    Module,
    /// Module-level field or local variable.
    Variable,
    /// `Const` declaration.
    Constant,
    /// `Type ... End Type`.
    UserDefinedType,
    /// Member of a user-defined type.
    UserDefinedTypeMember,
    /// `Enum ... End Enum`.
    Enumeration,
    /// `Sub`.
    Procedure,
    /// `Function`.
    Function,
    /// `Property Get`.
    PropertyGet,
    /// `Property Let`.
    PropertyLet,
    /// `Property Set`.
    PropertySet,
    /// `Event`.
    Event,
    /// `Declare Sub|Function`.
    LibraryFunction,
}

impl DeclarationKind {
    /// Convert kind to string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Module => "module",
            DeclarationKind::Variable => "variable",
            DeclarationKind::Constant => "constant",
            DeclarationKind::UserDefinedType => "user-defined type",
            DeclarationKind::UserDefinedTypeMember => "user-defined type member",
            DeclarationKind::Enumeration => "enum",
            DeclarationKind::Procedure => "procedure",
            DeclarationKind::Function => "function",
            DeclarationKind::PropertyGet => "property-get",
            DeclarationKind::PropertyLet => "property-let",
            DeclarationKind::PropertySet => "property-set",
            DeclarationKind::Event => "event",
            DeclarationKind::LibraryFunction => "library function",
        }
    }

    /// Members that own a parameter list.
    pub fn is_member(&self) -> bool {
        matches!(
            self,
            DeclarationKind::Procedure
                | DeclarationKind::Function
                | DeclarationKind::PropertyGet
                | DeclarationKind::PropertyLet
                | DeclarationKind::PropertySet
                | DeclarationKind::Event
                | DeclarationKind::LibraryFunction
        )
    }

    /// `Property Get`, `Property Let` or `Property Set`.
    pub fn is_property(&self) -> bool {
        matches!(
            self,
            DeclarationKind::PropertyGet | DeclarationKind::PropertyLet | DeclarationKind::PropertySet
        )
    }

    /// Accessors whose last parameter carries the assigned value.
    pub fn has_value_parameter(&self) -> bool {
        matches!(self, DeclarationKind::PropertyLet | DeclarationKind::PropertySet)
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accessibility modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Accessibility {
    /// No modifier (`Dim`, or members without a keyword).
    Implicit,
    /// `Private`.
    Private,
    /// `Public`.
    Public,
    /// `Friend`.
    Friend,
    /// `Global`.
    Global,
}

impl Accessibility {
    /// Parse a modifier keyword (case-insensitive).
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "private" => Some(Accessibility::Private),
            "public" => Some(Accessibility::Public),
            "friend" => Some(Accessibility::Friend),
            "global" => Some(Accessibility::Global),
            "dim" => Some(Accessibility::Implicit),
            _ => None,
        }
    }

    /// Keyword as written in source.
    pub fn token(&self) -> &'static str {
        match self {
            Accessibility::Implicit => "Dim",
            Accessibility::Private => "Private",
            Accessibility::Public => "Public",
            Accessibility::Friend => "Friend",
            Accessibility::Global => "Global",
        }
    }

    /// True when visible from other modules.
    pub fn is_exposed(&self) -> bool {
        matches!(
            self,
            Accessibility::Public | Accessibility::Global | Accessibility::Friend
        )
    }
}

/// A member parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    /// Parameter identifier.
    pub name: String,
    /// Declared type (`As ...`), if any.
    pub declared_type: Option<String>,
    /// Original position (0-based, dense within the member).
    pub position: usize,
    /// `Optional` modifier.
    pub is_optional: bool,
    /// `ParamArray` modifier.
    pub is_param_array: bool,
    /// `ByVal` modifier.
    pub is_by_val: bool,
    /// Default value text after `=`.
    pub default_value: Option<String>,
    /// Source text of the whole parameter.
    pub text: String,
    /// Extent of the whole parameter.
    pub extent: Extent,
}

/// A named program entity.
#[derive(Debug, Clone, Serialize)]
pub struct Declaration {
    /// Handle inside the owning index.
    pub id: DeclarationId,
    /// Identifier name as written.
    pub name: String,
    /// Declaration kind.
    pub kind: DeclarationKind,
    /// Owning module.
    pub module: ModuleId,
    /// Enclosing declaration (module, member or type).
    pub parent_scope: Option<DeclarationId>,
    /// Accessibility modifier.
    pub accessibility: Accessibility,
    /// Declared type name (`As ...`).
    pub as_type_name: Option<String>,
    /// `WithEvents` field.
    pub is_with_events: bool,
    /// Declared with array bounds (`name()`).
    pub is_array: bool,
    /// Extent of the identifier.
    pub selection: Extent,
    /// Extent of the whole declaration.
    pub extent: Extent,
    /// Parameters in declaration order (members only).
    pub parameters: Vec<Parameter>,
}

impl Declaration {
    /// Case-insensitive identifier comparison.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Parameters that take part in reordering.
    ///
    /// The trailing value parameter of `Property Let`/`Property Set` always
    /// stays last and is excluded.
    pub fn reorderable_parameters(&self) -> &[Parameter] {
        if self.kind.has_value_parameter() && !self.parameters.is_empty() {
            &self.parameters[..self.parameters.len() - 1]
        } else {
            &self.parameters
        }
    }

    /// `Module.Member` display name.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module.component(), self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_id_is_case_insensitive() {
        let a = ModuleId::new("VBAProject", "Module1");
        let b = ModuleId::new("vbaproject", "MODULE1");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "VBAProject.Module1");
    }

    #[test]
    fn test_span_containment() {
        let outer = Span::new(4, 20);
        assert!(outer.contains(&Span::new(4, 20)));
        assert!(outer.contains(&Span::empty(10)));
        assert!(!outer.contains(&Span::new(3, 8)));
        assert_eq!(outer.cover(&Span::new(1, 5)), Span::new(1, 20));
    }

    #[test]
    fn test_accessibility_keywords() {
        assert_eq!(Accessibility::from_keyword("PUBLIC"), Some(Accessibility::Public));
        assert_eq!(Accessibility::from_keyword("Dim"), Some(Accessibility::Implicit));
        assert_eq!(Accessibility::from_keyword("Static"), None);
        assert!(Accessibility::Friend.is_exposed());
        assert!(!Accessibility::Private.is_exposed());
    }
}

//! Tagged-variant syntax tree for the constructs refactorings touch.
//!
//! Sub-structures are reached through typed accessors returning `Option`,
//! so a missing argument list is an ordinary `None` instead of a failed cast.

use crate::symbol::{DeclarationId, DeclarationKind, Extent, Span};
use serde::Serialize;

/// Parsed module: ordered module-level items.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleAst {
    /// Items in source order.
    pub items: Vec<ModuleItem>,
}

impl ModuleAst {
    /// Member node for a declaration.
    pub fn member(&self, id: DeclarationId) -> Option<&MemberNode> {
        self.items
            .iter()
            .filter_map(ModuleItem::as_member)
            .find(|member| member.declaration == id)
    }

    /// Field statement declaring `id`.
    pub fn field_statement(&self, id: DeclarationId) -> Option<&VariableStmt> {
        self.items
            .iter()
            .filter_map(ModuleItem::as_fields)
            .find(|stmt| stmt.declarators.iter().any(|d| d.declaration == id))
    }

    /// Type block for a user-defined type declaration.
    pub fn type_block(&self, id: DeclarationId) -> Option<&TypeBlock> {
        self.items
            .iter()
            .filter_map(ModuleItem::as_type_block)
            .find(|block| block.declaration == id)
    }

    /// Interfaces named in `Implements` statements.
    pub fn implemented_interfaces(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match item {
            ModuleItem::Implements(stmt) => Some(stmt.interface.as_str()),
            _ => None,
        })
    }

    /// First member (procedure, property, ...) in source order, excluding events.
    pub fn first_procedure(&self) -> Option<&MemberNode> {
        self.items
            .iter()
            .filter_map(ModuleItem::as_member)
            .find(|member| member.body.is_some())
    }

    /// Last line of the declarations section, if any declaration exists.
    pub fn declarations_end_line(&self) -> Option<usize> {
        self.items
            .iter()
            .filter(|item| match item {
                ModuleItem::Member(member) => member.body.is_none(),
                _ => true,
            })
            .map(|item| item.extent().line_end)
            .max()
    }
}

/// Module-level syntax item.
#[derive(Debug, Clone, Serialize)]
pub enum ModuleItem {
    /// `Implements Interface`.
    Implements(ImplementsStmt),
    /// Field declaration statement (one or more declarators).
    Fields(VariableStmt),
    /// `Type ... End Type`.
    TypeBlock(TypeBlock),
    /// Sub, Function, Property, Event or Declare.
    Member(MemberNode),
}

impl ModuleItem {
    /// The member node, if this item is one.
    pub fn as_member(&self) -> Option<&MemberNode> {
        match self {
            ModuleItem::Member(member) => Some(member),
            _ => None,
        }
    }

    /// The field statement, if this item is one.
    pub fn as_fields(&self) -> Option<&VariableStmt> {
        match self {
            ModuleItem::Fields(stmt) => Some(stmt),
            _ => None,
        }
    }

    /// The type block, if this item is one.
    pub fn as_type_block(&self) -> Option<&TypeBlock> {
        match self {
            ModuleItem::TypeBlock(block) => Some(block),
            _ => None,
        }
    }

    /// Extent of the whole item.
    pub fn extent(&self) -> Extent {
        match self {
            ModuleItem::Implements(stmt) => stmt.extent,
            ModuleItem::Fields(stmt) => stmt.extent,
            ModuleItem::TypeBlock(block) => block.extent,
            ModuleItem::Member(member) => member.extent,
        }
    }
}

/// `Implements Interface`.
#[derive(Debug, Clone, Serialize)]
pub struct ImplementsStmt {
    /// Interface module name.
    pub interface: String,
    /// Statement extent.
    pub extent: Extent,
}

/// Field declaration statement such as `Public a As Long, b As String`.
#[derive(Debug, Clone, Serialize)]
pub struct VariableStmt {
    /// Whole statement.
    pub extent: Extent,
    /// Leading modifier keywords (`Public`, `Private WithEvents`, ...).
    pub keywords: Span,
    /// One entry per declared variable.
    pub declarators: Vec<Declarator>,
}

/// One variable inside a field statement.
#[derive(Debug, Clone, Serialize)]
pub struct Declarator {
    /// Declared variable.
    pub declaration: DeclarationId,
    /// From the identifier through its `As` clause.
    pub span: Span,
    /// Array bounds text including parentheses, e.g. `(1 To 5)`.
    pub array_bounds: Option<String>,
}

/// `Type ... End Type` block.
#[derive(Debug, Clone, Serialize)]
pub struct TypeBlock {
    /// The user-defined type declaration.
    pub declaration: DeclarationId,
    /// Whole block.
    pub extent: Extent,
    /// Member lines in order.
    pub members: Vec<TypeMember>,
    /// Line of `End Type`.
    pub end_line: usize,
}

/// Member line of a type block.
#[derive(Debug, Clone, Serialize)]
pub struct TypeMember {
    /// Member declaration.
    pub declaration: DeclarationId,
    /// Extent of the member line content.
    pub extent: Extent,
}

/// Sub, Function, Property, Event or Declare.
#[derive(Debug, Clone, Serialize)]
pub struct MemberNode {
    /// Declared member.
    pub declaration: DeclarationId,
    /// Member kind.
    pub kind: DeclarationKind,
    /// Whole member, including body and `End` line.
    pub extent: Extent,
    /// From the first modifier through the argument list and `As` clause.
    pub signature: Extent,
    /// Parenthesized parameter list.
    pub arg_list: Option<ArgList>,
    /// Body between signature and `End` statement; `None` for events and declares.
    pub body: Option<Span>,
}

impl MemberNode {
    /// Parameter list, when the signature has one.
    pub fn arg_list(&self) -> Option<&ArgList> {
        self.arg_list.as_ref()
    }
}

/// Parenthesized parameter list of a signature.
#[derive(Debug, Clone, Serialize)]
pub struct ArgList {
    /// From `(` through `)`.
    pub extent: Extent,
    /// Span of each parameter, in order.
    pub params: Vec<Span>,
}

/// Kind of a supplied call argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ArgumentKind {
    /// Positional argument.
    Positional,
    /// `name:=value`.
    Named(String),
    /// Omitted argument between commas.
    Missing,
}

/// One argument slot at a call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Argument {
    /// Trimmed argument text span; zero-width for missing arguments.
    pub span: Span,
    /// Argument kind.
    pub kind: ArgumentKind,
}

/// Argument list supplied at a call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgumentList {
    /// Region holding the arguments (inside parentheses when parenthesized).
    pub extent: Span,
    /// Argument slots in order.
    pub arguments: Vec<Argument>,
    /// Whether the arguments were enclosed in parentheses.
    pub parenthesized: bool,
}

impl ArgumentList {
    /// True when no argument was supplied.
    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// True when any argument is passed by name.
    pub fn has_named(&self) -> bool {
        self.arguments
            .iter()
            .any(|arg| matches!(arg.kind, ArgumentKind::Named(_)))
    }

    /// True when every argument is passed by name.
    pub fn all_named(&self) -> bool {
        !self.arguments.is_empty()
            && self
                .arguments
                .iter()
                .all(|arg| matches!(arg.kind, ArgumentKind::Named(_)))
    }
}

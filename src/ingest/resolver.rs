//! Reference resolution over member bodies.
//!
//! Runs after every module has been declared. Each body statement is scanned
//! for identifiers; those that bind to a known declaration become
//! [`IdentifierReference`]s carrying their usage context and, for calls and
//! indexed assignments, the supplied argument list.

use super::lexer::{Token, TokenKind};
use super::vba::{identifier_name, is_punct, is_word, matching_paren, word, BodyStatement};
use crate::ast::{Argument, ArgumentKind, ArgumentList};
use crate::index::{bare_type_name, IdentifierReference, ReferenceContext};
use crate::source::ModuleSource;
use crate::symbol::{Declaration, DeclarationId, DeclarationKind, ModuleId, ModuleKind, Span};
use std::collections::HashMap;

/// Words never resolved as identifiers.
const KEYWORDS: &[&str] = &[
    "addressof", "and", "as", "boolean", "byref", "byte", "byval", "call", "case", "close",
    "const", "currency", "date", "debug", "decimal", "declare", "dim", "do", "double", "each",
    "else", "elseif", "empty", "end", "enum", "eqv", "erase", "error", "event", "exit", "false",
    "for", "friend", "function", "get", "global", "gosub", "goto", "if", "imp", "implements",
    "in", "input", "integer", "is", "let", "like", "long", "longlong", "longptr", "loop", "lset",
    "me", "mod", "new", "next", "not", "nothing", "null", "object", "on", "open", "option",
    "optional", "or", "paramarray", "preserve", "print", "private", "property", "public", "put",
    "raiseevent", "redim", "resume", "return", "rset", "select", "set", "single", "static",
    "step", "stop", "string", "sub", "then", "to", "true", "type", "typeof", "until", "variant",
    "wend", "while", "with", "withevents", "xor",
];

/// Words after which an identifier names a type or a label.
const NON_VALUE_PREFIXES: &[&str] = &["as", "new", "goto", "gosub", "typeof"];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Resolution scope tables for one snapshot.
pub(crate) struct Resolver<'a> {
    declarations: &'a [Declaration],
    module_scopes: HashMap<ModuleId, DeclarationId>,
    scoped: HashMap<(DeclarationId, String), Vec<DeclarationId>>,
    modules_by_name: HashMap<String, ModuleId>,
    module_kinds: HashMap<ModuleId, ModuleKind>,
}

/// Qualifier preceding a resolved name.
#[derive(Debug, Clone, Default)]
struct Qualifier {
    /// Leading `.` inside a `With` block.
    with: bool,
    /// Identifier token indices of the `a.b.` chain.
    names: Vec<usize>,
}

impl Qualifier {
    fn is_none(&self) -> bool {
        !self.with && self.names.is_empty()
    }
}

impl<'a> Resolver<'a> {
    /// Index the declarations of a snapshot.
    pub(crate) fn new(declarations: &'a [Declaration], module_kinds: HashMap<ModuleId, ModuleKind>) -> Self {
        let mut module_scopes = HashMap::new();
        let mut modules_by_name = HashMap::new();
        let mut scoped: HashMap<(DeclarationId, String), Vec<DeclarationId>> = HashMap::new();
        for declaration in declarations {
            if declaration.kind == DeclarationKind::Module {
                module_scopes.insert(declaration.module.clone(), declaration.id);
                modules_by_name.insert(declaration.name.to_ascii_lowercase(), declaration.module.clone());
            }
            if let Some(parent) = declaration.parent_scope {
                scoped
                    .entry((parent, declaration.name.to_ascii_lowercase()))
                    .or_default()
                    .push(declaration.id);
            }
        }
        Self {
            declarations,
            module_scopes,
            scoped,
            modules_by_name,
            module_kinds,
        }
    }

    /// Resolve every body statement of one module.
    pub(crate) fn resolve_module(
        &self,
        source: &ModuleSource,
        bodies: &[BodyStatement],
        references: &mut Vec<IdentifierReference>,
    ) {
        let mut with_stack: Vec<Option<ModuleId>> = Vec::new();
        let mut current_member = None;
        for body in bodies {
            if current_member != Some(body.member) {
                with_stack.clear();
                current_member = Some(body.member);
            }
            let mut walker = StatementWalker {
                resolver: self,
                source,
                text: source.text(),
                tokens: &body.tokens,
                member: body.member,
                claimed: vec![false; body.tokens.len()],
                with_stack: &mut with_stack,
                references: &mut *references,
            };
            walker.walk();
        }
    }

    fn declaration(&self, id: DeclarationId) -> Option<&'a Declaration> {
        self.declarations.get(id.0)
    }

    fn in_scope(&self, scope: DeclarationId, name: &str) -> Vec<&'a Declaration> {
        self.scoped
            .get(&(scope, name.to_ascii_lowercase()))
            .map(|ids| ids.iter().filter_map(|id| self.declaration(*id)).collect())
            .unwrap_or_default()
    }

    fn module_level(&self, module: &ModuleId, name: &str) -> Vec<&'a Declaration> {
        self.module_scopes
            .get(module)
            .map(|scope| self.in_scope(*scope, name))
            .unwrap_or_default()
    }

    fn module_named(&self, type_name: &str) -> Option<&ModuleId> {
        self.modules_by_name
            .get(&bare_type_name(type_name).to_ascii_lowercase())
    }

    /// Declared type of a local or parameter; `None` when `name` is not local.
    fn local_type(&self, member: DeclarationId, name: &str) -> Option<Option<String>> {
        if let Some(local) = self.in_scope(member, name).first() {
            return Some(local.as_type_name.clone());
        }
        let owner = self.declaration(member)?;
        owner
            .parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.declared_type.clone())
    }

    /// Public declarations of standard modules, when they come from a single module.
    fn global(&self, name: &str) -> Vec<&'a Declaration> {
        let mut found: Vec<&'a Declaration> = Vec::new();
        for (module, kind) in &self.module_kinds {
            if *kind != ModuleKind::Standard {
                continue;
            }
            found.extend(
                self.module_level(module, name)
                    .into_iter()
                    .filter(|d| is_globally_visible(d)),
            );
        }
        if found.windows(2).all(|pair| pair[0].module == pair[1].module) {
            found
        } else {
            Vec::new()
        }
    }

    fn unqualified(&self, module: &ModuleId, member: DeclarationId, name: &str) -> Vec<&'a Declaration> {
        if self.local_type(member, name).is_some() {
            return Vec::new();
        }
        let local = self.module_level(module, name);
        if !local.is_empty() {
            return local;
        }
        self.global(name)
    }

    /// Module that an object-typed declaration refers to.
    fn type_of(&self, declaration: &Declaration) -> Option<ModuleId> {
        let type_name = declaration.as_type_name.as_deref()?;
        self.module_named(type_name).cloned()
    }
}

fn is_globally_visible(declaration: &Declaration) -> bool {
    use crate::symbol::Accessibility;
    match declaration.kind {
        kind if kind.is_member() => declaration.accessibility != Accessibility::Private,
        DeclarationKind::Variable | DeclarationKind::Constant => declaration.accessibility.is_exposed(),
        _ => false,
    }
}

/// Pick the declaration a usage binds to among same-named candidates.
fn pick<'d>(candidates: &[&'d Declaration], context: ReferenceContext, set: bool) -> Option<&'d Declaration> {
    if candidates.iter().all(|d| d.kind.is_property()) && !candidates.is_empty() {
        let wanted = match context {
            ReferenceContext::Assignment if set => DeclarationKind::PropertySet,
            ReferenceContext::Assignment => DeclarationKind::PropertyLet,
            _ => DeclarationKind::PropertyGet,
        };
        return candidates
            .iter()
            .find(|d| d.kind == wanted)
            .or_else(|| candidates.iter().find(|d| d.kind == DeclarationKind::PropertyGet))
            .or_else(|| candidates.first())
            .copied();
    }
    match candidates {
        [single] => Some(*single),
        _ => None,
    }
}

struct StatementWalker<'w, 'a> {
    resolver: &'w Resolver<'a>,
    source: &'w ModuleSource,
    text: &'w str,
    tokens: &'w [Token],
    member: DeclarationId,
    claimed: Vec<bool>,
    with_stack: &'w mut Vec<Option<ModuleId>>,
    references: &'w mut Vec<IdentifierReference>,
}

impl StatementWalker<'_, '_> {
    fn walk(&mut self) {
        self.head(0, self.tokens.len());
        self.scan();
    }

    fn word(&self, i: usize) -> Option<String> {
        word(self.text, self.tokens, i)
    }

    fn is_word(&self, i: usize, keyword: &str) -> bool {
        is_word(self.text, self.tokens, i, keyword)
    }

    fn is_punct(&self, i: usize, punct: &str) -> bool {
        is_punct(self.text, self.tokens, i, punct)
    }

    fn is_identifier(&self, i: usize) -> bool {
        self.tokens
            .get(i)
            .is_some_and(|t| t.kind == TokenKind::Identifier)
    }

    /// Statement-level forms: calls without parentheses, assignments,
    /// `Call`, `RaiseEvent`, single-line `If` and `With` blocks.
    fn head(&mut self, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let first = self.word(start).unwrap_or_default();
        match first.as_str() {
            "call" => {
                if let Some((qualifier, name, after)) = self.chain(start + 1, end) {
                    let arguments = if after < end && self.is_punct(after, "(") {
                        self.parenthesized(after, end)
                    } else {
                        Some(self.empty_arguments(name))
                    };
                    self.emit(name, &qualifier, ReferenceContext::Call, arguments, false);
                }
            }
            "raiseevent" => {
                if self.is_identifier(start + 1) {
                    let name = start + 1;
                    let arguments = if self.is_punct(name + 1, "(") {
                        self.parenthesized(name + 1, end)
                    } else {
                        Some(self.empty_arguments(name))
                    };
                    self.emit(name, &Qualifier::default(), ReferenceContext::RaiseEvent, arguments, false);
                }
            }
            "set" | "let" => self.statement(start + 1, end, first == "set"),
            "if" | "elseif" => {
                let Some(then) = (start..end).find(|&i| self.is_word(i, "then")) else {
                    return;
                };
                let otherwise = (then + 1..end).find(|&i| self.is_word(i, "else"));
                match otherwise {
                    Some(at) => {
                        self.head(then + 1, at);
                        self.head(at + 1, end);
                    }
                    None => self.head(then + 1, end),
                }
            }
            "else" => self.head(start + 1, end),
            "with" => {
                let target = if self.is_word(start + 1, "new") {
                    self.tokens
                        .get(start + 2)
                        .and_then(|t| self.resolver.module_named(t.text(self.text)).cloned())
                } else {
                    self.chain(start + 1, end)
                        .filter(|(_, _, after)| *after == end)
                        .and_then(|(mut qualifier, name, _)| {
                            qualifier.names.push(name);
                            self.qualifier_type(&qualifier)
                        })
                };
                self.with_stack.push(target);
            }
            "end" if self.is_word(start + 1, "with") => {
                self.with_stack.pop();
            }
            word if is_keyword(word) => {}
            _ => self.statement(start, end, false),
        }
    }

    /// Call statement or assignment starting at `start`.
    fn statement(&mut self, start: usize, end: usize, set: bool) {
        let Some((qualifier, name, after)) = self.chain(start, end) else {
            return;
        };

        if after < end && self.is_punct(after, "=") {
            if qualifier.is_none() && self.is_own_return_value(name) {
                self.emit_return_value(name);
                return;
            }
            let arguments = Some(self.empty_arguments(name));
            self.emit(name, &qualifier, ReferenceContext::Assignment, arguments, set);
            return;
        }

        if after == end {
            let arguments = Some(self.empty_arguments(name));
            self.emit(name, &qualifier, ReferenceContext::Call, arguments, set);
            return;
        }

        if self.is_punct(after, "(") {
            if let Some(close) = matching_paren(self.text, &self.tokens[..end], after) {
                if close + 1 < end && self.is_punct(close + 1, "=") {
                    if qualifier.is_none() && self.is_own_return_value(name) {
                        self.emit_return_value(name);
                        return;
                    }
                    let arguments = self.parenthesized(after, end);
                    self.emit(name, &qualifier, ReferenceContext::Assignment, arguments, set);
                    return;
                }
                if close + 1 == end {
                    let arguments = self.parenthesized(after, end);
                    self.emit(name, &qualifier, ReferenceContext::Call, arguments, set);
                    return;
                }
            }
        }

        let arguments = Some(self.arguments(after, end, false));
        self.emit(name, &qualifier, ReferenceContext::Call, arguments, set);
    }

    /// `[.]a.b.Name` starting at `start`: the qualifier, the name index and
    /// the index just past the chain.
    fn chain(&self, start: usize, end: usize) -> Option<(Qualifier, usize, usize)> {
        let mut i = start;
        let mut qualifier = Qualifier::default();
        if self.is_punct(i, ".") {
            qualifier.with = true;
            i += 1;
        }
        if i >= end || !self.is_identifier(i) {
            return None;
        }
        let mut name = i;
        i += 1;
        while i + 1 < end && self.is_punct(i, ".") && self.is_identifier(i + 1) {
            qualifier.names.push(name);
            name = i + 1;
            i += 2;
        }
        Some((qualifier, name, i))
    }

    /// Remaining identifiers: expression operands, nested calls, qualifiers.
    fn scan(&mut self) {
        for i in 0..self.tokens.len() {
            if self.claimed[i] || !self.is_identifier(i) {
                continue;
            }
            let lowered = self.word(i).unwrap_or_default();
            if is_keyword(&lowered) {
                continue;
            }
            if i > 0 {
                if let Some(previous) = self.word(i - 1) {
                    if NON_VALUE_PREFIXES.contains(&previous.as_str()) {
                        continue;
                    }
                }
                if self.is_punct(i - 1, "!") {
                    continue;
                }
            }
            if self.is_punct(i + 1, ":=") {
                continue;
            }

            let Some(qualifier) = self.qualifier_before(i) else {
                continue;
            };
            let address_of = i > 0 && self.is_word(i - 1, "addressof");
            if self.is_punct(i + 1, "(") {
                let arguments = self.parenthesized(i + 1, self.tokens.len());
                self.emit(i, &qualifier, ReferenceContext::Call, arguments, false);
            } else if address_of {
                self.emit(i, &qualifier, ReferenceContext::Bare, None, false);
            } else {
                self.emit_bare(i, &qualifier);
            }
        }
    }

    /// Qualifier chain ending just before `name`; `None` when the qualifier
    /// cannot be followed (e.g. `f(x).Name`).
    fn qualifier_before(&self, name: usize) -> Option<Qualifier> {
        let mut qualifier = Qualifier::default();
        if name == 0 || !self.is_punct(name - 1, ".") {
            return Some(qualifier);
        }
        let mut j = name - 1;
        loop {
            // tokens[j] is a '.'
            if j == 0 || !self.is_identifier(j - 1) {
                if j > 0 && self.is_punct(j - 1, ")") {
                    return None;
                }
                qualifier.with = true;
                break;
            }
            qualifier.names.insert(0, j - 1);
            if j >= 2 && self.is_punct(j - 2, ".") {
                j -= 2;
            } else {
                break;
            }
        }
        Some(qualifier)
    }

    fn qualifier_type(&self, qualifier: &Qualifier) -> Option<ModuleId> {
        let resolver = self.resolver;
        let module = self.source.id();
        let mut names = qualifier.names.iter();
        let mut current = if qualifier.with {
            self.with_stack.last().cloned().flatten()?
        } else {
            let first = self.tokens[*names.next()?];
            let name = identifier_name(self.text, &first);
            if name.eq_ignore_ascii_case("me") {
                module.clone()
            } else if let Some(local) = resolver.local_type(self.member, &name) {
                resolver.module_named(local.as_deref()?)?.clone()
            } else if let Some(typed) = resolver
                .unqualified(module, self.member, &name)
                .into_iter()
                .find_map(|d| resolver.type_of(d))
            {
                typed
            } else {
                resolver.module_named(&name)?.clone()
            }
        };
        for index in names {
            let name = identifier_name(self.text, &self.tokens[*index]);
            current = resolver
                .module_level(&current, &name)
                .into_iter()
                .find_map(|d| resolver.type_of(d))?;
        }
        Some(current)
    }

    fn lookup(&self, name: usize, qualifier: &Qualifier, context: ReferenceContext, set: bool) -> Option<DeclarationId> {
        let resolver = self.resolver;
        let text = identifier_name(self.text, &self.tokens[name]);
        let candidates: Vec<&Declaration> = if qualifier.is_none() {
            if context == ReferenceContext::RaiseEvent {
                resolver
                    .module_level(self.source.id(), &text)
                    .into_iter()
                    .filter(|d| d.kind == DeclarationKind::Event)
                    .collect()
            } else {
                resolver.unqualified(self.source.id(), self.member, &text)
            }
        } else {
            let module = self.qualifier_type(qualifier)?;
            resolver.module_level(&module, &text)
        };
        pick(&candidates, context, set).map(|d| d.id)
    }

    fn is_own_return_value(&self, name: usize) -> bool {
        let Some(member) = self.resolver.declaration(self.member) else {
            return false;
        };
        matches!(member.kind, DeclarationKind::Function | DeclarationKind::PropertyGet)
            && member.is_named(&identifier_name(self.text, &self.tokens[name]))
    }

    fn emit_return_value(&mut self, name: usize) {
        self.claimed[name] = true;
        let selection = self.source.extent(self.tokens[name].span);
        self.references.push(IdentifierReference {
            declaration: self.member,
            module: self.source.id().clone(),
            parent_member: Some(self.member),
            selection,
            qualified: selection,
            context: ReferenceContext::ReturnValue,
            arguments: None,
        });
    }

    fn emit_bare(&mut self, name: usize, qualifier: &Qualifier) {
        let Some(id) = self.lookup(name, qualifier, ReferenceContext::Bare, false) else {
            self.claimed[name] = true;
            return;
        };
        let is_member = self
            .resolver
            .declaration(id)
            .is_some_and(|d| d.kind.is_member());
        if is_member {
            let arguments = Some(self.empty_arguments(name));
            self.push(id, name, qualifier, ReferenceContext::Call, arguments);
        } else {
            self.push(id, name, qualifier, ReferenceContext::Bare, None);
        }
    }

    fn emit(
        &mut self,
        name: usize,
        qualifier: &Qualifier,
        context: ReferenceContext,
        arguments: Option<ArgumentList>,
        set: bool,
    ) {
        self.claimed[name] = true;
        if let Some(id) = self.lookup(name, qualifier, context, set) {
            self.push(id, name, qualifier, context, arguments);
        }
    }

    fn push(
        &mut self,
        declaration: DeclarationId,
        name: usize,
        qualifier: &Qualifier,
        context: ReferenceContext,
        arguments: Option<ArgumentList>,
    ) {
        self.claimed[name] = true;
        let name_span = self.tokens[name].span;
        let start = match (qualifier.names.first(), qualifier.with) {
            (Some(first), true) if *first > 0 => self.tokens[first - 1].span.start,
            (Some(first), _) => self.tokens[*first].span.start,
            (None, true) if name > 0 => self.tokens[name - 1].span.start,
            _ => name_span.start,
        };
        self.references.push(IdentifierReference {
            declaration,
            module: self.source.id().clone(),
            parent_member: Some(self.member),
            selection: self.source.extent(name_span),
            qualified: self.source.extent(Span::new(start, name_span.end)),
            context,
            arguments,
        });
    }

    fn empty_arguments(&self, name: usize) -> ArgumentList {
        ArgumentList {
            extent: Span::empty(self.tokens[name].span.end),
            arguments: Vec::new(),
            parenthesized: false,
        }
    }

    /// Arguments inside the parentheses opening at `open`.
    fn parenthesized(&self, open: usize, end: usize) -> Option<ArgumentList> {
        let close = matching_paren(self.text, &self.tokens[..end], open)?;
        Some(self.arguments(open + 1, close, true))
    }

    /// Split `tokens[start..end]` into argument slots.
    fn arguments(&self, start: usize, end: usize, parenthesized: bool) -> ArgumentList {
        let extent = if parenthesized {
            Span::new(self.tokens[start - 1].span.end, self.tokens[end].span.start)
        } else if start < end {
            self.tokens[start].span.cover(&self.tokens[end - 1].span)
        } else {
            Span::empty(self.tokens[start.saturating_sub(1)].span.end)
        };

        let mut arguments = Vec::new();
        if start < end {
            let mut depth = 0usize;
            let mut piece = start;
            for i in start..end {
                if self.is_punct(i, "(") {
                    depth += 1;
                } else if self.is_punct(i, ")") {
                    depth = depth.saturating_sub(1);
                } else if depth == 0 && self.is_punct(i, ",") {
                    arguments.push(self.argument(piece, i, self.tokens[i].span.start));
                    piece = i + 1;
                }
            }
            arguments.push(self.argument(piece, end, extent.end));
        }

        ArgumentList {
            extent,
            arguments,
            parenthesized,
        }
    }

    fn argument(&self, start: usize, end: usize, missing_at: usize) -> Argument {
        if start >= end {
            return Argument {
                span: Span::empty(missing_at),
                kind: ArgumentKind::Missing,
            };
        }
        let span = self.tokens[start].span.cover(&self.tokens[end - 1].span);
        let kind = if self.is_identifier(start) && self.is_punct(start + 1, ":=") {
            ArgumentKind::Named(identifier_name(self.text, &self.tokens[start]))
        } else {
            ArgumentKind::Positional
        };
        Argument { span, kind }
    }
}

#[cfg(test)]
mod tests {
    use crate::index::ReferenceContext;
    use crate::ingest::build_snapshot;
    use crate::ast::ArgumentKind;
    use crate::symbol::{DeclarationKind, ModuleKind};

    #[test]
    fn test_call_statement_arguments() {
        let code = "\
Public Sub Foo(ByVal a As Long, ByVal b As Long, ByVal c As Long)
End Sub

Public Sub Caller()
    Foo 1, 2, 3
    Call Foo(4, , 6)
End Sub
";
        let snap = build_snapshot("VBAProject", &[("Module1", ModuleKind::Standard, code)]).unwrap();
        let foo = snap.index().resolve_member(None, "Foo", None).unwrap();
        let refs = snap.index().references_of(foo.id);
        assert_eq!(refs.len(), 2);

        let first = refs[0].argument_list().unwrap();
        assert!(!first.parenthesized);
        let texts: Vec<&str> = first.arguments.iter().map(|a| a.span.text(code)).collect();
        assert_eq!(texts, vec!["1", "2", "3"]);

        let second = refs[1].argument_list().unwrap();
        assert!(second.parenthesized);
        assert_eq!(second.arguments[1].kind, ArgumentKind::Missing);
        assert_eq!(second.arguments[2].span.text(code), "6");
    }

    #[test]
    fn test_nested_and_named_calls() {
        let code = "\
Public Function Twice(ByVal x As Long, ByVal y As Long) As Long
    Twice = x * y
End Function

Public Sub Caller()
    Dim r As Long
    r = Twice(Twice(1, 2), 3)
    r = Twice(y:=1, x:=2)
End Sub
";
        let snap = build_snapshot("VBAProject", &[("Module1", ModuleKind::Standard, code)]).unwrap();
        let twice = snap.index().resolve_member(None, "Twice", None).unwrap();
        let refs = snap.index().references_of(twice.id);
        let calls: Vec<_> = refs
            .iter()
            .filter(|r| r.context == ReferenceContext::Call)
            .collect();
        assert_eq!(calls.len(), 3);
        assert!(calls[2].argument_list().unwrap().all_named());
        assert!(refs.iter().any(|r| r.context == ReferenceContext::ReturnValue));
    }

    #[test]
    fn test_qualified_class_member_and_property_assignment() {
        let class = "\
Private mName As String

Public Property Get Name() As String
    Name = mName
End Property

Public Property Let Name(ByVal value As String)
    mName = value
End Property
";
        let module = "\
Public Sub Use()
    Dim c As New Class1
    c.Name = \"x\"
    Debug.Print c.Name
End Sub
";
        let snap = build_snapshot(
            "VBAProject",
            &[
                ("Class1", ModuleKind::Class, class),
                ("Module1", ModuleKind::Standard, module),
            ],
        )
        .unwrap();
        let index = snap.index();
        let let_ = index
            .resolve_member(Some("Class1"), "Name", Some(DeclarationKind::PropertyLet))
            .unwrap();
        let get = index
            .resolve_member(Some("Class1"), "Name", Some(DeclarationKind::PropertyGet))
            .unwrap();
        let assignments = index.references_of(let_.id);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].context, ReferenceContext::Assignment);
        assert!(assignments[0].is_qualified());

        let reads: Vec<_> = index
            .references_of(get.id)
            .into_iter()
            .filter(|r| r.context != ReferenceContext::ReturnValue)
            .collect();
        assert_eq!(reads.len(), 1);

        let field = index.resolve_member(Some("Class1"), "mName", None).unwrap();
        assert_eq!(index.references_of(field.id).len(), 2);
    }

    #[test]
    fn test_locals_shadow_fields() {
        let code = "\
Private total As Long

Public Sub Add()
    Dim total As Long
    total = 1
End Sub
";
        let snap = build_snapshot("VBAProject", &[("Module1", ModuleKind::Standard, code)]).unwrap();
        let field = snap.index().find_in_module(
            &crate::symbol::ModuleId::new("VBAProject", "Module1"),
            "total",
        );
        assert_eq!(field.len(), 1);
        assert!(snap.index().references_of(field[0].id).is_empty());
    }

    #[test]
    fn test_raise_event_and_with_block() {
        let code = "\
Public Event Changed(ByVal a As Long, ByVal b As Long)
Public Sub Touch()
    RaiseEvent Changed(1, 2)
End Sub
";
        let user = "\
Public Sub Go()
    Dim s As Source
    With s
        .Touch
    End With
End Sub
";
        let snap = build_snapshot(
            "VBAProject",
            &[
                ("Source", ModuleKind::Class, code),
                ("Module1", ModuleKind::Standard, user),
            ],
        )
        .unwrap();
        let event = snap.index().resolve_member(None, "Changed", None).unwrap();
        let raised = snap.index().references_of(event.id);
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].context, ReferenceContext::RaiseEvent);
        assert_eq!(raised[0].argument_list().unwrap().arguments.len(), 2);

        let touch = snap.index().resolve_member(None, "Touch", None).unwrap();
        assert_eq!(snap.index().references_of(touch.id).len(), 1);
    }
}

//! Declaration-level parser for VBA modules.
//!
//! Builds the module AST and the declarations of one module. Procedure
//! bodies are not interpreted here; their statements are handed to the
//! resolver once every module has been declared.

use super::lexer::{tokenize, Token, TokenKind};
use crate::ast::{
    ArgList, Declarator, ImplementsStmt, MemberNode, ModuleAst, ModuleItem, TypeBlock, TypeMember,
    VariableStmt,
};
use crate::error::{RefactorError, Result};
use crate::source::ModuleSource;
use crate::symbol::{
    Accessibility, Declaration, DeclarationId, DeclarationKind, Extent, Parameter, Span,
};

/// A logical statement: significant tokens between separators.
pub(crate) type Statement = Vec<Token>;

/// Statement inside a member body.
#[derive(Debug, Clone)]
pub(crate) struct BodyStatement {
    /// Enclosing member.
    pub member: DeclarationId,
    /// Statement tokens.
    pub tokens: Statement,
}

/// Parse output of one module.
#[derive(Debug, Clone)]
pub(crate) struct ModuleParse {
    /// Syntax tree.
    pub ast: ModuleAst,
    /// Interfaces named in `Implements` statements.
    pub implements: Vec<String>,
    /// Body statements in source order.
    pub bodies: Vec<BodyStatement>,
}

/// Split tokens into logical statements on newlines and `:` separators.
///
/// Comments and line continuations are dropped, so a statement continued
/// over several physical lines comes out as one token run.
pub(crate) fn split_statements(tokens: &[Token]) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        match token.kind {
            TokenKind::Newline | TokenKind::Colon => {
                if !current.is_empty() {
                    statements.push(std::mem::take(&mut current));
                }
            }
            TokenKind::Comment | TokenKind::Continuation => {}
            _ => current.push(*token),
        }
    }
    if !current.is_empty() {
        statements.push(current);
    }
    statements
}

/// Lowercased text of `tokens[i]`, when it is an identifier.
pub(crate) fn word(text: &str, tokens: &[Token], i: usize) -> Option<String> {
    tokens
        .get(i)
        .filter(|t| t.kind == TokenKind::Identifier)
        .map(|t| t.text(text).to_ascii_lowercase())
}

/// True when `tokens[i]` is the given keyword.
pub(crate) fn is_word(text: &str, tokens: &[Token], i: usize, keyword: &str) -> bool {
    tokens.get(i).is_some_and(|t| t.is_word(text, keyword))
}

/// True when `tokens[i]` is the given punctuation.
pub(crate) fn is_punct(text: &str, tokens: &[Token], i: usize, punct: &str) -> bool {
    tokens.get(i).is_some_and(|t| t.is_punct(text, punct))
}

/// Index of the `)` matching the `(` at `open`.
pub(crate) fn matching_paren(text: &str, tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        if token.is_punct(text, "(") {
            depth += 1;
        } else if token.is_punct(text, ")") {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Split a token run at top-level commas. Empty pieces are kept.
pub(crate) fn split_commas<'t>(text: &str, tokens: &'t [Token]) -> Vec<&'t [Token]> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if token.is_punct(text, "(") {
            depth += 1;
        } else if token.is_punct(text, ")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && token.is_punct(text, ",") {
            pieces.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    pieces.push(&tokens[start..]);
    pieces
}

/// Span from the first to the last token.
pub(crate) fn cover(tokens: &[Token]) -> Option<Span> {
    let first = tokens.first()?;
    let last = tokens.last()?;
    Some(first.span.cover(&last.span))
}

/// Identifier name with `[brackets]` removed.
pub(crate) fn identifier_name(text: &str, token: &Token) -> String {
    let raw = token.text(text);
    raw.strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(raw)
        .to_string()
}

enum Block {
    Code,
    Header,
    Member(OpenMember),
    Type(OpenType),
    Enum(DeclarationId),
}

struct OpenMember {
    declaration: DeclarationId,
    kind: DeclarationKind,
    start: usize,
    signature: Extent,
    arg_list: Option<ArgList>,
    body_start: usize,
    end_keyword: &'static str,
}

struct OpenType {
    declaration: DeclarationId,
    start: usize,
    members: Vec<TypeMember>,
}

/// Parser for one module.
pub(crate) struct ModuleParser<'a> {
    source: &'a ModuleSource,
    declarations: &'a mut Vec<Declaration>,
    module_declaration: DeclarationId,
    items: Vec<ModuleItem>,
    implements: Vec<String>,
    bodies: Vec<BodyStatement>,
}

impl<'a> ModuleParser<'a> {
    /// Parse `source`, appending its declarations to `declarations`.
    ///
    /// # Errors
    /// Returns `Parse` when a block is left open at the end of the module or
    /// a member header has no name.
    pub(crate) fn parse(
        source: &'a ModuleSource,
        declarations: &'a mut Vec<Declaration>,
    ) -> Result<ModuleParse> {
        let text = source.text();
        let whole = source.extent(Span::new(0, text.len()));
        let module_declaration = DeclarationId(declarations.len());
        declarations.push(Declaration {
            id: module_declaration,
            name: source.id().component().to_string(),
            kind: DeclarationKind::Module,
            module: source.id().clone(),
            parent_scope: None,
            accessibility: Accessibility::Public,
            as_type_name: None,
            is_with_events: false,
            is_array: false,
            selection: whole,
            extent: whole,
            parameters: Vec::new(),
        });

        let mut parser = ModuleParser {
            source,
            declarations,
            module_declaration,
            items: Vec::new(),
            implements: Vec::new(),
            bodies: Vec::new(),
        };

        let statements = split_statements(&tokenize(text));
        let mut block = Block::Code;
        for statement in statements {
            block = parser.statement(block, statement)?;
        }

        let open = match block {
            Block::Code | Block::Header => None,
            Block::Member(member) => Some(member.end_keyword),
            Block::Type(_) => Some("type"),
            Block::Enum(_) => Some("enum"),
        };
        if let Some(keyword) = open {
            return Err(parser.error(format!("missing 'End {}' at end of module", keyword)));
        }

        Ok(ModuleParse {
            ast: ModuleAst { items: parser.items },
            implements: parser.implements,
            bodies: parser.bodies,
        })
    }

    fn text(&self) -> &'a str {
        self.source.text()
    }

    fn error(&self, message: String) -> RefactorError {
        RefactorError::Parse {
            module: self.source.id().to_string(),
            message,
        }
    }

    fn extent(&self, span: Span) -> Extent {
        self.source.extent(span)
    }

    fn statement(&mut self, block: Block, tokens: Statement) -> Result<Block> {
        let text = self.text();
        match block {
            Block::Code => self.module_statement(tokens),
            Block::Header => {
                if tokens.len() == 1 && is_word(text, &tokens, 0, "end") {
                    Ok(Block::Code)
                } else {
                    Ok(Block::Header)
                }
            }
            Block::Member(open) => {
                if is_word(text, &tokens, 0, "end") && is_word(text, &tokens, 1, open.end_keyword) {
                    self.close_member(open, &tokens);
                    return Ok(Block::Code);
                }
                self.local_statement(open.declaration, &tokens);
                self.bodies.push(BodyStatement {
                    member: open.declaration,
                    tokens,
                });
                Ok(Block::Member(open))
            }
            Block::Type(mut open) => {
                if is_word(text, &tokens, 0, "end") && is_word(text, &tokens, 1, "type") {
                    let end = tokens[tokens.len() - 1].span.end;
                    let extent = self.extent(Span::new(open.start, end));
                    self.items.push(ModuleItem::TypeBlock(TypeBlock {
                        declaration: open.declaration,
                        extent,
                        members: open.members,
                        end_line: self.source.line_of(tokens[0].span.start),
                    }));
                    return Ok(Block::Code);
                }
                if let Some(member) = self.type_member(open.declaration, &tokens) {
                    open.members.push(member);
                }
                Ok(Block::Type(open))
            }
            Block::Enum(enumeration) => {
                if is_word(text, &tokens, 0, "end") && is_word(text, &tokens, 1, "enum") {
                    return Ok(Block::Code);
                }
                if let Some(name) = tokens.first().filter(|t| t.kind == TokenKind::Identifier) {
                    let span = cover(&tokens).unwrap_or(name.span);
                    self.declare(
                        identifier_name(text, name),
                        DeclarationKind::Constant,
                        Some(self.module_declaration),
                        Accessibility::Public,
                        Some(self.declarations[enumeration.0].name.clone()),
                        name.span,
                        span,
                    );
                }
                Ok(Block::Enum(enumeration))
            }
        }
    }

    fn module_statement(&mut self, tokens: Statement) -> Result<Block> {
        let text = self.text();
        let first = word(text, &tokens, 0).unwrap_or_default();
        match first.as_str() {
            "attribute" | "option" | "version" => return Ok(Block::Code),
            "begin" => return Ok(Block::Header),
            "implements" => {
                if let Some(span) = cover(&tokens[1..]) {
                    let interface = span.text(text).to_string();
                    let extent = self.extent(cover(&tokens).unwrap_or(span));
                    self.implements.push(interface.clone());
                    self.items
                        .push(ModuleItem::Implements(ImplementsStmt { interface, extent }));
                }
                return Ok(Block::Code);
            }
            _ => {}
        }

        let mut idx = 0;
        let access = Accessibility::from_keyword(&first);
        if access.is_some() {
            idx += 1;
        }
        if is_word(text, &tokens, idx, "static") {
            idx += 1;
        }
        let accessibility = access.unwrap_or(Accessibility::Implicit);

        let keyword = word(text, &tokens, idx).unwrap_or_default();
        match keyword.as_str() {
            "sub" => self.open_member(&tokens, idx + 1, DeclarationKind::Procedure, accessibility, "sub"),
            "function" => {
                self.open_member(&tokens, idx + 1, DeclarationKind::Function, accessibility, "function")
            }
            "property" => {
                let kind = match word(text, &tokens, idx + 1).as_deref() {
                    Some("get") => DeclarationKind::PropertyGet,
                    Some("let") => DeclarationKind::PropertyLet,
                    Some("set") => DeclarationKind::PropertySet,
                    _ => return Err(self.statement_error(&tokens, "property accessor keyword")),
                };
                self.open_member(&tokens, idx + 2, kind, accessibility, "property")
            }
            "event" => {
                self.bodyless_member(&tokens, idx + 1, DeclarationKind::Event, accessibility)?;
                Ok(Block::Code)
            }
            "declare" => {
                let mut name_idx = idx + 1;
                if is_word(text, &tokens, name_idx, "ptrsafe") {
                    name_idx += 1;
                }
                // Sub or Function keyword
                name_idx += 1;
                self.bodyless_member(&tokens, name_idx, DeclarationKind::LibraryFunction, accessibility)?;
                Ok(Block::Code)
            }
            "type" => {
                let name = tokens
                    .get(idx + 1)
                    .ok_or_else(|| self.statement_error(&tokens, "type name"))?;
                let declaration = self.declare(
                    identifier_name(text, name),
                    DeclarationKind::UserDefinedType,
                    Some(self.module_declaration),
                    accessibility,
                    None,
                    name.span,
                    tokens[0].span.cover(&name.span),
                );
                Ok(Block::Type(OpenType {
                    declaration,
                    start: tokens[0].span.start,
                    members: Vec::new(),
                }))
            }
            "enum" => {
                let name = tokens
                    .get(idx + 1)
                    .ok_or_else(|| self.statement_error(&tokens, "enum name"))?;
                let declaration = self.declare(
                    identifier_name(text, name),
                    DeclarationKind::Enumeration,
                    Some(self.module_declaration),
                    accessibility,
                    None,
                    name.span,
                    tokens[0].span.cover(&name.span),
                );
                Ok(Block::Enum(declaration))
            }
            "const" => {
                self.constants(&tokens[idx + 1..], self.module_declaration, accessibility);
                Ok(Block::Code)
            }
            _ if access.is_some() || keyword == "withevents" => {
                self.fields(&tokens, idx, accessibility);
                Ok(Block::Code)
            }
            _ => Ok(Block::Code),
        }
    }

    fn statement_error(&self, tokens: &[Token], expected: &str) -> RefactorError {
        let line = tokens
            .first()
            .map(|t| self.source.line_of(t.span.start))
            .unwrap_or(1);
        self.error(format!("expected {} on line {}", expected, line))
    }

    #[allow(clippy::too_many_arguments)]
    fn declare(
        &mut self,
        name: String,
        kind: DeclarationKind,
        parent_scope: Option<DeclarationId>,
        accessibility: Accessibility,
        as_type_name: Option<String>,
        selection: Span,
        extent: Span,
    ) -> DeclarationId {
        let id = DeclarationId(self.declarations.len());
        let selection = self.extent(selection);
        let extent = self.extent(extent);
        self.declarations.push(Declaration {
            id,
            name,
            kind,
            module: self.source.id().clone(),
            parent_scope,
            accessibility,
            as_type_name,
            is_with_events: false,
            is_array: false,
            selection,
            extent,
            parameters: Vec::new(),
        });
        id
    }

    /// Parse `name(params) [As T]` starting at `name_idx` and declare the member.
    fn member_header(
        &mut self,
        tokens: &[Token],
        name_idx: usize,
        kind: DeclarationKind,
        accessibility: Accessibility,
    ) -> Result<(DeclarationId, Extent, Option<ArgList>)> {
        let text = self.text();
        let name = tokens
            .get(name_idx)
            .filter(|t| t.kind == TokenKind::Identifier)
            .ok_or_else(|| self.statement_error(tokens, "member name"))?;

        let open = (name_idx + 1..tokens.len()).find(|&i| is_punct(text, tokens, i, "("));
        let mut parameters = Vec::new();
        let mut arg_list = None;
        let mut after_args = name_idx + 1;
        if let Some(open) = open {
            let close = matching_paren(text, tokens, open)
                .ok_or_else(|| self.statement_error(tokens, "closing parenthesis"))?;
            let inner = &tokens[open + 1..close];
            let mut spans = Vec::new();
            if !inner.is_empty() {
                for (position, piece) in split_commas(text, inner).into_iter().enumerate() {
                    if let Some(parameter) = self.parameter(piece, position) {
                        spans.push(parameter.extent.span);
                        parameters.push(parameter);
                    }
                }
            }
            arg_list = Some(ArgList {
                extent: self.extent(tokens[open].span.cover(&tokens[close].span)),
                params: spans,
            });
            after_args = close + 1;
        }

        let as_type_name = if is_word(text, tokens, after_args, "as") {
            cover(&tokens[after_args + 1..]).map(|span| span.text(text).to_string())
        } else {
            None
        };

        let statement = cover(tokens).unwrap_or(name.span);
        let id = self.declare(
            identifier_name(text, name),
            kind,
            Some(self.module_declaration),
            accessibility,
            as_type_name,
            name.span,
            statement,
        );
        self.declarations[id.0].parameters = parameters;
        Ok((id, self.extent(statement), arg_list))
    }

    fn open_member(
        &mut self,
        tokens: &[Token],
        name_idx: usize,
        kind: DeclarationKind,
        accessibility: Accessibility,
        end_keyword: &'static str,
    ) -> Result<Block> {
        let (declaration, signature, arg_list) =
            self.member_header(tokens, name_idx, kind, accessibility)?;
        Ok(Block::Member(OpenMember {
            declaration,
            kind,
            start: signature.span.start,
            signature,
            arg_list,
            body_start: signature.span.end,
            end_keyword,
        }))
    }

    fn bodyless_member(
        &mut self,
        tokens: &[Token],
        name_idx: usize,
        kind: DeclarationKind,
        accessibility: Accessibility,
    ) -> Result<()> {
        let (declaration, signature, arg_list) =
            self.member_header(tokens, name_idx, kind, accessibility)?;
        self.items.push(ModuleItem::Member(MemberNode {
            declaration,
            kind,
            extent: signature,
            signature,
            arg_list,
            body: None,
        }));
        Ok(())
    }

    fn close_member(&mut self, open: OpenMember, end_tokens: &[Token]) {
        let end_start = end_tokens[0].span.start;
        let end = end_tokens[end_tokens.len() - 1].span.end;
        let extent = self.extent(Span::new(open.start, end));
        self.declarations[open.declaration.0].extent = extent;
        self.items.push(ModuleItem::Member(MemberNode {
            declaration: open.declaration,
            kind: open.kind,
            extent,
            signature: open.signature,
            arg_list: open.arg_list,
            body: Some(Span::new(open.body_start, end_start.max(open.body_start))),
        }));
    }

    /// `[Optional] [ByVal|ByRef] [ParamArray] name[()] [As T] [= default]`
    fn parameter(&self, tokens: &[Token], position: usize) -> Option<Parameter> {
        let text = self.text();
        let span = cover(tokens)?;
        let mut is_optional = false;
        let mut is_by_val = false;
        let mut is_param_array = false;
        let mut i = 0;
        while let Some(keyword) = word(text, tokens, i) {
            match keyword.as_str() {
                "optional" => is_optional = true,
                "byval" => is_by_val = true,
                "byref" => {}
                "paramarray" => is_param_array = true,
                _ => break,
            }
            i += 1;
        }
        let name = tokens.get(i)?;
        i += 1;
        if is_punct(text, tokens, i, "(") && is_punct(text, tokens, i + 1, ")") {
            i += 2;
        }
        let default_at = (i..tokens.len()).find(|&k| is_punct(text, tokens, k, "="));
        let declared_type = if is_word(text, tokens, i, "as") {
            let end = default_at.unwrap_or(tokens.len());
            cover(&tokens[i + 1..end]).map(|s| s.text(text).to_string())
        } else {
            None
        };
        let default_value =
            default_at.and_then(|k| cover(&tokens[k + 1..]).map(|s| s.text(text).to_string()));

        Some(Parameter {
            name: identifier_name(text, name),
            declared_type,
            position,
            is_optional,
            is_param_array,
            is_by_val,
            default_value,
            text: span.text(text).to_string(),
            extent: self.extent(span),
        })
    }

    /// `name[(bounds)] [As [New] Type]`, returning (name token, bounds, type).
    fn declarator(&self, tokens: &[Token]) -> Option<(Token, Option<Span>, Option<String>)> {
        let text = self.text();
        let mut i = 0;
        if is_word(text, tokens, i, "withevents") {
            i += 1;
        }
        let name = *tokens.get(i).filter(|t| t.kind == TokenKind::Identifier)?;
        i += 1;
        let mut bounds = None;
        if is_punct(text, tokens, i, "(") {
            let close = matching_paren(text, tokens, i)?;
            bounds = Some(tokens[i].span.cover(&tokens[close].span));
            i = close + 1;
        }
        let mut as_type = None;
        if is_word(text, tokens, i, "as") {
            i += 1;
            if is_word(text, tokens, i, "new") {
                i += 1;
            }
            let end = (i..tokens.len())
                .find(|&k| is_punct(text, tokens, k, "="))
                .unwrap_or(tokens.len());
            as_type = cover(&tokens[i..end]).map(|s| s.text(text).to_string());
        }
        Some((name, bounds, as_type))
    }

    fn fields(&mut self, tokens: &[Token], idx: usize, accessibility: Accessibility) {
        let text = self.text();
        let mut start = idx;
        let mut with_events = false;
        if is_word(text, tokens, start, "withevents") {
            with_events = true;
            start += 1;
        }
        if start >= tokens.len() {
            return;
        }
        let keywords = if start > 0 {
            tokens[0].span.cover(&tokens[start - 1].span)
        } else {
            Span::empty(tokens[0].span.start)
        };

        let mut declarators = Vec::new();
        for piece in split_commas(text, &tokens[start..]) {
            let Some((name, bounds, as_type)) = self.declarator(piece) else {
                continue;
            };
            let Some(span) = cover(piece) else { continue };
            let id = self.declare(
                identifier_name(text, &name),
                DeclarationKind::Variable,
                Some(self.module_declaration),
                accessibility,
                as_type,
                name.span,
                span,
            );
            let declaration = &mut self.declarations[id.0];
            declaration.is_with_events = with_events || is_word(text, piece, 0, "withevents");
            declaration.is_array = bounds.is_some();
            declarators.push(Declarator {
                declaration: id,
                span,
                array_bounds: bounds.map(|b| b.text(text).to_string()),
            });
        }

        if let Some(span) = cover(tokens) {
            self.items.push(ModuleItem::Fields(VariableStmt {
                extent: self.extent(span),
                keywords,
                declarators,
            }));
        }
    }

    fn constants(&mut self, tokens: &[Token], scope: DeclarationId, accessibility: Accessibility) {
        let text = self.text();
        for piece in split_commas(text, tokens) {
            let Some((name, _, as_type)) = self.declarator(piece) else {
                continue;
            };
            let span = cover(piece).unwrap_or(name.span);
            self.declare(
                identifier_name(text, &name),
                DeclarationKind::Constant,
                Some(scope),
                accessibility,
                as_type,
                name.span,
                span,
            );
        }
    }

    fn type_member(&mut self, udt: DeclarationId, tokens: &[Token]) -> Option<TypeMember> {
        let text = self.text();
        let (name, bounds, as_type) = self.declarator(tokens)?;
        let span = cover(tokens)?;
        let id = self.declare(
            identifier_name(text, &name),
            DeclarationKind::UserDefinedTypeMember,
            Some(udt),
            Accessibility::Public,
            as_type,
            name.span,
            span,
        );
        self.declarations[id.0].is_array = bounds.is_some();
        Some(TypeMember {
            declaration: id,
            extent: self.extent(span),
        })
    }

    /// Declare locals of `Dim`/`Static`/`Const` statements inside a body.
    fn local_statement(&mut self, member: DeclarationId, tokens: &[Token]) {
        let text = self.text();
        match word(text, tokens, 0).as_deref() {
            Some("dim") | Some("static") => {
                for piece in split_commas(text, &tokens[1..]) {
                    let Some((name, bounds, as_type)) = self.declarator(piece) else {
                        continue;
                    };
                    let span = cover(piece).unwrap_or(name.span);
                    let id = self.declare(
                        identifier_name(text, &name),
                        DeclarationKind::Variable,
                        Some(member),
                        Accessibility::Implicit,
                        as_type,
                        name.span,
                        span,
                    );
                    self.declarations[id.0].is_array = bounds.is_some();
                }
            }
            Some("const") => self.constants(&tokens[1..], member, Accessibility::Implicit),
            _ => {}
        }
    }
}

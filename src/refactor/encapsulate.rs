//! Encapsulate module-level fields behind property accessors.
//!
//! Each request yields a `Property Get` plus `Let` and/or `Set` accessors,
//! a private backing field (or a member of a private record type) and the
//! renames of every reference. All names are checked for collisions before
//! anything is queued.

use super::model::{EncapsulateFieldModel, FieldEncapsulation};
use super::state_udt::ObjectStateUdt;
use super::{capitalize_first, Indenter, RefactorOutcome};
use crate::ast::VariableStmt;
use crate::error::{RefactorError, Result};
use crate::index::{bare_type_name, DeclarationIndex, ParseSnapshot, ParsedModule};
use crate::rewrite::{queue_slot_rewrites, Fill, LineRange, Rewriter, SlotRewrite};
use crate::source::ModuleSource;
use crate::symbol::{Accessibility, Declaration, DeclarationKind, ModuleId, Span};
use std::collections::{BTreeMap, HashSet};

const INDENT: &str = "    ";
const VALUE_PARAMETER: &str = "RHS";

/// Intrinsic types assigned with `Let`.
const VALUE_TYPES: &[&str] = &[
    "boolean", "byte", "currency", "date", "decimal", "double", "integer", "long", "longlong",
    "longptr", "single", "string",
];

/// How the backing storage is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    Value,
    Record,
    Object,
    Variant,
    Array,
}

#[derive(Debug)]
struct FieldPlan<'s> {
    field: &'s Declaration,
    property: String,
    /// Backing field name, or `state.member` in aggregate mode.
    backing: String,
    read_only: bool,
    storage: Storage,
    type_name: String,
}

/// Encapsulate the requested fields of one module.
///
/// # Arguments
/// * `snapshot` - Parse result the request was made against
/// * `model` - Fields to encapsulate and the optional record aggregate
/// * `indenter` - Indents a synthesized `Type` block; left unindented when `None`
///
/// # Returns
/// `Unchanged` for an empty request set, otherwise the rewritten modules.
///
/// # Errors
/// - `InvalidTargetKind` - a request names something other than a
///   module-level field, or fields of different modules
/// - `NameConflict` - a property, backing field or record name is taken
/// - `InvalidObjectState` - the aggregate belongs to another module, or is
///   itself requested for encapsulation
pub fn encapsulate_fields(
    snapshot: &ParseSnapshot,
    model: &EncapsulateFieldModel,
    indenter: Option<&dyn Indenter>,
) -> Result<RefactorOutcome> {
    if model.requests.is_empty() {
        return Ok(RefactorOutcome::unchanged());
    }

    let fields = resolve_fields(snapshot, &model.requests)?;
    let module = fields[0].module.clone();
    let parsed = snapshot.require_module(&module)?;
    let state = model.object_state.as_ref();
    let plans = plan_fields(snapshot.index(), &module, &model.requests, &fields, state)?;

    let mut rewriter = Rewriter::new(snapshot);
    if let Err(err) = queue_edits(snapshot, parsed, &plans, state, indenter, &mut rewriter) {
        rewriter.discard();
        return Err(err);
    }

    Ok(RefactorOutcome {
        result: rewriter.commit(),
        skipped: Vec::new(),
    })
}

fn resolve_fields<'s>(
    snapshot: &'s ParseSnapshot,
    requests: &[FieldEncapsulation],
) -> Result<Vec<&'s Declaration>> {
    let index = snapshot.index();
    let mut fields: Vec<&Declaration> = Vec::with_capacity(requests.len());
    for request in requests {
        let field = snapshot.declaration(request.field)?;
        let module_scope = index.module_declaration(&field.module).map(|d| d.id);
        if field.kind != DeclarationKind::Variable {
            return Err(RefactorError::InvalidTargetKind {
                name: field.qualified_name(),
                kind: field.kind.to_string(),
            });
        }
        if module_scope.is_none() || field.parent_scope != module_scope {
            return Err(RefactorError::InvalidTargetKind {
                name: field.qualified_name(),
                kind: "local variable".to_string(),
            });
        }
        if let Some(first) = fields.first() {
            if first.module != field.module {
                return Err(RefactorError::InvalidTargetKind {
                    name: field.qualified_name(),
                    kind: format!("field outside {}", first.module.component()),
                });
            }
        }
        if fields.iter().any(|f| f.id == field.id) {
            return Err(RefactorError::NameConflict {
                name: field.name.clone(),
                module: field.module.to_string(),
            });
        }
        fields.push(field);
    }
    Ok(fields)
}

fn plan_fields<'s>(
    index: &DeclarationIndex,
    module: &ModuleId,
    requests: &[FieldEncapsulation],
    fields: &[&'s Declaration],
    state: Option<&ObjectStateUdt>,
) -> Result<Vec<FieldPlan<'s>>> {
    let conflict = |name: &str| RefactorError::NameConflict {
        name: name.to_string(),
        module: module.to_string(),
    };

    if let Some(state) = state {
        if state.module() != module {
            return Err(RefactorError::InvalidObjectState(format!(
                "{} belongs to {}, the fields to {}",
                state.type_name(),
                state.module(),
                module
            )));
        }
        if fields.iter().any(|f| Some(f.id) == state.existing_field()) {
            return Err(RefactorError::InvalidObjectState(format!(
                "'{}' holds the object state and cannot be encapsulated",
                state.field_name()
            )));
        }
        if !state.is_existing() {
            for name in [state.type_name(), state.field_name()] {
                let taken = index
                    .find_in_module(module, name)
                    .into_iter()
                    .any(|d| !fields.iter().any(|f| f.id == d.id));
                if taken {
                    return Err(conflict(name));
                }
            }
        }
    }

    let members = index.members_of(module);
    let taken = |name: &str, own: &Declaration| members.iter().any(|d| d.id != own.id && d.is_named(name));
    let mut chosen: HashSet<String> = HashSet::new();
    let mut plans = Vec::with_capacity(requests.len());

    for (request, field) in requests.iter().zip(fields.iter().copied()) {
        let property = request
            .property_name
            .clone()
            .unwrap_or_else(|| capitalize_first(&field.name));
        if property.is_empty() || taken(&property, field) || !chosen.insert(property.to_ascii_lowercase()) {
            return Err(conflict(&property));
        }

        let backing = match state {
            Some(state) => {
                if let Some(type_id) = state.existing_type() {
                    let duplicate = index.find(&property).into_iter().any(|d| {
                        d.kind == DeclarationKind::UserDefinedTypeMember && d.parent_scope == Some(type_id)
                    });
                    if duplicate {
                        return Err(conflict(&property));
                    }
                }
                state.member_access(&property)
            }
            None => {
                let backing = if property.eq_ignore_ascii_case(&field.name) {
                    (1..)
                        .map(|suffix| format!("{}{}", field.name, suffix))
                        .find(|candidate| {
                            !taken(candidate, field) && !chosen.contains(&candidate.to_ascii_lowercase())
                        })
                        .unwrap_or_else(|| format!("{}1", field.name))
                } else {
                    field.name.clone()
                };
                if !chosen.insert(backing.to_ascii_lowercase()) {
                    return Err(conflict(&backing));
                }
                backing
            }
        };

        let (storage, type_name) = classify(index, field);
        log::debug!(
            "encapsulating {} as {} backed by {} ({:?})",
            field.qualified_name(),
            property,
            backing,
            storage
        );
        plans.push(FieldPlan {
            field,
            property,
            backing,
            read_only: request.read_only || storage == Storage::Array,
            storage,
            type_name,
        });
    }
    Ok(plans)
}

fn classify(index: &DeclarationIndex, field: &Declaration) -> (Storage, String) {
    let declared = field.as_type_name.as_deref().unwrap_or("Variant");
    // `String * 10` is returned as `String`.
    let type_name = declared.split('*').next().unwrap_or(declared).trim().to_string();
    if field.is_array {
        return (Storage::Array, "Variant".to_string());
    }
    let lowered = type_name.to_ascii_lowercase();
    let storage = if lowered == "variant" {
        Storage::Variant
    } else if VALUE_TYPES.contains(&lowered.as_str()) {
        Storage::Value
    } else {
        let project_type = index
            .find(bare_type_name(&type_name))
            .into_iter()
            .find(|d| matches!(d.kind, DeclarationKind::UserDefinedType | DeclarationKind::Enumeration));
        match project_type.map(|d| d.kind) {
            Some(DeclarationKind::UserDefinedType) => Storage::Record,
            Some(_) => Storage::Value,
            None => Storage::Object,
        }
    };
    (storage, type_name)
}

fn queue_edits(
    snapshot: &ParseSnapshot,
    parsed: &ParsedModule,
    plans: &[FieldPlan<'_>],
    state: Option<&ObjectStateUdt>,
    indenter: Option<&dyn Indenter>,
    rewriter: &mut Rewriter<'_>,
) -> Result<()> {
    let source = &parsed.source;
    let module = source.id();
    let text = source.text();
    let missing = |plan: &FieldPlan<'_>, element: &str| RefactorError::MissingSyntaxElement {
        module: module.to_string(),
        line: plan.field.selection.line_start,
        element: element.to_string(),
    };

    let mut statements: BTreeMap<usize, &VariableStmt> = BTreeMap::new();
    let mut record_members = Vec::with_capacity(plans.len());
    for plan in plans {
        let statement = parsed
            .ast
            .field_statement(plan.field.id)
            .ok_or_else(|| missing(plan, "field declaration"))?;
        statements.insert(statement.extent.span.start, statement);
        if state.is_some() {
            let declarator = statement
                .declarators
                .iter()
                .find(|d| d.declaration == plan.field.id)
                .ok_or_else(|| missing(plan, "declarator"))?;
            let rest = Span::new(plan.field.selection.span.end, declarator.span.end).text(text);
            let mut member = format!("{}{}", plan.property, rest.trim_end());
            if plan.field.as_type_name.is_none() {
                member.push_str(" As Variant");
            }
            record_members.push(member);
        }
    }

    // Declarations section: backing fields and the record type.
    let mut record_block = None;
    if let Some(state) = state {
        let mut state = state.clone();
        state.add_members(record_members.iter().cloned());
        if state.is_existing() {
            queue_existing_members(snapshot, parsed, &state, &record_members, rewriter)?;
        } else {
            let mut block = state.type_block(indenter);
            block.push(state.field_declaration());
            record_block = Some(block);
        }
    }
    for (position, statement) in statements.values().enumerate() {
        let mut lines = statement_lines(source, statement, plans, state.is_some());
        if position == 0 {
            if let Some(block) = record_block.take() {
                lines.extend(block);
            }
        }
        let range = LineRange::new(statement.extent.line_start, statement.extent.line_end);
        let original: Vec<&str> = (range.start..=range.end).map(|l| source.line_text(l)).collect();
        if lines.is_empty() {
            rewriter.queue_delete(module, range)?;
        } else if lines != original {
            rewriter.queue_replace(module, range, lines.join("\n"))?;
        }
    }

    // Accessors.
    let blocks: Vec<String> = plans
        .iter()
        .flat_map(property_blocks)
        .map(|block| block.join("\n"))
        .collect();
    let accessors = blocks.join("\n\n");
    match parsed.ast.first_procedure() {
        Some(first) => rewriter.queue_insert(module, first.extent.line_start, format!("{}\n", accessors))?,
        None => rewriter.queue_insert(module, source.line_count() + 1, format!("\n{}", accessors))?,
    }

    // References.
    let mut renames: BTreeMap<ModuleId, Vec<SlotRewrite>> = BTreeMap::new();
    for plan in plans {
        for reference in snapshot.index().references_of(plan.field.id) {
            let (span, replacement) = if &reference.module == module {
                let span = if state.is_some() {
                    reference.qualified.span
                } else {
                    reference.selection.span
                };
                (span, plan.backing.as_str())
            } else {
                (reference.selection.span, plan.property.as_str())
            };
            let using = snapshot.require_module(&reference.module)?;
            if span.text(using.source.text()) == replacement {
                continue;
            }
            renames.entry(reference.module.clone()).or_default().push(SlotRewrite {
                region: span,
                slots: vec![span],
                fills: vec![Fill::Literal(replacement.to_string())],
                collapse: false,
            });
        }
    }
    for (using, rewrites) in renames {
        let using = snapshot.require_module(&using)?;
        queue_slot_rewrites(rewriter, &using.source, rewrites)?;
    }
    Ok(())
}

/// New lines of a field statement with the encapsulated declarators moved out.
///
/// Declarators that stay keep the original keywords. In aggregate mode the
/// encapsulated declarators disappear; otherwise each becomes a private
/// backing field on its own line.
fn statement_lines(
    source: &ModuleSource,
    statement: &VariableStmt,
    plans: &[FieldPlan<'_>],
    aggregate: bool,
) -> Vec<String> {
    let text = source.text();
    let keywords = statement.keywords.text(text);
    let mut kept = Vec::new();
    let mut moved = Vec::new();
    for declarator in &statement.declarators {
        match plans.iter().find(|p| p.field.id == declarator.declaration) {
            None => kept.push(declarator.span.text(text)),
            Some(_) if aggregate => {}
            Some(plan) => {
                let rest = Span::new(plan.field.selection.span.end, declarator.span.end).text(text);
                let with_events = if plan.field.is_with_events { "WithEvents " } else { "" };
                moved.push(format!(
                    "{} {}{}{}",
                    Accessibility::Private.token(),
                    with_events,
                    plan.backing,
                    rest
                ));
            }
        }
    }

    let mut lines = Vec::with_capacity(moved.len() + 1);
    if !kept.is_empty() {
        lines.push(format!("{} {}", keywords, kept.join(", ")));
    }
    lines.extend(moved);

    let first_line_start = source.line_start(statement.extent.line_start);
    let last_line_end = source.line_end(statement.extent.line_end);
    let prefix = &text[first_line_start..statement.extent.span.start.max(first_line_start)];
    let suffix = &text[statement.extent.span.end.min(last_line_end)..last_line_end];
    match (lines.first_mut(), suffix.trim().is_empty()) {
        (Some(first), _) => {
            first.insert_str(0, prefix);
            if let Some(last) = lines.last_mut() {
                last.push_str(suffix);
            }
        }
        (None, false) => lines.push(format!("{}{}", prefix, suffix.trim_start())),
        (None, true) => {}
    }
    lines
}

fn queue_existing_members(
    snapshot: &ParseSnapshot,
    parsed: &ParsedModule,
    state: &ObjectStateUdt,
    members: &[String],
    rewriter: &mut Rewriter<'_>,
) -> Result<()> {
    let source = &parsed.source;
    let type_id = state
        .existing_type()
        .ok_or_else(|| RefactorError::InvalidObjectState(state.type_name().to_string()))?;
    let line = snapshot.declaration(type_id)?.selection.line_start;
    let block = parsed.ast.type_block(type_id).ok_or_else(|| RefactorError::MissingSyntaxElement {
        module: source.id().to_string(),
        line,
        element: format!("Type {} block", state.type_name()),
    })?;
    let indent: String = block
        .members
        .first()
        .map(|member| {
            source
                .line_text(member.extent.line_start)
                .chars()
                .take_while(|c| c.is_whitespace())
                .collect()
        })
        .unwrap_or_else(|| INDENT.to_string());
    let lines: Vec<String> = members.iter().map(|member| format!("{}{}", indent, member)).collect();
    rewriter.queue_insert(source.id(), block.end_line, lines.join("\n"))
}

fn property_blocks(plan: &FieldPlan<'_>) -> Vec<Vec<String>> {
    let mut blocks = vec![getter(plan)];
    if plan.read_only {
        return blocks;
    }
    match plan.storage {
        Storage::Value | Storage::Record => blocks.push(letter(plan)),
        Storage::Object => blocks.push(setter(plan)),
        Storage::Variant => {
            blocks.push(letter(plan));
            blocks.push(setter(plan));
        }
        Storage::Array => {}
    }
    blocks
}

fn getter(plan: &FieldPlan<'_>) -> Vec<String> {
    let (property, backing) = (&plan.property, &plan.backing);
    let mut lines = vec![format!("Public Property Get {}() As {}", property, plan.type_name)];
    match plan.storage {
        Storage::Object => lines.push(format!("{}Set {} = {}", INDENT, property, backing)),
        Storage::Variant => lines.extend([
            format!("{}If IsObject({}) Then", INDENT, backing),
            format!("{0}{0}Set {1} = {2}", INDENT, property, backing),
            format!("{}Else", INDENT),
            format!("{0}{0}{1} = {2}", INDENT, property, backing),
            format!("{}End If", INDENT),
        ]),
        Storage::Value | Storage::Record | Storage::Array => {
            lines.push(format!("{}{} = {}", INDENT, property, backing))
        }
    }
    lines.push("End Property".to_string());
    lines
}

fn letter(plan: &FieldPlan<'_>) -> Vec<String> {
    // User-defined types cannot be passed ByVal.
    let passing = if plan.storage == Storage::Record { "ByRef" } else { "ByVal" };
    vec![
        format!(
            "Public Property Let {}({} {} As {})",
            plan.property, passing, VALUE_PARAMETER, plan.type_name
        ),
        format!("{}{} = {}", INDENT, plan.backing, VALUE_PARAMETER),
        "End Property".to_string(),
    ]
}

fn setter(plan: &FieldPlan<'_>) -> Vec<String> {
    vec![
        format!(
            "Public Property Set {}(ByVal {} As {})",
            plan.property, VALUE_PARAMETER, plan.type_name
        ),
        format!("{}Set {} = {}", INDENT, plan.backing, VALUE_PARAMETER),
        "End Property".to_string(),
    ]
}

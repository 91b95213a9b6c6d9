//! Reorder the parameters of a member and every call site.
//!
//! The planner walks the affected closure once (accessor siblings, interface
//! implementations, event handlers), turns every signature and argument list
//! into a [`SlotRewrite`] and queues all of them before committing. Nothing
//! is queued until every precondition holds.

use super::model::{Permutation, ReorderParametersModel};
use super::{ChooseTarget, Confirm, RefactorOutcome, SkippedSite};
use crate::ast::ArgumentKind;
use crate::error::{OrderRule, RefactorError, Result};
use crate::index::{DeclarationIndex, IdentifierReference, ParseSnapshot, ReferenceContext};
use crate::resolve::ReferenceLocator;
use crate::rewrite::{queue_slot_rewrites, Fill, Rewriter, SlotRewrite};
use crate::symbol::{Declaration, DeclarationKind, ModuleId};
use crate::validate::validate_order;
use std::collections::BTreeMap;

/// Reorder the parameters of `model.target`.
///
/// # Arguments
/// * `snapshot` - Parse result the request was made against
/// * `model` - Target and requested order
/// * `confirm` - Asked once when the target implements one interface member
/// * `choose` - Asked when the target implements several interface members
///
/// # Returns
/// The new text of every changed module, plus the call sites that had to be
/// left alone. An identity order returns `Unchanged` without asking anything.
///
/// # Errors
/// - `InvalidTargetKind` - target is not a procedure, function, property or event
/// - `InvalidParameterOrder` - the order is not a permutation, or breaks the
///   optional/ParamArray rules
/// - `UserAborted` - the interface prompt was declined
/// - `AmbiguousAccessorState` / `MirrorMismatch` - a sibling or mirror cannot
///   be matched to the target's parameter list
pub fn reorder_parameters(
    snapshot: &ParseSnapshot,
    model: &ReorderParametersModel,
    confirm: &dyn Confirm,
    choose: &dyn ChooseTarget,
) -> Result<RefactorOutcome> {
    let index = snapshot.index();
    let target = snapshot.declaration(model.target)?;
    check_target_kind(target)?;

    let permutation = &model.permutation;
    let reorderable = target.reorderable_parameters();
    if permutation.len() != reorderable.len() {
        return Err(RefactorError::InvalidParameterOrder {
            rule: OrderRule::NotAPermutation {
                expected: reorderable.len(),
                found: permutation.new_to_old().to_vec(),
            },
        });
    }
    if permutation.is_identity() {
        log::debug!("{}: identity order, nothing to do", target.qualified_name());
        return Ok(RefactorOutcome::unchanged());
    }
    validate_order(reorderable, permutation)
        .map_err(|rule| RefactorError::InvalidParameterOrder { rule })?;

    let target = retarget_interface(index, target, confirm, choose)?;
    let sites = ReferenceLocator::new(index).usage_sites(target)?;

    let mut planned: BTreeMap<ModuleId, Vec<SlotRewrite>> = BTreeMap::new();
    let mut skipped = Vec::new();
    for site in sites {
        let declaration = site.declaration;
        let Some(reference) = site.reference else {
            log::debug!("planning {} as {:?}", declaration.qualified_name(), site.role);
            planned
                .entry(declaration.module.clone())
                .or_default()
                .push(signature_rewrite(snapshot, declaration, permutation)?);
            continue;
        };

        match call_site_rewrite(declaration, reference, permutation) {
            Ok(Some(rewrite)) => planned.entry(reference.module.clone()).or_default().push(rewrite),
            Ok(None) => {}
            Err(err @ RefactorError::MissingSyntaxElement { .. }) => {
                log::warn!("Skipping call site: {}", err);
                skipped.push(SkippedSite {
                    module: reference.module.clone(),
                    line: reference.selection.line_start,
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    let mut rewriter = Rewriter::new(snapshot);
    for (module, rewrites) in planned {
        let parsed = snapshot.require_module(&module)?;
        if let Err(err) = queue_slot_rewrites(&mut rewriter, &parsed.source, rewrites) {
            rewriter.discard();
            return Err(err);
        }
    }

    Ok(RefactorOutcome {
        result: rewriter.commit(),
        skipped,
    })
}

fn check_target_kind(target: &Declaration) -> Result<()> {
    match target.kind {
        DeclarationKind::Event
        | DeclarationKind::Function
        | DeclarationKind::Procedure
        | DeclarationKind::PropertyGet
        | DeclarationKind::PropertyLet
        | DeclarationKind::PropertySet => Ok(()),
        other => Err(RefactorError::InvalidTargetKind {
            name: target.qualified_name(),
            kind: other.to_string(),
        }),
    }
}

/// Move the request to the interface member a target implements.
fn retarget_interface<'s>(
    index: &'s DeclarationIndex,
    target: &'s Declaration,
    confirm: &dyn Confirm,
    choose: &dyn ChooseTarget,
) -> Result<&'s Declaration> {
    let members = index.interface_members_of(target.id);
    match members.as_slice() {
        [] => Ok(target),
        [member] => {
            let message = format!(
                "{} implements {}. Modify the interface member and all of its implementations?",
                target.qualified_name(),
                member.qualified_name()
            );
            if confirm.confirm(&message) {
                Ok(*member)
            } else {
                Err(RefactorError::UserAborted)
            }
        }
        _ => {
            let message = format!(
                "{} implements several interface members. Choose the member to modify.",
                target.qualified_name()
            );
            let chosen = choose
                .choose(&message, &members)
                .ok_or(RefactorError::UserAborted)?;
            members
                .iter()
                .copied()
                .find(|member| member.id == chosen)
                .ok_or(RefactorError::UserAborted)
        }
    }
}

fn signature_rewrite(
    snapshot: &ParseSnapshot,
    declaration: &Declaration,
    permutation: &Permutation,
) -> Result<SlotRewrite> {
    let missing = |element: &str| RefactorError::MissingSyntaxElement {
        module: declaration.module.to_string(),
        line: declaration.selection.line_start,
        element: element.to_string(),
    };
    let node = snapshot
        .member_node(declaration.id)
        .ok_or_else(|| missing("member signature"))?;
    let arg_list = node.arg_list().ok_or_else(|| missing("parameter list"))?;
    if arg_list.params.len() != declaration.parameters.len() {
        return Err(missing("parameter"));
    }

    let reorderable = declaration.reorderable_parameters().len();
    if reorderable != permutation.len() {
        return Err(RefactorError::MirrorMismatch {
            name: declaration.qualified_name(),
            expected: permutation.len(),
            found: reorderable,
        });
    }

    // The value parameter of Let/Set stays in place after the moved ones.
    let mut fills: Vec<Fill> = (0..reorderable)
        .map(|new| Fill::Source(arg_list.params[permutation.source_of(new)]))
        .collect();
    fills.extend(arg_list.params[reorderable..].iter().map(|span| Fill::Source(*span)));

    Ok(SlotRewrite {
        region: arg_list.extent.span,
        slots: arg_list.params.clone(),
        fills,
        collapse: arg_list.extent.line_start != arg_list.extent.line_end,
    })
}

fn call_site_rewrite(
    declaration: &Declaration,
    reference: &IdentifierReference,
    permutation: &Permutation,
) -> Result<Option<SlotRewrite>> {
    if reference.context == ReferenceContext::ReturnValue {
        return Ok(None);
    }
    let missing = |element: &str| RefactorError::MissingSyntaxElement {
        module: reference.module.to_string(),
        line: reference.selection.line_start,
        element: element.to_string(),
    };
    let arguments = reference
        .argument_list()
        .ok_or_else(|| missing("argument list"))?;
    if arguments.is_empty() || arguments.all_named() {
        return Ok(None);
    }
    if arguments.has_named() {
        return Err(missing("positional argument list (named and positional arguments are mixed)"));
    }

    let params = declaration.reorderable_parameters();
    let fixed = match params.last() {
        Some(last) if last.is_param_array => params.len() - 1,
        _ => params.len(),
    };
    let fill_of = |position: usize| match arguments.arguments.get(position) {
        Some(argument) if argument.kind != ArgumentKind::Missing => Fill::Source(argument.span),
        _ => Fill::Empty,
    };

    // ParamArray arguments (and any surplus) keep their relative order at the tail.
    let mut fills: Vec<Fill> = (0..fixed).map(|new| fill_of(permutation.source_of(new))).collect();
    fills.extend((fixed..arguments.arguments.len()).map(fill_of));
    while fills.last() == Some(&Fill::Empty) {
        fills.pop();
    }
    // A leading gap is only legal when the omitted argument is optional.
    let required = params.iter().filter(|p| !p.is_optional && !p.is_param_array).count();
    if arguments.arguments.len() < required && fills.first() == Some(&Fill::Empty) {
        return Err(missing("argument for a required parameter"));
    }

    Ok(Some(SlotRewrite {
        region: arguments.extent,
        slots: arguments.arguments.iter().map(|argument| argument.span).collect(),
        fills,
        collapse: false,
    }))
}

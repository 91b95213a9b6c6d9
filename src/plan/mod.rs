//! JSON plan format for sequential multi-step refactorings.
//!
//! A plan lists reorder and encapsulate steps. Steps run in order, each
//! against a snapshot freshly parsed from the texts produced by the previous
//! steps. Nothing is written until every step succeeded; the merged result
//! is handed back to the caller.
//!
//! ```json
//! {
//!   "steps": [
//!     {"action": "reorder", "target": "Module1.Foo", "order": ["c", "a", "b"]},
//!     {"action": "encapsulate", "module": "Class1",
//!      "fields": [{"field": "fizz", "property": "Name"}]}
//!   ]
//! }
//! ```

use crate::error::{RefactorError, Result};
use crate::index::ParseSnapshot;
use crate::ingest::snapshot_from_sources;
use crate::refactor::{
    encapsulate_fields, reorder_parameters, BlockIndenter, Confirm, EncapsulateFieldModel,
    FieldEncapsulation, Indenter, ObjectStateUdt, RefactorOutcome, ReorderParametersModel, SkippedSite,
};
use crate::resolve::{parse_kind, resolve_target};
use crate::rewrite::RefactorResult;
use crate::source::ModuleSource;
use crate::symbol::{Declaration, DeclarationId, DeclarationKind, ModuleId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A refactoring plan containing sequential steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Steps to execute in order.
    pub steps: Vec<PlanStep>,
}

/// One refactoring request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum PlanStep {
    /// Reorder the parameters of a member.
    Reorder(ReorderStep),
    /// Encapsulate fields of a module.
    Encapsulate(EncapsulateStep),
}

impl PlanStep {
    /// Action name as written in the plan.
    pub fn action(&self) -> &'static str {
        match self {
            PlanStep::Reorder(_) => "reorder",
            PlanStep::Encapsulate(_) => "encapsulate",
        }
    }
}

/// `{"action": "reorder", ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderStep {
    /// `Member` or `Module.Member`.
    pub target: String,
    /// Optional kind filter (`sub`, `function`, `get`, `let`, `set`, `event`).
    #[serde(default)]
    pub kind: Option<String>,
    /// Parameter names in their new order (value parameters excluded).
    pub order: Vec<String>,
    /// Interface to retarget to when the member implements several.
    #[serde(default)]
    pub interface: Option<String>,
}

/// `{"action": "encapsulate", ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncapsulateStep {
    /// Module declaring the fields.
    pub module: String,
    /// Fields in insertion order.
    pub fields: Vec<FieldStep>,
    /// Aggregate the backing storage into a private record type.
    #[serde(default)]
    pub object_state: Option<ObjectStateStep>,
    /// Indent members of a synthesized record type.
    #[serde(default)]
    pub indent: bool,
}

/// One field of an encapsulate step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldStep {
    /// Field name.
    pub field: String,
    /// Property name; defaults to the capitalized field name.
    #[serde(default)]
    pub property: Option<String>,
    /// Generate the getter only.
    #[serde(default)]
    pub read_only: bool,
}

/// Record aggregate of an encapsulate step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectStateStep {
    /// Existing private field of a module-local type; a new `T<Module>` type
    /// with field `this` is synthesized when absent.
    #[serde(default)]
    pub existing: Option<String>,
}

/// Report for one executed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// 1-based step number.
    pub step: usize,
    /// Action name.
    pub action: String,
    /// Modules the step changed.
    pub modules: Vec<String>,
    /// Call sites the step left alone.
    pub skipped: Vec<SkippedSite>,
}

/// Outcome of a whole plan.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    /// Per-step reports.
    pub steps: Vec<StepReport>,
    /// Final text of every module that differs from the input.
    pub result: RefactorResult,
}

/// Parse a plan from a JSON file.
///
/// # Errors
/// `InvalidPlanSchema` for malformed JSON, an empty plan or steps with
/// empty targets, empty field lists or unknown kinds.
pub fn parse_plan(plan_path: &Path) -> Result<Plan> {
    let content = fs::read_to_string(plan_path).map_err(|e| RefactorError::Io {
        path: plan_path.to_path_buf(),
        source: e,
    })?;
    parse_plan_str(&content)
}

/// Parse a plan from JSON text. See [`parse_plan`].
pub fn parse_plan_str(content: &str) -> Result<Plan> {
    let plan: Plan = serde_json::from_str(content).map_err(|e| RefactorError::InvalidPlanSchema {
        message: format!("JSON parse error: {}", e),
    })?;

    if plan.steps.is_empty() {
        return Err(RefactorError::InvalidPlanSchema {
            message: "Plan must contain at least one step".to_string(),
        });
    }

    for (i, step) in plan.steps.iter().enumerate() {
        let invalid = |message: String| RefactorError::InvalidPlanSchema {
            message: format!("Step {} {}", i + 1, message),
        };
        match step {
            PlanStep::Reorder(reorder) => {
                if reorder.target.is_empty() {
                    return Err(invalid("has empty 'target' field".to_string()));
                }
                if let Some(kind) = &reorder.kind {
                    parse_kind(kind).map_err(|_| invalid(format!("has invalid 'kind': '{}'", kind)))?;
                }
            }
            PlanStep::Encapsulate(encapsulate) => {
                if encapsulate.module.is_empty() {
                    return Err(invalid("has empty 'module' field".to_string()));
                }
                if encapsulate.fields.iter().any(|f| f.field.is_empty()) {
                    return Err(invalid("has a field with an empty name".to_string()));
                }
            }
        }
    }

    Ok(plan)
}

/// Run every step of a plan against in-memory texts.
///
/// # Arguments
/// * `sources` - Module texts the plan starts from
/// * `plan` - Steps to run
/// * `confirm` - Answers interface retargeting prompts
///
/// # Errors
/// `PlanExecutionFailed` naming the first failing step; no text is written.
pub fn execute_plan(sources: Vec<ModuleSource>, plan: &Plan, confirm: &dyn Confirm) -> Result<PlanOutcome> {
    let originals: BTreeMap<ModuleId, String> = sources
        .iter()
        .map(|source| (source.id().clone(), source.text().to_string()))
        .collect();
    let mut current = sources;
    let mut reports = Vec::with_capacity(plan.steps.len());

    for (position, step) in plan.steps.iter().enumerate() {
        let step_number = position + 1;
        let failed = |err: RefactorError| RefactorError::PlanExecutionFailed {
            step: step_number,
            error: err.to_string(),
        };
        let snapshot = snapshot_from_sources(current.clone()).map_err(failed)?;
        let outcome = run_step(&snapshot, step, confirm).map_err(failed)?;
        log::debug!(
            "step {} ({}): {} modules changed",
            step_number,
            step.action(),
            outcome.result.modules().len()
        );

        reports.push(StepReport {
            step: step_number,
            action: step.action().to_string(),
            modules: outcome.result.modules().iter().map(|m| m.to_string()).collect(),
            skipped: outcome.skipped,
        });
        for source in current.iter_mut() {
            if let Some(text) = outcome.result.module_text(source.id()) {
                *source = ModuleSource::new(source.id().clone(), source.kind(), text);
            }
        }
    }

    let changed: BTreeMap<ModuleId, String> = current
        .into_iter()
        .filter(|source| originals.get(source.id()).map(String::as_str) != Some(source.text()))
        .map(|source| (source.id().clone(), source.text().to_string()))
        .collect();
    let result = if changed.is_empty() {
        RefactorResult::Unchanged
    } else {
        RefactorResult::Rewritten(changed)
    };

    Ok(PlanOutcome {
        steps: reports,
        result,
    })
}

/// Run one step against a snapshot.
pub fn run_step(snapshot: &ParseSnapshot, step: &PlanStep, confirm: &dyn Confirm) -> Result<RefactorOutcome> {
    match step {
        PlanStep::Reorder(reorder) => run_reorder(snapshot, reorder, confirm),
        PlanStep::Encapsulate(encapsulate) => run_encapsulate(snapshot, encapsulate),
    }
}

fn run_reorder(snapshot: &ParseSnapshot, step: &ReorderStep, confirm: &dyn Confirm) -> Result<RefactorOutcome> {
    let kind = step.kind.as_deref().map(parse_kind).transpose()?;
    let target = resolve_target(snapshot.index(), &step.target, kind)?;
    let names: Vec<&str> = step.order.iter().map(String::as_str).collect();
    let model = ReorderParametersModel::by_names(target, &names)?;

    let interface = step.interface.clone();
    let choose = move |_: &str, candidates: &[&Declaration]| -> Option<DeclarationId> {
        let wanted = interface.as_deref()?;
        candidates
            .iter()
            .find(|c| c.module.component().eq_ignore_ascii_case(wanted))
            .map(|c| c.id)
    };
    reorder_parameters(snapshot, &model, confirm, &choose)
}

fn run_encapsulate(snapshot: &ParseSnapshot, step: &EncapsulateStep) -> Result<RefactorOutcome> {
    let index = snapshot.index();
    let module = index
        .module_named(&step.module)
        .ok_or_else(|| RefactorError::ModuleNotFound(step.module.clone()))?
        .module
        .clone();
    let field = |name: &str| index.resolve_member(Some(module.component()), name, Some(DeclarationKind::Variable));

    let requests = step
        .fields
        .iter()
        .map(|request| -> Result<FieldEncapsulation> {
            let declaration = field(&request.field)?;
            let encapsulation = FieldEncapsulation::new(declaration.id).read_only(request.read_only);
            Ok(match &request.property {
                Some(property) => encapsulation.named(property.as_str()),
                None => encapsulation,
            })
        })
        .collect::<Result<Vec<FieldEncapsulation>>>()?;

    let mut model = EncapsulateFieldModel::new(requests);
    if let Some(state) = &step.object_state {
        let state = match &state.existing {
            Some(existing) => ObjectStateUdt::from_field(index, field(existing)?.id)?,
            None => ObjectStateUdt::new(&module),
        };
        model = model.with_object_state(state);
    }

    let indenter = BlockIndenter::default();
    encapsulate_fields(snapshot, &model, step.indent.then_some(&indenter as &dyn Indenter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::ModuleKind;

    #[test]
    fn test_parse_valid_plan() {
        let json = r#"{"steps": [
            {"action": "reorder", "target": "Module1.Foo", "kind": "sub", "order": ["b", "a"]},
            {"action": "encapsulate", "module": "Class1", "fields": [{"field": "fizz", "property": "Name"}]}
        ]}"#;
        let plan = parse_plan_str(json).unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].action(), "reorder");
        match &plan.steps[1] {
            PlanStep::Encapsulate(step) => {
                assert_eq!(step.fields[0].property.as_deref(), Some("Name"));
                assert!(!step.fields[0].read_only);
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_schema_errors() {
        let err = parse_plan_str(r#"{"steps": []}"#).unwrap_err();
        assert_eq!(err.kind(), "InvalidPlanSchema");
        let err = parse_plan_str(r#"{"steps": [{"action": "rename", "target": "x"}]}"#).unwrap_err();
        assert_eq!(err.kind(), "InvalidPlanSchema");
        let err = parse_plan_str(r#"{"steps": [{"action": "reorder", "target": "Foo", "kind": "class", "order": []}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Step 1"));
    }

    #[test]
    fn test_steps_see_previous_results() {
        let code = "\
Public Sub Foo(ByVal a As Long, ByVal b As Long)
End Sub
Public Sub Bar()
    Foo 1, 2
End Sub
";
        let id = ModuleId::new("P", "Module1");
        let sources = vec![ModuleSource::new(id.clone(), ModuleKind::Standard, code)];
        let plan = parse_plan_str(
            r#"{"steps": [
                {"action": "reorder", "target": "Foo", "order": ["b", "a"]},
                {"action": "reorder", "target": "Foo", "order": ["a", "b"]}
            ]}"#,
        )
        .unwrap();
        let outcome = execute_plan(sources.clone(), &plan, &|_: &str| false).unwrap();
        assert_eq!(outcome.steps.len(), 2);
        assert_eq!(outcome.steps[0].modules, vec!["P.Module1".to_string()]);
        // The second step sees `b, a` and swaps back, so nothing differs in the end.
        assert!(outcome.result.is_unchanged());

        let failing = parse_plan_str(r#"{"steps": [{"action": "reorder", "target": "Missing", "order": []}]}"#).unwrap();
        let err = execute_plan(sources, &failing, &|_: &str| false).unwrap_err();
        assert_eq!(err.kind(), "PlanExecutionFailed");
    }
}

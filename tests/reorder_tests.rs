//! Integration tests for parameter reordering across modules.

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use vbrewrite::error::OrderRule;
    use vbrewrite::ingest::build_snapshot;
    use vbrewrite::refactor::{reorder_parameters, RefactorOutcome, RefactorResult, ReorderParametersModel};
    use vbrewrite::resolve::resolve_target;
    use vbrewrite::symbol::{Declaration, DeclarationId, DeclarationKind, ModuleId, ModuleKind};
    use vbrewrite::{ParseSnapshot, RefactorError, Result};

    const FOO_MODULE: &str = "\
Public Sub Foo(ByVal a As Long, ByVal b As String, ByVal c As Double)
End Sub

Public Sub Caller()
    Foo 1, \"two\", 3.5
    Call Foo(4, \"five\", 6.5)
End Sub
";

    fn decline(_: &str) -> bool {
        false
    }

    fn accept(_: &str) -> bool {
        true
    }

    fn no_choice(_: &str, _: &[&Declaration]) -> Option<DeclarationId> {
        None
    }

    fn reorder_with(
        snapshot: &ParseSnapshot,
        target: &str,
        kind: Option<DeclarationKind>,
        names: &[&str],
        confirm: &dyn Fn(&str) -> bool,
    ) -> Result<RefactorOutcome> {
        let target = resolve_target(snapshot.index(), target, kind)?;
        let model = ReorderParametersModel::by_names(target, names)?;
        reorder_parameters(snapshot, &model, &confirm, &no_choice)
    }

    fn module(name: &str) -> ModuleId {
        ModuleId::new("Project", name)
    }

    #[test]
    fn test_reorder_declaration_and_calls() {
        let snapshot = build_snapshot("Project", &[("Module1", ModuleKind::Standard, FOO_MODULE)]).unwrap();
        let outcome = reorder_with(&snapshot, "Foo", None, &["c", "a", "b"], &decline).unwrap();

        let text = outcome.result.module_text(&module("Module1")).unwrap();
        assert!(text.contains("Public Sub Foo(ByVal c As Double, ByVal a As Long, ByVal b As String)"));
        assert!(text.contains("    Foo 3.5, 1, \"two\"\n"));
        assert!(text.contains("    Call Foo(6.5, 4, \"five\")\n"));
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_reorder_untyped_parameters() {
        let code = "\
Public Sub Foo(a, b, c)
End Sub

Public Sub Caller()
    Foo 1, 2, 3
End Sub
";
        let snapshot = build_snapshot("Project", &[("Module1", ModuleKind::Standard, code)]).unwrap();
        let outcome = reorder_with(&snapshot, "Foo", None, &["c", "a", "b"], &decline).unwrap();

        let text = outcome.result.module_text(&module("Module1")).unwrap();
        assert_eq!(
            text,
            "Public Sub Foo(c, a, b)\nEnd Sub\n\nPublic Sub Caller()\n    Foo 3, 1, 2\nEnd Sub\n"
        );
    }

    #[test]
    fn test_identity_order_is_a_no_op() {
        let snapshot = build_snapshot("Project", &[("Module1", ModuleKind::Standard, FOO_MODULE)]).unwrap();
        let outcome = reorder_with(&snapshot, "Module1.Foo", None, &["a", "b", "c"], &decline).unwrap();
        assert_eq!(outcome.result, RefactorResult::Unchanged);
    }

    #[test]
    fn test_order_then_inverse_restores_text() {
        let snapshot = build_snapshot("Project", &[("Module1", ModuleKind::Standard, FOO_MODULE)]).unwrap();
        let first = reorder_with(&snapshot, "Foo", None, &["c", "a", "b"], &decline).unwrap();
        let rewritten = first.result.module_text(&module("Module1")).unwrap().to_string();

        let snapshot = build_snapshot("Project", &[("Module1", ModuleKind::Standard, &rewritten)]).unwrap();
        let second = reorder_with(&snapshot, "Foo", None, &["a", "b", "c"], &decline).unwrap();
        assert_eq!(second.result.module_text(&module("Module1")), Some(FOO_MODULE));
    }

    #[test]
    fn test_order_rules_are_enforced() {
        let code = "\
Public Sub Opt(ByVal a As Long, Optional ByVal b As Long = 0)
End Sub
Public Sub Rest(ByVal a As Long, ParamArray more() As Variant)
End Sub
";
        let snapshot = build_snapshot("Project", &[("Module1", ModuleKind::Standard, code)]).unwrap();

        let err = reorder_with(&snapshot, "Opt", None, &["b", "a"], &decline).unwrap_err();
        assert!(matches!(
            err,
            RefactorError::InvalidParameterOrder {
                rule: OrderRule::OptionalNotTrailing { .. }
            }
        ));

        let err = reorder_with(&snapshot, "Rest", None, &["more", "a"], &decline).unwrap_err();
        assert!(matches!(
            err,
            RefactorError::InvalidParameterOrder {
                rule: OrderRule::ParamArrayNotLast { .. }
            }
        ));

        let err = reorder_with(&snapshot, "Opt", None, &["a"], &decline).unwrap_err();
        assert!(matches!(
            err,
            RefactorError::InvalidParameterOrder {
                rule: OrderRule::NotAPermutation { .. }
            }
        ));
    }

    #[test]
    fn test_property_accessors_stay_in_sync() {
        let code = "\
Private mCells As Collection

Public Property Get Cell(ByVal row As Long, ByVal col As Long) As Variant
    Cell = mCells(row * 100 + col)
End Property

Public Property Let Cell(ByVal row As Long, ByVal col As Long, ByVal value As Variant)
    mCells.Add value
End Property
";
        let snapshot = build_snapshot("Project", &[("Grid", ModuleKind::Class, code)]).unwrap();
        let outcome = reorder_with(
            &snapshot,
            "Grid.Cell",
            Some(DeclarationKind::PropertyGet),
            &["col", "row"],
            &decline,
        )
        .unwrap();

        let text = outcome.result.module_text(&module("Grid")).unwrap();
        assert!(text.contains("Public Property Get Cell(ByVal col As Long, ByVal row As Long) As Variant"));
        assert!(text.contains("Public Property Let Cell(ByVal col As Long, ByVal row As Long, ByVal value As Variant)"));
    }

    fn interface_project() -> ParseSnapshot {
        let shape = "\
Public Sub Draw(ByVal x As Long, ByVal y As Long)
End Sub
";
        let circle = "\
Implements IShape

Private Sub IShape_Draw(ByVal x As Long, ByVal y As Long)
End Sub
";
        let main = "\
Public Sub Main()
    Dim shape As IShape
    Set shape = New Circle
    shape.Draw 1, 2
End Sub
";
        build_snapshot(
            "Project",
            &[
                ("IShape", ModuleKind::Class, shape),
                ("Circle", ModuleKind::Class, circle),
                ("Module1", ModuleKind::Standard, main),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_declined_interface_prompt_aborts_everything() {
        let snapshot = interface_project();
        let asked = Cell::new(0);
        let confirm = |_: &str| {
            asked.set(asked.get() + 1);
            false
        };
        let err = reorder_with(&snapshot, "Circle.IShape_Draw", None, &["y", "x"], &confirm).unwrap_err();
        assert_eq!(err.kind(), "UserAborted");
        assert_eq!(asked.get(), 1);
    }

    #[test]
    fn test_accepted_interface_prompt_rewrites_interface_and_callers() {
        let snapshot = interface_project();
        let outcome = reorder_with(&snapshot, "Circle.IShape_Draw", None, &["y", "x"], &accept).unwrap();

        let shape = outcome.result.module_text(&module("IShape")).unwrap();
        assert!(shape.contains("Public Sub Draw(ByVal y As Long, ByVal x As Long)"));
        let circle = outcome.result.module_text(&module("Circle")).unwrap();
        assert!(circle.contains("Private Sub IShape_Draw(ByVal y As Long, ByVal x As Long)"));
        let main = outcome.result.module_text(&module("Module1")).unwrap();
        assert!(main.contains("    shape.Draw 2, 1\n"));
    }

    /// `IA_B_Run` implements both `IA.B_Run` and `IA_B.Run`.
    fn two_candidate_project() -> ParseSnapshot {
        let first = "\
Public Sub B_Run(ByVal x As Long, ByVal y As Long)
End Sub
";
        let second = "\
Public Sub Run(ByVal x As Long, ByVal y As Long)
End Sub
";
        let implementation = "\
Implements IA
Implements IA_B

Private Sub IA_B_Run(ByVal x As Long, ByVal y As Long)
End Sub
";
        build_snapshot(
            "Project",
            &[
                ("IA", ModuleKind::Class, first),
                ("IA_B", ModuleKind::Class, second),
                ("Impl", ModuleKind::Class, implementation),
            ],
        )
        .unwrap()
    }

    fn reorder_choosing(snapshot: &ParseSnapshot, interface: Option<&str>) -> Result<RefactorOutcome> {
        let target = resolve_target(snapshot.index(), "Impl.IA_B_Run", None)?;
        let model = ReorderParametersModel::by_names(target, &["y", "x"])?;
        let offered = Cell::new(0);
        let choose = |_: &str, candidates: &[&Declaration]| -> Option<DeclarationId> {
            offered.set(candidates.len());
            let wanted = interface?;
            candidates
                .iter()
                .find(|c| c.module.component().eq_ignore_ascii_case(wanted))
                .map(|c| c.id)
        };
        let outcome = reorder_parameters(snapshot, &model, &decline, &choose);
        assert_eq!(offered.get(), 2);
        outcome
    }

    #[test]
    fn test_no_choice_among_interfaces_aborts() {
        let snapshot = two_candidate_project();
        let err = reorder_choosing(&snapshot, None).unwrap_err();
        assert_eq!(err.kind(), "UserAborted");
    }

    #[test]
    fn test_chosen_interface_is_rewritten() {
        let snapshot = two_candidate_project();
        let outcome = reorder_choosing(&snapshot, Some("IA_B")).unwrap();

        let chosen = outcome.result.module_text(&module("IA_B")).unwrap();
        assert!(chosen.contains("Public Sub Run(ByVal y As Long, ByVal x As Long)"));
        let implementation = outcome.result.module_text(&module("Impl")).unwrap();
        assert!(implementation.contains("Private Sub IA_B_Run(ByVal y As Long, ByVal x As Long)"));
        assert!(outcome.result.module_text(&module("IA")).is_none());
    }
}

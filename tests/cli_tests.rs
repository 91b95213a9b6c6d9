//! CLI argument parsing tests.

#[cfg(test)]
mod tests {
    use clap::Parser;
    use vbrewrite::cli::{Cli, CliErrorPayload, Commands, FieldSpec, MemberKind};
    use vbrewrite::plan::PlanStep;
    use vbrewrite::RefactorError;

    #[test]
    fn test_reorder_arguments() {
        let cli = Cli::try_parse_from([
            "vbrewrite",
            "reorder",
            "--dir",
            "src",
            "--target",
            "Module1.Foo",
            "--kind",
            "function",
            "--order",
            "c,a,b",
            "--yes",
        ])
        .unwrap();
        assert!(!cli.verbose);

        let Commands::Reorder { order, kind, yes, .. } = &cli.command else {
            panic!("expected reorder, got {:?}", cli.command);
        };
        assert_eq!(order, &["c", "a", "b"]);
        assert_eq!(*kind, Some(MemberKind::Function));
        assert!(*yes);

        match cli.command.to_plan_step() {
            Some(PlanStep::Reorder(step)) => {
                assert_eq!(step.target, "Module1.Foo");
                assert_eq!(step.kind.as_deref(), Some("function"));
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_encapsulate_arguments() {
        let cli = Cli::try_parse_from([
            "vbrewrite",
            "--json",
            "encapsulate",
            "-d",
            ".",
            "--module",
            "Class1",
            "--field",
            "fizz:Name",
            "--field",
            "buzz",
            "--read-only",
            "BUZZ",
            "--object-state",
        ])
        .unwrap();
        assert!(cli.json);

        let Some(PlanStep::Encapsulate(step)) = cli.command.to_plan_step() else {
            panic!("expected encapsulate step");
        };
        assert_eq!(step.module, "Class1");
        assert_eq!(step.fields.len(), 2);
        assert_eq!(step.fields[0].property.as_deref(), Some("Name"));
        assert!(!step.fields[0].read_only);
        assert!(step.fields[1].read_only);
        assert!(step.object_state.is_some_and(|state| state.existing.is_none()));
    }

    #[test]
    fn test_existing_state_requires_object_state() {
        let result = Cli::try_parse_from([
            "vbrewrite",
            "encapsulate",
            "--dir",
            ".",
            "--module",
            "Class1",
            "--field",
            "fizz",
            "--existing-state",
            "mState",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_field_spec() {
        let spec: FieldSpec = "fizz:Name".parse().unwrap();
        assert_eq!(spec.field, "fizz");
        assert_eq!(spec.property.as_deref(), Some("Name"));
        assert!("".parse::<FieldSpec>().is_err());
        assert!("fizz:".parse::<FieldSpec>().is_err());
    }

    #[test]
    fn test_undo_is_not_a_plan_step() {
        let cli = Cli::try_parse_from(["vbrewrite", "undo", "--dir", "."]).unwrap();
        assert!(cli.command.to_plan_step().is_none());
    }

    #[test]
    fn test_error_payload() {
        let payload = CliErrorPayload::from_error(&RefactorError::UserAborted);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["kind"], "UserAborted");
        assert!(json["error"]["hint"].as_str().unwrap().contains("--yes"));
    }
}

//! Integration tests for loading, writing and restoring module files.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use vbrewrite::plan::{execute_plan, parse_plan_str, run_step, PlanStep, ReorderStep};
    use vbrewrite::workspace::{apply_result, load_modules, restore_from_manifest, BackupManifest, BackupWriter};

    const MODULE: &str = "\
Attribute VB_Name = \"Module1\"
Option Explicit

Public Sub Foo(ByVal a As Long, ByVal b As Long)
End Sub

Public Sub Caller()
    Foo 1, 2
End Sub
";

    const CLASS: &str = "\
VERSION 1.0 CLASS
BEGIN
  MultiUse = -1  'True
END
Attribute VB_Name = \"Class1\"
Option Explicit

Public fizz As Integer
";

    fn write_project(root: &Path) {
        fs::write(root.join("Module1.bas"), MODULE).expect("write module");
        fs::write(root.join("Class1.cls"), CLASS).expect("write class");
        fs::write(root.join("README.txt"), "not a module").expect("write readme");
    }

    fn swap_step() -> PlanStep {
        PlanStep::Reorder(ReorderStep {
            target: "Module1.Foo".to_string(),
            kind: None,
            order: vec!["b".to_string(), "a".to_string()],
            interface: None,
        })
    }

    fn no_prompt(_: &str) -> bool {
        false
    }

    #[test]
    fn test_apply_backup_and_undo() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let root = dir.path();
        write_project(root);

        let workspace = load_modules(root, "*").unwrap();
        assert_eq!(workspace.files().count(), 2);

        let outcome = run_step(workspace.snapshot(), &swap_step(), &no_prompt).unwrap();
        let mut backup = BackupWriter::new(root, "reorder", None).unwrap();
        let written = apply_result(&workspace, &outcome.result, Some(&mut backup)).unwrap();
        assert_eq!(written.len(), 1);
        assert_ne!(written[0].before_hash, written[0].after_hash);
        let manifest_path = backup.finalize().unwrap();

        let module = fs::read_to_string(root.join("Module1.bas")).unwrap();
        assert!(module.contains("Public Sub Foo(ByVal b As Long, ByVal a As Long)"));
        assert!(module.contains("    Foo 2, 1\n"));
        assert_eq!(fs::read_to_string(root.join("Class1.cls")).unwrap(), CLASS);

        // Reloading ignores the backup directory.
        let reloaded = load_modules(root, "**/*").unwrap();
        assert_eq!(reloaded.files().count(), 2);

        assert_eq!(BackupManifest::latest(root).unwrap(), Some(manifest_path.clone()));
        let restored = restore_from_manifest(&manifest_path, root).unwrap();
        assert_eq!(restored, 1);
        assert_eq!(fs::read_to_string(root.join("Module1.bas")).unwrap(), MODULE);
    }

    #[test]
    fn test_plan_over_loaded_modules() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let root = dir.path();
        write_project(root);
        let workspace = load_modules(root, "*").unwrap();

        let plan = parse_plan_str(
            r#"{"steps": [
                {"action": "reorder", "target": "Module1.Foo", "order": ["b", "a"]},
                {"action": "encapsulate", "module": "Class1",
                 "fields": [{"field": "fizz", "property": "Name"}]}
            ]}"#,
        )
        .unwrap();
        let sources: Vec<_> = workspace
            .snapshot()
            .modules()
            .values()
            .map(|module| module.source.clone())
            .collect();
        let outcome = execute_plan(sources, &plan, &no_prompt).unwrap();
        assert_eq!(outcome.steps.len(), 2);
        assert_eq!(outcome.result.modules().len(), 2);

        let written = apply_result(&workspace, &outcome.result, None).unwrap();
        assert_eq!(written.len(), 2);
        let class = fs::read_to_string(root.join("Class1.cls")).unwrap();
        assert!(class.contains("Private fizz As Integer"));
        assert!(class.contains("Public Property Get Name() As Integer"));
        assert!(class.starts_with("VERSION 1.0 CLASS\n"));
    }

    #[test]
    fn test_unchanged_result_writes_nothing() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let root = dir.path();
        write_project(root);
        let workspace = load_modules(root, "*.bas").unwrap();

        let identity = PlanStep::Reorder(ReorderStep {
            target: "Foo".to_string(),
            kind: Some("sub".to_string()),
            order: vec!["a".to_string(), "b".to_string()],
            interface: None,
        });
        let outcome = run_step(workspace.snapshot(), &identity, &no_prompt).unwrap();
        assert!(outcome.result.is_unchanged());
        assert!(apply_result(&workspace, &outcome.result, None).unwrap().is_empty());
    }
}

//! vbrewrite CLI binary
//!
//! This is the main entry point for the vbrewrite command-line interface.
//! The CLI is a thin adapter over existing APIs - NO logic is implemented here.

use std::path::Path;
use std::process::ExitCode;

use serde_json::json;
use vbrewrite::cli::{CliErrorPayload, CliSuccessPayload, Commands};
use vbrewrite::plan::PlanStep;
use vbrewrite::refactor::{RefactorResult, SkippedSite};
use vbrewrite::workspace::{self, BackupManifest, BackupWriter, Workspace};
use vbrewrite::RefactorError;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = vbrewrite::cli::parse_args();

    // Initialize logger if verbose
    if cli.verbose {
        env_logger::init();
    }

    // Execute command
    let result = match &cli.command {
        Commands::Reorder {
            dir,
            pattern,
            yes,
            dry_run,
            create_backup,
            operation_id,
            ..
        } => {
            let options = WriteOptions::new(*dry_run, *create_backup, operation_id);
            execute_step(dir, pattern, &cli.command, *yes, options)
        }

        Commands::Encapsulate {
            dir,
            pattern,
            dry_run,
            create_backup,
            operation_id,
            ..
        } => {
            let options = WriteOptions::new(*dry_run, *create_backup, operation_id);
            execute_step(dir, pattern, &cli.command, false, options)
        }

        Commands::Plan {
            dir,
            pattern,
            file,
            yes,
            dry_run,
            create_backup,
            operation_id,
        } => {
            let options = WriteOptions::new(*dry_run, *create_backup, operation_id);
            execute_plan(dir, pattern, file, *yes, options)
        }

        Commands::Undo { dir, manifest } => execute_undo(dir, manifest.as_deref()),
    };

    // Handle result
    match result {
        Ok(payload) => {
            if cli.json {
                print_json(&payload);
            } else {
                println!("{}", payload.message);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            if cli.json {
                print_json(&CliErrorPayload::from_error(&e));
            } else {
                eprintln!("Error: {}", e);
                if let Some(hint) = e.hint() {
                    eprintln!("Hint: {}", hint);
                }
            }
            ExitCode::from(1)
        }
    }
}

fn print_json<T: serde::Serialize>(payload: &T) {
    match serde_json::to_string_pretty(payload) {
        Ok(text) => println!("{}", text),
        Err(err) => eprintln!("Error: failed to serialize output: {}", err),
    }
}

/// How a computed result reaches the disk.
struct WriteOptions {
    dry_run: bool,
    create_backup: bool,
    operation_id: Option<String>,
}

impl WriteOptions {
    fn new(dry_run: bool, create_backup: bool, operation_id: &Option<String>) -> Self {
        Self {
            dry_run,
            create_backup,
            operation_id: operation_id.clone(),
        }
    }
}

/// Answer to interface retargeting prompts.
///
/// Without `--yes` every prompt is declined, which aborts the action.
fn confirmation(yes: bool) -> impl Fn(&str) -> bool {
    move |message: &str| {
        if !yes {
            log::warn!("{} (declined, pass --yes to accept)", message);
        }
        yes
    }
}

/// Execute the reorder or encapsulate command.
///
/// This function is a thin adapter that:
/// 1. Loads and parses the modules of the directory
/// 2. Runs the command as a single plan step
/// 3. Writes (or prints) the rewritten modules
fn execute_step(
    dir: &Path,
    pattern: &str,
    command: &Commands,
    yes: bool,
    options: WriteOptions,
) -> Result<CliSuccessPayload, RefactorError> {
    let step: PlanStep = command
        .to_plan_step()
        .ok_or_else(|| RefactorError::Other("Command is not a refactoring".to_string()))?;

    let workspace = workspace::load_modules(dir, pattern)?;
    let outcome = vbrewrite::plan::run_step(workspace.snapshot(), &step, &confirmation(yes))?;

    write_result(&workspace, step.action(), &outcome.result, &outcome.skipped, options, json!({}))
}

/// Execute the plan command.
///
/// This function is a thin adapter that:
/// 1. Reads the plan.json file
/// 2. Calls execute_plan from the plan module
/// 3. Writes (or prints) the merged result once
fn execute_plan(
    dir: &Path,
    pattern: &str,
    plan_path: &Path,
    yes: bool,
    options: WriteOptions,
) -> Result<CliSuccessPayload, RefactorError> {
    let plan = vbrewrite::plan::parse_plan(plan_path)?;
    let workspace = workspace::load_modules(dir, pattern)?;
    let sources: Vec<_> = workspace
        .snapshot()
        .modules()
        .values()
        .map(|module| module.source.clone())
        .collect();

    let outcome = vbrewrite::plan::execute_plan(sources, &plan, &confirmation(yes))?;
    let skipped: Vec<SkippedSite> = outcome
        .steps
        .iter()
        .flat_map(|report| report.skipped.iter().cloned())
        .collect();

    write_result(
        &workspace,
        "plan",
        &outcome.result,
        &skipped,
        options,
        json!({ "steps": outcome.steps }),
    )
}

fn write_result(
    workspace: &Workspace,
    operation: &str,
    result: &RefactorResult,
    skipped: &[SkippedSite],
    options: WriteOptions,
    mut data: serde_json::Value,
) -> Result<CliSuccessPayload, RefactorError> {
    data["skipped"] = json!(skipped);
    for site in skipped {
        log::warn!("skipped {} line {}: {}", site.module, site.line, site.reason);
    }

    let RefactorResult::Rewritten(texts) = result else {
        return Ok(CliSuccessPayload::with_data(
            format!("{}: no changes", operation),
            data,
        ));
    };

    if options.dry_run {
        let message = texts
            .iter()
            .map(|(module, text)| format!("=== {} ===\n{}", module, text))
            .collect::<Vec<_>>()
            .join("\n");
        data["modules"] = json!(texts
            .iter()
            .map(|(module, text)| (module.to_string(), text.clone()))
            .collect::<std::collections::BTreeMap<_, _>>());
        return Ok(CliSuccessPayload::with_data(message, data));
    }

    let mut backup = if options.create_backup {
        Some(BackupWriter::new(workspace.root(), operation, options.operation_id)?)
    } else {
        None
    };
    let files = workspace::apply_result(workspace, result, backup.as_mut())?;
    if let Some(writer) = backup {
        let manifest = writer.finalize()?;
        data["backup_manifest"] = json!(manifest);
    }
    data["files"] = json!(files);

    Ok(CliSuccessPayload::with_data(
        format!(
            "{}: rewrote {} module(s), skipped {} site(s)",
            operation,
            files.len(),
            skipped.len()
        ),
        data,
    ))
}

/// Execute the undo command.
fn execute_undo(dir: &Path, manifest: Option<&Path>) -> Result<CliSuccessPayload, RefactorError> {
    let manifest_path = match manifest {
        Some(path) => path.to_path_buf(),
        None => BackupManifest::latest(dir)?.ok_or_else(|| {
            RefactorError::Other(format!("No backup found under {}", dir.display()))
        })?,
    };

    let restored = workspace::restore_from_manifest(&manifest_path, dir)?;
    Ok(CliSuccessPayload::message_only(format!(
        "Restored {} file(s) from {}",
        restored,
        manifest_path.display()
    )))
}

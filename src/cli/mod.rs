//! Command-line interface for vbrewrite.
//!
//! This module handles argument parsing and user interface only.
//! Commands are turned into plan steps; the refactoring itself happens in
//! the library.

use crate::plan::{EncapsulateStep, FieldStep, ObjectStateStep, PlanStep, ReorderStep};
use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::str::FromStr;

/// vbrewrite: Line-safe refactoring kernel for VBA source modules.
#[derive(Parser, Debug)]
#[command(name = "vbrewrite")]
#[command(author, version, about, long_about = None)]
#[command(subcommand_required = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available vbrewrite commands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Reorder the parameters of a procedure and every call to it.
    Reorder {
        /// Directory holding the exported modules.
        #[arg(short, long)]
        dir: PathBuf,

        /// Glob selecting module files under the directory.
        #[arg(long, default_value = "**/*")]
        pattern: String,

        /// Member to reorder, as `Name` or `Module.Name`.
        #[arg(short, long)]
        target: String,

        /// Optional member kind filter.
        #[arg(short, long)]
        kind: Option<MemberKind>,

        /// New parameter order as comma-separated names.
        #[arg(short, long, value_delimiter = ',', required = true)]
        order: Vec<String>,

        /// Interface to retarget to when the member implements several.
        #[arg(long)]
        interface: Option<String>,

        /// Accept retargeting the interface member without asking.
        #[arg(short, long)]
        yes: bool,

        /// Print the rewritten modules instead of writing them.
        #[arg(long)]
        dry_run: bool,

        /// Create a backup before writing.
        #[arg(long)]
        create_backup: bool,

        /// Optional operation ID for auditing (auto-generated UUID if not provided).
        #[arg(long)]
        operation_id: Option<String>,
    },

    /// Encapsulate module fields behind properties.
    Encapsulate {
        /// Directory holding the exported modules.
        #[arg(short, long)]
        dir: PathBuf,

        /// Glob selecting module files under the directory.
        #[arg(long, default_value = "**/*")]
        pattern: String,

        /// Module declaring the fields.
        #[arg(short, long)]
        module: String,

        /// Field to encapsulate, as `field` or `field:Property`. Repeatable.
        #[arg(short, long = "field", value_name = "FIELD[:PROPERTY]", required = true)]
        fields: Vec<FieldSpec>,

        /// Field that only gets a getter. Repeatable.
        #[arg(long = "read-only", value_name = "FIELD")]
        read_only: Vec<String>,

        /// Back the properties with a private record type.
        #[arg(long)]
        object_state: bool,

        /// Reuse an existing record field instead of declaring a new one.
        #[arg(long, value_name = "FIELD", requires = "object_state")]
        existing_state: Option<String>,

        /// Indent generated blocks.
        #[arg(long)]
        indent: bool,

        /// Print the rewritten modules instead of writing them.
        #[arg(long)]
        dry_run: bool,

        /// Create a backup before writing.
        #[arg(long)]
        create_backup: bool,

        /// Optional operation ID for auditing (auto-generated UUID if not provided).
        #[arg(long)]
        operation_id: Option<String>,
    },

    /// Execute a multi-step refactoring plan.
    Plan {
        /// Directory holding the exported modules.
        #[arg(short, long)]
        dir: PathBuf,

        /// Glob selecting module files under the directory.
        #[arg(long, default_value = "**/*")]
        pattern: String,

        /// Path to the plan.json file.
        #[arg(short, long)]
        file: PathBuf,

        /// Accept every interface retargeting without asking.
        #[arg(short, long)]
        yes: bool,

        /// Print the rewritten modules instead of writing them.
        #[arg(long)]
        dry_run: bool,

        /// Create a backup before writing.
        #[arg(long)]
        create_backup: bool,

        /// Optional operation ID for auditing (auto-generated UUID if not provided).
        #[arg(long)]
        operation_id: Option<String>,
    },

    /// Restore the files of a backup.
    Undo {
        /// Directory the backup was taken in.
        #[arg(short, long)]
        dir: PathBuf,

        /// Manifest to restore (latest backup if omitted).
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
}

impl Commands {
    /// The plan step a refactoring command stands for.
    ///
    /// Returns `None` for commands that are not a single step.
    pub fn to_plan_step(&self) -> Option<PlanStep> {
        match self {
            Commands::Reorder {
                target,
                kind,
                order,
                interface,
                ..
            } => Some(PlanStep::Reorder(ReorderStep {
                target: target.clone(),
                kind: kind.map(|k| k.as_str().to_string()),
                order: order.clone(),
                interface: interface.clone(),
            })),
            Commands::Encapsulate {
                module,
                fields,
                read_only,
                object_state,
                existing_state,
                indent,
                ..
            } => Some(PlanStep::Encapsulate(EncapsulateStep {
                module: module.clone(),
                fields: fields
                    .iter()
                    .map(|spec| FieldStep {
                        field: spec.field.clone(),
                        property: spec.property.clone(),
                        read_only: read_only.iter().any(|f| f.eq_ignore_ascii_case(&spec.field)),
                    })
                    .collect(),
                object_state: object_state.then(|| ObjectStateStep {
                    existing: existing_state.clone(),
                }),
                indent: *indent,
            })),
            Commands::Plan { .. } | Commands::Undo { .. } => None,
        }
    }
}

/// Member kind filter.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// `Sub` procedure.
    Sub,
    /// `Function` procedure.
    Function,
    /// `Property Get` accessor.
    PropertyGet,
    /// `Property Let` accessor.
    PropertyLet,
    /// `Property Set` accessor.
    PropertySet,
    /// `Event` declaration.
    Event,
}

impl MemberKind {
    /// Convert to the kind name used in plans.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberKind::Sub => "sub",
            MemberKind::Function => "function",
            MemberKind::PropertyGet => "property-get",
            MemberKind::PropertyLet => "property-let",
            MemberKind::PropertySet => "property-set",
            MemberKind::Event => "event",
        }
    }
}

/// `field` or `field:Property` as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name.
    pub field: String,
    /// Property name, when not derived from the field.
    pub property: Option<String>,
}

impl FromStr for FieldSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, property) = match s.split_once(':') {
            Some((field, property)) => (field.trim(), Some(property.trim())),
            None => (s.trim(), None),
        };
        if field.is_empty() {
            return Err(format!("missing field name in '{}'", s));
        }
        if property.is_some_and(str::is_empty) {
            return Err(format!("missing property name in '{}'", s));
        }
        Ok(FieldSpec {
            field: field.to_string(),
            property: property.map(str::to_string),
        })
    }
}

/// Parse command-line arguments.
///
/// This function is the entry point for CLI argument parsing.
/// It returns the parsed Cli struct or exits on error.
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// JSON success payload for CLI responses.
#[derive(Serialize)]
pub struct CliSuccessPayload {
    /// Status indicator ("ok").
    pub status: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CliSuccessPayload {
    /// Construct a payload containing only the message.
    pub fn message_only(message: String) -> Self {
        Self {
            status: "ok",
            message,
            data: None,
        }
    }

    /// Construct a payload with structured data.
    pub fn with_data(message: String, data: Value) -> Self {
        Self {
            status: "ok",
            message,
            data: Some(data),
        }
    }
}

/// JSON error payload for CLI responses.
#[derive(Serialize)]
pub struct CliErrorPayload {
    /// Status indicator ("error").
    pub status: &'static str,
    /// Structured error details.
    pub error: ErrorDetails,
}

/// Details for a CLI error payload.
#[derive(Serialize)]
pub struct ErrorDetails {
    /// Error kind identifier (DeclarationNotFound, etc.).
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Optional module context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Optional hint for remediation steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl CliErrorPayload {
    /// Build payload from a RefactorError instance.
    pub fn from_error(error: &crate::RefactorError) -> Self {
        CliErrorPayload {
            status: "error",
            error: ErrorDetails {
                kind: error.kind(),
                message: error.to_string(),
                module: error.module_name().map(str::to_string),
                hint: error.hint().map(str::to_string),
            },
        }
    }
}

//! vbrewrite error types.
//!
//! All errors are typed and provide root cause information.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Parameter-order rule violated by a requested reorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRule {
    /// The requested order is not a permutation of the current positions.
    NotAPermutation {
        /// Number of reorderable parameters on the target.
        expected: usize,
        /// The positions that were supplied.
        found: Vec<usize>,
    },
    /// A required parameter follows an optional one.
    OptionalNotTrailing {
        /// The first required parameter placed after an optional one.
        parameter: String,
    },
    /// A `ParamArray` parameter is not in the last position.
    ParamArrayNotLast {
        /// The misplaced `ParamArray` parameter.
        parameter: String,
    },
}

impl fmt::Display for OrderRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderRule::NotAPermutation { expected, found } => write!(
                f,
                "order {:?} is not a permutation of 0..{}",
                found, expected
            ),
            OrderRule::OptionalNotTrailing { parameter } => write!(
                f,
                "optional parameters must be last, but '{}' follows an optional parameter",
                parameter
            ),
            OrderRule::ParamArrayNotLast { parameter } => {
                write!(f, "ParamArray parameter '{}' must be last", parameter)
            }
        }
    }
}

/// Main error type for vbrewrite operations.
#[derive(Error, Debug)]
pub enum RefactorError {
    /// I/O error during file operations.
    #[error("I/O error for path {path}: {source}")]
    Io {
        /// The file path that caused the I/O error.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The reference front end could not make sense of a module.
    #[error("Parse error in {module}: {message}")]
    Parse {
        /// The module that failed to parse.
        module: String,
        /// The parse error message.
        message: String,
    },

    /// No module with this name is part of the snapshot.
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    /// No declaration matches the query.
    #[error("Declaration not found: {0}")]
    DeclarationNotFound(String),

    /// Declaration name matches several candidates.
    #[error("Ambiguous declaration '{name}': candidates {candidates:?}")]
    AmbiguousDeclaration {
        /// The ambiguous name.
        name: String,
        /// Qualified names of the candidates.
        candidates: Vec<String>,
    },

    /// Target declaration kind cannot be refactored by the requested action.
    #[error("Invalid target kind: '{name}' is a {kind}")]
    InvalidTargetKind {
        /// Target identifier.
        name: String,
        /// Human readable kind of the target.
        kind: String,
    },

    /// Requested parameter order breaks a structural rule.
    #[error("Invalid parameter order: {rule}")]
    InvalidParameterOrder {
        /// The rule that failed.
        rule: OrderRule,
    },

    /// An expected syntax construct is absent at a reference site.
    #[error("Missing {element} at {module}:{line}")]
    MissingSyntaxElement {
        /// Module containing the site.
        module: String,
        /// 1-based line of the site.
        line: usize,
        /// Description of the missing construct.
        element: String,
    },

    /// The confirmation collaborator declined.
    #[error("Refactoring aborted by user")]
    UserAborted,

    /// A property accessor sibling does not line up with the target accessor.
    #[error("Accessor '{accessor}' of property '{name}' does not match its siblings")]
    AmbiguousAccessorState {
        /// Property name.
        name: String,
        /// Accessor that could not be matched (get, let, set).
        accessor: String,
    },

    /// An interface or event-handler mirror has a different parameter count.
    #[error("Mirror '{name}' has {found} parameters, expected {expected}")]
    MirrorMismatch {
        /// Qualified name of the mirror.
        name: String,
        /// Parameter count of the target.
        expected: usize,
        /// Parameter count of the mirror.
        found: usize,
    },

    /// Two queued edits overlap in a way that cannot be merged.
    #[error("Overlapping edits in {module}: lines {first:?} and {second:?}")]
    OverlappingEdits {
        /// Module the edits belong to.
        module: String,
        /// Line range of the edit already queued.
        first: (usize, usize),
        /// Line range of the conflicting edit.
        second: (usize, usize),
    },

    /// Line range outside of a module.
    #[error("Invalid line range {start}..={end} in {module}")]
    InvalidLineRange {
        /// Module addressed by the edit.
        module: String,
        /// 1-based first line.
        start: usize,
        /// 1-based last line.
        end: usize,
    },

    /// Object state aggregate cannot be used.
    #[error("Invalid object state type: {0}")]
    InvalidObjectState(String),

    /// A generated identifier collides with an existing one.
    #[error("Identifier '{name}' already exists in {module}")]
    NameConflict {
        /// Conflicting identifier.
        name: String,
        /// Module where the conflict occurs.
        module: String,
    },

    /// Invalid plan schema.
    #[error("Invalid plan schema: {message}")]
    InvalidPlanSchema {
        /// The schema validation error message.
        message: String,
    },

    /// Plan execution failed at step.
    #[error("Plan execution failed at step {step}: {error}")]
    PlanExecutionFailed {
        /// The step number that failed.
        step: usize,
        /// The error that occurred.
        error: String,
    },

    /// UTF-8 validation error.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Generic error with context.
    #[error("{0}")]
    Other(String),
}

impl RefactorError {
    /// Stable identifier for the error variant, used in JSON payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            RefactorError::Io { .. } => "Io",
            RefactorError::Parse { .. } => "Parse",
            RefactorError::ModuleNotFound(_) => "ModuleNotFound",
            RefactorError::DeclarationNotFound(_) => "DeclarationNotFound",
            RefactorError::AmbiguousDeclaration { .. } => "AmbiguousDeclaration",
            RefactorError::InvalidTargetKind { .. } => "InvalidTargetKind",
            RefactorError::InvalidParameterOrder { .. } => "InvalidParameterOrder",
            RefactorError::MissingSyntaxElement { .. } => "MissingSyntaxElement",
            RefactorError::UserAborted => "UserAborted",
            RefactorError::AmbiguousAccessorState { .. } => "AmbiguousAccessorState",
            RefactorError::MirrorMismatch { .. } => "MirrorMismatch",
            RefactorError::OverlappingEdits { .. } => "OverlappingEdits",
            RefactorError::InvalidLineRange { .. } => "InvalidLineRange",
            RefactorError::InvalidObjectState(_) => "InvalidObjectState",
            RefactorError::NameConflict { .. } => "NameConflict",
            RefactorError::InvalidPlanSchema { .. } => "InvalidPlanSchema",
            RefactorError::PlanExecutionFailed { .. } => "PlanExecutionFailed",
            RefactorError::Utf8(_) => "Utf8",
            RefactorError::Other(_) => "Other",
        }
    }

    /// Optional remediation hint shown by the CLI.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            RefactorError::AmbiguousDeclaration { .. } => {
                Some("Pass --kind or qualify the member with its module")
            }
            RefactorError::InvalidParameterOrder { rule } => match rule {
                OrderRule::NotAPermutation { .. } => {
                    Some("List every parameter exactly once (value parameters excluded)")
                }
                OrderRule::OptionalNotTrailing { .. } => {
                    Some("Keep Optional parameters after all required parameters")
                }
                OrderRule::ParamArrayNotLast { .. } => Some("Keep the ParamArray parameter last"),
            },
            RefactorError::AmbiguousAccessorState { .. } => {
                Some("Make the Get/Let/Set parameter lists identical before reordering")
            }
            RefactorError::UserAborted => Some("Re-run with --yes to accept the interface target"),
            RefactorError::NameConflict { .. } => Some("Choose a different property name"),
            _ => None,
        }
    }

    /// The module name this error relates to, when known.
    pub fn module_name(&self) -> Option<&str> {
        match self {
            RefactorError::Parse { module, .. }
            | RefactorError::MissingSyntaxElement { module, .. }
            | RefactorError::OverlappingEdits { module, .. }
            | RefactorError::InvalidLineRange { module, .. }
            | RefactorError::NameConflict { module, .. } => Some(module.as_str()),
            RefactorError::ModuleNotFound(module) => Some(module.as_str()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RefactorError {
    fn from(err: std::io::Error) -> Self {
        RefactorError::Io {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

/// Result type alias for vbrewrite operations.
pub type Result<T> = std::result::Result<T, RefactorError>;

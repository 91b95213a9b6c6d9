//! vbrewrite: Line-safe refactoring kernel for VBA source modules.
//!
//! This library reorders procedure parameters and encapsulates module fields
//! across a whole VBA project. Actions work on a read-only parse snapshot,
//! validate every precondition up front and rewrite whole lines through a
//! single batch commit, so a failed request never leaves partial edits.

#![warn(missing_docs)]
// env_logger is used by src/main.rs (binary), not this library
#![expect(unused_crate_dependencies)]

pub mod ast;
pub mod cli;
pub mod error;
pub mod index;
pub mod ingest;
pub mod plan;
pub mod refactor;
pub mod resolve;
pub mod rewrite;
pub mod source;
pub mod symbol;
pub mod validate;
pub mod workspace;

/// Re-export common error types for convenience.
pub use error::{RefactorError, Result};

/// Re-export the snapshot types for convenience.
pub use index::{DeclarationIndex, ParseSnapshot};

/// vbrewrite version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

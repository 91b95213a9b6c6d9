//! File-system host for exported VBA modules.
//!
//! This module provides:
//! - Module discovery (`.bas`/`.cls`) by glob pattern
//! - Atomic writes of a `RefactorResult` (write temp + fsync + rename)
//! - File hashes before/after every write
//! - Automatic rollback when any write fails
//! - Optional backups restorable through `undo`

mod backup;

pub use backup::{restore_from_manifest, BackupEntry, BackupManifest, BackupWriter, BACKUP_DIR};

use crate::error::{RefactorError, Result};
use crate::index::ParseSnapshot;
use crate::ingest::detect::{component_name, detect_module_kind};
use crate::ingest::snapshot_from_sources;
use crate::rewrite::RefactorResult;
use crate::source::ModuleSource;
use crate::symbol::ModuleId;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default project name when the directory name cannot be used.
pub const DEFAULT_PROJECT: &str = "VBAProject";

/// Modules loaded from a directory plus the files they came from.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    project: String,
    files: BTreeMap<ModuleId, PathBuf>,
    snapshot: ParseSnapshot,
}

impl Workspace {
    /// Directory the modules were loaded from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Project name shared by every module.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Parse snapshot of the loaded modules.
    pub fn snapshot(&self) -> &ParseSnapshot {
        &self.snapshot
    }

    /// File backing a module.
    pub fn path_of(&self, module: &ModuleId) -> Option<&Path> {
        self.files.get(module).map(PathBuf::as_path)
    }

    /// Every module file, in module order.
    pub fn files(&self) -> impl Iterator<Item = (&ModuleId, &Path)> {
        self.files.iter().map(|(id, path)| (id, path.as_path()))
    }
}

/// Result summary for a written module file.
#[derive(Debug, Clone, Serialize)]
pub struct FileWriteSummary {
    /// Module written.
    pub module: String,
    /// Path of the file.
    pub file: PathBuf,
    /// SHA-256 before writing.
    pub before_hash: String,
    /// SHA-256 after writing.
    pub after_hash: String,
}

/// Load every module matching `pattern` under `dir` and parse them.
///
/// # Arguments
/// * `dir` - Directory holding exported modules
/// * `pattern` - Glob relative to `dir`, e.g. `**/*.bas`; files with other
///   extensions are ignored
///
/// # Errors
/// - `Other` - invalid glob pattern, or two files export the same module
/// - `Io` - a file cannot be read
/// - `Parse` - a module cannot be parsed
pub fn load_modules(dir: &Path, pattern: &str) -> Result<Workspace> {
    let project = dir
        .canonicalize()
        .ok()
        .and_then(|path| path.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_PROJECT.to_string());

    let full_pattern = dir.join(pattern);
    let full_pattern = full_pattern
        .to_str()
        .ok_or_else(|| RefactorError::Other(format!("Non UTF-8 path: {}", dir.display())))?;
    let entries = glob::glob(full_pattern)
        .map_err(|e| RefactorError::Other(format!("Invalid glob pattern '{}': {}", pattern, e)))?;

    let mut files: BTreeMap<ModuleId, PathBuf> = BTreeMap::new();
    let mut sources = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| RefactorError::Io {
            path: e.path().to_path_buf(),
            source: std::io::Error::from(e),
        })?;
        if path.components().any(|c| c.as_os_str() == BACKUP_DIR) {
            continue;
        }
        let (Some(kind), Some(name)) = (detect_module_kind(&path), component_name(&path)) else {
            continue;
        };
        let id = ModuleId::new(project.as_str(), name);
        if let Some(previous) = files.get(&id) {
            return Err(RefactorError::Other(format!(
                "Module {} is exported twice: {} and {}",
                id,
                previous.display(),
                path.display()
            )));
        }
        let text = fs::read_to_string(&path).map_err(|e| RefactorError::Io {
            path: path.clone(),
            source: e,
        })?;
        log::debug!("loaded {} from {}", id, path.display());
        sources.push(ModuleSource::new(id.clone(), kind, text));
        files.insert(id, path);
    }

    let snapshot = snapshot_from_sources(sources)?;
    Ok(Workspace {
        root: dir.to_path_buf(),
        project,
        files,
        snapshot,
    })
}

/// Write every rewritten module of `result`.
///
/// Each module is backed up first when a writer is given. Any failed write
/// restores the files already written before returning the error.
///
/// # Errors
/// - `ModuleNotFound` - the result names a module the workspace did not load
/// - `Io` - a file cannot be read, backed up or written
pub fn apply_result(
    workspace: &Workspace,
    result: &RefactorResult,
    mut backup: Option<&mut BackupWriter>,
) -> Result<Vec<FileWriteSummary>> {
    let RefactorResult::Rewritten(texts) = result else {
        return Ok(Vec::new());
    };

    // Every original is read before the first write.
    let mut planned = Vec::with_capacity(texts.len());
    for (module, text) in texts {
        let path = workspace
            .path_of(module)
            .ok_or_else(|| RefactorError::ModuleNotFound(module.to_string()))?;
        let original = fs::read(path).map_err(|e| RefactorError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        planned.push((module, path, text, original));
    }

    let mut applied: Vec<AppliedFile> = Vec::new();
    for (module, path, text, original) in planned {
        if let Some(writer) = backup.as_deref_mut() {
            if let Err(backup_err) = writer.backup_file(path) {
                rollback_files(&applied);
                return Err(backup_err);
            }
        }
        let before_hash = compute_hash(&original);
        let after_hash = compute_hash(text.as_bytes());

        if let Err(write_err) = write_atomic(path, text.as_bytes(), "vbrewrite") {
            rollback_files(&applied);
            return Err(write_err);
        }
        applied.push(AppliedFile {
            module: module.to_string(),
            file: path.to_path_buf(),
            original,
            before_hash,
            after_hash,
        });
    }

    Ok(applied
        .into_iter()
        .map(|file| FileWriteSummary {
            module: file.module,
            file: file.file,
            before_hash: file.before_hash,
            after_hash: file.after_hash,
        })
        .collect())
}

struct AppliedFile {
    module: String,
    file: PathBuf,
    original: Vec<u8>,
    before_hash: String,
    after_hash: String,
}

fn rollback_files(files: &[AppliedFile]) {
    for file in files.iter().rev() {
        log::warn!("Rolling back {}", file.file.display());
        if let Err(err) = write_atomic(&file.file, &file.original, "rollback") {
            log::error!("Rollback failed for {}: {}", file.file.display(), err);
        }
    }
}

fn write_atomic(file_path: &Path, content: &[u8], suffix: &str) -> Result<()> {
    let temp_path = temp_path_for(file_path, suffix)?;
    let io_err = |source| RefactorError::Io {
        path: temp_path.clone(),
        source,
    };
    let mut temp_file = File::create(&temp_path).map_err(io_err)?;
    temp_file.write_all(content).map_err(io_err)?;
    temp_file.sync_all().map_err(io_err)?;
    fs::rename(&temp_path, file_path).map_err(|source| RefactorError::Io {
        path: file_path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn temp_path_for(file_path: &Path, suffix: &str) -> Result<PathBuf> {
    let file_dir = file_path
        .parent()
        .ok_or_else(|| RefactorError::Other("File has no parent directory".to_string()))?;
    let file_name = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("tmp");
    Ok(file_dir.join(format!(".{}.{}.tmp", file_name, suffix)))
}

/// SHA-256 of bytes as lowercase hex.
pub(crate) fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_skips_foreign_files() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("Module1.bas"), "Public Sub Go()\nEnd Sub\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "Sub NotCode()\n").unwrap();
        let workspace = load_modules(dir.path(), "*").unwrap();
        assert_eq!(workspace.files().count(), 1);
        assert!(workspace.snapshot().index().resolve_member(None, "Go", None).is_ok());
    }

    #[test]
    fn test_unknown_module_is_rejected_before_writing() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("Module1.bas");
        fs::write(&path, "Public x As Long\n").unwrap();
        let workspace = load_modules(dir.path(), "*.bas").unwrap();

        let mut texts = BTreeMap::new();
        texts.insert(ModuleId::new(workspace.project(), "Module1"), "Private x As Long\n".to_string());
        texts.insert(ModuleId::new(workspace.project(), "Ghost"), String::new());
        let err = apply_result(&workspace, &RefactorResult::Rewritten(texts), None).unwrap_err();
        assert_eq!(err.kind(), "ModuleNotFound");
        assert_eq!(fs::read_to_string(&path).unwrap(), "Public x As Long\n");
    }

    #[test]
    fn test_unreadable_module_leaves_every_file_untouched() {
        let dir = TempDir::new().expect("temp dir");
        let first = dir.path().join("Module1.bas");
        let second = dir.path().join("Module2.bas");
        fs::write(&first, "Public x As Long\n").unwrap();
        fs::write(&second, "Public y As Long\n").unwrap();
        let workspace = load_modules(dir.path(), "*.bas").unwrap();
        fs::remove_file(&second).unwrap();

        let mut texts = BTreeMap::new();
        texts.insert(ModuleId::new(workspace.project(), "Module1"), "Private x As Long\n".to_string());
        texts.insert(ModuleId::new(workspace.project(), "Module2"), "Private y As Long\n".to_string());
        let err = apply_result(&workspace, &RefactorResult::Rewritten(texts), None).unwrap_err();
        assert_eq!(err.kind(), "Io");
        assert_eq!(fs::read_to_string(&first).unwrap(), "Public x As Long\n");
        assert!(!second.exists());
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        assert_eq!(
            compute_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

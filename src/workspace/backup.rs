//! Backups of module files taken before a refactoring is written.
//!
//! Backups are stored in `.vbrewrite-backup/<operation_id>/` with a
//! `manifest.json` recording the action, the original file locations and
//! their hashes. `undo` restores the files from a manifest.

use super::{compute_hash, write_atomic};
use crate::error::{RefactorError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory under the workspace root holding every backup.
pub const BACKUP_DIR: &str = ".vbrewrite-backup";

const MANIFEST_FILE: &str = "manifest.json";

/// Metadata about a backed-up module file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    /// Path of the file relative to the workspace root.
    pub original_path: PathBuf,
    /// SHA-256 hash of the original content.
    pub hash: String,
    /// Byte count of the original content.
    pub size: u64,
}

/// Manifest describing one backed-up refactoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    /// Unique identifier of the operation.
    pub operation_id: String,
    /// Action that was applied (`reorder`, `encapsulate`, `plan`).
    pub operation: String,
    /// Creation time (RFC 3339).
    pub timestamp: String,
    /// Files backed up.
    pub files: Vec<BackupEntry>,
    /// Directory holding the manifest.
    #[serde(skip)]
    pub backup_dir: PathBuf,
}

impl BackupManifest {
    /// Empty manifest stamped with the current time.
    pub fn new(operation_id: String, operation: impl Into<String>, backup_dir: PathBuf) -> Self {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        BackupManifest {
            operation_id,
            operation: operation.into(),
            timestamp,
            files: Vec::new(),
            backup_dir,
        }
    }

    /// Record a backed-up file.
    pub fn add_file(&mut self, original_path: PathBuf, hash: String, size: u64) {
        self.files.push(BackupEntry {
            original_path,
            hash,
            size,
        });
    }

    /// Write `manifest.json` into the backup directory.
    pub fn save(&self) -> Result<()> {
        let manifest_path = self.backup_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RefactorError::Other(format!("Failed to serialize manifest: {}", e)))?;
        fs::write(&manifest_path, json).map_err(|e| RefactorError::Io {
            path: manifest_path,
            source: e,
        })?;
        Ok(())
    }

    /// Read a manifest; its directory becomes `backup_dir`.
    pub fn load(manifest_path: &Path) -> Result<Self> {
        let json = fs::read_to_string(manifest_path).map_err(|e| RefactorError::Io {
            path: manifest_path.to_path_buf(),
            source: e,
        })?;

        let mut manifest: BackupManifest = serde_json::from_str(&json)
            .map_err(|e| RefactorError::Other(format!("Failed to parse manifest: {}", e)))?;

        manifest.backup_dir = manifest_path
            .parent()
            .ok_or_else(|| RefactorError::Other("Manifest has no parent directory".to_string()))?
            .to_path_buf();

        Ok(manifest)
    }

    /// Manifest of the most recent backup under `workspace_root`, if any.
    pub fn latest(workspace_root: &Path) -> Result<Option<PathBuf>> {
        let root = workspace_root.join(BACKUP_DIR);
        if !root.is_dir() {
            return Ok(None);
        }
        let entries = fs::read_dir(&root).map_err(|e| RefactorError::Io {
            path: root.clone(),
            source: e,
        })?;

        let mut latest: Option<(String, PathBuf)> = None;
        for entry in entries.flatten() {
            let path = entry.path().join(MANIFEST_FILE);
            if !path.is_file() {
                continue;
            }
            let manifest = Self::load(&path)?;
            if latest.as_ref().map_or(true, |(stamp, _)| manifest.timestamp >= *stamp) {
                latest = Some((manifest.timestamp, path));
            }
        }
        Ok(latest.map(|(_, path)| path))
    }
}

/// Copies module files aside before they are overwritten.
pub struct BackupWriter {
    manifest: BackupManifest,
    workspace_root: PathBuf,
}

impl BackupWriter {
    /// Create the backup directory of a new operation.
    ///
    /// # Arguments
    /// * `workspace_root` - Directory the modules were loaded from
    /// * `operation` - Action name recorded in the manifest
    /// * `operation_id` - Identifier of the operation (UUID v4 if `None`)
    pub fn new(workspace_root: &Path, operation: &str, operation_id: Option<String>) -> Result<Self> {
        let op_id = operation_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let backup_dir = workspace_root.join(BACKUP_DIR).join(&op_id);

        fs::create_dir_all(&backup_dir).map_err(|e| RefactorError::Io {
            path: backup_dir.clone(),
            source: e,
        })?;

        Ok(BackupWriter {
            manifest: BackupManifest::new(op_id, operation, backup_dir),
            workspace_root: workspace_root.to_path_buf(),
        })
    }

    /// Operation identifier.
    pub fn operation_id(&self) -> &str {
        &self.manifest.operation_id
    }

    /// Path the manifest is written to.
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest.backup_dir.join(MANIFEST_FILE)
    }

    /// Copy one file into the backup, keeping its path relative to the root.
    ///
    /// A file backed up twice keeps its first copy.
    pub fn backup_file(&mut self, file_path: &Path) -> Result<()> {
        let relative = file_path
            .strip_prefix(&self.workspace_root)
            .map_err(|_| {
                RefactorError::Other(format!(
                    "File '{}' is not under workspace root '{}'",
                    file_path.display(),
                    self.workspace_root.display()
                ))
            })?
            .to_path_buf();
        if self.manifest.files.iter().any(|f| f.original_path == relative) {
            return Ok(());
        }

        let content = fs::read(file_path).map_err(|e| RefactorError::Io {
            path: file_path.to_path_buf(),
            source: e,
        })?;
        let backup_path = self.manifest.backup_dir.join(&relative);
        if let Some(parent) = backup_path.parent() {
            fs::create_dir_all(parent).map_err(|e| RefactorError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(&backup_path, &content).map_err(|e| RefactorError::Io {
            path: backup_path.clone(),
            source: e,
        })?;

        self.manifest
            .add_file(relative, compute_hash(&content), content.len() as u64);
        Ok(())
    }

    /// Number of files backed up so far.
    pub fn file_count(&self) -> usize {
        self.manifest.files.len()
    }

    /// Write the manifest and return its path.
    pub fn finalize(self) -> Result<PathBuf> {
        self.manifest.save()?;
        Ok(self.manifest_path())
    }
}

/// Restore every file of a backup manifest.
///
/// Backup copies are hash-checked before anything is written.
///
/// # Returns
/// The number of files restored.
pub fn restore_from_manifest(manifest_path: &Path, workspace_root: &Path) -> Result<usize> {
    let manifest = BackupManifest::load(manifest_path)?;

    let mut contents = Vec::with_capacity(manifest.files.len());
    for entry in &manifest.files {
        let backup_path = manifest.backup_dir.join(&entry.original_path);
        let content = fs::read(&backup_path).map_err(|e| RefactorError::Io {
            path: backup_path.clone(),
            source: e,
        })?;
        let actual_hash = compute_hash(&content);
        if actual_hash != entry.hash {
            return Err(RefactorError::Other(format!(
                "Hash mismatch for {}: expected {}, got {}",
                entry.original_path.display(),
                entry.hash,
                actual_hash
            )));
        }
        contents.push((workspace_root.join(&entry.original_path), content));
    }

    for (original_path, content) in &contents {
        if let Some(parent) = original_path.parent() {
            fs::create_dir_all(parent).map_err(|e| RefactorError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        write_atomic(original_path, content, "restore")?;
        log::debug!("restored {}", original_path.display());
    }

    Ok(contents.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backup_and_restore() {
        let workspace = TempDir::new().expect("Failed to create temp dir");
        let root = workspace.path();
        let module = root.join("Module1.bas");
        fs::write(&module, "Public x As Long\n").expect("Failed to write module");

        let mut writer = BackupWriter::new(root, "encapsulate", Some("op-1".to_string()))
            .expect("Failed to create BackupWriter");
        writer.backup_file(&module).expect("Failed to backup");
        writer.backup_file(&module).expect("Second backup is a no-op");
        assert_eq!(writer.file_count(), 1);
        let manifest_path = writer.finalize().expect("Failed to finalize");
        assert!(root.join(".vbrewrite-backup/op-1/Module1.bas").exists());

        fs::write(&module, "Private x As Long\n").expect("Failed to modify");
        let restored = restore_from_manifest(&manifest_path, root).expect("Failed to restore");
        assert_eq!(restored, 1);
        assert_eq!(fs::read_to_string(&module).unwrap(), "Public x As Long\n");

        let manifest = BackupManifest::load(&manifest_path).unwrap();
        assert_eq!(manifest.operation, "encapsulate");
    }

    #[test]
    fn test_tampered_backup_restores_nothing() {
        let workspace = TempDir::new().expect("Failed to create temp dir");
        let root = workspace.path();
        let module = root.join("Module1.bas");
        fs::write(&module, "original").expect("Failed to write module");

        let mut writer = BackupWriter::new(root, "reorder", Some("op-2".to_string())).unwrap();
        writer.backup_file(&module).unwrap();
        let manifest_path = writer.finalize().unwrap();

        fs::write(root.join(".vbrewrite-backup/op-2/Module1.bas"), "tampered").unwrap();
        fs::write(&module, "modified").unwrap();
        let err = restore_from_manifest(&manifest_path, root).unwrap_err();
        assert!(err.to_string().contains("Hash mismatch"));
        assert_eq!(fs::read_to_string(&module).unwrap(), "modified");
    }

    #[test]
    fn test_latest_manifest() {
        let workspace = TempDir::new().expect("Failed to create temp dir");
        let root = workspace.path();
        assert!(BackupManifest::latest(root).unwrap().is_none());

        let writer = BackupWriter::new(root, "reorder", Some("only".to_string())).unwrap();
        let manifest_path = writer.finalize().unwrap();
        assert_eq!(BackupManifest::latest(root).unwrap(), Some(manifest_path));
    }
}

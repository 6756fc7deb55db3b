//! Read-only views of a filesystem transaction, for diagnostics and reports.

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Open,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatedKind {
    File,
    Dir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPath {
    pub path: Utf8PathBuf,
    pub kind: CreatedKind,
}

/// Summary of one captured backup. The bytes themselves stay in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSummary {
    pub path: Utf8PathBuf,
    pub original_existed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_sha256: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_bytes: Option<u64>,

    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionState {
    pub id: String,
    pub root: Utf8PathBuf,
    pub created_at: DateTime<Utc>,
    pub status: TransactionStatus,

    #[serde(default)]
    pub backups: Vec<BackupSummary>,

    #[serde(default)]
    pub created: Vec<CreatedPath>,
}

impl TransactionState {
    pub fn created_files(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.created
            .iter()
            .filter(|c| c.kind == CreatedKind::File)
            .map(|c| &c.path)
    }

    pub fn created_dirs(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.created
            .iter()
            .filter(|c| c.kind == CreatedKind::Dir)
            .map(|c| &c.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackAction {
    RemoveCreatedFile,
    RemoveCreatedDir,
    RestoreBackup,
    RemoveBackedUpPath,
}

/// A single rollback step that could not be completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackFailure {
    pub path: Utf8PathBuf,
    pub action: RollbackAction,
    pub message: String,
}

/// A created directory left in place because it still had content.
///
/// The directory did not exist before the transaction, so anything still
/// inside it was written during the run without going through the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetainedDir {
    pub path: Utf8PathBuf,

    /// Entry names found in the directory (truncated).
    pub untracked_entries: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackReport {
    #[serde(default)]
    pub removed_files: Vec<Utf8PathBuf>,

    #[serde(default)]
    pub removed_dirs: Vec<Utf8PathBuf>,

    #[serde(default)]
    pub restored_files: Vec<Utf8PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retained_dirs: Vec<RetainedDir>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<RollbackFailure>,
}

impl RollbackReport {
    /// True when every step completed and no directory was retained.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.retained_dirs.is_empty()
    }
}

use crate::error::{TxnError, TxnResult};
use crate::paths::{depth, normalize};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use fs_err as fs;
use pwaify_types::txn::{
    BackupSummary, CreatedKind, CreatedPath, RetainedDir, RollbackAction, RollbackFailure,
    RollbackReport, TransactionState, TransactionStatus,
};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How many entry names a retained directory reports.
const RETAINED_ENTRY_LIMIT: usize = 8;

/// Original state of one file, captured before its first mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBackup {
    pub path: Utf8PathBuf,
    pub original_existed: bool,
    /// Present only when `original_existed`.
    pub original_content: Option<Vec<u8>>,
    pub captured_at: DateTime<Utc>,
}

impl FileBackup {
    fn summary(&self) -> BackupSummary {
        BackupSummary {
            path: self.path.clone(),
            original_existed: self.original_existed,
            original_sha256: self.original_content.as_deref().map(sha256_hex),
            original_bytes: self.original_content.as_ref().map(|c| c.len() as u64),
            captured_at: self.captured_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Committed,
    RolledBack,
}

/// Records every filesystem mutation of one pipeline run.
///
/// Not safe for unsynchronized concurrent use; concurrent producers go through
/// [`crate::SharedTransactionLog`].
#[derive(Debug)]
pub struct TransactionLog {
    id: Uuid,
    root: Utf8PathBuf,
    created_at: DateTime<Utc>,
    backups: Vec<FileBackup>,
    backup_index: BTreeMap<Utf8PathBuf, usize>,
    created_files: BTreeSet<Utf8PathBuf>,
    created_dirs: BTreeSet<Utf8PathBuf>,
    phase: Phase,
    rollback_report: Option<RollbackReport>,
}

impl TransactionLog {
    /// Open a transaction rooted at `root`. Relative paths resolve against it.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        let root = root.into();
        let id = Uuid::new_v4();
        debug!(txid = %id, root = %root, "opened transaction");
        Self {
            id,
            root,
            created_at: Utc::now(),
            backups: Vec::new(),
            backup_index: BTreeMap::new(),
            created_files: BTreeSet::new(),
            created_dirs: BTreeSet::new(),
            phase: Phase::Open,
            rollback_report: None,
        }
    }

    pub fn id(&self) -> String {
        self.id.to_string()
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        normalize(&self.root, path)
    }

    pub fn is_committed(&self) -> bool {
        self.phase == Phase::Committed
    }

    pub fn is_rolled_back(&self) -> bool {
        self.phase == Phase::RolledBack
    }

    fn ensure_open(&self) -> TxnResult<()> {
        match self.phase {
            Phase::Open => Ok(()),
            _ => Err(TxnError::Finalized { id: self.id() }),
        }
    }

    /// Capture the original state of `path` before its first mutation.
    ///
    /// Returns `true` when a new backup was captured. Repeated calls are no-ops
    /// and keep the content from the first call. Paths already tracked as
    /// created need no backup: rollback deletes them anyway.
    pub fn backup_file(&mut self, path: &Utf8Path) -> TxnResult<bool> {
        self.ensure_open()?;
        let abs = self.resolve(path);

        if self.backup_index.contains_key(&abs) || self.created_files.contains(&abs) {
            return Ok(false);
        }

        let backup = match fs::read(&abs) {
            Ok(bytes) => FileBackup {
                path: abs.clone(),
                original_existed: true,
                original_content: Some(bytes),
                captured_at: Utc::now(),
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => FileBackup {
                path: abs.clone(),
                original_existed: false,
                original_content: None,
                captured_at: Utc::now(),
            },
            Err(_) if abs.is_dir() => return Err(TxnError::NotAFile { path: abs }),
            Err(err) => return Err(err.into()),
        };

        debug!(
            txid = %self.id,
            path = %abs,
            existed = backup.original_existed,
            "captured backup"
        );
        self.backup_index.insert(abs, self.backups.len());
        self.backups.push(backup);
        Ok(true)
    }

    /// Register a file that rollback must delete. Set semantics.
    pub fn track_created_file(&mut self, path: &Utf8Path) -> TxnResult<bool> {
        self.ensure_open()?;
        let abs = self.resolve(path);
        self.check_not_preexisting(&abs)?;
        let inserted = self.created_files.insert(abs);
        if inserted {
            debug!(txid = %self.id, path = %path, "tracked created file");
        }
        Ok(inserted)
    }

    /// Register a directory that rollback must delete when empty. Set semantics.
    pub fn track_created_dir(&mut self, path: &Utf8Path) -> TxnResult<bool> {
        self.ensure_open()?;
        let abs = self.resolve(path);
        self.check_not_preexisting(&abs)?;
        let inserted = self.created_dirs.insert(abs);
        if inserted {
            debug!(txid = %self.id, path = %path, "tracked created dir");
        }
        Ok(inserted)
    }

    fn check_not_preexisting(&self, abs: &Utf8Path) -> TxnResult<()> {
        let preexisting = self
            .backup_index
            .get(abs)
            .map(|&i| self.backups[i].original_existed)
            .unwrap_or(false);
        if preexisting {
            return Err(TxnError::ConflictingTrack {
                path: abs.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Create `path` and any missing ancestors, tracking each directory created.
    ///
    /// Returns the number of directories that did not exist before.
    pub fn create_dir_all(&mut self, path: &Utf8Path) -> TxnResult<usize> {
        self.ensure_open()?;
        let abs = self.resolve(path);

        let mut missing = Vec::new();
        let mut cursor = Some(abs.as_path());
        while let Some(dir) = cursor {
            if dir.as_str().is_empty() || dir.exists() {
                break;
            }
            missing.push(dir.to_path_buf());
            cursor = dir.parent();
        }

        // Track before creating so a partial failure still gets cleaned up.
        for dir in &missing {
            self.track_created_dir(dir)?;
        }
        fs::create_dir_all(&abs)?;
        Ok(missing.len())
    }

    /// Write `contents` to `path` with the right bookkeeping.
    ///
    /// Existing files are backed up, new files are tracked as created, and
    /// missing parent directories are created and tracked.
    pub fn write_file(&mut self, path: &Utf8Path, contents: &[u8]) -> TxnResult<()> {
        self.ensure_open()?;
        let abs = self.resolve(path);

        if let Some(parent) = abs.parent() {
            self.create_dir_all(parent)?;
        }

        let known = self.backup_index.contains_key(&abs) || self.created_files.contains(&abs);
        if !known {
            if abs.exists() {
                self.backup_file(&abs)?;
            } else {
                self.track_created_file(&abs)?;
            }
        }

        fs::write(&abs, contents)?;
        debug!(txid = %self.id, path = %abs, bytes = contents.len(), "wrote file");
        Ok(())
    }

    /// Mark the transaction final. Idempotent.
    pub fn commit(&mut self) -> TxnResult<()> {
        match self.phase {
            Phase::Committed => Ok(()),
            Phase::RolledBack => Err(TxnError::AlreadyRolledBack { id: self.id() }),
            Phase::Open => {
                self.phase = Phase::Committed;
                info!(
                    txid = %self.id,
                    backups = self.backups.len(),
                    created_files = self.created_files.len(),
                    created_dirs = self.created_dirs.len(),
                    "transaction committed"
                );
                Ok(())
            }
        }
    }

    /// Undo every recorded mutation, best-effort.
    ///
    /// Order: created files, then created directories deepest-first (only when
    /// empty), then backups. A failing step is recorded in the report and the
    /// remaining steps still run. A second call returns the first report.
    pub fn rollback(&mut self) -> TxnResult<RollbackReport> {
        match self.phase {
            Phase::Committed => return Err(TxnError::AlreadyCommitted { id: self.id() }),
            Phase::RolledBack => return Ok(self.rollback_report.clone().unwrap_or_default()),
            Phase::Open => {}
        }

        let mut report = RollbackReport::default();

        for file in &self.created_files {
            match fs::remove_file(file) {
                Ok(()) => report.removed_files.push(file.clone()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %file, "created file already gone");
                }
                Err(err) => record_failure(&mut report, file, RollbackAction::RemoveCreatedFile, &err),
            }
        }

        let mut dirs: Vec<&Utf8PathBuf> = self.created_dirs.iter().collect();
        dirs.sort_by(|a, b| depth(b).cmp(&depth(a)).then_with(|| b.cmp(a)));
        let mut retained: Vec<Utf8PathBuf> = Vec::new();
        for dir in dirs {
            match remove_dir_if_empty(dir) {
                Ok(DirRemoval::Removed) => report.removed_dirs.push(dir.clone()),
                Ok(DirRemoval::Missing) => {}
                Ok(DirRemoval::NotEmpty) => retained.push(dir.clone()),
                Err(err) => record_failure(&mut report, dir, RollbackAction::RemoveCreatedDir, &err),
            }
        }

        for backup in &self.backups {
            if let Some(content) = &backup.original_content {
                match restore_bytes(&backup.path, content) {
                    Ok(()) => report.restored_files.push(backup.path.clone()),
                    Err(err) => {
                        record_failure(&mut report, &backup.path, RollbackAction::RestoreBackup, &err)
                    }
                }
            } else {
                match fs::remove_file(&backup.path) {
                    Ok(()) => report.removed_files.push(backup.path.clone()),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => record_failure(
                        &mut report,
                        &backup.path,
                        RollbackAction::RemoveBackedUpPath,
                        &err,
                    ),
                }
            }
        }

        // Removing backed-up paths may have emptied a retained directory.
        for dir in retained {
            match remove_dir_if_empty(&dir) {
                Ok(DirRemoval::Removed) => report.removed_dirs.push(dir),
                Ok(DirRemoval::Missing) => {}
                Ok(DirRemoval::NotEmpty) => {
                    let untracked_entries = list_entries(&dir);
                    warn!(
                        txid = %self.id,
                        path = %dir,
                        entries = ?untracked_entries,
                        "created directory holds untracked content; left in place"
                    );
                    report.retained_dirs.push(RetainedDir {
                        path: dir,
                        untracked_entries,
                    });
                }
                Err(err) => record_failure(&mut report, &dir, RollbackAction::RemoveCreatedDir, &err),
            }
        }

        self.phase = Phase::RolledBack;
        info!(
            txid = %self.id,
            removed_files = report.removed_files.len(),
            removed_dirs = report.removed_dirs.len(),
            restored_files = report.restored_files.len(),
            failures = report.failures.len(),
            "transaction rolled back"
        );
        self.rollback_report = Some(report.clone());
        Ok(report)
    }

    /// Read-only snapshot for diagnostics and tests.
    pub fn state(&self) -> TransactionState {
        let status = match self.phase {
            Phase::Open => TransactionStatus::Open,
            Phase::Committed => TransactionStatus::Committed,
            Phase::RolledBack => TransactionStatus::RolledBack,
        };

        let mut created: Vec<CreatedPath> = self
            .created_dirs
            .iter()
            .map(|p| CreatedPath {
                path: p.clone(),
                kind: CreatedKind::Dir,
            })
            .collect();
        created.extend(self.created_files.iter().map(|p| CreatedPath {
            path: p.clone(),
            kind: CreatedKind::File,
        }));

        TransactionState {
            id: self.id(),
            root: self.root.clone(),
            created_at: self.created_at,
            status,
            backups: self.backups.iter().map(FileBackup::summary).collect(),
            created,
        }
    }

    pub fn backups(&self) -> &[FileBackup] {
        &self.backups
    }
}

impl Drop for TransactionLog {
    fn drop(&mut self) {
        let dirty = !self.backups.is_empty()
            || !self.created_files.is_empty()
            || !self.created_dirs.is_empty();
        if self.phase == Phase::Open && dirty {
            warn!(txid = %self.id, "transaction dropped without commit or rollback");
        }
    }
}

enum DirRemoval {
    Removed,
    Missing,
    NotEmpty,
}

fn remove_dir_if_empty(dir: &Utf8Path) -> io::Result<DirRemoval> {
    let mut entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(DirRemoval::Missing),
        Err(err) => return Err(err),
    };
    if entries.next().is_some() {
        return Ok(DirRemoval::NotEmpty);
    }
    fs::remove_dir(dir)?;
    Ok(DirRemoval::Removed)
}

fn list_entries(dir: &Utf8Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names.truncate(RETAINED_ENTRY_LIMIT);
    names
}

fn restore_bytes(path: &Utf8Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

fn record_failure(
    report: &mut RollbackReport,
    path: &Utf8Path,
    action: RollbackAction,
    err: &io::Error,
) {
    warn!(path = %path, ?action, error = %err, "rollback step failed");
    report.failures.push(RollbackFailure {
        path: path.to_path_buf(),
        action,
        message: err.to_string(),
    });
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

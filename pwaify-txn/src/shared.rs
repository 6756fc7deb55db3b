use crate::error::TxnResult;
use crate::log::TransactionLog;
use camino::{Utf8Path, Utf8PathBuf};
use pwaify_types::txn::{RollbackReport, TransactionState};
use std::sync::{Arc, Mutex, MutexGuard};

/// A [`TransactionLog`] behind a single mutex.
///
/// Stages that fan out work (icon rendering) clone this handle into their
/// workers; every log call is serialized through the one lock.
#[derive(Debug, Clone)]
pub struct SharedTransactionLog {
    inner: Arc<Mutex<TransactionLog>>,
}

impl SharedTransactionLog {
    pub fn new(log: TransactionLog) -> Self {
        Self {
            inner: Arc::new(Mutex::new(log)),
        }
    }

    /// Lock the log. A worker that panicked while holding the lock does not
    /// make the log unusable: rollback must still be possible.
    pub fn lock(&self) -> MutexGuard<'_, TransactionLog> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn id(&self) -> String {
        self.lock().id()
    }

    pub fn root(&self) -> Utf8PathBuf {
        self.lock().root().to_path_buf()
    }

    pub fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        self.lock().resolve(path)
    }

    pub fn backup_file(&self, path: &Utf8Path) -> TxnResult<bool> {
        self.lock().backup_file(path)
    }

    pub fn track_created_file(&self, path: &Utf8Path) -> TxnResult<bool> {
        self.lock().track_created_file(path)
    }

    pub fn track_created_dir(&self, path: &Utf8Path) -> TxnResult<bool> {
        self.lock().track_created_dir(path)
    }

    pub fn create_dir_all(&self, path: &Utf8Path) -> TxnResult<usize> {
        self.lock().create_dir_all(path)
    }

    pub fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> TxnResult<()> {
        self.lock().write_file(path, contents)
    }

    pub fn commit(&self) -> TxnResult<()> {
        self.lock().commit()
    }

    pub fn rollback(&self) -> TxnResult<RollbackReport> {
        self.lock().rollback()
    }

    pub fn state(&self) -> TransactionState {
        self.lock().state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn concurrent_writers_are_all_recorded() {
        let td = tempfile::tempdir().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).expect("utf8");
        let shared = SharedTransactionLog::new(TransactionLog::new(&root));

        thread::scope(|scope| {
            for i in 0..8 {
                let log = shared.clone();
                scope.spawn(move || {
                    let path = Utf8PathBuf::from(format!("icons/icon-{i}.svg"));
                    log.write_file(&path, b"<svg/>").expect("write");
                });
            }
        });

        let state = shared.state();
        assert_eq!(state.created_files().count(), 8);
        assert_eq!(state.created_dirs().count(), 1);

        let report = shared.rollback().expect("rollback");
        assert_eq!(report.removed_files.len(), 8);
        assert!(!root.join("icons").exists());
    }
}

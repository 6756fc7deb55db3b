//! Error types for the transaction log.

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxnError {
    /// `rollback()` after `commit()` is a programming error at the call site.
    #[error("transaction {id} is committed; rollback is not allowed")]
    AlreadyCommitted { id: String },

    /// The log no longer accepts changes (committed or rolled back).
    #[error("transaction {id} is finalized; no further changes are accepted")]
    Finalized { id: String },

    #[error("cannot commit transaction {id}: it was rolled back")]
    AlreadyRolledBack { id: String },

    /// A path is either pre-existing and backed up, or newly created. Never both.
    #[error("{path} is backed up as a pre-existing file and cannot be tracked as created")]
    ConflictingTrack { path: Utf8PathBuf },

    #[error("{path} is a directory and cannot be backed up as a file")]
    NotAFile { path: Utf8PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type TxnResult<T> = Result<T, TxnError>;

#[cfg(test)]
mod tests {
    use super::TxnError;

    #[test]
    fn already_committed_mentions_rollback() {
        let err = TxnError::AlreadyCommitted {
            id: "abc".to_string(),
        };
        assert!(err.to_string().contains("abc"));
        assert!(err.to_string().contains("rollback is not allowed"));
    }

    #[test]
    fn conflicting_track_names_the_path() {
        let err = TxnError::ConflictingTrack {
            path: "public/index.html".into(),
        };
        assert!(err.to_string().contains("public/index.html"));
    }
}

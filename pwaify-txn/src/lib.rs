//! Filesystem transaction log for pwaify runs.
//!
//! Every write a pipeline stage makes is recorded here first: pre-existing
//! files are backed up (first capture wins), new files and directories are
//! tracked for deletion. A run ends with exactly one of [`TransactionLog::commit`]
//! or [`TransactionLog::rollback`].
//!
//! Rollback is best-effort. It is not atomic against crashes or against other
//! processes writing into the project at the same time.

mod error;
mod log;
mod paths;
mod shared;

pub use error::{TxnError, TxnResult};
pub use log::{FileBackup, TransactionLog};
pub use paths::normalize;
pub use shared::SharedTransactionLog;

//! Error types for parsing and injection.

use crate::slots::MarkerSlot;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("input contains a NUL byte at offset {offset}; not an HTML document")]
    BinaryContent { offset: usize },
}

#[derive(Debug, Error)]
pub enum InjectError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Raised before anything is written; the source document is untouched on disk.
    #[error("head would be {bytes} bytes after injection, over the {limit}-byte budget")]
    HeadBudgetExceeded { bytes: usize, limit: usize },

    #[error("slot {slot} has {count} marked elements after injection, expected exactly one")]
    MarkerCount { slot: MarkerSlot, count: usize },
}

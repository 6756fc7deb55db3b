//! Shared DTOs (schemas-as-code) for the pwaify workspace.
//!
//! # Design constraints
//! - These types are serialized into `--json` output and must stay stable.
//! - Prefer adding optional fields over changing semantics.

pub mod manifest;
pub mod result;
pub mod scan;
pub mod txn;

/// Schema identifiers.
pub mod schema {
    pub const PWAIFY_RESULT_V1: &str = "pwaify.result.v1";
    pub const PWAIFY_SCAN_V1: &str = "pwaify.scan.v1";
}

//! Embeddable core library for pwaify.
//!
//! Provides a clap-free entry point that turns a web project into an
//! installable PWA inside one filesystem transaction.
//!
//! # Port traits
//!
//! The pipeline's collaborators are abstracted behind traits in [`ports`]:
//! - [`Scanner`](ports::Scanner) classifies the project
//! - [`IconRenderer`](ports::IconRenderer) writes icon files
//! - [`ManifestWriter`](ports::ManifestWriter) and
//!   [`ServiceWorkerWriter`](ports::ServiceWorkerWriter) write the generated assets
//!
//! The [`adapters`] module provides default filesystem-backed implementations.
//!
//! # Entry point
//!
//! [`PipelineRunner::run`](pipeline::PipelineRunner::run) runs every enabled
//! stage and returns a [`PipelineResult`](pwaify_types::result::PipelineResult).

pub mod adapters;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod settings;

pub use error::StageError;
pub use pipeline::{Collaborators, PipelineRunner};
pub use settings::{AppSettings, IconSettings, PipelineSettings, StageToggles};

// Re-exported so embedders don't need the lower crates directly.
pub use pwaify_txn::{SharedTransactionLog, TransactionLog};
pub use pwaify_types::result::{PipelineResult, RunOutcome, StageName};

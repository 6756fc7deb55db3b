//! Port traits for the pipeline's collaborators.
//!
//! Every write a collaborator makes goes through the run's
//! [`SharedTransactionLog`] so the runner can undo it.

use camino::{Utf8Path, Utf8PathBuf};
use pwaify_domain::{ManifestOptions, ServiceWorkerOptions};
use pwaify_txn::SharedTransactionLog;
use pwaify_types::scan::ScanResult;

/// Read-only project classification.
pub trait Scanner {
    fn scan(&self, project_root: &Utf8Path) -> anyhow::Result<ScanResult>;
}

#[derive(Debug, Clone)]
pub struct IconRequest {
    /// Source image; `None` renders a placeholder.
    pub source: Option<Utf8PathBuf>,
    pub sizes: Vec<u32>,
    /// Directory for rendered icons, relative to the project root.
    pub out_dir: Utf8PathBuf,
    pub app_name: String,
    pub background_color: String,
    pub foreground_color: String,
    pub workers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedIcon {
    pub size: u32,
    /// Project-relative path of the written file.
    pub path: Utf8PathBuf,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct IconRenderReport {
    pub rendered: Vec<RenderedIcon>,
    /// Sizes that failed, with the reason.
    pub failures: Vec<(u32, String)>,
    pub warnings: Vec<String>,
}

pub trait IconRenderer {
    /// Render every requested size. Per-size failures go into the report;
    /// `Err` means nothing could be attempted (unreadable or invalid source).
    fn render(
        &self,
        request: &IconRequest,
        log: &SharedTransactionLog,
    ) -> anyhow::Result<IconRenderReport>;
}

/// A file a writer produced, plus anything worth telling the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: Utf8PathBuf,
    pub warnings: Vec<String>,
}

pub trait ManifestWriter {
    fn generate(
        &self,
        options: &ManifestOptions,
        path: &Utf8Path,
        log: &SharedTransactionLog,
    ) -> anyhow::Result<GeneratedFile>;
}

pub trait ServiceWorkerWriter {
    fn generate(
        &self,
        options: &ServiceWorkerOptions,
        path: &Utf8Path,
        log: &SharedTransactionLog,
    ) -> anyhow::Result<GeneratedFile>;
}

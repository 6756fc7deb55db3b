//! Default filesystem-backed port implementations.

use crate::ports::{
    GeneratedFile, IconRenderReport, IconRenderer, IconRequest, ManifestWriter, RenderedIcon,
    Scanner, ServiceWorkerWriter,
};
use anyhow::Context;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use fs_err as fs;
use glob::{Pattern, glob};
use pwaify_domain::{
    FsProjectView, IconSource, ImageFormat, ManifestOptions, ServiceWorkerOptions, build_manifest,
    render_manifest, render_service_worker, scan_project,
};
use pwaify_txn::SharedTransactionLog;
use pwaify_types::scan::ScanResult;
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, warn};

/// Heuristic scanner over the real project directory.
#[derive(Debug, Clone, Default)]
pub struct FsScanner;

impl Scanner for FsScanner {
    fn scan(&self, project_root: &Utf8Path) -> anyhow::Result<ScanResult> {
        let view = FsProjectView::new(project_root.to_path_buf());
        scan_project(&view).with_context(|| format!("scan {}", project_root))
    }
}

/// Renders icons from an SVG or raster source on a bounded set of scoped threads.
#[derive(Debug, Clone, Default)]
pub struct FsIconRenderer;

impl IconRenderer for FsIconRenderer {
    fn render(
        &self,
        request: &IconRequest,
        log: &SharedTransactionLog,
    ) -> anyhow::Result<IconRenderReport> {
        let mut report = IconRenderReport::default();

        let source = match &request.source {
            Some(path) => {
                let bytes = fs::read(log.resolve(path))
                    .with_context(|| format!("read icon source {}", path))?;
                IconSource::from_bytes(bytes, path.as_str())
                    .with_context(|| format!("load icon source {}", path))?
            }
            None => {
                report
                    .warnings
                    .push("no icon source provided, used placeholder".to_string());
                IconSource::placeholder(
                    &request.app_name,
                    &request.background_color,
                    &request.foreground_color,
                )
            }
        };
        if source.format() != ImageFormat::Svg {
            report.warnings.push(format!(
                "{} icon source copied at its original resolution for every size",
                source.format().extension()
            ));
        }

        log.create_dir_all(&request.out_dir)
            .with_context(|| format!("create icon directory {}", request.out_dir))?;

        for (size, result) in render_all(&source, request, log) {
            match result {
                Ok(icon) => report.rendered.push(icon),
                Err(err) => {
                    warn!(size, error = %format!("{err:#}"), "icon render failed");
                    report.failures.push((size, format!("{err:#}")));
                }
            }
        }
        report.rendered.sort_by_key(|icon| icon.size);
        report.failures.sort_by_key(|(size, _)| *size);
        debug!(
            rendered = report.rendered.len(),
            failed = report.failures.len(),
            "icons rendered"
        );
        Ok(report)
    }
}

fn render_one(
    source: &IconSource,
    size: u32,
    out_dir: &Utf8Path,
    log: &SharedTransactionLog,
) -> anyhow::Result<RenderedIcon> {
    let bytes = source
        .render(size)
        .with_context(|| format!("render {size}x{size}"))?;
    let path = out_dir.join(source.file_name(size));
    log.write_file(&path, &bytes)
        .with_context(|| format!("write {}", path))?;
    Ok(RenderedIcon {
        size,
        path,
        mime_type: source.format().mime_type().to_string(),
    })
}

/// Each worker pulls the next size until none are left; one failure does not stop the rest.
fn render_all(
    source: &IconSource,
    request: &IconRequest,
    log: &SharedTransactionLog,
) -> Vec<(u32, anyhow::Result<RenderedIcon>)> {
    let sizes = &request.sizes;
    let workers = request.workers.clamp(1, sizes.len().max(1));
    let next = AtomicUsize::new(0);
    let results = Mutex::new(Vec::with_capacity(sizes.len()));

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(&size) = sizes.get(index) else {
                        break;
                    };
                    let result = render_one(source, size, &request.out_dir, log);
                    results
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .push((size, result));
                }
            });
        }
    });

    results
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Writes `manifest.json` through the transaction log.
#[derive(Debug, Clone, Default)]
pub struct JsonManifestWriter;

impl ManifestWriter for JsonManifestWriter {
    fn generate(
        &self,
        options: &ManifestOptions,
        path: &Utf8Path,
        log: &SharedTransactionLog,
    ) -> anyhow::Result<GeneratedFile> {
        let built = build_manifest(options).context("build manifest")?;
        let json = render_manifest(&built.manifest).context("serialize manifest")?;
        log.write_file(path, json.as_bytes())
            .with_context(|| format!("write {}", path))?;
        Ok(GeneratedFile {
            path: path.to_path_buf(),
            warnings: built.warnings,
        })
    }
}

/// Writes a dependency-free service worker through the transaction log.
#[derive(Debug, Clone, Default)]
pub struct JsServiceWorkerWriter;

impl ServiceWorkerWriter for JsServiceWorkerWriter {
    fn generate(
        &self,
        options: &ServiceWorkerOptions,
        path: &Utf8Path,
        log: &SharedTransactionLog,
    ) -> anyhow::Result<GeneratedFile> {
        let js = render_service_worker(options).context("render service worker")?;
        log.write_file(path, js.as_bytes())
            .with_context(|| format!("write {}", path))?;
        Ok(GeneratedFile {
            path: path.to_path_buf(),
            warnings: Vec::new(),
        })
    }
}

/// Deepest directory level searched below each base.
const MAX_HTML_DEPTH: usize = 3;

const SKIPPED_DIRS: &[&str] = &["node_modules", ".git"];

/// HTML files under `output_dir` and `templates/`, relative to `root`, sorted.
pub fn discover_html_targets(
    root: &Utf8Path,
    output_dir: &Utf8Path,
) -> anyhow::Result<Vec<Utf8PathBuf>> {
    // Glob results are compared against the root, so both must be spelled the same way.
    let root = &root
        .canonicalize_utf8()
        .with_context(|| format!("resolve project root {root}"))?;
    let mut bases = vec![output_dir.to_path_buf()];
    let templates = Utf8PathBuf::from("templates");
    if root.join(&templates).is_dir() && !output_dir.starts_with(&templates) {
        bases.push(templates);
    }

    let mut found = BTreeSet::new();
    for base in &bases {
        let dir = if base == "." {
            root.to_path_buf()
        } else {
            root.join(base)
        };
        let prefix = Pattern::escape(dir.as_str());
        for depth in 0..MAX_HTML_DEPTH {
            let pattern = format!("{prefix}/{}*.html", "*/".repeat(depth));
            debug!(pattern = %pattern, "scanning for HTML files");
            for entry in glob(&pattern).with_context(|| format!("glob {pattern}"))? {
                let path = entry.map_err(|e| anyhow::anyhow!("glob error: {e}"))?;
                let Ok(path) = Utf8PathBuf::from_path_buf(path) else {
                    continue;
                };
                let Ok(rel) = path.strip_prefix(root) else {
                    continue;
                };
                if rel.components().any(is_skipped) || !path.is_file() {
                    continue;
                }
                found.insert(normalize_rel(rel));
            }
        }
    }
    Ok(found.into_iter().collect())
}

fn is_skipped(component: Utf8Component<'_>) -> bool {
    match component {
        Utf8Component::Normal(name) => SKIPPED_DIRS.contains(&name),
        _ => false,
    }
}

fn normalize_rel(rel: &Utf8Path) -> Utf8PathBuf {
    rel.components()
        .filter(|c| !matches!(c, Utf8Component::CurDir))
        .collect()
}

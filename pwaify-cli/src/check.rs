//! Read-only PWA readiness check of a project.

use anyhow::Context;
use camino::Utf8PathBuf;
use fs_err as fs;
use pwaify_core::PipelineSettings;
use pwaify_core::adapters::{FsScanner, discover_html_targets};
use pwaify_core::ports::Scanner;
use pwaify_inject::{MarkerSlot, parse_document, sentinel_counts};
use pwaify_types::manifest::WebManifest;
use pwaify_types::scan::ScanResult;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Slots a page must carry to be installable.
const REQUIRED_SLOTS: [MarkerSlot; 3] = [
    MarkerSlot::ManifestLink,
    MarkerSlot::ThemeColor,
    MarkerSlot::ServiceWorkerRegistration,
];

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub manifest_path: Utf8PathBuf,
    pub service_worker_path: Utf8PathBuf,
    pub pages: Vec<PageCheck>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageCheck {
    pub path: Utf8PathBuf,
    /// Marker slot name -> number of marked elements.
    pub markers: BTreeMap<String, usize>,
}

pub fn check_project(settings: &PipelineSettings) -> anyhow::Result<CheckReport> {
    let root = &settings.project_root;
    let scan = match FsScanner.scan(root) {
        Ok(scan) => scan,
        Err(err) if settings.fallback_to_defaults => {
            warn!(error = %format!("{err:#}"), "scan failed, using defaults");
            ScanResult::generic()
        }
        Err(err) => return Err(err),
    };
    let layout = settings.output_layout(scan.framework);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let manifest_path = layout.path(&settings.manifest_file);
    let abs = root.join(&manifest_path);
    if abs.is_file() {
        let text = fs::read_to_string(&abs)?;
        match serde_json::from_str::<WebManifest>(&text) {
            Ok(manifest) if manifest.icons.is_empty() => {
                warnings.push(format!("{manifest_path} lists no icons"));
            }
            Ok(manifest) => {
                debug!(icons = manifest.icons.len(), "manifest ok");
            }
            Err(err) => errors.push(format!("{manifest_path} is not a valid manifest: {err}")),
        }
    } else {
        errors.push(format!("{manifest_path} is missing"));
    }

    let service_worker_path = layout.path(&settings.service_worker_file);
    if !root.join(&service_worker_path).is_file() {
        errors.push(format!("{service_worker_path} is missing"));
    }

    let targets = if settings.html_targets.is_empty() {
        discover_html_targets(root, layout.dir()).context("discover HTML files")?
    } else {
        settings.html_targets.clone()
    };
    if targets.is_empty() {
        warnings.push("no HTML files found".to_string());
    }

    let mut pages = Vec::with_capacity(targets.len());
    for path in targets {
        let source = fs::read_to_string(root.join(&path))?;
        let doc = match parse_document(&source) {
            Ok(doc) => doc,
            Err(err) => {
                warnings.push(format!("skipped {path}: {err}"));
                continue;
            }
        };
        let counts = sentinel_counts(&doc);
        for slot in MarkerSlot::ALL {
            let count = counts.get(&slot).copied().unwrap_or(0);
            match count {
                0 if REQUIRED_SLOTS.contains(&slot) => {
                    errors.push(format!("{path} has no {slot} tag"));
                }
                0 => warnings.push(format!("{path} has no {slot} tag")),
                1 => {}
                n => errors.push(format!("{path} has {n} {slot} tags")),
            }
        }
        pages.push(PageCheck {
            path,
            markers: counts
                .into_iter()
                .map(|(slot, n)| (slot.as_str().to_string(), n))
                .collect(),
        });
    }

    Ok(CheckReport {
        valid: errors.is_empty(),
        errors,
        warnings,
        manifest_path,
        service_worker_path,
        pages,
    })
}

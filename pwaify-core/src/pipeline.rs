//! The PWA enablement pipeline.
//!
//! Stages run in a fixed order against one transaction log. A fatal stage
//! error stops the run; injection errors only become warnings. Whether the
//! log is committed or rolled back is decided once, in `settle`.

use crate::adapters::{
    FsIconRenderer, FsScanner, JsServiceWorkerWriter, JsonManifestWriter, discover_html_targets,
};
use crate::error::StageError;
use crate::ports::{
    IconRenderer, IconRequest, ManifestWriter, RenderedIcon, Scanner, ServiceWorkerWriter,
};
use crate::settings::PipelineSettings;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use fs_err as fs;
use pwaify_domain::{APPLE_TOUCH_SIZE, ManifestOptions, OutputLayout, ServiceWorkerOptions};
use pwaify_inject::{InjectError, MarkerInjector, MarkerSlot, SlotValue, service_worker_snippet};
use pwaify_txn::{SharedTransactionLog, TransactionLog};
use pwaify_types::manifest::ManifestIcon;
use pwaify_types::result::{PipelineResult, RunOutcome, StageName};
use pwaify_types::scan::{Framework, ScanResult};
use pwaify_types::schema::PWAIFY_RESULT_V1;
use pwaify_types::txn::RollbackReport;
use tracing::{debug, error, info, warn};

/// The collaborators a run delegates to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub scanner: &'a dyn Scanner,
    pub icons: &'a dyn IconRenderer,
    pub manifest: &'a dyn ManifestWriter,
    pub service_worker: &'a dyn ServiceWorkerWriter,
}

impl Collaborators<'static> {
    /// Filesystem-backed defaults.
    pub fn fs() -> Self {
        Self {
            scanner: &FsScanner,
            icons: &FsIconRenderer,
            manifest: &JsonManifestWriter,
            service_worker: &JsServiceWorkerWriter,
        }
    }
}

/// State threaded through the stages of one run.
struct RunContext {
    log: SharedTransactionLog,
    scan: Option<ScanResult>,
    layout: OutputLayout,
    app_name: String,
    icons: Vec<RenderedIcon>,
    icons_generated: u64,
    manifest_path: Option<Utf8PathBuf>,
    service_worker_path: Option<Utf8PathBuf>,
    html_files_injected: u64,
    errors: Vec<String>,
    warnings: Vec<String>,
    notes: Vec<String>,
}

impl RunContext {
    fn new(settings: &PipelineSettings) -> Self {
        Self {
            log: SharedTransactionLog::new(TransactionLog::new(settings.project_root.clone())),
            scan: None,
            layout: OutputLayout::new(".", "/"),
            app_name: app_name(settings),
            icons: Vec::new(),
            icons_generated: 0,
            manifest_path: None,
            service_worker_path: None,
            html_files_injected: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn framework(&self) -> Framework {
        self.scan
            .as_ref()
            .map(|s| s.framework)
            .unwrap_or(Framework::Static)
    }

    fn into_result(
        self,
        started_at: DateTime<Utc>,
        outcome: RunOutcome,
        rollback: Option<RollbackReport>,
    ) -> PipelineResult {
        PipelineResult {
            schema: PWAIFY_RESULT_V1.to_string(),
            success: self.errors.is_empty(),
            transaction_id: self.log.id(),
            errors: self.errors,
            warnings: self.warnings,
            notes: self.notes,
            manifest_path: self.manifest_path,
            service_worker_path: self.service_worker_path,
            icons_generated: self.icons_generated,
            html_files_injected: self.html_files_injected,
            scan: self.scan,
            outcome,
            rollback,
            started_at,
            ended_at: Utc::now(),
        }
    }
}

fn app_name(settings: &PipelineSettings) -> String {
    if let Some(name) = settings.app.name.as_deref().map(str::trim)
        && !name.is_empty()
    {
        return name.to_string();
    }
    settings
        .project_root
        .canonicalize_utf8()
        .ok()
        .and_then(|p| p.file_name().map(str::to_string))
        .unwrap_or_else(|| "My App".to_string())
}

pub struct PipelineRunner<'a> {
    settings: PipelineSettings,
    ports: Collaborators<'a>,
}

impl PipelineRunner<'static> {
    pub fn with_defaults(settings: PipelineSettings) -> Self {
        Self::new(settings, Collaborators::fs())
    }
}

impl<'a> PipelineRunner<'a> {
    pub fn new(settings: PipelineSettings, ports: Collaborators<'a>) -> Self {
        Self { settings, ports }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run every enabled stage. Always returns a result; failures are reported in it.
    pub fn run(&self) -> PipelineResult {
        let started_at = Utc::now();
        let mut cx = RunContext::new(&self.settings);
        info!(
            txid = %cx.log.id(),
            root = %self.settings.project_root,
            dry_run = self.settings.dry_run,
            "pipeline started"
        );

        let fatal = self.run_stages(&mut cx).err();
        let (outcome, rollback) = self.settle(&mut cx, fatal);
        let result = cx.into_result(started_at, outcome, rollback);
        info!(
            success = result.success,
            outcome = ?result.outcome,
            icons = result.icons_generated,
            html = result.html_files_injected,
            "pipeline finished"
        );
        result
    }

    fn run_stages(&self, cx: &mut RunContext) -> Result<(), StageError> {
        for stage in StageName::ORDER {
            if !self.settings.stages.enabled(stage) {
                info!(stage = %stage, "stage skipped");
                cx.notes.push(format!("{stage} stage skipped"));
                if stage == StageName::Scan {
                    self.adopt_scan(cx, ScanResult::generic());
                }
                continue;
            }
            debug!(stage = %stage, "stage started");
            match stage {
                StageName::Scan => self.scan(cx)?,
                StageName::Icons => self.icons(cx)?,
                StageName::Manifest => self.manifest(cx)?,
                StageName::ServiceWorker => self.service_worker(cx)?,
                StageName::Injection => self.injection(cx)?,
            }
        }
        Ok(())
    }

    fn scan(&self, cx: &mut RunContext) -> Result<(), StageError> {
        let scan = match self.ports.scanner.scan(&self.settings.project_root) {
            Ok(scan) => scan,
            Err(err) if self.settings.fallback_to_defaults => {
                warn!(error = %format!("{err:#}"), "scan failed, using defaults");
                cx.warnings.push(format!(
                    "project scan failed, using static-site defaults: {err:#}"
                ));
                ScanResult::generic()
            }
            Err(err) => return Err(StageError::ScanFailed(err)),
        };
        info!(
            framework = %scan.framework,
            confidence = ?scan.confidence,
            "project scanned"
        );
        self.adopt_scan(cx, scan);
        Ok(())
    }

    fn adopt_scan(&self, cx: &mut RunContext, scan: ScanResult) {
        cx.layout = self.settings.output_layout(scan.framework);
        debug!(dir = %cx.layout.dir(), base = cx.layout.url_base(), "output layout");
        cx.scan = Some(scan);
    }

    fn icons(&self, cx: &mut RunContext) -> Result<(), StageError> {
        let s = &self.settings;
        let mut sizes = s.icons.sizes.clone();
        sizes.sort_unstable();
        sizes.dedup();

        let request = IconRequest {
            source: s.icons.source.clone(),
            sizes,
            out_dir: cx.layout.path(&s.icons.dir),
            app_name: cx.app_name.clone(),
            background_color: s.app.theme_color.clone(),
            foreground_color: s.app.background_color.clone(),
            workers: s.icons.workers.max(1),
        };
        let report = self
            .ports
            .icons
            .render(&request, &cx.log)
            .map_err(StageError::from_icon_error)?;

        cx.warnings.extend(report.warnings);
        cx.icons_generated = report.rendered.len() as u64;
        if report.rendered.is_empty() && !report.failures.is_empty() {
            let reasons = report
                .failures
                .iter()
                .map(|(size, why)| format!("{size}px: {why}"))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(StageError::IconGenerationFailed {
                message: format!("no icon could be rendered ({reasons})"),
            });
        }
        for (size, why) in &report.failures {
            cx.warnings
                .push(format!("icon {size}x{size} was not generated: {why}"));
        }
        cx.icons = report.rendered;
        Ok(())
    }

    fn icon_href(&self, cx: &RunContext, icon: &RenderedIcon) -> String {
        let file = icon.path.file_name().unwrap_or_default();
        cx.layout.href(&format!("{}/{}", self.settings.icons.dir, file))
    }

    fn manifest(&self, cx: &mut RunContext) -> Result<(), StageError> {
        let s = &self.settings;
        let icons = cx
            .icons
            .iter()
            .map(|icon| ManifestIcon {
                src: self.icon_href(cx, icon),
                sizes: format!("{0}x{0}", icon.size),
                mime_type: icon.mime_type.clone(),
                purpose: None,
            })
            .collect();
        let options = ManifestOptions {
            name: cx.app_name.clone(),
            short_name: s.app.short_name.clone(),
            description: s.app.description.clone(),
            start_url: s.app.start_url.clone(),
            scope: s.app.scope.clone(),
            display: s.app.display,
            theme_color: s.app.theme_color.clone(),
            background_color: s.app.background_color.clone(),
            icons,
        };
        let path = cx.layout.path(&s.manifest_file);
        let generated = self
            .ports
            .manifest
            .generate(&options, &path, &cx.log)
            .map_err(StageError::ManifestGenerationFailed)?;
        info!(path = %generated.path, "manifest written");
        cx.warnings.extend(generated.warnings);
        cx.manifest_path = Some(generated.path);
        Ok(())
    }

    fn service_worker(&self, cx: &mut RunContext) -> Result<(), StageError> {
        let s = &self.settings;
        let mut options = ServiceWorkerOptions::for_framework(cx.framework(), s.caching_strategy);

        let mut precache = vec![s.app.start_url.clone()];
        if cx.manifest_path.is_some() {
            precache.push(cx.layout.href(&s.manifest_file));
        }
        precache.extend(cx.icons.iter().map(|icon| self.icon_href(cx, icon)));
        precache.dedup();
        options.precache = precache;

        let path = cx.layout.path(&s.service_worker_file);
        let generated = self
            .ports
            .service_worker
            .generate(&options, &path, &cx.log)
            .map_err(StageError::ServiceWorkerGenerationFailed)?;
        info!(path = %generated.path, strategy = s.caching_strategy.as_str(), "service worker written");
        cx.warnings.extend(generated.warnings);
        cx.service_worker_path = Some(generated.path);
        Ok(())
    }

    fn slot_values(&self, cx: &RunContext) -> Vec<SlotValue> {
        let s = &self.settings;
        let title = s
            .app
            .short_name
            .clone()
            .unwrap_or_else(|| cx.app_name.clone());

        let mut values = Vec::new();
        if cx.manifest_path.is_some() {
            values.push(SlotValue::new(
                MarkerSlot::ManifestLink,
                cx.layout.href(&s.manifest_file),
            ));
        }
        values.push(SlotValue::new(MarkerSlot::ThemeColor, s.app.theme_color.clone()));
        let touch_icon = cx
            .icons
            .iter()
            .find(|icon| icon.size == APPLE_TOUCH_SIZE)
            .or_else(|| cx.icons.last());
        if let Some(icon) = touch_icon {
            values.push(SlotValue::new(
                MarkerSlot::AppleTouchIcon,
                self.icon_href(cx, icon),
            ));
        }
        values.push(SlotValue::new(MarkerSlot::AppleWebAppCapable, "yes"));
        values.push(SlotValue::new(MarkerSlot::MobileWebAppCapable, "yes"));
        values.push(SlotValue::new(MarkerSlot::AppleWebAppTitle, title));
        if cx.service_worker_path.is_some() {
            values.push(SlotValue::new(
                MarkerSlot::ServiceWorkerRegistration,
                service_worker_snippet(&cx.layout.href(&s.service_worker_file), &s.app.scope),
            ));
        }
        values
    }

    /// Best-effort: per-file failures become warnings and never abort the run.
    fn injection(&self, cx: &mut RunContext) -> Result<(), StageError> {
        let s = &self.settings;
        let injector =
            MarkerInjector::new(self.slot_values(cx)).with_head_budget(s.head_budget_bytes);

        let targets = if s.html_targets.is_empty() {
            match discover_html_targets(&s.project_root, cx.layout.dir()) {
                Ok(found) => found,
                Err(err) => {
                    cx.warnings
                        .push(format!("HTML discovery failed: {err:#}"));
                    Vec::new()
                }
            }
        } else {
            s.html_targets.clone()
        };
        if targets.is_empty() {
            cx.warnings
                .push("no HTML files found; nothing was injected".to_string());
        }

        for target in &targets {
            match inject_file(&cx.log, &injector, target) {
                Ok(true) => {
                    info!(file = %target, "tags injected");
                    cx.html_files_injected += 1;
                }
                Ok(false) => debug!(file = %target, "already up to date"),
                Err(err) => recover(cx, err)?,
            }
        }
        Ok(())
    }

    /// The single commit-or-rollback decision of a run.
    fn settle(
        &self,
        cx: &mut RunContext,
        fatal: Option<StageError>,
    ) -> (RunOutcome, Option<RollbackReport>) {
        let roll_back = match fatal {
            Some(err) => {
                error!(stage = ?err.stage(), error = %err, "fatal stage error, rolling back");
                cx.errors.push(err.to_string());
                true
            }
            None if self.settings.dry_run => {
                cx.notes
                    .push("dry run: all changes rolled back".to_string());
                true
            }
            None => false,
        };

        if !roll_back {
            match cx.log.commit() {
                Ok(()) => {
                    info!(txid = %cx.log.id(), "transaction committed");
                    return (RunOutcome::Committed, None);
                }
                Err(err) => cx.errors.push(format!("commit failed: {err}")),
            }
        }

        match cx.log.rollback() {
            Ok(report) => {
                if !report.failures.is_empty() {
                    cx.warnings.push(
                        StageError::RollbackPartialFailure {
                            failures: report.failures.len(),
                        }
                        .to_string(),
                    );
                    for failure in &report.failures {
                        cx.warnings.push(format!(
                            "rollback could not {:?} {}: {}",
                            failure.action, failure.path, failure.message
                        ));
                    }
                }
                for dir in &report.retained_dirs {
                    cx.warnings.push(format!(
                        "kept {}: it contains files this run did not create ({})",
                        dir.path,
                        dir.untracked_entries.join(", ")
                    ));
                }
                info!(
                    txid = %cx.log.id(),
                    removed = report.removed_files.len(),
                    restored = report.restored_files.len(),
                    "transaction rolled back"
                );
                (RunOutcome::RolledBack, Some(report))
            }
            Err(err) => {
                cx.warnings.push(format!("rollback failed: {err}"));
                (RunOutcome::RolledBack, None)
            }
        }
    }
}

/// Downgrade a non-fatal stage error to a warning; fatal ones propagate.
fn recover(cx: &mut RunContext, err: StageError) -> Result<(), StageError> {
    if err.is_fatal() {
        return Err(err);
    }
    warn!(stage = ?err.stage(), error = %err, "recovered stage error");
    cx.warnings.push(err.to_string());
    Ok(())
}

/// Inject into one file. Returns `true` when the file was rewritten.
fn inject_file(
    log: &SharedTransactionLog,
    injector: &MarkerInjector,
    target: &Utf8Path,
) -> Result<bool, StageError> {
    let failed = |message: String| StageError::InjectionFailed {
        path: target.to_path_buf(),
        message,
    };
    let bytes = fs::read(log.resolve(target)).map_err(|e| failed(e.to_string()))?;
    let source = String::from_utf8(bytes).map_err(|_| StageError::ParsingFailed {
        path: target.to_path_buf(),
        message: "not valid UTF-8".to_string(),
    })?;

    let injected = injector.inject_html(&source).map_err(|err| match err {
        InjectError::Parse(e) => StageError::ParsingFailed {
            path: target.to_path_buf(),
            message: e.to_string(),
        },
        other => failed(other.to_string()),
    })?;
    if !injected.changed {
        return Ok(false);
    }
    log.write_file(target, injected.html.as_bytes())
        .map_err(|e| failed(e.to_string()))?;
    Ok(true)
}

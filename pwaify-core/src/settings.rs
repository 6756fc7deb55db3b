//! Clap-free settings for the pipeline.

use camino::Utf8PathBuf;
use pwaify_domain::{DEFAULT_ICON_SIZES, FsProjectView, OutputLayout};
use pwaify_inject::HEAD_BUDGET_BYTES;
use pwaify_types::manifest::{CachingStrategy, DisplayMode};
use pwaify_types::result::StageName;
use pwaify_types::scan::Framework;

/// App metadata written into the manifest and page heads.
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Defaults to the project directory name.
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub description: Option<String>,
    pub theme_color: String,
    pub background_color: String,
    pub start_url: String,
    pub scope: String,
    pub display: DisplayMode,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: None,
            short_name: None,
            description: None,
            theme_color: "#000000".to_string(),
            background_color: "#FFFFFF".to_string(),
            start_url: "/".to_string(),
            scope: "/".to_string(),
            display: DisplayMode::Standalone,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IconSettings {
    /// Source image, relative to the project root.
    pub source: Option<Utf8PathBuf>,
    pub sizes: Vec<u32>,
    /// Directory name under the output directory.
    pub dir: String,
    /// Upper bound on concurrent renders.
    pub workers: usize,
}

impl Default for IconSettings {
    fn default() -> Self {
        Self {
            source: None,
            sizes: DEFAULT_ICON_SIZES.to_vec(),
            dir: "icons".to_string(),
            workers: 4,
        }
    }
}

/// Which stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageToggles {
    pub scan: bool,
    pub icons: bool,
    pub manifest: bool,
    pub service_worker: bool,
    pub injection: bool,
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            scan: true,
            icons: true,
            manifest: true,
            service_worker: true,
            injection: true,
        }
    }
}

impl StageToggles {
    pub fn enabled(&self, stage: StageName) -> bool {
        match stage {
            StageName::Scan => self.scan,
            StageName::Icons => self.icons,
            StageName::Manifest => self.manifest,
            StageName::ServiceWorker => self.service_worker,
            StageName::Injection => self.injection,
        }
    }

    pub fn set(&mut self, stage: StageName, enabled: bool) {
        match stage {
            StageName::Scan => self.scan = enabled,
            StageName::Icons => self.icons = enabled,
            StageName::Manifest => self.manifest = enabled,
            StageName::ServiceWorker => self.service_worker = enabled,
            StageName::Injection => self.injection = enabled,
        }
    }
}

/// Settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub project_root: Utf8PathBuf,
    pub app: AppSettings,
    pub icons: IconSettings,
    pub stages: StageToggles,

    /// A failed scan falls back to generic static-site defaults instead of aborting.
    /// Off unless requested.
    pub fallback_to_defaults: bool,
    pub caching_strategy: CachingStrategy,

    // Output
    /// Relative to the project root; detected from the framework when unset.
    pub output_dir: Option<Utf8PathBuf>,
    /// URL prefix the output directory is served under.
    pub base_path: Option<String>,
    pub manifest_file: String,
    pub service_worker_file: String,

    // Injection
    /// Explicit HTML files, relative to the project root. Empty means discover.
    pub html_targets: Vec<Utf8PathBuf>,
    pub head_budget_bytes: usize,

    /// Run every stage, then roll back regardless of outcome.
    pub dry_run: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            project_root: Utf8PathBuf::from("."),
            app: AppSettings::default(),
            icons: IconSettings::default(),
            stages: StageToggles::default(),
            fallback_to_defaults: false,
            caching_strategy: CachingStrategy::default(),
            output_dir: None,
            base_path: None,
            manifest_file: "manifest.json".to_string(),
            service_worker_file: "sw.js".to_string(),
            html_targets: Vec::new(),
            head_budget_bytes: HEAD_BUDGET_BYTES,
            dry_run: false,
        }
    }
}

impl PipelineSettings {
    /// Where artifacts go: the configured directory, else the framework's conventional one.
    pub fn output_layout(&self, framework: Framework) -> OutputLayout {
        let base = self.base_path.as_deref();
        match &self.output_dir {
            Some(dir) => OutputLayout::new(dir.clone(), base.unwrap_or("/")),
            None => {
                let view = FsProjectView::new(self.project_root.clone());
                let detected = OutputLayout::detect(&view, framework);
                match base {
                    Some(base) => OutputLayout::new(detected.dir().to_path_buf(), base),
                    None => detected,
                }
            }
        }
    }
}

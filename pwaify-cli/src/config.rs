//! Configuration file loading for pwaify.
//!
//! Discovers and loads `pwaify.toml` from the project root.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use pwaify_core::PipelineSettings;
use pwaify_types::manifest::{CachingStrategy, DisplayMode};
use pwaify_types::result::StageName;
use serde::Deserialize;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "pwaify.toml";

/// Top-level configuration from pwaify.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PwaifyConfig {
    pub app: AppConfig,
    pub icons: IconsConfig,
    pub stages: StagesConfig,
    pub output: OutputConfig,
    pub injection: InjectionConfig,
}

/// `[app]`: manifest metadata.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub description: Option<String>,
    pub theme_color: Option<String>,
    pub background_color: Option<String>,
    pub start_url: Option<String>,
    pub scope: Option<String>,
    pub display: Option<DisplayMode>,
}

/// `[icons]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IconsConfig {
    /// Source image, relative to the project root.
    pub source: Option<Utf8PathBuf>,
    pub sizes: Option<Vec<u32>>,
    pub dir: Option<String>,
    pub workers: Option<usize>,
}

/// `[stages]`: per-stage switches.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StagesConfig {
    pub scan: Option<bool>,
    pub icons: Option<bool>,
    pub manifest: Option<bool>,
    pub service_worker: Option<bool>,
    pub injection: Option<bool>,

    /// Continue with static-site defaults when the scan fails.
    pub fallback_to_defaults: Option<bool>,
}

/// `[output]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: Option<Utf8PathBuf>,
    pub base_path: Option<String>,
    pub manifest_file: Option<String>,
    pub service_worker_file: Option<String>,
    pub caching_strategy: Option<CachingStrategy>,
}

/// `[injection]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InjectionConfig {
    /// Explicit HTML files; discovery is used when empty.
    pub targets: Vec<Utf8PathBuf>,
    pub head_budget_bytes: Option<usize>,
}

/// Discover the pwaify.toml config file.
///
/// Returns `None` if no config file is found.
pub fn discover_config(project_root: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = project_root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!(path = %config_path, "found config file");
        Some(config_path)
    } else {
        debug!(path = %config_path, "no config file");
        None
    }
}

pub fn load_config(path: &Utf8Path) -> anyhow::Result<PwaifyConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<PwaifyConfig> {
    let config: PwaifyConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from the project root, or return default if not found.
pub fn load_or_default(project_root: &Utf8Path) -> anyhow::Result<PwaifyConfig> {
    match discover_config(project_root) {
        Some(path) => load_config(&path),
        None => Ok(PwaifyConfig::default()),
    }
}

/// CLI values that override the config file. `None` and empty mean "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub theme_color: Option<String>,
    pub background_color: Option<String>,
    pub display: Option<DisplayMode>,
    pub icon_source: Option<Utf8PathBuf>,
    pub icon_workers: Option<usize>,
    pub output_dir: Option<Utf8PathBuf>,
    pub base_path: Option<String>,
    pub caching_strategy: Option<CachingStrategy>,
    pub html: Vec<Utf8PathBuf>,
    pub skip: Vec<StageName>,
    /// `Some` when `--fallback` or `--no-fallback` was given.
    pub fallback: Option<bool>,
    pub dry_run: bool,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: PwaifyConfig,
}

impl ConfigMerger {
    pub fn new(config: PwaifyConfig) -> Self {
        Self { config }
    }

    /// Produce pipeline settings: defaults, then the config file, then the CLI.
    pub fn merge(self, project_root: Utf8PathBuf, cli: CliOverrides) -> PipelineSettings {
        let PwaifyConfig {
            app,
            icons,
            stages,
            output,
            injection,
        } = self.config;
        let mut s = PipelineSettings {
            project_root,
            ..PipelineSettings::default()
        };

        s.app.name = cli.name.or(app.name);
        s.app.short_name = cli.short_name.or(app.short_name);
        s.app.description = app.description;
        if let Some(color) = cli.theme_color.or(app.theme_color) {
            s.app.theme_color = color;
        }
        if let Some(color) = cli.background_color.or(app.background_color) {
            s.app.background_color = color;
        }
        if let Some(url) = app.start_url {
            s.app.start_url = url;
        }
        if let Some(scope) = app.scope {
            s.app.scope = scope;
        }
        if let Some(display) = cli.display.or(app.display) {
            s.app.display = display;
        }

        s.icons.source = cli.icon_source.or(icons.source);
        if let Some(sizes) = icons.sizes {
            s.icons.sizes = sizes;
        }
        if let Some(dir) = icons.dir {
            s.icons.dir = dir;
        }
        if let Some(workers) = cli.icon_workers.or(icons.workers) {
            s.icons.workers = workers;
        }

        for (stage, enabled) in [
            (StageName::Scan, stages.scan),
            (StageName::Icons, stages.icons),
            (StageName::Manifest, stages.manifest),
            (StageName::ServiceWorker, stages.service_worker),
            (StageName::Injection, stages.injection),
        ] {
            if let Some(enabled) = enabled {
                s.stages.set(stage, enabled);
            }
        }
        for stage in cli.skip {
            s.stages.set(stage, false);
        }
        s.fallback_to_defaults = cli
            .fallback
            .or(stages.fallback_to_defaults)
            .unwrap_or(false);

        s.output_dir = cli.output_dir.or(output.dir);
        s.base_path = cli.base_path.or(output.base_path);
        if let Some(file) = output.manifest_file {
            s.manifest_file = file;
        }
        if let Some(file) = output.service_worker_file {
            s.service_worker_file = file;
        }
        if let Some(strategy) = cli.caching_strategy.or(output.caching_strategy) {
            s.caching_strategy = strategy;
        }

        s.html_targets = if cli.html.is_empty() {
            injection.targets
        } else {
            cli.html
        };
        if let Some(budget) = injection.head_budget_bytes {
            s.head_budget_bytes = budget;
        }
        s.dry_run = cli.dry_run;
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let contents = r##"
[app]
name = "Field Notes"
short_name = "Notes"
theme_color = "#336699"
display = "minimal-ui"

[icons]
source = "assets/logo.svg"
sizes = [192, 512]
workers = 2

[stages]
service_worker = false
fallback_to_defaults = false

[output]
dir = "static"
base_path = "/static"
caching_strategy = "aggressive"

[injection]
targets = ["templates/base.html"]
head_budget_bytes = 8192
"##;

        let config = parse_config(contents).unwrap();
        assert_eq!(config.app.name.as_deref(), Some("Field Notes"));
        assert_eq!(config.app.display, Some(DisplayMode::MinimalUi));
        assert_eq!(config.icons.sizes, Some(vec![192, 512]));
        assert_eq!(config.stages.service_worker, Some(false));
        assert_eq!(config.output.caching_strategy, Some(CachingStrategy::Aggressive));
        assert_eq!(config.injection.targets, vec![Utf8PathBuf::from("templates/base.html")]);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("").unwrap();
        assert!(config.app.name.is_none());
        assert!(config.injection.targets.is_empty());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = parse_config("[app]\ncolour = \"red\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("colour"));
    }

    #[test]
    fn test_merge_defaults_without_config_or_cli() {
        let s = ConfigMerger::new(PwaifyConfig::default())
            .merge(Utf8PathBuf::from("site"), CliOverrides::default());
        assert_eq!(s.project_root, Utf8PathBuf::from("site"));
        assert_eq!(s.app.theme_color, "#000000");
        assert_eq!(s.app.background_color, "#FFFFFF");
        assert!(!s.fallback_to_defaults);
        assert!(s.stages.enabled(StageName::Injection));
        assert!(!s.dry_run);
    }

    #[test]
    fn test_merge_cli_wins_over_config() {
        let config = parse_config(
            r##"
[app]
name = "From File"
theme_color = "#111111"

[output]
caching_strategy = "conservative"

[injection]
targets = ["a.html"]
"##,
        )
        .unwrap();
        let cli = CliOverrides {
            name: Some("From Flag".to_string()),
            caching_strategy: Some(CachingStrategy::Aggressive),
            html: vec![Utf8PathBuf::from("b.html")],
            ..CliOverrides::default()
        };

        let s = ConfigMerger::new(config).merge(Utf8PathBuf::from("."), cli);

        assert_eq!(s.app.name.as_deref(), Some("From Flag"));
        assert_eq!(s.app.theme_color, "#111111");
        assert_eq!(s.caching_strategy, CachingStrategy::Aggressive);
        assert_eq!(s.html_targets, vec![Utf8PathBuf::from("b.html")]);
    }

    #[test]
    fn test_merge_skip_flags_and_stage_table_combine() {
        let config = parse_config("[stages]\nicons = false\n").unwrap();
        let cli = CliOverrides {
            skip: vec![StageName::ServiceWorker],
            fallback: Some(false),
            ..CliOverrides::default()
        };

        let s = ConfigMerger::new(config).merge(Utf8PathBuf::from("."), cli);

        assert!(!s.stages.enabled(StageName::Icons));
        assert!(!s.stages.enabled(StageName::ServiceWorker));
        assert!(s.stages.enabled(StageName::Manifest));
        assert!(!s.fallback_to_defaults);
    }

    #[test]
    fn test_merge_fallback_requires_opt_in() {
        let from_file = parse_config("[stages]\nfallback_to_defaults = true\n").unwrap();
        let s = ConfigMerger::new(from_file.clone())
            .merge(Utf8PathBuf::from("."), CliOverrides::default());
        assert!(s.fallback_to_defaults);

        let cli = CliOverrides {
            fallback: Some(false),
            ..CliOverrides::default()
        };
        let s = ConfigMerger::new(from_file).merge(Utf8PathBuf::from("."), cli);
        assert!(!s.fallback_to_defaults);

        let cli = CliOverrides {
            fallback: Some(true),
            ..CliOverrides::default()
        };
        let s = ConfigMerger::new(PwaifyConfig::default()).merge(Utf8PathBuf::from("."), cli);
        assert!(s.fallback_to_defaults);
    }

    #[test]
    fn test_discover_config_some_and_none() {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        assert!(discover_config(&root).is_none());

        fs::write(root.join(CONFIG_FILE_NAME), "").expect("write config");
        assert!(discover_config(&root).is_some());
    }

    #[test]
    fn test_load_or_default_returns_default_when_missing() {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        let cfg = load_or_default(&root).expect("load default");
        assert!(cfg.app.name.is_none());
    }
}

//! Heuristic framework detection.
//!
//! Each detector collects indicators for one framework. A primary indicator
//! (e.g. `manage.py`) lifts confidence to medium; supporting indicators lift
//! medium to high. The most confident detection wins; ties go to the detector
//! listed first.

use crate::error::ScanError;
use crate::ports::ProjectView;
use camino::Utf8Path;
use pwaify_types::scan::{Architecture, BuildTool, Confidence, Framework, ScanResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug)]
struct Evidence {
    framework: Framework,
    confidence: Confidence,
    indicators: Vec<String>,
}

impl Evidence {
    fn new(framework: Framework) -> Self {
        Self {
            framework,
            confidence: Confidence::Low,
            indicators: Vec::new(),
        }
    }

    fn primary(&mut self, indicator: impl Into<String>) {
        self.indicators.push(indicator.into());
        self.confidence = self.confidence.max(Confidence::Medium);
    }

    fn supporting(&mut self, indicator: impl Into<String>) {
        self.indicators.push(indicator.into());
        if self.confidence == Confidence::Medium {
            self.confidence = Confidence::High;
        }
    }

    fn finish(self) -> Option<Self> {
        (!self.indicators.is_empty()).then_some(self)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageJson {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, serde_json::Value>,
}

impl PackageJson {
    fn load(view: &dyn ProjectView) -> Result<Option<Self>, ScanError> {
        let path = Utf8Path::new("package.json");
        if !view.exists(path) {
            return Ok(None);
        }
        let text = view.read_to_string(path)?;
        let pkg = serde_json::from_str(&text)
            .map_err(|source| ScanError::InvalidPackageJson { source })?;
        Ok(Some(pkg))
    }

    fn has(&self, name: &str) -> bool {
        self.dependencies.contains_key(name) || self.dev_dependencies.contains_key(name)
    }
}

type Detector = fn(&dyn ProjectView) -> Option<Evidence>;

const BACKEND_DETECTORS: &[Detector] = &[
    detect_django,
    detect_flask,
    detect_fastapi,
    detect_laravel,
    detect_symfony,
];

/// Frontend frameworks by package name, most specific first.
const FRONTEND_PACKAGES: &[(&str, Framework)] = &[
    ("next", Framework::Next),
    ("nuxt", Framework::Nuxt),
    ("@angular/core", Framework::Angular),
    ("@sveltejs/kit", Framework::Svelte),
    ("svelte", Framework::Svelte),
    ("vue", Framework::Vue),
    ("react", Framework::React),
];

const BUILD_TOOLS: &[(BuildTool, &str, &[&str])] = &[
    (
        BuildTool::Vite,
        "vite",
        &["vite.config.js", "vite.config.ts", "vite.config.mjs"],
    ),
    (
        BuildTool::Webpack,
        "webpack",
        &["webpack.config.js", "webpack.config.ts"],
    ),
    (BuildTool::Parcel, "parcel", &[".parcelrc"]),
    (
        BuildTool::Rollup,
        "rollup",
        &["rollup.config.js", "rollup.config.mjs"],
    ),
    (BuildTool::Esbuild, "esbuild", &[]),
];

/// Scan `view` and classify the project.
pub fn scan_project(view: &dyn ProjectView) -> Result<ScanResult, ScanError> {
    if !view.is_dir(Utf8Path::new("")) {
        return Err(ScanError::MissingRoot {
            root: view.root().to_path_buf(),
        });
    }
    let package = PackageJson::load(view)?;

    let mut candidates: Vec<Evidence> = BACKEND_DETECTORS
        .iter()
        .filter_map(|detect| detect(view))
        .collect();
    if let Some(pkg) = &package {
        candidates.extend(detect_frontend(pkg));
    }
    candidates.extend(detect_static(view));

    let mut best: Option<Evidence> = None;
    for candidate in candidates {
        debug!(
            framework = %candidate.framework,
            confidence = ?candidate.confidence,
            "framework candidate"
        );
        if best
            .as_ref()
            .is_none_or(|b| candidate.confidence > b.confidence)
        {
            best = Some(candidate);
        }
    }

    let build_tool = detect_build_tool(view, package.as_ref());
    let result = match best {
        Some(e) => ScanResult {
            framework: e.framework,
            architecture: architecture_for(e.framework),
            build_tool,
            confidence: e.confidence,
            indicators: e.indicators,
        },
        None => ScanResult {
            framework: Framework::Unknown,
            architecture: Architecture::Static,
            build_tool,
            confidence: Confidence::Low,
            indicators: Vec::new(),
        },
    };
    Ok(result)
}

pub fn architecture_for(framework: Framework) -> Architecture {
    match framework {
        Framework::React | Framework::Vue | Framework::Angular | Framework::Svelte => {
            Architecture::Spa
        }
        Framework::Next | Framework::Nuxt => Architecture::Ssr,
        f if f.is_backend() => Architecture::Ssr,
        _ => Architecture::Static,
    }
}

fn file_contains(view: &dyn ProjectView, rel: &str, needle: &str) -> bool {
    let path = Utf8Path::new(rel);
    view.exists(path)
        && view
            .read_to_string(path)
            .map(|text| text.to_ascii_lowercase().contains(needle))
            .unwrap_or(false)
}

fn exists(view: &dyn ProjectView, rel: &str) -> bool {
    view.exists(Utf8Path::new(rel))
}

fn is_dir(view: &dyn ProjectView, rel: &str) -> bool {
    view.is_dir(Utf8Path::new(rel))
}

fn detect_django(view: &dyn ProjectView) -> Option<Evidence> {
    let mut e = Evidence::new(Framework::Django);
    if exists(view, "manage.py") {
        e.primary("manage.py");
    }
    if exists(view, "settings.py") || is_dir(view, "settings") {
        e.supporting("settings.py or settings/");
    }
    if exists(view, "urls.py") {
        e.supporting("urls.py");
    }
    if file_contains(view, "requirements.txt", "django") {
        e.supporting("requirements.txt: Django");
    }
    if file_contains(view, "pyproject.toml", "django") {
        e.supporting("pyproject.toml: django");
    }
    e.finish()
}

fn detect_flask(view: &dyn ProjectView) -> Option<Evidence> {
    let mut e = Evidence::new(Framework::Flask);
    if exists(view, "app.py") || exists(view, "application.py") {
        e.primary("app.py or application.py");
    }
    if file_contains(view, "requirements.txt", "flask") {
        e.supporting("requirements.txt: Flask");
    }
    if e.indicators.is_empty() {
        // templates/ or static/ only count alongside other Flask evidence.
        return None;
    }
    if is_dir(view, "templates") || is_dir(view, "static") {
        e.supporting("Flask structure (templates/ or static/)");
    }
    e.finish()
}

fn detect_fastapi(view: &dyn ProjectView) -> Option<Evidence> {
    let mut e = Evidence::new(Framework::FastApi);
    if file_contains(view, "requirements.txt", "fastapi")
        || file_contains(view, "pyproject.toml", "fastapi")
    {
        e.primary("dependency: fastapi");
        if exists(view, "main.py") || exists(view, "app/main.py") {
            e.supporting("main.py or app/main.py");
        }
    }
    e.finish()
}

fn detect_laravel(view: &dyn ProjectView) -> Option<Evidence> {
    let mut e = Evidence::new(Framework::Laravel);
    if exists(view, "artisan") {
        e.primary("artisan");
    }
    if file_contains(view, "composer.json", "laravel/framework") {
        e.supporting("composer.json: laravel/framework");
    }
    e.finish()
}

fn detect_symfony(view: &dyn ProjectView) -> Option<Evidence> {
    let mut e = Evidence::new(Framework::Symfony);
    if exists(view, "bin/console") {
        e.primary("bin/console");
    }
    if exists(view, "symfony.lock") {
        e.supporting("symfony.lock");
    }
    if file_contains(view, "composer.json", "symfony/framework-bundle") {
        e.supporting("composer.json: symfony/framework-bundle");
    }
    e.finish()
}

fn detect_frontend(pkg: &PackageJson) -> Option<Evidence> {
    let (name, framework) = FRONTEND_PACKAGES
        .iter()
        .find(|(name, _)| pkg.has(name))?;
    let mut e = Evidence::new(*framework);
    e.primary("package.json");
    e.supporting(format!("package.json: {name}"));
    Some(e)
}

fn detect_static(view: &dyn ProjectView) -> Option<Evidence> {
    let mut e = Evidence::new(Framework::Static);
    for candidate in ["index.html", "public/index.html"] {
        if exists(view, candidate) {
            e.indicators.push(candidate.to_string());
            e.confidence = Confidence::Medium;
            break;
        }
    }
    e.finish()
}

fn detect_build_tool(view: &dyn ProjectView, pkg: Option<&PackageJson>) -> BuildTool {
    BUILD_TOOLS
        .iter()
        .find(|(_, package, configs)| {
            pkg.is_some_and(|p| p.has(package)) || configs.iter().any(|c| exists(view, c))
        })
        .map(|(tool, _, _)| *tool)
        .unwrap_or(BuildTool::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::memory::MemoryProject;
    use pretty_assertions::assert_eq;

    #[test]
    fn flask_app_with_requirements_is_high_confidence() {
        let project = MemoryProject::new()
            .with("app.py", "from flask import Flask")
            .with("requirements.txt", "Flask==3.0\n")
            .with("templates/index.html", "<html></html>");
        let scan = scan_project(&project).unwrap();
        assert_eq!(scan.framework, Framework::Flask);
        assert_eq!(scan.confidence, Confidence::High);
        assert_eq!(scan.architecture, Architecture::Ssr);
        assert_eq!(
            scan.indicators,
            vec![
                "app.py or application.py".to_string(),
                "requirements.txt: Flask".to_string(),
                "Flask structure (templates/ or static/)".to_string(),
            ]
        );
    }

    #[test]
    fn django_requirements_alone_stay_low() {
        let project = MemoryProject::new().with("requirements.txt", "django>=4.2");
        let scan = scan_project(&project).unwrap();
        assert_eq!(scan.framework, Framework::Django);
        assert_eq!(scan.confidence, Confidence::Low);
    }

    #[test]
    fn vite_react_project() {
        let project = MemoryProject::new()
            .with(
                "package.json",
                r#"{"dependencies":{"react":"^18"},"devDependencies":{"vite":"^5"}}"#,
            )
            .with("index.html", "<html></html>");
        let scan = scan_project(&project).unwrap();
        assert_eq!(scan.framework, Framework::React);
        assert_eq!(scan.architecture, Architecture::Spa);
        assert_eq!(scan.build_tool, BuildTool::Vite);
        assert_eq!(scan.confidence, Confidence::High);
    }

    #[test]
    fn next_wins_over_react() {
        let project = MemoryProject::new().with(
            "package.json",
            r#"{"dependencies":{"react":"^18","next":"^14"}}"#,
        );
        let scan = scan_project(&project).unwrap();
        assert_eq!(scan.framework, Framework::Next);
        assert_eq!(scan.architecture, Architecture::Ssr);
    }

    #[test]
    fn plain_html_is_static() {
        let project = MemoryProject::new().with("public/index.html", "<html></html>");
        let scan = scan_project(&project).unwrap();
        assert_eq!(scan.framework, Framework::Static);
        assert_eq!(scan.confidence, Confidence::Medium);
    }

    #[test]
    fn empty_project_is_unknown() {
        let project = MemoryProject::new().with("README.md", "hi");
        let scan = scan_project(&project).unwrap();
        assert_eq!(scan.framework, Framework::Unknown);
        assert_eq!(scan.confidence, Confidence::Low);
    }

    #[test]
    fn malformed_package_json_is_an_error() {
        let project = MemoryProject::new().with("package.json", "{ nope");
        assert!(matches!(
            scan_project(&project),
            Err(ScanError::InvalidPackageJson { .. })
        ));
    }

    #[test]
    fn laravel_beats_its_frontend_tooling() {
        let project = MemoryProject::new()
            .with("artisan", "#!/usr/bin/env php")
            .with("composer.json", r#"{"require":{"laravel/framework":"^11"}}"#)
            .with("package.json", r#"{"devDependencies":{"vue":"^3","vite":"^5"}}"#);
        let scan = scan_project(&project).unwrap();
        assert_eq!(scan.framework, Framework::Laravel);
        assert_eq!(scan.build_tool, BuildTool::Vite);
    }
}

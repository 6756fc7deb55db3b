use serde::{Deserialize, Serialize};
use std::fmt;

/// Web framework detected in a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framework {
    Static,
    React,
    Vue,
    Angular,
    Svelte,
    Next,
    Nuxt,
    Django,
    Flask,
    #[serde(rename = "fastapi")]
    FastApi,
    Laravel,
    Symfony,
    Unknown,
}

impl Framework {
    pub fn as_str(self) -> &'static str {
        match self {
            Framework::Static => "static",
            Framework::React => "react",
            Framework::Vue => "vue",
            Framework::Angular => "angular",
            Framework::Svelte => "svelte",
            Framework::Next => "next",
            Framework::Nuxt => "nuxt",
            Framework::Django => "django",
            Framework::Flask => "flask",
            Framework::FastApi => "fastapi",
            Framework::Laravel => "laravel",
            Framework::Symfony => "symfony",
            Framework::Unknown => "unknown",
        }
    }

    /// Server-side frameworks whose HTML lives in templates rather than a
    /// static output directory.
    pub fn is_backend(self) -> bool {
        matches!(
            self,
            Framework::Django
                | Framework::Flask
                | Framework::FastApi
                | Framework::Laravel
                | Framework::Symfony
        )
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    Spa,
    Ssr,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildTool {
    Vite,
    Webpack,
    Parcel,
    Rollup,
    Esbuild,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Read-only description of a project, produced by the scan stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub framework: Framework,
    pub architecture: Architecture,
    pub build_tool: BuildTool,
    pub confidence: Confidence,

    /// Human-readable evidence for the detection, in discovery order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indicators: Vec<String>,
}

impl ScanResult {
    /// Generic defaults used when scanning fails and fallback is enabled,
    /// or when the scan stage is skipped.
    pub fn generic() -> Self {
        Self {
            framework: Framework::Static,
            architecture: Architecture::Static,
            build_tool: BuildTool::None,
            confidence: Confidence::Low,
            indicators: Vec::new(),
        }
    }
}

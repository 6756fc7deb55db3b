use serde::{Deserialize, Serialize};

/// Web app manifest as written to disk.
///
/// Field names follow the W3C manifest vocabulary, hence snake_case on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebManifest {
    pub name: String,
    pub short_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub start_url: String,
    pub scope: String,
    pub display: DisplayMode,
    pub theme_color: String,
    pub background_color: String,

    #[serde(default)]
    pub icons: Vec<ManifestIcon>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIcon {
    pub src: String,
    pub sizes: String,

    #[serde(rename = "type")]
    pub mime_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    Fullscreen,
    #[default]
    Standalone,
    MinimalUi,
    Browser,
}

/// Service-worker caching profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachingStrategy {
    /// Cache-first for everything cacheable, long expirations.
    Aggressive,
    #[default]
    Balanced,
    /// Network-first everywhere, short expirations.
    Conservative,
}

impl CachingStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            CachingStrategy::Aggressive => "aggressive",
            CachingStrategy::Balanced => "balanced",
            CachingStrategy::Conservative => "conservative",
        }
    }
}

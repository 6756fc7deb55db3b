//! Web app manifest construction and validation.

use crate::error::ManifestError;
use pwaify_types::manifest::{DisplayMode, ManifestIcon, WebManifest};

/// Longest short name launchers reliably show without truncating.
pub const SHORT_NAME_MAX_CHARS: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestOptions {
    pub name: String,
    pub short_name: Option<String>,
    pub description: Option<String>,
    pub start_url: String,
    pub scope: String,
    pub display: DisplayMode,
    pub theme_color: String,
    pub background_color: String,
    pub icons: Vec<ManifestIcon>,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            name: "My App".to_string(),
            short_name: None,
            description: None,
            start_url: "/".to_string(),
            scope: "/".to_string(),
            display: DisplayMode::Standalone,
            theme_color: "#000000".to_string(),
            background_color: "#FFFFFF".to_string(),
            icons: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltManifest {
    pub manifest: WebManifest,
    pub warnings: Vec<String>,
}

pub fn build_manifest(opts: &ManifestOptions) -> Result<BuiltManifest, ManifestError> {
    let name = opts.name.trim();
    if name.is_empty() {
        return Err(ManifestError::EmptyName);
    }
    check_color("theme_color", &opts.theme_color)?;
    check_color("background_color", &opts.background_color)?;
    check_url("start_url", &opts.start_url)?;
    check_url("scope", &opts.scope)?;

    let mut warnings = Vec::new();

    let requested = opts
        .short_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(name);
    let short_name = if requested.chars().count() > SHORT_NAME_MAX_CHARS {
        let cut: String = requested.chars().take(SHORT_NAME_MAX_CHARS).collect();
        let cut = cut.trim_end().to_string();
        warnings.push(format!(
            "short name truncated to {SHORT_NAME_MAX_CHARS} characters: {cut:?}"
        ));
        cut
    } else {
        requested.to_string()
    };

    if !opts.start_url.starts_with(opts.scope.as_str()) {
        warnings.push(format!(
            "start_url {:?} is outside scope {:?}",
            opts.start_url, opts.scope
        ));
    }
    if opts.icons.is_empty() {
        warnings.push("manifest lists no icons; browsers will not offer installation".to_string());
    }

    Ok(BuiltManifest {
        manifest: WebManifest {
            name: name.to_string(),
            short_name,
            description: opts.description.clone().filter(|d| !d.trim().is_empty()),
            start_url: opts.start_url.clone(),
            scope: opts.scope.clone(),
            display: opts.display,
            theme_color: opts.theme_color.clone(),
            background_color: opts.background_color.clone(),
            icons: opts.icons.clone(),
        },
        warnings,
    })
}

/// Pretty JSON with a trailing newline.
pub fn render_manifest(manifest: &WebManifest) -> Result<String, ManifestError> {
    let mut out = serde_json::to_string_pretty(manifest)?;
    out.push('\n');
    Ok(out)
}

/// `#rgb` or `#rrggbb`.
pub fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

fn check_color(field: &'static str, value: &str) -> Result<(), ManifestError> {
    if is_hex_color(value) {
        Ok(())
    } else {
        Err(ManifestError::InvalidColor {
            field,
            value: value.to_string(),
        })
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ManifestError> {
    if value.starts_with('/') || value.starts_with("https://") || value.starts_with("http://") {
        Ok(())
    } else {
        Err(ManifestError::InvalidUrl {
            field,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn long_name_is_truncated_with_warning() {
        let built = build_manifest(&ManifestOptions {
            name: "Extraordinary Notes".to_string(),
            icons: vec![ManifestIcon {
                src: "/icons/icon-192x192.png".to_string(),
                sizes: "192x192".to_string(),
                mime_type: "image/png".to_string(),
                purpose: None,
            }],
            ..ManifestOptions::default()
        })
        .unwrap();
        assert_eq!(built.manifest.short_name, "Extraordinar");
        assert_eq!(built.warnings.len(), 1);
        assert!(built.warnings[0].starts_with("short name truncated to 12 characters"));
    }

    #[test]
    fn explicit_short_name_is_kept() {
        let built = build_manifest(&ManifestOptions {
            name: "Extraordinary Notes".to_string(),
            short_name: Some("Notes".to_string()),
            ..ManifestOptions::default()
        })
        .unwrap();
        assert_eq!(built.manifest.short_name, "Notes");
    }

    #[test]
    fn invalid_color_is_rejected() {
        let err = build_manifest(&ManifestOptions {
            theme_color: "blue".to_string(),
            ..ManifestOptions::default()
        })
        .unwrap_err();
        assert!(matches!(err, ManifestError::InvalidColor { field: "theme_color", .. }));
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = build_manifest(&ManifestOptions {
            name: "   ".to_string(),
            ..ManifestOptions::default()
        })
        .unwrap_err();
        assert!(matches!(err, ManifestError::EmptyName));
    }

    #[test]
    fn relative_start_url_is_rejected() {
        let err = build_manifest(&ManifestOptions {
            start_url: "index.html".to_string(),
            ..ManifestOptions::default()
        })
        .unwrap_err();
        assert!(matches!(err, ManifestError::InvalidUrl { field: "start_url", .. }));
    }

    #[test]
    fn hex_colors() {
        assert!(is_hex_color("#fff"));
        assert!(is_hex_color("#A1B2C3"));
        assert!(!is_hex_color("#abcd"));
        assert!(!is_hex_color("000000"));
        assert!(!is_hex_color("#ggg"));
    }

    #[test]
    fn rendered_manifest_uses_web_field_names() {
        let built = build_manifest(&ManifestOptions::default()).unwrap();
        let json = render_manifest(&built.manifest).unwrap();
        assert!(json.contains("\"short_name\": \"My App\""));
        assert!(json.contains("\"display\": \"standalone\""));
        assert!(json.ends_with("}\n"));
    }
}

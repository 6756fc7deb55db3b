use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("project root {root} is not a directory")]
    MissingRoot { root: Utf8PathBuf },

    #[error("package.json is not valid JSON: {source}")]
    InvalidPackageJson {
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("app name must not be empty")]
    EmptyName,

    #[error("{field} must be a hex color like #1a2b3c, got {value:?}")]
    InvalidColor { field: &'static str, value: String },

    #[error("{field} must be a root-relative path or an http(s) URL, got {value:?}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum IconError {
    /// Source bytes are not PNG, JPEG, WebP or SVG.
    #[error("icon source {origin} is not a PNG, JPEG, WebP or SVG image")]
    InvalidFormat { origin: String },

    #[error("read icon source: {0}")]
    Io(#[from] std::io::Error),
}

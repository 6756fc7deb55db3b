//! Where generated artifacts live on disk and how pages reference them.

use crate::ports::ProjectView;
use camino::{Utf8Path, Utf8PathBuf};
use pwaify_types::scan::Framework;

/// Output directory (relative to the project root) and the URL it is served under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    dir: Utf8PathBuf,
    url_base: String,
}

impl OutputLayout {
    pub fn new(dir: impl Into<Utf8PathBuf>, url_base: &str) -> Self {
        let dir = dir.into();
        let dir = if dir.as_str().is_empty() {
            Utf8PathBuf::from(".")
        } else {
            dir
        };
        Self {
            dir,
            url_base: normalize_base(url_base),
        }
    }

    /// Pick the conventional public directory for `framework`, if the project has one.
    pub fn detect(view: &dyn ProjectView, framework: Framework) -> Self {
        let candidates: &[(&str, &str)] = match framework {
            Framework::Django | Framework::Flask | Framework::FastApi => {
                &[("static", "/static/"), ("public", "/")]
            }
            _ => &[("public", "/")],
        };
        candidates
            .iter()
            .find(|(dir, _)| view.is_dir(Utf8Path::new(dir)))
            .map(|(dir, base)| Self::new(*dir, base))
            .unwrap_or_else(|| Self::new(".", "/"))
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn url_base(&self) -> &str {
        &self.url_base
    }

    /// Project-relative path of an artifact.
    pub fn path(&self, rel: &str) -> Utf8PathBuf {
        let rel = rel.trim_start_matches('/');
        if self.dir == "." {
            Utf8PathBuf::from(rel)
        } else {
            self.dir.join(rel)
        }
    }

    /// Root-relative URL of an artifact.
    pub fn href(&self, rel: &str) -> String {
        format!("{}{}", self.url_base, rel.trim_start_matches('/'))
    }
}

fn normalize_base(base: &str) -> String {
    let trimmed = base.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

//! Stage failure taxonomy.

use camino::Utf8PathBuf;
use pwaify_domain::IconError;
use pwaify_types::result::StageName;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("project scan failed: {0:#}")]
    ScanFailed(anyhow::Error),

    #[error("icon generation failed: {message}")]
    IconGenerationFailed { message: String },

    #[error("icon source {origin} is not a PNG, JPEG, WebP or SVG image")]
    IconInvalidFormat { origin: String },

    #[error("manifest generation failed: {0:#}")]
    ManifestGenerationFailed(anyhow::Error),

    #[error("service worker generation failed: {0:#}")]
    ServiceWorkerGenerationFailed(anyhow::Error),

    #[error("injection into {path} failed: {message}")]
    InjectionFailed { path: Utf8PathBuf, message: String },

    #[error("skipped {path}: {message}")]
    ParsingFailed { path: Utf8PathBuf, message: String },

    #[error("rollback incomplete: {failures} path(s) could not be restored")]
    RollbackPartialFailure { failures: usize },
}

impl StageError {
    /// Fatal errors void the run and trigger rollback.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            StageError::InjectionFailed { .. }
                | StageError::ParsingFailed { .. }
                | StageError::RollbackPartialFailure { .. }
        )
    }

    pub fn stage(&self) -> Option<StageName> {
        match self {
            StageError::ScanFailed(_) => Some(StageName::Scan),
            StageError::IconGenerationFailed { .. } | StageError::IconInvalidFormat { .. } => {
                Some(StageName::Icons)
            }
            StageError::ManifestGenerationFailed(_) => Some(StageName::Manifest),
            StageError::ServiceWorkerGenerationFailed(_) => Some(StageName::ServiceWorker),
            StageError::InjectionFailed { .. } | StageError::ParsingFailed { .. } => {
                Some(StageName::Injection)
            }
            StageError::RollbackPartialFailure { .. } => None,
        }
    }

    /// Classify an icon renderer error, surfacing an invalid source format.
    pub fn from_icon_error(err: anyhow::Error) -> Self {
        let invalid = err.chain().find_map(|cause| match cause.downcast_ref::<IconError>() {
            Some(IconError::InvalidFormat { origin }) => Some(origin.clone()),
            _ => None,
        });
        match invalid {
            Some(origin) => StageError::IconInvalidFormat { origin },
            None => StageError::IconGenerationFailed {
                message: format!("{err:#}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn invalid_icon_format_is_found_under_context() {
        let err = Err::<(), _>(IconError::InvalidFormat {
            origin: "logo.gif".to_string(),
        })
        .context("load icon source")
        .unwrap_err();
        let stage = StageError::from_icon_error(err);
        assert!(matches!(&stage, StageError::IconInvalidFormat { origin } if origin == "logo.gif"));
        assert!(stage.is_fatal());
    }

    #[test]
    fn injection_errors_are_best_effort() {
        let err = StageError::ParsingFailed {
            path: "index.html".into(),
            message: "binary".to_string(),
        };
        assert!(!err.is_fatal());
        assert_eq!(err.stage(), Some(StageName::Injection));
    }
}

use crate::scan::ScanResult;
use crate::txn::RollbackReport;
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Scan,
    Icons,
    Manifest,
    ServiceWorker,
    Injection,
}

impl StageName {
    pub const ORDER: [StageName; 5] = [
        StageName::Scan,
        StageName::Icons,
        StageName::Manifest,
        StageName::ServiceWorker,
        StageName::Injection,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Scan => "scan",
            StageName::Icons => "icons",
            StageName::Manifest => "manifest",
            StageName::ServiceWorker => "service_worker",
            StageName::Injection => "injection",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the run's transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Committed,
    RolledBack,
}

/// Result of one pipeline invocation. Returned exactly once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub schema: String,
    pub success: bool,

    #[serde(default)]
    pub errors: Vec<String>,

    #[serde(default)]
    pub warnings: Vec<String>,

    /// Informational messages such as skipped stages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<Utf8PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_worker_path: Option<Utf8PathBuf>,

    pub icons_generated: u64,
    pub html_files_injected: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan: Option<ScanResult>,

    pub transaction_id: String,
    pub outcome: RunOutcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackReport>,

    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

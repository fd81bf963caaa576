//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - passed between the control loop and worker threads
//! - serialized into fit records
//! - rendered by the CLI and the TUI

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File extension of generated LTC tables.
pub const TABLE_EXTENSION: &str = "ltc";

/// File extension of fit record sidecars.
pub const RECORD_EXTENSION: &str = "json";

/// Identifier of a fittable BRDF model.
///
/// Ids are fixed when the model registry is built and compare by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BrdfModelId(&'static str);

impl BrdfModelId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for BrdfModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Location of the table generated for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitTarget {
    pub model: BrdfModelId,
    pub table_path: PathBuf,
}

impl FitTarget {
    /// `<dir>/<ModelId>.ltc`
    pub fn in_dir(dir: &Path, model: BrdfModelId) -> Self {
        Self {
            model,
            table_path: dir.join(format!("{}.{TABLE_EXTENSION}", model.name())),
        }
    }

    /// Directory holding the table.
    pub fn dir(&self) -> Option<&Path> {
        self.table_path.parent()
    }

    /// `<dir>/<ModelId>.json`
    pub fn record_path(&self) -> PathBuf {
        self.table_path.with_extension(RECORD_EXTENSION)
    }
}

/// State of a fitting job.
///
/// `Running` is the only non-terminal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Running,
    Succeeded,
    SucceededWithErrors,
    Aborted,
    Failed,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Outcome::Running)
    }

    /// Whether the model still needs fitting after a job ended this way.
    pub fn requires_refit(self) -> bool {
        matches!(self, Outcome::Aborted | Outcome::Failed)
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            Outcome::Running => "running",
            Outcome::Succeeded => "succeeded",
            Outcome::SucceededWithErrors => "succeeded with errors",
            Outcome::Aborted => "aborted",
            Outcome::Failed => "failed",
        }
    }
}

/// What a fit routine returns when it runs to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FitReport {
    /// Number of table entries that could not be fitted cleanly.
    pub errors_count: usize,
    /// One line per problematic entry.
    pub error_log: String,
}

/// Final report of one job, handed to the completion callback.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub model: BrdfModelId,
    pub outcome: Outcome,
    /// Failure message for `Failed`; the warning log for `SucceededWithErrors`.
    pub error_detail: Option<String>,
    pub warnings: usize,
    /// Progress value at the time the job ended.
    pub progress: f32,
    pub overwrite: bool,
}

/// Per-model display state for a presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelStatus {
    pub model: BrdfModelId,
    pub label: String,
    pub is_active: bool,
    pub progress: f32,
    pub needs_fitting: bool,
    pub last_outcome: Option<Outcome>,
    pub warnings: usize,
}

/// Pushed to subscribers whenever a job has ended and its model is idle again.
#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    pub report: JobReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_path_is_derived_from_id() {
        let target = FitTarget::in_dir(Path::new("out/tables"), BrdfModelId::new("GGX"));
        assert_eq!(target.table_path, PathBuf::from("out/tables/GGX.ltc"));
        assert_eq!(target.record_path(), PathBuf::from("out/tables/GGX.json"));
        assert_eq!(target.dir(), Some(Path::new("out/tables")));
    }

    #[test]
    fn only_abort_and_failure_require_refit() {
        assert!(Outcome::Aborted.requires_refit());
        assert!(Outcome::Failed.requires_refit());
        assert!(!Outcome::Succeeded.requires_refit());
        assert!(!Outcome::SucceededWithErrors.requires_refit());
        assert!(!Outcome::Running.is_terminal());
    }
}

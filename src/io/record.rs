//! Fit record sidecars.
//!
//! Each completed job leaves `<ModelId>.json` next to its table. The record
//! keeps the warning log inspectable after the job is gone and lets a new
//! session know which models still need fitting.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{JobReport, Outcome};
use crate::error::FitError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRecord {
    pub model: String,
    pub outcome: Outcome,
    pub warnings: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub progress: f32,
    pub overwrite: bool,
    pub finished_at: DateTime<Utc>,
}

impl FitRecord {
    pub fn from_report(report: &JobReport, finished_at: DateTime<Utc>) -> Self {
        Self {
            model: report.model.name().to_string(),
            outcome: report.outcome,
            warnings: report.warnings,
            detail: report.error_detail.clone(),
            progress: report.progress,
            overwrite: report.overwrite,
            finished_at,
        }
    }
}

pub fn write_record(path: &Path, record: &FitRecord) -> Result<(), FitError> {
    let file = File::create(path).map_err(|e| FitError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, record)
        .map_err(|e| FitError::io(path, std::io::Error::other(e)))?;
    writer.flush().map_err(|e| FitError::io(path, e))
}

pub fn read_record(path: &Path) -> Result<FitRecord, FitError> {
    let file = File::open(path).map_err(|e| FitError::io(path, e))?;
    serde_json::from_reader(file).map_err(|e| FitError::InvalidTable {
        path: path.to_path_buf(),
        reason: format!("invalid fit record: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BrdfModelId;
    use tempfile::tempdir;
    use chrono::TimeZone;

    #[test]
    fn warning_log_stays_inspectable() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path();
        let path = dir.join("GGX.json");
        let report = JobReport {
            model: BrdfModelId::new("GGX"),
            outcome: Outcome::SucceededWithErrors,
            error_detail: Some("entry (theta 3, alpha 0): singular matrix".to_string()),
            warnings: 1,
            progress: 1.0,
            overwrite: false,
        };
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        write_record(&path, &FitRecord::from_report(&report, at)).unwrap();

        let back = read_record(&path).unwrap();
        assert_eq!(back.outcome, Outcome::SucceededWithErrors);
        assert_eq!(back.warnings, 1);
        assert!(back.detail.unwrap().contains("singular"));
        assert_eq!(back.finished_at, at);
    }

    #[test]
    fn garbage_is_rejected() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path();
        let path = dir.join("x.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(read_record(&path).is_err());
    }
}

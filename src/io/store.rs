//! Output directory holding one table (and one record) per model.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{BrdfModelId, FitTarget};
use crate::error::FitError;
use crate::io::record::{read_record, write_record, FitRecord};

#[derive(Debug, Clone)]
pub struct TableStore {
    dir: PathBuf,
}

impl TableStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn target(&self, model: BrdfModelId) -> FitTarget {
        FitTarget::in_dir(&self.dir, model)
    }

    /// Create the output directory if needed. Returns whether it was created.
    pub fn ensure_dir(&self) -> Result<bool, FitError> {
        if self.dir.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&self.dir).map_err(|e| FitError::io(&self.dir, e))?;
        log::info!("Created output directory {}", self.dir.display());
        Ok(true)
    }

    pub fn table_exists(&self, model: BrdfModelId) -> bool {
        self.target(model).table_path.is_file()
    }

    /// Last record for `model`; `None` when missing or unreadable.
    pub fn load_record(&self, model: BrdfModelId) -> Option<FitRecord> {
        let path = self.target(model).record_path();
        if !path.is_file() {
            return None;
        }
        match read_record(&path) {
            Ok(record) => Some(record),
            Err(err) => {
                log::warn!("Ignoring fit record for {model}: {err}");
                None
            }
        }
    }

    pub fn save_record(&self, model: BrdfModelId, record: &FitRecord) -> Result<(), FitError> {
        write_record(&self.target(model).record_path(), record)
    }

    /// A model needs fitting unless a table exists and its last run did not
    /// end aborted or failed.
    pub fn needs_fitting(&self, model: BrdfModelId) -> bool {
        if !self.table_exists(model) {
            return true;
        }
        self.load_record(model)
            .map(|r| r.outcome.requires_refit())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Outcome;
    use tempfile::tempdir;
    use chrono::Utc;

    fn record(outcome: Outcome) -> FitRecord {
        FitRecord {
            model: "GGX".to_string(),
            outcome,
            warnings: 0,
            detail: None,
            progress: 0.5,
            overwrite: false,
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn ensure_dir_reports_creation_once() {
        let tmp = tempdir().unwrap();
        let store = TableStore::new(tmp.path().join("nested/tables"));
        assert!(store.ensure_dir().unwrap());
        assert!(!store.ensure_dir().unwrap());
    }

    #[test]
    fn needs_fitting_follows_table_and_record() {
        let tmp = tempdir().unwrap();
        let store = TableStore::new(tmp.path());
        let ggx = BrdfModelId::new("GGX");
        assert!(store.needs_fitting(ggx));

        std::fs::write(store.target(ggx).table_path, b"x").unwrap();
        assert!(!store.needs_fitting(ggx));

        store.save_record(ggx, &record(Outcome::Aborted)).unwrap();
        assert!(store.needs_fitting(ggx));

        store.save_record(ggx, &record(Outcome::Succeeded)).unwrap();
        assert!(!store.needs_fitting(ggx));
    }
}

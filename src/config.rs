//! Generator configuration.
//!
//! Values come from the environment (optionally a `.env` file) and are then
//! overridden by command-line flags.

use std::path::PathBuf;

use crate::error::AppError;
use crate::fit::LtcFitConfig;
use crate::io::MAX_TABLE_SIZE;

pub const ENV_OUTPUT_DIR: &str = "LTCGEN_OUTPUT_DIR";
pub const ENV_TABLE_SIZE: &str = "LTCGEN_TABLE_SIZE";
pub const ENV_SAMPLES: &str = "LTCGEN_SAMPLES";
pub const ENV_THREADS: &str = "LTCGEN_THREADS";
pub const ENV_FLUSH_INTERVAL: &str = "LTCGEN_FLUSH_INTERVAL";

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Directory receiving `<Model>.ltc` tables and their records.
    pub output_dir: PathBuf,
    pub table_size: usize,
    /// Samples per dimension.
    pub sample_count: usize,
    pub flush_interval: usize,
    /// Worker threads; raised to the number of models when lower.
    pub worker_threads: usize,
    /// Reuse partially fitted tables.
    pub resume: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("ltc"),
            table_size: 64,
            sample_count: 32,
            flush_interval: 64,
            worker_threads: 0,
            resume: true,
        }
    }
}

impl GeneratorConfig {
    /// Load from the process environment after reading `.env` if present.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup; missing keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_OUTPUT_DIR).filter(|v| !v.trim().is_empty()) {
            config.output_dir = PathBuf::from(dir.trim());
        }
        if let Some(v) = lookup(ENV_TABLE_SIZE) {
            config.table_size = parse_count(ENV_TABLE_SIZE, &v)?;
        }
        if let Some(v) = lookup(ENV_SAMPLES) {
            config.sample_count = parse_count(ENV_SAMPLES, &v)?;
        }
        if let Some(v) = lookup(ENV_THREADS) {
            config.worker_threads = parse_count(ENV_THREADS, &v)?;
        }
        if let Some(v) = lookup(ENV_FLUSH_INTERVAL) {
            config.flush_interval = parse_count(ENV_FLUSH_INTERVAL, &v)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(2..=MAX_TABLE_SIZE).contains(&self.table_size) {
            return Err(AppError::new(
                2,
                format!(
                    "Table size must be between 2 and {MAX_TABLE_SIZE} (got {}).",
                    self.table_size
                ),
            ));
        }
        if self.sample_count == 0 {
            return Err(AppError::new(2, "Sample count must be at least 1."));
        }
        if self.flush_interval == 0 {
            return Err(AppError::new(2, "Flush interval must be at least 1."));
        }
        Ok(())
    }

    pub fn fit_config(&self) -> LtcFitConfig {
        LtcFitConfig {
            table_size: self.table_size,
            sample_count: self.sample_count,
            flush_interval: self.flush_interval,
            ..LtcFitConfig::default()
        }
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize, AppError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| AppError::new(2, format!("Invalid {key}: '{value}' is not a count.")))
}

//! Reporting utilities: formatted terminal output for model lists, progress
//! and fit records.

pub mod format;

pub use format::*;

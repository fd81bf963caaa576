//! Domain types used throughout the generator.
//!
//! This module defines:
//!
//! - model identifiers and fit targets (`BrdfModelId`, `FitTarget`)
//! - job outcomes and reports (`Outcome`, `FitReport`, `JobReport`)
//! - presentation snapshots (`ModelStatus`, `JobEvent`)

pub mod types;

pub use types::*;

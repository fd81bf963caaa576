//! LTC table fitting.
//!
//! Responsibilities:
//!
//! - define the contract between a job and its fit routine
//! - fit one LTC lobe per (roughness, view angle) entry
//! - checkpoint progress and partial tables so a run can be resumed

pub mod fitter;
pub mod ltc;
pub mod routine;

pub use fitter::*;
pub use ltc::*;
pub use routine::*;

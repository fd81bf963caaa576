//! `ltc-tables` library crate.
//!
//! The binary (`ltcgen`) is a thin wrapper around this library so that:
//!
//! - job control is testable without spawning processes or a terminal
//! - other front-ends can drive the same coordinator
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod jobs;
pub mod math;
pub mod models;
pub mod report;
pub mod tui;

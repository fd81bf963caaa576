//! Mathematical utilities: derivative-free minimisation.

pub mod simplex;

pub use simplex::*;

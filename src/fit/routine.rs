//! The contract between a fitting job and the numerical routine it runs.

use crate::domain::{FitReport, FitTarget};
use crate::error::FitError;
use crate::models::Brdf;

/// A long-running fit for one model.
///
/// The routine calls `on_progress` at its checkpoints with values in `[0, 1]`.
/// When the callback returns `false` the routine stops at that checkpoint and
/// returns [`FitError::UserAbort`].
///
/// With `overwrite == false` the routine reuses whatever finished work it finds
/// at its target and only computes what is missing.
pub trait FitRoutine: Send {
    fn fit(
        &mut self,
        overwrite: bool,
        on_progress: &mut dyn FnMut(f32) -> bool,
    ) -> Result<FitReport, FitError>;
}

/// Creates the routine for one job.
pub trait RoutineFactory: Send + Sync {
    fn create(&self, brdf: Box<dyn Brdf>, target: &FitTarget) -> Box<dyn FitRoutine>;
}

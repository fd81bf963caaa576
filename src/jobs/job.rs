//! One model's fitting run.
//!
//! A job owns its mutable state behind a single mutex. The worker running the
//! routine writes progress and the final outcome; the coordinator only sets
//! the abort flag and reads.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rayon::ThreadPool;

use crate::domain::{BrdfModelId, JobReport, Outcome};
use crate::fit::FitRoutine;

#[derive(Debug)]
struct JobState {
    progress: f32,
    abort_requested: bool,
    outcome: Outcome,
    overwrite: bool,
}

#[derive(Debug)]
pub struct FittingJob {
    model: BrdfModelId,
    state: Mutex<JobState>,
}

impl FittingJob {
    pub fn new(model: BrdfModelId) -> Self {
        Self {
            model,
            state: Mutex::new(JobState {
                progress: 0.0,
                abort_requested: false,
                outcome: Outcome::Running,
                overwrite: false,
            }),
        }
    }

    /// Run `routine` on `pool`.
    ///
    /// `on_complete` is called exactly once, on the worker, after the outcome
    /// has been recorded.
    pub fn start<F>(
        self: &Arc<Self>,
        pool: &ThreadPool,
        mut routine: Box<dyn FitRoutine>,
        overwrite: bool,
        on_complete: F,
    ) where
        F: FnOnce(JobReport) + Send + 'static,
    {
        self.lock().overwrite = overwrite;
        log::info!(
            "Starting fit for {} ({})",
            self.model,
            if overwrite { "overwrite" } else { "resume" }
        );

        let job = Arc::clone(self);
        pool.spawn(move || {
            let report = job.run(routine.as_mut(), overwrite);
            on_complete(report);
        });
    }

    /// Ask the routine to stop at its next checkpoint.
    pub fn request_abort(&self) {
        let mut state = self.lock();
        if state.outcome.is_terminal() || state.abort_requested {
            return;
        }
        state.abort_requested = true;
        log::warn!("Abort requested for {}", self.model);
    }

    pub fn is_abort_requested(&self) -> bool {
        self.lock().abort_requested
    }

    pub fn current_progress(&self) -> f32 {
        self.lock().progress
    }

    pub fn outcome(&self) -> Outcome {
        self.lock().outcome
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Progress callback handed to the routine. Returns whether to go on.
    fn checkpoint(&self, value: f32) -> bool {
        let mut state = self.lock();
        if state.outcome.is_terminal() {
            return false;
        }
        if value.is_finite() {
            state.progress = state.progress.max(value.clamp(0.0, 1.0));
        }
        log::trace!("{}: {:.1}%", self.model, state.progress * 100.0);
        !state.abort_requested
    }

    fn run(&self, routine: &mut dyn FitRoutine, overwrite: bool) -> JobReport {
        if self.is_abort_requested() {
            return self.finish(Outcome::Aborted, None, 0);
        }

        let mut on_progress = |value: f32| self.checkpoint(value);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            routine.fit(overwrite, &mut on_progress)
        }));

        match result {
            Ok(Ok(report)) if report.errors_count == 0 => self.finish(Outcome::Succeeded, None, 0),
            Ok(Ok(report)) => {
                log::warn!(
                    "Fit for {} finished with {} warning(s):\n{}",
                    self.model,
                    report.errors_count,
                    report.error_log.trim_end()
                );
                self.finish(
                    Outcome::SucceededWithErrors,
                    Some(report.error_log),
                    report.errors_count,
                )
            }
            Ok(Err(err)) if err.is_user_abort() => {
                log::warn!("Fit for {} aborted", self.model);
                self.finish(Outcome::Aborted, None, 0)
            }
            Ok(Err(err)) => {
                log::error!("Fit for {} failed: {err}", self.model);
                self.finish(Outcome::Failed, Some(err.to_string()), 0)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("Fit for {} panicked: {message}", self.model);
                self.finish(Outcome::Failed, Some(format!("fit routine panicked: {message}")), 0)
            }
        }
    }

    fn finish(&self, outcome: Outcome, error_detail: Option<String>, warnings: usize) -> JobReport {
        let mut state = self.lock();
        if matches!(outcome, Outcome::Succeeded | Outcome::SucceededWithErrors) {
            state.progress = 1.0;
        }
        state.outcome = outcome;
        JobReport {
            model: self.model,
            outcome,
            error_detail,
            warnings,
            progress: state.progress,
            overwrite: state.overwrite,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FitReport;
    use crate::error::FitError;
    use std::sync::mpsc;
    use std::time::Duration;

    struct Steps {
        values: Vec<f32>,
        result: fn() -> Result<FitReport, FitError>,
    }

    impl FitRoutine for Steps {
        fn fit(
            &mut self,
            _overwrite: bool,
            on_progress: &mut dyn FnMut(f32) -> bool,
        ) -> Result<FitReport, FitError> {
            for &v in &self.values {
                if !on_progress(v) {
                    return Err(FitError::UserAbort);
                }
            }
            (self.result)()
        }
    }

    fn pool() -> ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap()
    }

    fn run_to_end(job: &Arc<FittingJob>, routine: Steps) -> JobReport {
        let pool = pool();
        let (tx, rx) = mpsc::channel();
        job.start(&pool, Box::new(routine), false, move |report| {
            tx.send(report).unwrap();
        });
        rx.recv_timeout(Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn warnings_become_succeeded_with_errors() {
        let job = Arc::new(FittingJob::new(BrdfModelId::new("GGX")));
        let report = run_to_end(
            &job,
            Steps {
                values: vec![0.5],
                result: || {
                    Ok(FitReport {
                        errors_count: 2,
                        error_log: "a\nb\n".to_string(),
                    })
                },
            },
        );
        assert_eq!(report.outcome, Outcome::SucceededWithErrors);
        assert_eq!(report.warnings, 2);
        assert_eq!(report.error_detail.as_deref(), Some("a\nb\n"));
        assert_eq!(job.current_progress(), 1.0);
    }

    #[test]
    fn abort_before_launch_skips_the_routine() {
        let job = Arc::new(FittingJob::new(BrdfModelId::new("GGX")));
        job.request_abort();
        let report = run_to_end(
            &job,
            Steps {
                values: vec![],
                result: || panic!("routine must not run"),
            },
        );
        assert_eq!(report.outcome, Outcome::Aborted);
        assert_eq!(job.outcome(), Outcome::Aborted);
    }

    #[test]
    fn routine_abort_ends_as_aborted() {
        let job = Arc::new(FittingJob::new(BrdfModelId::new("GGX")));
        let report = run_to_end(
            &job,
            Steps {
                values: vec![0.4],
                result: || Err(FitError::UserAbort),
            },
        );
        assert_eq!(report.outcome, Outcome::Aborted);
        assert_eq!(report.error_detail, None);
        assert_eq!(report.progress, 0.4);
    }

    #[test]
    fn panics_are_contained() {
        let job = Arc::new(FittingJob::new(BrdfModelId::new("GGX")));
        let report = run_to_end(
            &job,
            Steps {
                values: vec![0.2],
                result: || panic!("boom"),
            },
        );
        assert_eq!(report.outcome, Outcome::Failed);
        assert!(report.error_detail.unwrap().contains("boom"));
        assert_eq!(report.progress, 0.2);
    }

    #[test]
    fn terminal_job_ignores_progress_and_abort() {
        let job = Arc::new(FittingJob::new(BrdfModelId::new("GGX")));
        let report = run_to_end(
            &job,
            Steps {
                values: vec![0.7, 0.4],
                result: || Err(FitError::Failure("bad input".to_string())),
            },
        );
        assert_eq!(job.current_progress(), 0.7);
        assert!(!job.checkpoint(0.9));
        job.request_abort();
        assert!(!job.is_abort_requested());
        assert_eq!(job.current_progress(), 0.7);
        assert_eq!(job.outcome(), Outcome::Failed);
        assert_eq!(report.error_detail.as_deref(), Some("Fit failed: bad input"));
        assert_eq!(report.progress, 0.7);
    }
}

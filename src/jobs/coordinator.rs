//! Maps model ids to at most one active fitting job.
//!
//! Every registered model owns a slot guarded by its own mutex. A slot's job
//! is set by [`Coordinator::request_start`] and cleared only by that job's
//! completion callback, on the job's worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::domain::{BrdfModelId, JobEvent, JobReport, ModelStatus, Outcome};
use crate::error::FitError;
use crate::fit::RoutineFactory;
use crate::io::{FitRecord, TableStore};
use crate::jobs::job::FittingJob;
use crate::models::ModelRegistry;

/// What happened to each id passed to [`Coordinator::request_start`].
#[derive(Debug, Default)]
pub struct StartReport {
    pub started: Vec<BrdfModelId>,
    /// Skipped because a job is already active.
    pub already_running: Vec<BrdfModelId>,
    pub rejected: Vec<(BrdfModelId, FitError)>,
    /// Whether this batch created the output directory.
    pub created_dir: bool,
}

#[derive(Debug)]
struct SlotState {
    job: Option<Arc<FittingJob>>,
    needs_fitting: bool,
    last: Option<JobReport>,
}

#[derive(Debug)]
struct ModelSlot {
    model: BrdfModelId,
    state: Mutex<SlotState>,
}

impl ModelSlot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type Subscribers = Arc<Mutex<Vec<Sender<JobEvent>>>>;

pub struct Coordinator {
    registry: ModelRegistry,
    store: TableStore,
    factory: Arc<dyn RoutineFactory>,
    pool: ThreadPool,
    slots: Vec<Arc<ModelSlot>>,
    resume: AtomicBool,
    subscribers: Subscribers,
}

impl Coordinator {
    /// Build a coordinator over `registry`.
    ///
    /// The worker pool gets at least one thread per registered model, so a
    /// routine that never returns cannot hold back other models.
    pub fn new(
        registry: ModelRegistry,
        store: TableStore,
        factory: Arc<dyn RoutineFactory>,
        threads: usize,
    ) -> Result<Self, FitError> {
        let threads = threads.max(registry.len()).max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ltc-fit-{i}"))
            .build()
            .map_err(|e| FitError::Failure(format!("cannot build worker pool: {e}")))?;
        log::debug!("Worker pool ready with {threads} thread(s)");

        let slots = registry
            .list_models()
            .into_iter()
            .map(|model| {
                let last = store.load_record(model).map(|record| JobReport {
                    model,
                    outcome: record.outcome,
                    error_detail: record.detail,
                    warnings: record.warnings,
                    progress: record.progress,
                    overwrite: record.overwrite,
                });
                Arc::new(ModelSlot {
                    model,
                    state: Mutex::new(SlotState {
                        job: None,
                        needs_fitting: store.needs_fitting(model),
                        last,
                    }),
                })
            })
            .collect();

        Ok(Self {
            registry,
            store,
            factory,
            pool,
            slots,
            resume: AtomicBool::new(true),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn list_models(&self) -> Vec<BrdfModelId> {
        self.registry.list_models()
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    /// Whether new jobs reuse partial tables (`overwrite = !resume`).
    pub fn resume(&self) -> bool {
        self.resume.load(Ordering::Relaxed)
    }

    pub fn set_resume(&self, resume: bool) {
        self.resume.store(resume, Ordering::Relaxed);
    }

    /// Start one job per idle id in `selected`.
    ///
    /// Never fails as a whole: per-id problems land in the returned report.
    pub fn request_start(&self, selected: &[BrdfModelId]) -> StartReport {
        let mut report = StartReport::default();
        let overwrite = !self.resume();
        let mut dir_ready: Option<Result<(), String>> = None;

        for &id in selected {
            let Some(slot) = self.slot(id) else {
                report
                    .rejected
                    .push((id, FitError::UnknownModel(id.name().to_string())));
                continue;
            };

            let mut state = slot.lock();
            if state.job.is_some() {
                log::debug!("{id} is already fitting");
                report.already_running.push(id);
                continue;
            }

            let brdf = match self.registry.instantiate(id) {
                Ok(brdf) => brdf,
                Err(err) => {
                    report.rejected.push((id, err));
                    continue;
                }
            };

            // Once per batch, before the first launch.
            let ready = dir_ready.get_or_insert_with(|| match self.store.ensure_dir() {
                Ok(created) => {
                    report.created_dir = created;
                    Ok(())
                }
                Err(err) => {
                    log::error!("{err}");
                    Err(err.to_string())
                }
            });
            if let Err(message) = ready {
                report.rejected.push((id, FitError::Failure(message.clone())));
                continue;
            }

            let target = self.store.target(id);
            let routine = self.factory.create(brdf, &target);
            let job = Arc::new(FittingJob::new(id));
            state.job = Some(Arc::clone(&job));
            drop(state);

            let on_complete = completion_handler(
                self.store.clone(),
                Arc::clone(&self.subscribers),
                Arc::clone(slot),
                Arc::clone(&job),
            );
            job.start(&self.pool, routine, overwrite, on_complete);
            report.started.push(id);
        }

        report
    }

    pub fn request_abort(&self, id: BrdfModelId) {
        if let Some(job) = self.active_job(id) {
            job.request_abort();
        }
    }

    pub fn request_abort_all(&self) {
        for slot in &self.slots {
            if let Some(job) = slot.lock().job.as_ref() {
                job.request_abort();
            }
        }
    }

    pub fn is_active(&self, id: BrdfModelId) -> bool {
        self.active_job(id).is_some()
    }

    /// Progress of the active job; `0.0` when idle.
    pub fn progress_of(&self, id: BrdfModelId) -> f32 {
        self.active_job(id)
            .map(|job| job.current_progress())
            .unwrap_or(0.0)
    }

    pub fn needs_fitting(&self, id: BrdfModelId) -> bool {
        self.slot(id).map(|slot| slot.lock().needs_fitting).unwrap_or(false)
    }

    /// Override the flag of an idle model. Ignored while a job is active.
    pub fn set_needs_fitting(&self, id: BrdfModelId, needs_fitting: bool) {
        if let Some(slot) = self.slot(id) {
            let mut state = slot.lock();
            if state.job.is_none() {
                state.needs_fitting = needs_fitting;
            }
        }
    }

    pub fn last_report(&self, id: BrdfModelId) -> Option<JobReport> {
        self.slot(id).and_then(|slot| slot.lock().last.clone())
    }

    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.lock().job.is_some())
            .count()
    }

    /// Snapshot of every model, in registry order.
    pub fn statuses(&self) -> Vec<ModelStatus> {
        self.slots
            .iter()
            .map(|slot| {
                let state = slot.lock();
                let last_outcome: Option<Outcome> = state.last.as_ref().map(|r| r.outcome);
                ModelStatus {
                    model: slot.model,
                    label: slot.model.name().to_string(),
                    is_active: state.job.is_some(),
                    progress: state.job.as_ref().map(|j| j.current_progress()).unwrap_or(0.0),
                    needs_fitting: state.needs_fitting,
                    last_outcome,
                    warnings: state.last.as_ref().map(|r| r.warnings).unwrap_or(0),
                }
            })
            .collect()
    }

    /// Receive one [`JobEvent`] per finished job, sent once the model is idle.
    pub fn subscribe(&self) -> Receiver<JobEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    fn slot(&self, id: BrdfModelId) -> Option<&Arc<ModelSlot>> {
        self.slots.iter().find(|slot| slot.model == id)
    }

    fn active_job(&self, id: BrdfModelId) -> Option<Arc<FittingJob>> {
        self.slot(id).and_then(|slot| slot.lock().job.clone())
    }
}

/// Runs on the job's worker: persist the record, free the slot, notify.
fn completion_handler(
    store: TableStore,
    subscribers: Subscribers,
    slot: Arc<ModelSlot>,
    job: Arc<FittingJob>,
) -> impl FnOnce(JobReport) + Send + 'static {
    move |report: JobReport| {
        let record = FitRecord::from_report(&report, Utc::now());
        if let Err(err) = store.save_record(report.model, &record) {
            log::warn!("Could not save fit record for {}: {err}", report.model);
        }

        {
            let mut state = slot.lock();
            if state.job.as_ref().is_some_and(|active| Arc::ptr_eq(active, &job)) {
                state.job = None;
            }
            state.needs_fitting = report.outcome.requires_refit();
            state.last = Some(report.clone());
        }

        match report.outcome {
            Outcome::Succeeded | Outcome::SucceededWithErrors => {
                log::info!("Fit for {} {}", report.model, report.outcome.display_name())
            }
            _ => log::debug!("Fit for {} {}", report.model, report.outcome.display_name()),
        }

        let event = JobEvent { report };
        subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

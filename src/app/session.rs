//! Presentation state shared by the CLI and the TUI.
//!
//! Selecting a model means flagging it as needing a fit, so the selection
//! survives restarts through the fit records. The front-ends only render
//! [`Session::rows`] and call the actions below.

use std::sync::mpsc::Receiver;

use crate::domain::{BrdfModelId, JobEvent, ModelStatus};
use crate::jobs::{Coordinator, StartReport};

pub struct Session {
    coordinator: Coordinator,
    events: Receiver<JobEvent>,
}

impl Session {
    pub fn new(coordinator: Coordinator) -> Self {
        let events = coordinator.subscribe();
        Self {
            coordinator,
            events,
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn rows(&self) -> Vec<ModelStatus> {
        self.coordinator.statuses()
    }

    pub fn select_all(&self) {
        for id in self.coordinator.list_models() {
            self.coordinator.set_needs_fitting(id, true);
        }
    }

    pub fn select_none(&self) {
        for id in self.coordinator.list_models() {
            self.coordinator.set_needs_fitting(id, false);
        }
    }

    /// Flip the selection of an idle model.
    pub fn toggle(&self, id: BrdfModelId) {
        let flag = self.coordinator.needs_fitting(id);
        self.coordinator.set_needs_fitting(id, !flag);
    }

    /// Idle models flagged for fitting.
    pub fn selected(&self) -> Vec<BrdfModelId> {
        self.rows()
            .into_iter()
            .filter(|row| row.needs_fitting && !row.is_active)
            .map(|row| row.model)
            .collect()
    }

    pub fn can_start(&self) -> bool {
        !self.selected().is_empty()
    }

    pub fn start_selected(&self) -> StartReport {
        let selected = self.selected();
        self.coordinator.request_start(&selected)
    }

    pub fn can_abort(&self) -> bool {
        self.coordinator.active_count() > 0
    }

    pub fn abort_all(&self) {
        self.coordinator.request_abort_all();
    }

    pub fn resume_computation(&self) -> bool {
        self.coordinator.resume()
    }

    pub fn set_resume_computation(&self, resume: bool) {
        self.coordinator.set_resume(resume);
    }

    /// Drain finished-job events without blocking.
    pub fn poll_events(&self) -> Vec<JobEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

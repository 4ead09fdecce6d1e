//! Progress Reporter
//!
//! The engine is the single writer; a UI, a headless printer or a test is the
//! single reader. Messages arrive in emission order. With no reader attached
//! the sends are dropped and the engine carries on.

use crate::engine::step::StepStatus;
use crate::error::ErrorKind;
use std::sync::mpsc::{self, Receiver, Sender};

/// One state transition of a running plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    StepStart { index: usize, name: String },
    StepOk { index: usize },
    StepFail {
        index: usize,
        kind: ErrorKind,
        error: String,
    },
    PlanDone { ok: bool },
}

impl Progress {
    /// `(index, new status)` for step transitions, `None` for `PlanDone`.
    pub fn transition(&self) -> Option<(usize, StepStatus)> {
        match self {
            Self::StepStart { index, .. } => Some((*index, StepStatus::Running)),
            Self::StepOk { index } => Some((*index, StepStatus::Done)),
            Self::StepFail { index, .. } => Some((*index, StepStatus::Failed)),
            Self::PlanDone { .. } => None,
        }
    }
}

/// Sending half held by the engine.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    tx: Option<Sender<Progress>>,
}

impl Reporter {
    /// A reporter and the receiver that observes it
    pub fn channel() -> (Self, Receiver<Progress>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A reporter nobody listens to
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn send(&self, msg: Progress) {
        if let Some(tx) = &self.tx {
            // Reader gone: keep running, the outcome is returned synchronously
            let _ = tx.send(msg);
        }
    }
}

/// Reader-side view of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepView {
    pub name: String,
    pub status: StepStatus,
    pub error: Option<String>,
}

/// Per-step status table built from the message stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressBoard {
    pub title: String,
    pub steps: Vec<StepView>,
    /// `Some` once `PlanDone` arrived
    pub outcome: Option<bool>,
}

impl ProgressBoard {
    pub fn new<I, S>(title: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: title.into(),
            steps: names
                .into_iter()
                .map(|n| StepView {
                    name: n.into(),
                    status: StepStatus::Pending,
                    error: None,
                })
                .collect(),
            outcome: None,
        }
    }

    pub fn apply(&mut self, msg: &Progress) {
        match msg {
            Progress::PlanDone { ok } => self.outcome = Some(*ok),
            Progress::StepStart { index, name } => {
                if let Some(step) = self.slot(*index) {
                    step.status = StepStatus::Running;
                    step.name.clone_from(name);
                }
            }
            Progress::StepOk { index } => {
                if let Some(step) = self.slot(*index) {
                    step.status = StepStatus::Done;
                }
            }
            Progress::StepFail { index, error, .. } => {
                if let Some(step) = self.slot(*index) {
                    step.status = StepStatus::Failed;
                    step.error = Some(error.clone());
                }
            }
        }
    }

    fn slot(&mut self, index: usize) -> Option<&mut StepView> {
        // Steps not announced up front are appended as they start
        while self.steps.len() <= index {
            self.steps.push(StepView {
                name: String::new(),
                status: StepStatus::Pending,
                error: None,
            });
        }
        self.steps.get_mut(index)
    }

    pub fn done_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Done)
            .count()
    }

    pub fn failed_step(&self) -> Option<&StepView> {
        self.steps.iter().find(|s| s.status == StepStatus::Failed)
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Completion ratio for a gauge, 0.0 to 1.0
    pub fn ratio(&self) -> f64 {
        if self.steps.is_empty() {
            return if self.is_finished() { 1.0 } else { 0.0 };
        }
        self.done_count() as f64 / self.steps.len() as f64
    }
}

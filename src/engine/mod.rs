//! Step Engine
//!
//! Runs an ordered list of [`Step`]s one at a time, each on its own worker
//! thread, and reports every transition through a [`Reporter`]. The first
//! failure stops the run; later steps are never started. Cancellation is
//! checked between steps only.
//!
//! The engine knows nothing about plans, state or rendering.

pub mod progress;
pub mod step;

pub use progress::{Progress, ProgressBoard, Reporter, StepView};
pub use step::{Step, StepStatus};

use crate::error::{NodeError, Result};
use crate::process_guard::CancelToken;
use std::any::Any;
use std::thread;
use std::time::Instant;
use tracing::{error, info, warn};

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one step body on a dedicated thread and wait for it.
fn run_isolated(name: &str, action: step::StepAction) -> Result<()> {
    let handle = thread::Builder::new()
        .name(format!("step:{}", name))
        .spawn(action)
        .map_err(|e| NodeError::Worker(format!("could not spawn worker: {}", e)))?;
    match handle.join() {
        Ok(result) => result,
        Err(payload) => Err(NodeError::Worker(format!(
            "panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

/// Execute `steps` in order.
///
/// Returns the first failure wrapped with its step name. Emits
/// `StepStart`, then `StepOk` or `StepFail`, per step and a final `PlanDone`.
pub fn run(steps: Vec<Step>, reporter: &Reporter, cancel: &CancelToken) -> Result<()> {
    let total = steps.len();
    let started = Instant::now();

    for (index, step) in steps.into_iter().enumerate() {
        let (name, action) = step.into_parts();

        if cancel.is_cancelled() {
            warn!(step = %name, "cancelled before step");
            reporter.send(Progress::PlanDone { ok: false });
            return Err(NodeError::Cancelled { step: name });
        }

        info!(step = %name, index, total, "step started");
        reporter.send(Progress::StepStart {
            index,
            name: name.clone(),
        });

        let step_started = Instant::now();
        match run_isolated(&name, action) {
            Ok(()) => {
                info!(
                    step = %name,
                    elapsed_ms = step_started.elapsed().as_millis() as u64,
                    "step done"
                );
                reporter.send(Progress::StepOk { index });
            }
            Err(e) => {
                error!(step = %name, error = %e, "step failed");
                reporter.send(Progress::StepFail {
                    index,
                    kind: e.kind(),
                    error: e.to_string(),
                });
                reporter.send(Progress::PlanDone { ok: false });
                return Err(e.in_step(name));
            }
        }
    }

    info!(
        steps = total,
        elapsed_s = started.elapsed().as_secs(),
        "all steps done"
    );
    reporter.send(Progress::PlanDone { ok: true });
    Ok(())
}

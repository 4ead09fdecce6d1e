//! A step: a name plus one fallible action.

use crate::error::Result;
use strum::Display;

/// Boxed step body. Runs once, on a worker thread.
pub type StepAction = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// Lifecycle of a step. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Failed,
}

pub struct Step {
    name: String,
    action: StepAction,
}

impl Step {
    pub fn new(name: impl Into<String>, action: impl FnOnce() -> Result<()> + Send + 'static) -> Self {
        Self {
            name: name.into(),
            action: Box::new(action),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, StepAction) {
        (self.name, self.action)
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish_non_exhaustive()
    }
}

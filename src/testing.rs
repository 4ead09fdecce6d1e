//! Recording command backend.
//!
//! [`RecordingExec`] stands in for the host's process table: every command is
//! logged, and answers come from prefix-matched rules (last added wins).
//! Anything without a rule exits 0 with empty output.

use crate::error::Result;
use crate::runner::{CommandOutput, CommandSpec, Exec};
use std::sync::Mutex;

type Effect = Box<dyn Fn(&CommandSpec) + Send + Sync>;

struct Rule {
    prefix: String,
    output: CommandOutput,
    effect: Option<Effect>,
}

#[derive(Default)]
pub struct RecordingExec {
    rules: Mutex<Vec<Rule>>,
    seen: Mutex<Vec<CommandSpec>>,
}

impl std::fmt::Debug for RecordingExec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingExec")
            .field("seen", &self.commands())
            .finish_non_exhaustive()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingExec {
    fn push(&self, prefix: &str, output: CommandOutput, effect: Option<Effect>) {
        lock(&self.rules).push(Rule {
            prefix: prefix.to_string(),
            output,
            effect,
        });
    }

    /// Commands starting with `prefix` exit 0 printing `stdout`.
    pub fn respond(&self, prefix: &str, stdout: &str) {
        self.push(
            prefix,
            CommandOutput {
                code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
            None,
        );
    }

    /// Commands starting with `prefix` exit 1.
    pub fn fail_on(&self, prefix: &str) {
        self.push(
            prefix,
            CommandOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: format!("{}: simulated failure", prefix),
            },
            None,
        );
    }

    /// Commands starting with `prefix` succeed after running `effect`
    /// (e.g. creating the file a downloader would have written).
    pub fn on_run(&self, prefix: &str, effect: impl Fn(&CommandSpec) + Send + Sync + 'static) {
        self.push(
            prefix,
            CommandOutput {
                code: Some(0),
                ..Default::default()
            },
            Some(Box::new(effect)),
        );
    }

    /// Every command line seen so far, in order
    pub fn commands(&self) -> Vec<String> {
        lock(&self.seen).iter().map(CommandSpec::command_line).collect()
    }

    /// Number of commands whose line starts with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        lock(&self.seen).clear();
    }
}

impl Exec for RecordingExec {
    fn exec(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        lock(&self.seen).push(spec.clone());
        let line = spec.command_line();
        let rules = lock(&self.rules);
        match rules.iter().rev().find(|r| line.starts_with(&r.prefix)) {
            Some(rule) => {
                if let Some(effect) = &rule.effect {
                    effect(spec);
                }
                Ok(rule.output.clone())
            }
            None => Ok(CommandOutput {
                code: Some(0),
                ..Default::default()
            }),
        }
    }
}

//! Line-per-transition progress for `--headless` runs.

use crate::engine::{Progress, ProgressBoard};
use std::io::{self, Write};
use std::sync::mpsc::Receiver;

/// Text for one progress message, given the board *after* applying it.
pub fn describe(msg: &Progress, board: &ProgressBoard) -> String {
    let total = board.steps.len();
    match msg {
        Progress::StepStart { index, name } => {
            format!("[{}/{}] {} ...", index + 1, total, name)
        }
        Progress::StepOk { index } => {
            let name = board.steps.get(*index).map_or("", |s| s.name.as_str());
            format!("[{}/{}] {} ✓", index + 1, total, name)
        }
        Progress::StepFail { index, kind, error } => {
            let name = board.steps.get(*index).map_or("", |s| s.name.as_str());
            format!("[{}/{}] {} ✗ ({}): {}", index + 1, total, name, kind, error)
        }
        Progress::PlanDone { ok: true } => format!("✓ {} complete", board.title),
        Progress::PlanDone { ok: false } => format!("✗ {} failed", board.title),
    }
}

/// Drain `rx` into `out` until the plan finishes or the sender goes away.
pub fn print_progress<W: Write>(
    rx: &Receiver<Progress>,
    mut board: ProgressBoard,
    out: &mut W,
) -> io::Result<ProgressBoard> {
    for msg in rx.iter() {
        board.apply(&msg);
        writeln!(out, "{}", describe(&msg, &board))?;
        out.flush()?;
        if board.is_finished() {
            break;
        }
    }
    Ok(board)
}

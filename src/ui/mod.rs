//! Terminal front end
//!
//! Two screens: the progress view that follows a running plan, and the
//! read-only node summary. `--headless` runs use [`headless`] instead.

pub mod headless;
pub mod progress;
pub mod summary;

use crate::engine::{Progress, ProgressBoard};
use crate::process_guard::CancelToken;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout, stdout};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;
use summary::NodeSummary;
use tracing::debug;

const TICK: Duration = Duration::from_millis(50);

/// Raw mode plus alternate screen, restored on drop.
pub struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    pub fn enter() -> io::Result<Self> {
        debug!("Initializing terminal for TUI mode");
        enable_raw_mode()?;
        if let Err(e) = crossterm::execute!(stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = crossterm::execute!(stdout(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

enum Key {
    Quit,
    Interrupt,
    Other,
}

fn poll_key() -> io::Result<Option<Key>> {
    if !event::poll(TICK)? {
        return Ok(None);
    }
    match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            // Raw mode swallows SIGINT, so Ctrl-C arrives as a key
            if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                Ok(Some(Key::Interrupt))
            } else if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                Ok(Some(Key::Quit))
            } else {
                Ok(Some(Key::Other))
            }
        }
        _ => Ok(None),
    }
}

/// Follow a plan until it finishes and the user dismisses the result.
///
/// Returns the final board. If the sender disappears without `PlanDone`
/// (the plan failed before its first step) the view closes immediately.
pub fn show_progress(
    session: &mut TerminalSession,
    rx: &Receiver<Progress>,
    mut board: ProgressBoard,
    cancel: &CancelToken,
) -> io::Result<ProgressBoard> {
    let mut connected = true;
    loop {
        if connected {
            match rx.recv_timeout(TICK) {
                Ok(msg) => {
                    board.apply(&msg);
                    while let Ok(more) = rx.try_recv() {
                        board.apply(&more);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    connected = false;
                    if !board.is_finished() {
                        return Ok(board);
                    }
                }
            }
        }

        session.terminal.draw(|f| progress::render(f, &board))?;

        match poll_key()? {
            Some(Key::Interrupt) if !board.is_finished() => {
                cancel.cancel();
            }
            Some(_) if board.is_finished() => return Ok(board),
            _ => {}
        }
    }
}

/// Show the summary until `q` or Esc.
pub fn show_summary(session: &mut TerminalSession, summary: &NodeSummary) -> io::Result<()> {
    loop {
        session.terminal.draw(|f| summary.render(f, f.area()))?;
        if let Some(Key::Quit | Key::Interrupt) = poll_key()? {
            return Ok(());
        }
    }
}

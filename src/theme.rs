//! Colors and styles for the progress and summary views
//!
//! Every color the UI draws with is defined here so the two views stay
//! consistent.

use crate::engine::StepStatus;
use ratatui::style::{Color, Modifier, Style};

/// Color palette
pub struct Colors;

impl Colors {
    /// Panel background
    pub const BG_PRIMARY: Color = Color::Rgb(20, 20, 30);

    /// Gauge background
    pub const BG_GAUGE: Color = Color::Rgb(40, 40, 50);

    pub const FG_PRIMARY: Color = Color::White;
    pub const FG_SECONDARY: Color = Color::Gray;
    pub const FG_MUTED: Color = Color::DarkGray;

    /// Titles and borders
    pub const PRIMARY: Color = Color::Cyan;

    /// Section labels
    pub const SECONDARY: Color = Color::Yellow;

    pub const SUCCESS: Color = Color::Green;
    pub const ERROR: Color = Color::Red;

    // Step states
    pub const STEP_ACTIVE: Color = Color::Yellow;
    pub const STEP_COMPLETE: Color = Color::Green;
    pub const STEP_PENDING: Color = Color::Gray;
    pub const STEP_FAILED: Color = Color::Red;
}

/// Pre-built styles
pub struct Styles;

impl Styles {
    pub fn text() -> Style {
        Style::default().fg(Colors::FG_PRIMARY)
    }

    pub fn text_muted() -> Style {
        Style::default().fg(Colors::FG_MUTED)
    }

    pub fn label() -> Style {
        Style::default()
            .fg(Colors::SECONDARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn title() -> Style {
        Style::default()
            .fg(Colors::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border() -> Style {
        Style::default().fg(Colors::PRIMARY)
    }

    pub fn panel_bg() -> Style {
        Style::default().bg(Colors::BG_PRIMARY)
    }

    pub fn success() -> Style {
        Style::default().fg(Colors::SUCCESS)
    }

    pub fn error() -> Style {
        Style::default().fg(Colors::ERROR)
    }

    pub fn gauge(failed: bool) -> Style {
        let fg = if failed { Colors::ERROR } else { Colors::SUCCESS };
        Style::default().fg(fg).bg(Colors::BG_GAUGE)
    }

    /// Marker glyph and style for a step row
    pub fn step(status: StepStatus) -> (&'static str, Style) {
        match status {
            StepStatus::Pending => ("  ", Style::default().fg(Colors::STEP_PENDING)),
            StepStatus::Running => (
                "▶ ",
                Style::default()
                    .fg(Colors::STEP_ACTIVE)
                    .add_modifier(Modifier::BOLD),
            ),
            StepStatus::Done => ("✓ ", Style::default().fg(Colors::STEP_COMPLETE)),
            StepStatus::Failed => (
                "✗ ",
                Style::default()
                    .fg(Colors::STEP_FAILED)
                    .add_modifier(Modifier::BOLD),
            ),
        }
    }
}

//! Step list and gauge for a running plan.

use crate::engine::{ProgressBoard, StepStatus};
use crate::theme::Styles;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Wrap},
};

fn footer(board: &ProgressBoard) -> Line<'static> {
    match board.outcome {
        None => Line::from(Span::styled("Ctrl-C: cancel after the current step", Styles::text_muted())),
        Some(true) => Line::from(vec![
            Span::styled("Done. ", Styles::success()),
            Span::styled("Press any key to exit", Styles::text_muted()),
        ]),
        Some(false) => Line::from(vec![
            Span::styled("Failed. ", Styles::error()),
            Span::styled("Press any key to exit", Styles::text_muted()),
        ]),
    }
}

pub fn render(f: &mut Frame, board: &ProgressBoard) {
    let failed = board.failed_step();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(if failed.is_some() { 4 } else { 0 }),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    let title = Paragraph::new(Span::styled(board.title.clone(), Styles::title()))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Styles::border()),
        );
    f.render_widget(title, chunks[0]);

    let items: Vec<ListItem> = board
        .steps
        .iter()
        .map(|step| {
            let (marker, style) = Styles::step(step.status);
            ListItem::new(Line::from(vec![
                Span::styled(marker, style),
                Span::styled(step.name.clone(), style),
            ]))
        })
        .collect();
    let list = List::new(items).style(Styles::panel_bg()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Styles::border())
            .title(" Steps "),
    );
    f.render_widget(list, chunks[1]);

    if let Some(step) = failed {
        let detail = Paragraph::new(step.error.clone().unwrap_or_default())
            .style(Styles::error())
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(" Error "));
        f.render_widget(detail, chunks[2]);
    }

    let running = board.steps.iter().any(|s| s.status == StepStatus::Running);
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Styles::gauge(board.outcome == Some(false)))
        .ratio(board.ratio().clamp(0.0, 1.0))
        .label(format!(
            "{}/{}{}",
            board.done_count(),
            board.steps.len(),
            if running { " running" } else { "" }
        ));
    f.render_widget(gauge, chunks[3]);

    f.render_widget(Paragraph::new(footer(board)), chunks[4]);
}

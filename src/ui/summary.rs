//! Read-only node summary: saved state plus the onion address of every
//! hidden service the state publishes.

use crate::emit::tor;
use crate::host::Host;
use crate::state::AppConfig;
use crate::theme::Styles;
use crate::version;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table},
};
use std::fmt::Write;

/// One published hidden service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRow {
    pub name: &'static str,
    pub port: u16,
    /// `None` until Tor has created the service's hostname file
    pub onion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    pub facts: Vec<(&'static str, String)>,
    pub services: Vec<ServiceRow>,
}

fn yes_no(flag: bool) -> String {
    if flag { "yes" } else { "no" }.to_string()
}

impl NodeSummary {
    /// Gather the summary. Unreadable hostname files show as pending.
    pub fn collect(cfg: &AppConfig, host: &Host) -> Self {
        let mut facts = vec![
            ("rlvpn", version::version().to_string()),
            ("Network", cfg.network.to_string()),
            ("Components", cfg.components.to_string()),
            ("Prune size", format!("{} GB", cfg.prune_size)),
            ("SSH port", cfg.ssh_port.to_string()),
        ];
        if cfg.has_lnd() {
            facts.push(("LND P2P", cfg.effective_p2p_mode().to_string()));
            facts.push(("Wallet auto-unlock", yes_no(cfg.auto_unlock)));
        }
        facts.push(("Lightning Terminal", yes_no(cfg.lit_installed)));
        facts.push(("Syncthing backup", yes_no(cfg.syncthing_installed)));

        let services = tor::hidden_services(cfg)
            .into_iter()
            .map(|hs| ServiceRow {
                name: hs.name,
                port: hs.port,
                onion: host.onion_hostname(hs.name).ok().flatten(),
            })
            .collect();

        Self { facts, services }
    }

    /// Plain text for `rlvpn status`
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (label, value) in &self.facts {
            let _ = writeln!(out, "{:<20} {}", format!("{}:", label), value);
        }
        let _ = writeln!(out, "\nHidden services:");
        for svc in &self.services {
            let _ = writeln!(
                out,
                "  {:<16} {:>5}  {}",
                svc.name,
                svc.port,
                svc.onion.as_deref().unwrap_or("(pending)")
            );
        }
        out
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(self.facts.len() as u16 + 2),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(area);

        let facts: Vec<Line> = self
            .facts
            .iter()
            .map(|(label, value)| {
                Line::from(vec![
                    Span::styled(format!("{:<20}", label), Styles::label()),
                    Span::styled(value.clone(), Styles::text()),
                ])
            })
            .collect();
        let facts = Paragraph::new(facts).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Styles::border())
                .title(Span::styled(" Node ", Styles::title())),
        );
        f.render_widget(facts, chunks[0]);

        let rows = self.services.iter().map(|svc| {
            let onion = match &svc.onion {
                Some(h) => Span::styled(h.clone(), Styles::text()),
                None => Span::styled("(pending)", Styles::text_muted()),
            };
            Row::new(vec![
                Line::from(svc.name),
                Line::from(svc.port.to_string()),
                Line::from(onion),
            ])
        });
        let table = Table::new(
            rows,
            [
                Constraint::Length(16),
                Constraint::Length(6),
                Constraint::Min(20),
            ],
        )
        .header(Row::new(vec!["Service", "Port", "Onion address"]).style(Styles::label()))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Styles::border())
                .title(Span::styled(" Hidden services ", Styles::title())),
        );
        f.render_widget(table, chunks[1]);

        let hint = Paragraph::new(Span::styled("q / Esc: quit", Styles::text_muted()));
        f.render_widget(hint, chunks[2]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout as Paths;
    use crate::runner::Runner;
    use crate::state::Components;
    use crate::testing::RecordingExec;
    use std::fs;
    use std::sync::Arc;

    fn host(root: &std::path::Path) -> Host {
        Host::new(
            Runner::new(Arc::new(RecordingExec::default())),
            Paths::rooted(root),
        )
    }

    #[test]
    fn test_summary_lists_published_services() {
        let dir = tempfile::tempdir().unwrap();
        let host = host(dir.path());
        let hs = dir.path().join("var/lib/tor/bitcoin-rpc");
        fs::create_dir_all(&hs).unwrap();
        fs::write(hs.join("hostname"), "rpcabc.onion\n").unwrap();

        let cfg = AppConfig {
            components: Components::BitcoinLnd,
            ..Default::default()
        };
        let summary = NodeSummary::collect(&cfg, &host);
        assert_eq!(summary.services.len(), 4);
        assert_eq!(summary.services[0].onion.as_deref(), Some("rpcabc.onion"));
        assert_eq!(summary.services[1].onion, None);

        let text = summary.to_text();
        assert!(text.contains("Network:"));
        assert!(text.contains("mainnet"));
        assert!(text.contains("bitcoin+lnd"));
        assert!(text.contains("rpcabc.onion"));
        assert!(text.contains("(pending)"));
        assert!(text.contains("LND P2P:"));
    }

    #[test]
    fn test_summary_without_lnd_hides_lnd_facts() {
        let dir = tempfile::tempdir().unwrap();
        let summary = NodeSummary::collect(&AppConfig::default(), &host(dir.path()));
        assert!(summary.facts.iter().all(|(l, _)| *l != "LND P2P"));
        assert_eq!(summary.services.len(), 2);
    }
}

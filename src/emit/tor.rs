//! torrc
//!
//! The file is a pure function of [`AppConfig`] and is rebuilt from scratch on
//! every state change. Hidden services are data: one row per published port.

use crate::emit::lit::LIT_HTTPS_PORT;
use crate::emit::lnd::{LND_GRPC_PORT, LND_REST_PORT};
use crate::layout;
use crate::state::AppConfig;
use std::fmt::Write;

pub const SOCKS_PORT: u16 = 9050;
pub const CONTROL_PORT: u16 = 9051;
pub const SYNCTHING_GUI_PORT: u16 = 8384;
pub const SYNCTHING_SYNC_PORT: u16 = 22000;

/// One onion endpoint: `HiddenServiceDir` + `HiddenServicePort`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenService {
    /// Directory name under `/var/lib/tor`
    pub name: &'static str,
    /// Port published on the onion address
    pub port: u16,
    /// Local port it forwards to on 127.0.0.1
    pub target: u16,
}

impl HiddenService {
    const fn same(name: &'static str, port: u16) -> Self {
        Self {
            name,
            port,
            target: port,
        }
    }

    pub fn dir(&self) -> String {
        layout::hidden_service_dir(self.name)
    }
}

/// Hidden services the given state publishes, in torrc order.
pub fn hidden_services(cfg: &AppConfig) -> Vec<HiddenService> {
    let net = cfg.network_config();
    let mut services = vec![
        HiddenService::same("bitcoin-rpc", net.rpc_port),
        HiddenService::same("bitcoin-p2p", net.p2p_port),
    ];
    if cfg.has_lnd() {
        services.push(HiddenService::same("lnd-grpc", LND_GRPC_PORT));
        services.push(HiddenService::same(layout::LND_REST_HS, LND_REST_PORT));
    }
    if cfg.lit_installed {
        services.push(HiddenService::same("lnd-lit", LIT_HTTPS_PORT));
    }
    if cfg.syncthing_installed {
        services.push(HiddenService::same("syncthing", SYNCTHING_GUI_PORT));
        services.push(HiddenService::same("syncthing-sync", SYNCTHING_SYNC_PORT));
    }
    services
}

/// Render `/etc/tor/torrc`.
pub fn torrc(cfg: &AppConfig) -> String {
    let mut out = String::from("# Managed by rlvpn. Rebuilt on every configuration change.\n");
    let _ = writeln!(out, "SOCKSPort {}", SOCKS_PORT);

    // LND drives its own onion through the control port
    if cfg.has_lnd() {
        let _ = writeln!(out, "ControlPort {}", CONTROL_PORT);
        let _ = writeln!(out, "CookieAuthentication 1");
        let _ = writeln!(out, "CookieAuthFileGroupReadable 1");
    }

    for hs in hidden_services(cfg) {
        let _ = writeln!(out, "\nHiddenServiceDir {}/", hs.dir());
        let _ = writeln!(out, "HiddenServicePort {} 127.0.0.1:{}", hs.port, hs.target);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Components;

    #[test]
    fn test_bitcoin_only() {
        let conf = torrc(&AppConfig::default());
        assert!(conf.contains("SOCKSPort 9050"));
        assert!(conf.contains("HiddenServiceDir /var/lib/tor/bitcoin-rpc/"));
        assert!(conf.contains("HiddenServicePort 8332 127.0.0.1:8332"));
        assert!(conf.contains("HiddenServicePort 8333 127.0.0.1:8333"));
        assert_eq!(conf.matches("HiddenServicePort").count(), 2);
        assert!(!conf.contains("ControlPort"));
    }

    #[test]
    fn test_full_stack() {
        let cfg = AppConfig {
            components: Components::BitcoinLnd,
            lit_installed: true,
            syncthing_installed: true,
            ..Default::default()
        };
        let conf = torrc(&cfg);
        assert!(conf.contains("ControlPort 9051"));
        assert!(conf.contains("CookieAuthentication 1"));
        assert!(conf.contains("CookieAuthFileGroupReadable 1"));
        assert!(conf.contains("HiddenServicePort 10009 127.0.0.1:10009"));
        assert!(conf.contains("HiddenServicePort 8080 127.0.0.1:8080"));
        assert!(conf.contains("/var/lib/tor/lnd-lit/"));
        assert!(conf.contains("HiddenServicePort 8384 127.0.0.1:8384"));
        assert!(conf.contains("HiddenServicePort 22000 127.0.0.1:22000"));
        assert_eq!(hidden_services(&cfg).len(), 7);
    }
}

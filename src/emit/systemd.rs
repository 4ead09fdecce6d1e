//! systemd units for every daemon rlvpn manages.
//!
//! All service units run as the service user with the same hardening set.
//! Wallet auto-unlock is a drop-in over `lnd.service`, never a rewrite of it.

use crate::layout::{
    self, BITCOIND_BIN, BITCOIN_CONF, BITCOIN_DATA, LITD_BIN, LIT_CONF, LND_BIN, LND_CONF,
    LND_DATA, LND_WALLET_PASSWORD, SERVICE_USER, SYNCTHING_BACKUP_DIR, SYNCTHING_BIN,
    SYNCTHING_CONF_DIR, SYNCTHING_DATA,
};
use crate::state::AppConfig;
use std::fmt::Write;

pub const BITCOIND_UNIT: &str = "bitcoind.service";
pub const LND_UNIT: &str = "lnd.service";
pub const LITD_UNIT: &str = "litd.service";
pub const SYNCTHING_UNIT: &str = "syncthing.service";
pub const BACKUP_WATCH_UNIT: &str = "lnd-backup-watch.path";
pub const BACKUP_COPY_UNIT: &str = "lnd-backup-copy.service";
pub const LND_DROPIN_DIR: &str = "lnd.service.d";
pub const LND_AUTO_UNLOCK_DROPIN: &str = "auto-unlock.conf";

const HARDENING: &[&str] = &[
    "PrivateTmp=true",
    "ProtectSystem=full",
    "NoNewPrivileges=true",
];

/// Shape shared by every service unit.
struct ServiceUnit<'a> {
    description: &'a str,
    after: &'a [&'a str],
    wants: &'a [&'a str],
    service_type: &'a str,
    exec_start: String,
    timeout_stop_sec: Option<u32>,
    extra: &'a [&'a str],
}

impl ServiceUnit<'_> {
    fn render(&self) -> String {
        let mut out = String::from("# Managed by rlvpn.\n[Unit]\n");
        let _ = writeln!(out, "Description={}", self.description);
        if !self.after.is_empty() {
            let _ = writeln!(out, "After={}", self.after.join(" "));
        }
        if !self.wants.is_empty() {
            let _ = writeln!(out, "Wants={}", self.wants.join(" "));
        }

        let _ = writeln!(out, "\n[Service]");
        let _ = writeln!(out, "Type={}", self.service_type);
        let _ = writeln!(out, "User={}", SERVICE_USER);
        let _ = writeln!(out, "Group={}", SERVICE_USER);
        let _ = writeln!(out, "ExecStart={}", self.exec_start);
        let _ = writeln!(out, "Restart=on-failure");
        if let Some(secs) = self.timeout_stop_sec {
            let _ = writeln!(out, "TimeoutStopSec={}", secs);
        }
        for line in HARDENING.iter().chain(self.extra) {
            let _ = writeln!(out, "{}", line);
        }

        let _ = writeln!(out, "\n[Install]");
        let _ = writeln!(out, "WantedBy=multi-user.target");
        out
    }
}

fn lnd_exec_start() -> String {
    format!("{} --configfile={} --lnddir={}", LND_BIN, LND_CONF, LND_DATA)
}

pub fn bitcoind_service() -> String {
    ServiceUnit {
        description: "Bitcoin Core daemon",
        after: &["network-online.target", "tor.service"],
        wants: &["network-online.target"],
        service_type: "simple",
        exec_start: format!(
            "{} -conf={} -datadir={}",
            BITCOIND_BIN, BITCOIN_CONF, BITCOIN_DATA
        ),
        timeout_stop_sec: Some(600),
        extra: &[],
    }
    .render()
}

pub fn lnd_service() -> String {
    ServiceUnit {
        description: "Lightning Network Daemon",
        after: &["bitcoind.service", "tor.service"],
        wants: &["bitcoind.service"],
        service_type: "simple",
        exec_start: lnd_exec_start(),
        timeout_stop_sec: Some(300),
        extra: &[],
    }
    .render()
}

/// Drop-in for `lnd.service.d/` that re-declares ExecStart with the unlock file.
pub fn lnd_auto_unlock_dropin() -> String {
    format!(
        "# Managed by rlvpn.\n[Service]\nExecStart=\nExecStart={} --wallet-unlock-password-file={}\n",
        lnd_exec_start(),
        LND_WALLET_PASSWORD
    )
}

pub fn litd_service() -> String {
    ServiceUnit {
        description: "Lightning Terminal",
        after: &["lnd.service"],
        wants: &["lnd.service"],
        service_type: "simple",
        exec_start: format!("{} --configfile={}", LITD_BIN, LIT_CONF),
        timeout_stop_sec: Some(120),
        extra: &[],
    }
    .render()
}

pub fn syncthing_service() -> String {
    ServiceUnit {
        description: "Syncthing channel backup replication",
        after: &["network-online.target"],
        wants: &["network-online.target"],
        service_type: "simple",
        exec_start: format!(
            "{} serve --no-browser --no-restart --config={} --data={}",
            SYNCTHING_BIN, SYNCTHING_CONF_DIR, SYNCTHING_DATA
        ),
        timeout_stop_sec: None,
        // Syncthing rewrites its own config.xml
        extra: &["ReadWritePaths=/etc/syncthing"],
    }
    .render()
}

/// Path unit firing the copy service whenever LND rewrites `channel.backup`.
pub fn backup_watch_path(cfg: &AppConfig) -> String {
    let mut out = String::from("# Managed by rlvpn.\n[Unit]\n");
    let _ = writeln!(out, "Description=Watch the LND channel backup for changes");
    let _ = writeln!(out, "\n[Path]");
    let _ = writeln!(
        out,
        "PathChanged={}",
        layout::lnd_channel_backup(&cfg.network_config())
    );
    let _ = writeln!(out, "Unit={}", BACKUP_COPY_UNIT);
    let _ = writeln!(out, "\n[Install]");
    let _ = writeln!(out, "WantedBy=multi-user.target");
    out
}

/// Oneshot copying `channel.backup` into the replicated folder.
pub fn backup_copy_service(cfg: &AppConfig) -> String {
    ServiceUnit {
        description: "Copy the LND channel backup into the Syncthing folder",
        after: &[],
        wants: &[],
        service_type: "oneshot",
        exec_start: format!(
            "/usr/bin/install -m 0600 {} {}/channel.backup",
            layout::lnd_channel_backup(&cfg.network_config()),
            SYNCTHING_BACKUP_DIR
        ),
        timeout_stop_sec: None,
        extra: &[],
    }
    .render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    fn assert_hardened(unit: &str) {
        for line in [
            "User=bitcoin",
            "Group=bitcoin",
            "Restart=on-failure",
            "PrivateTmp=true",
            "ProtectSystem=full",
            "NoNewPrivileges=true",
        ] {
            assert!(unit.lines().any(|l| l == line), "missing {line} in\n{unit}");
        }
    }

    #[test]
    fn test_service_units_are_hardened() {
        let units = [
            bitcoind_service(),
            lnd_service(),
            litd_service(),
            syncthing_service(),
            backup_copy_service(&AppConfig::default()),
        ];
        for unit in &units {
            assert_hardened(unit);
        }
    }

    #[test]
    fn test_stop_timeouts() {
        assert!(bitcoind_service().contains("TimeoutStopSec=600"));
        assert!(lnd_service().contains("TimeoutStopSec=300"));
        assert!(litd_service().contains("TimeoutStopSec=120"));
        assert!(!syncthing_service().contains("TimeoutStopSec"));
    }

    #[test]
    fn test_auto_unlock_dropin_resets_exec_start() {
        let dropin = lnd_auto_unlock_dropin();
        let lines: Vec<&str> = dropin.lines().collect();
        let reset = lines.iter().position(|l| *l == "ExecStart=").unwrap();
        assert!(lines[reset + 1].starts_with("ExecStart=/usr/local/bin/lnd "));
        assert!(lines[reset + 1]
            .ends_with("--wallet-unlock-password-file=/var/lib/lnd/wallet_password"));
        assert!(!lnd_service().contains("wallet-unlock-password-file"));
    }

    #[test]
    fn test_backup_units_follow_network() {
        let cfg = AppConfig {
            network: Network::Testnet4,
            ..Default::default()
        };
        let path = backup_watch_path(&cfg);
        assert!(path.contains(
            "PathChanged=/var/lib/lnd/data/chain/bitcoin/testnet4/channel.backup"
        ));
        assert!(path.contains("Unit=lnd-backup-copy.service"));
        let copy = backup_copy_service(&cfg);
        assert!(copy.contains("Type=oneshot"));
        assert!(copy.contains("/var/lib/syncthing/lnd-backup/channel.backup"));
    }
}

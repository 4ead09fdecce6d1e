//! Canonical filesystem layout of a provisioned node.
//!
//! All paths rlvpn writes are derived here from a root (`/` in production,
//! a temporary directory in tests). Emitted file *contents* always reference
//! the canonical absolute paths; only the write location is re-rooted.

use crate::network::NetworkConfig;
use std::path::{Path, PathBuf};

/// System user every daemon runs as
pub const SERVICE_USER: &str = "bitcoin";
/// Group Tor uses for its control cookie
pub const TOR_GROUP: &str = "debian-tor";

pub const STATE_DIR: &str = "/etc/rlvpn";
pub const STATE_FILE: &str = "/etc/rlvpn/config.json";
pub const LOCK_FILE: &str = "/etc/rlvpn/.lock";

pub const BIN_DIR: &str = "/usr/local/bin";
pub const BITCOIND_BIN: &str = "/usr/local/bin/bitcoind";
pub const LND_BIN: &str = "/usr/local/bin/lnd";
pub const LITD_BIN: &str = "/usr/local/bin/litd";
pub const SYNCTHING_BIN: &str = "/usr/bin/syncthing";

pub const BITCOIN_CONF_DIR: &str = "/etc/bitcoin";
pub const BITCOIN_CONF: &str = "/etc/bitcoin/bitcoin.conf";
pub const BITCOIN_DATA: &str = "/var/lib/bitcoin";

pub const LND_CONF_DIR: &str = "/etc/lnd";
pub const LND_CONF: &str = "/etc/lnd/lnd.conf";
pub const LND_DATA: &str = "/var/lib/lnd";
pub const LND_TLS_CERT: &str = "/var/lib/lnd/tls.cert";
pub const LND_WALLET_PASSWORD: &str = "/var/lib/lnd/wallet_password";

pub const LIT_CONF_DIR: &str = "/etc/lit";
pub const LIT_CONF: &str = "/etc/lit/lit.conf";
pub const LIT_DATA: &str = "/var/lib/lit";

pub const SYNCTHING_CONF_DIR: &str = "/etc/syncthing";
pub const SYNCTHING_CONF: &str = "/etc/syncthing/config.xml";
pub const SYNCTHING_DATA: &str = "/var/lib/syncthing";
/// Replication target for the LND channel backup
pub const SYNCTHING_BACKUP_DIR: &str = "/var/lib/syncthing/lnd-backup";

pub const TORRC: &str = "/etc/tor/torrc";
pub const TOR_HS_ROOT: &str = "/var/lib/tor";

pub const SYSTEMD_DIR: &str = "/etc/systemd/system";
pub const SYSCTL_IPV6: &str = "/etc/sysctl.d/99-rlvpn-disable-ipv6.conf";
pub const APT_KEYRINGS: &str = "/etc/apt/keyrings";
pub const SYNCTHING_KEYRING: &str = "/etc/apt/keyrings/syncthing-archive-keyring.gpg";
pub const SYNCTHING_APT_LIST: &str = "/etc/apt/sources.list.d/syncthing.list";
pub const AUTO_UPGRADES: &str = "/etc/apt/apt.conf.d/20auto-upgrades";
pub const UNATTENDED_UPGRADES: &str = "/etc/apt/apt.conf.d/50unattended-upgrades";
pub const FAIL2BAN_JAIL: &str = "/etc/fail2ban/jail.local";
pub const OS_RELEASE: &str = "/etc/os-release";
pub const LOG_FILE: &str = "/var/log/rlvpn.log";

/// Hidden-service directory name for LND REST; its `hostname` feeds `tlsextradomain`
pub const LND_REST_HS: &str = "lnd-rest";

/// Directory holding LND's per-network chain data (macaroons, backup, wallet)
pub fn lnd_chain_dir(net: &NetworkConfig) -> String {
    format!("{}/data/chain/bitcoin/{}", LND_DATA, net.name)
}

pub fn lnd_admin_macaroon(net: &NetworkConfig) -> String {
    format!("{}/admin.macaroon", lnd_chain_dir(net))
}

pub fn lnd_channel_backup(net: &NetworkConfig) -> String {
    format!("{}/channel.backup", lnd_chain_dir(net))
}

pub fn lnd_wallet_db(net: &NetworkConfig) -> String {
    format!("{}/wallet.db", lnd_chain_dir(net))
}

pub fn hidden_service_dir(name: &str) -> String {
    format!("{}/{}", TOR_HS_ROOT, name)
}

pub fn systemd_unit(file_name: &str) -> String {
    format!("{}/{}", SYSTEMD_DIR, file_name)
}

/// Maps canonical absolute paths onto the filesystem actually written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self::system()
    }
}

impl Layout {
    /// The real host
    pub fn system() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }

    /// Everything below `root` (tests, image builds)
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a canonical absolute path under this layout's root.
    pub fn path(&self, canonical: &str) -> PathBuf {
        self.root.join(canonical.trim_start_matches('/'))
    }

    pub fn state_file(&self) -> PathBuf {
        self.path(STATE_FILE)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.path(LOCK_FILE)
    }

    /// Scratch directory for one component's downloads
    pub fn scratch(&self, component: &str) -> PathBuf {
        self.path(&format!("/tmp/rlvpn-{}", component))
    }
}

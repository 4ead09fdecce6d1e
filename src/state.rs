//! Declarative node state and its on-disk persistence.
//!
//! [`AppConfig`] is the single source of truth for what the node should look
//! like. Orchestration plans derive their steps from it and are the only code
//! that saves it. The file is JSON, mode 0600, replaced atomically.

use crate::error::{NodeError, PathContext, Result};
use crate::layout::{self, Layout};
use crate::network::{Network, NetworkConfig};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};
use tracing::{debug, warn};

/// Smallest prune target bitcoind is configured with, in GB
pub const MIN_PRUNE_GB: u32 = 10;
pub const DEFAULT_PRUNE_GB: u32 = 25;

/// Installed daemon set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
pub enum Components {
    #[default]
    #[serde(rename = "bitcoin")]
    #[strum(serialize = "bitcoin")]
    Bitcoin,
    #[serde(rename = "bitcoin+lnd")]
    #[strum(serialize = "bitcoin+lnd")]
    BitcoinLnd,
}

/// How LND is reachable by peers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum P2pMode {
    /// Onion only
    #[default]
    Tor,
    /// Onion plus clearnet on a public IPv4
    Hybrid,
}

/// Persisted target state of the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: Network,
    pub components: Components,
    /// Prune target in GB
    pub prune_size: u32,
    pub p2p_mode: P2pMode,
    pub ssh_port: u16,
    pub lit_installed: bool,
    pub syncthing_installed: bool,
    pub auto_unlock: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub lit_password: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub syncthing_password: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            components: Components::Bitcoin,
            prune_size: DEFAULT_PRUNE_GB,
            p2p_mode: P2pMode::Tor,
            ssh_port: 22,
            lit_installed: false,
            syncthing_installed: false,
            auto_unlock: false,
            lit_password: String::new(),
            syncthing_password: String::new(),
        }
    }
}

impl AppConfig {
    pub fn has_lnd(&self) -> bool {
        self.components == Components::BitcoinLnd
    }

    pub fn is_mainnet(&self) -> bool {
        self.network == Network::Mainnet
    }

    pub fn network_config(&self) -> NetworkConfig {
        self.network.config()
    }

    /// Prune target as bitcoin.conf expects it (MB)
    pub fn prune_mb(&self) -> u64 {
        u64::from(self.prune_size) * 1000
    }

    /// Hybrid only counts when LND is there to use it
    pub fn effective_p2p_mode(&self) -> P2pMode {
        if self.has_lnd() {
            self.p2p_mode
        } else {
            P2pMode::Tor
        }
    }

    /// LND created its wallet (probes the well-known wallet.db path)
    pub fn wallet_exists(&self, layout: &Layout) -> bool {
        layout
            .path(&layout::lnd_wallet_db(&self.network_config()))
            .exists()
    }

    /// Cross-field invariants plans must keep. Not enforced on save.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        if self.prune_size < MIN_PRUNE_GB {
            return Err(format!(
                "prune size {} GB is below the {} GB minimum",
                self.prune_size, MIN_PRUNE_GB
            ));
        }
        if self.lit_installed && !self.has_lnd() {
            return Err("Lightning Terminal requires LND".to_string());
        }
        if self.syncthing_installed && !self.has_lnd() {
            return Err("Syncthing backup replication requires LND".to_string());
        }
        if self.p2p_mode == P2pMode::Hybrid && !self.has_lnd() {
            return Err("hybrid P2P mode requires LND".to_string());
        }
        if self.auto_unlock && !self.has_lnd() {
            return Err("wallet auto-unlock requires LND".to_string());
        }
        Ok(())
    }
}

/// Loads and saves [`AppConfig`] at a fixed path.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_layout(layout: &Layout) -> Self {
        Self::new(layout.state_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fails with `NotFound` or `StateCorrupt`.
    pub fn load(&self) -> Result<AppConfig> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(NodeError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(NodeError::fs(&self.path, e)),
        };

        serde_json::from_str(&content).map_err(|e| NodeError::StateCorrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Load, falling back to defaults when the file is missing or malformed.
    pub fn load_or_default(&self) -> AppConfig {
        match self.load() {
            Ok(cfg) => cfg,
            Err(NodeError::NotFound { .. }) => {
                warn!(path = %self.path.display(), "no saved state, using defaults");
                AppConfig::default()
            }
            Err(e) => {
                warn!(error = %e, "saved state unusable, using defaults");
                AppConfig::default()
            }
        }
    }

    /// Write via temp file + rename, mode 0600, parent 0755, parent fsynced.
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| NodeError::preflight("state path has no parent directory"))?;
        fs::create_dir_all(parent).at(parent)?;
        fs::set_permissions(parent, fs::Permissions::from_mode(0o755)).at(parent)?;

        let json = serde_json::to_string_pretty(config).map_err(|e| NodeError::StateCorrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        write_atomic(&self.path, json.as_bytes(), 0o600)?;
        debug!(path = %self.path.display(), "state saved");
        Ok(())
    }
}

/// Replace `path` with `content` atomically: same-directory temp file,
/// fsync, rename, fsync of the parent directory.
pub fn write_atomic(path: &Path, content: &[u8], mode: u32) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| NodeError::preflight(format!("{} has no parent", path.display())))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let tmp = parent.join(format!(".{}.tmp", file_name));

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(&tmp)
            .at(&tmp)?;
        // mode() only applies on create; an old temp file keeps its bits
        file.set_permissions(fs::Permissions::from_mode(mode)).at(&tmp)?;
        file.write_all(content).at(&tmp)?;
        file.sync_all().at(&tmp)?;
    }

    fs::rename(&tmp, path).at(path)?;
    if let Ok(dir) = fs::File::open(parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}

use crate::network::Network;
use crate::state::{MIN_PRUNE_GB, P2pMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rlvpn - Bitcoin Core and LND node installer for Debian
#[derive(Parser, Debug)]
#[command(name = "rlvpn")]
#[command(about = "Installs and reconfigures a Tor-first Bitcoin Core / LND node")]
#[command(version)]
pub struct Cli {
    /// Never open the terminal UI; print progress to stdout line by line.
    #[arg(long, global = true)]
    pub headless: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Install Bitcoin Core, Tor and host hardening
    Install {
        /// Chain to follow (mainnet or testnet4)
        #[arg(long, default_value_t = Network::Mainnet)]
        network: Network,

        /// Prune target in GB
        #[arg(long, default_value_t = crate::state::DEFAULT_PRUNE_GB, value_parser = parse_prune_gb)]
        prune: u32,

        /// SSH port left open in the firewall
        #[arg(long, default_value_t = 22)]
        ssh_port: u16,
    },
    /// Add the Lightning Network Daemon
    AddLnd {
        /// Peer reachability (tor or hybrid)
        #[arg(long, default_value_t = P2pMode::Tor)]
        p2p: P2pMode,
    },
    /// Add Lightning Terminal on top of LND
    AddLit,
    /// Add Syncthing replication of the channel backup
    AddSyncthing,
    /// Change the bitcoind prune target
    Prune {
        /// New prune target in GB
        #[arg(value_parser = parse_prune_gb)]
        gb: u32,
    },
    /// Let LND unlock its wallet at startup
    AutoUnlock {
        /// File holding the wallet password
        #[arg(long)]
        password_file: PathBuf,
    },
    /// Replace this binary with a verified release
    SelfUpdate {
        /// Release to install (defaults to the latest published one)
        #[arg(long)]
        version: Option<String>,
    },
    /// Print the saved node state and published hidden services
    Status,
}

impl Commands {
    /// Whether the command changes the host and so needs root
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Status)
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

fn parse_prune_gb(value: &str) -> Result<u32, String> {
    let gb: u32 = value
        .parse()
        .map_err(|_| format!("'{}' is not a whole number of GB", value))?;
    if gb < MIN_PRUNE_GB {
        return Err(format!("prune size must be at least {} GB", MIN_PRUNE_GB));
    }
    Ok(gb)
}

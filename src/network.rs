//! Chain selection and the per-chain constants derived from it.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Bitcoin chain the node follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "lowercase", from = "String")]
#[strum(serialize_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet4,
}

/// Saved names go through the same total resolution as everything else
impl From<String> for Network {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl Network {
    /// Total resolution: `"mainnet"` is mainnet, everything else is testnet4.
    pub fn from_name(name: &str) -> Self {
        if name == "mainnet" {
            Self::Mainnet
        } else {
            Self::Testnet4
        }
    }

    pub fn config(self) -> NetworkConfig {
        match self {
            Self::Mainnet => MAINNET,
            Self::Testnet4 => TESTNET4,
        }
    }
}

/// Ports, flags and paths that differ between chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    pub network: Network,
    /// Chain name as LND and LIT spell it
    pub name: &'static str,
    /// Top-level bitcoin.conf chain flag (empty on mainnet)
    pub bitcoin_flag: &'static str,
    /// bitcoin.conf section header for chain-scoped keys (empty on mainnet)
    pub bitcoin_section: &'static str,
    pub lnd_bitcoin_flag: &'static str,
    pub rpc_port: u16,
    pub p2p_port: u16,
    pub zmq_block_port: u16,
    pub zmq_tx_port: u16,
    /// RPC cookie, relative to the bitcoind data dir
    pub cookie_path: &'static str,
}

const MAINNET: NetworkConfig = NetworkConfig {
    network: Network::Mainnet,
    name: "mainnet",
    bitcoin_flag: "",
    bitcoin_section: "",
    lnd_bitcoin_flag: "bitcoin.mainnet=true",
    rpc_port: 8332,
    p2p_port: 8333,
    zmq_block_port: 28332,
    zmq_tx_port: 28333,
    cookie_path: ".cookie",
};

const TESTNET4: NetworkConfig = NetworkConfig {
    network: Network::Testnet4,
    name: "testnet4",
    bitcoin_flag: "testnet4=1",
    bitcoin_section: "[testnet4]",
    lnd_bitcoin_flag: "bitcoin.testnet4=true",
    rpc_port: 48332,
    p2p_port: 48333,
    zmq_block_port: 28334,
    zmq_tx_port: 28335,
    cookie_path: "testnet4/.cookie",
};

impl NetworkConfig {
    /// Unknown names map to testnet4.
    pub fn from_name(name: &str) -> Self {
        Network::from_name(name).config()
    }

    pub fn is_mainnet(&self) -> bool {
        self.network == Network::Mainnet
    }
}

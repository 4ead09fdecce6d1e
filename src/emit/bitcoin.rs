//! bitcoin.conf

use crate::state::AppConfig;
use std::fmt::Write;

pub const DBCACHE_MB: u32 = 512;
pub const MAXMEMPOOL_MB: u32 = 300;

/// Render `/etc/bitcoin/bitcoin.conf`.
///
/// On testnet4 the chain flag sits at top level and the listener / RPC / ZMQ
/// keys move under `[testnet4]`; bitcoind ignores them at top level for
/// non-main chains.
pub fn bitcoin_conf(cfg: &AppConfig) -> String {
    let net = cfg.network_config();
    let mut out = String::from("# Managed by rlvpn. Local edits are overwritten.\n");

    if !net.bitcoin_flag.is_empty() {
        let _ = writeln!(out, "{}", net.bitcoin_flag);
    }

    let _ = writeln!(out, "server=1");
    let _ = writeln!(out, "prune={}", cfg.prune_mb());
    let _ = writeln!(out, "dbcache={}", DBCACHE_MB);
    let _ = writeln!(out, "maxmempool={}", MAXMEMPOOL_MB);
    let _ = writeln!(out, "disablewallet=1");
    let _ = writeln!(out, "proxy=127.0.0.1:9050");
    let _ = writeln!(out, "listen=1");
    let _ = writeln!(out, "listenonion=1");

    if !net.bitcoin_section.is_empty() {
        let _ = writeln!(out, "\n{}", net.bitcoin_section);
    }

    let _ = writeln!(out, "bind=127.0.0.1");
    let _ = writeln!(out, "rpcbind=127.0.0.1");
    let _ = writeln!(out, "rpcallowip=127.0.0.1");
    let _ = writeln!(out, "rpcport={}", net.rpc_port);
    let _ = writeln!(out, "zmqpubrawblock=tcp://127.0.0.1:{}", net.zmq_block_port);
    let _ = writeln!(out, "zmqpubrawtx=tcp://127.0.0.1:{}", net.zmq_tx_port);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    #[test]
    fn test_mainnet_defaults() {
        let conf = bitcoin_conf(&AppConfig::default());
        for line in [
            "server=1",
            "prune=25000",
            "dbcache=512",
            "maxmempool=300",
            "disablewallet=1",
            "proxy=127.0.0.1:9050",
            "listen=1",
            "listenonion=1",
            "bind=127.0.0.1",
            "rpcbind=127.0.0.1",
            "rpcallowip=127.0.0.1",
            "rpcport=8332",
            "zmqpubrawblock=tcp://127.0.0.1:28332",
            "zmqpubrawtx=tcp://127.0.0.1:28333",
        ] {
            assert!(conf.lines().any(|l| l == line), "missing {line}");
        }
        assert!(!conf.contains("[testnet4]"));
        assert!(!conf.contains("testnet4=1"));
    }

    #[test]
    fn test_testnet4_section_follows_globals() {
        let cfg = AppConfig {
            network: Network::Testnet4,
            prune_size: 50,
            ..Default::default()
        };
        let conf = bitcoin_conf(&cfg);
        let flag = conf.find("testnet4=1").unwrap();
        let section = conf.find("[testnet4]").unwrap();
        let prune = conf.find("prune=50000").unwrap();
        let rpcport = conf.find("rpcport=48332").unwrap();
        assert!(flag < prune && prune < section && section < rpcport);
        assert!(conf.contains("zmqpubrawblock=tcp://127.0.0.1:28334"));
        assert!(conf.contains("zmqpubrawtx=tcp://127.0.0.1:28335"));
    }
}

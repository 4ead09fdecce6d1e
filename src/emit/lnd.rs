//! lnd.conf, plus the one in-place edit rlvpn ever makes to it.

use crate::layout::BITCOIN_DATA;
use crate::state::{AppConfig, P2pMode};
use std::fmt::Write;
use std::net::Ipv4Addr;

pub const LND_P2P_PORT: u16 = 9735;
pub const LND_GRPC_PORT: u16 = 10009;
pub const LND_REST_PORT: u16 = 8080;

const APP_OPTIONS: &str = "[Application Options]";
const RPC_MIDDLEWARE: &str = "rpcmiddleware.enable=true";

/// Host facts lnd.conf depends on that are not part of [`AppConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LndHostFacts<'a> {
    /// Public address advertised in hybrid mode
    pub public_ipv4: Option<Ipv4Addr>,
    /// Contents of the REST hidden service's `hostname` file, if it exists
    pub rest_onion: Option<&'a str>,
}

/// Render `/etc/lnd/lnd.conf`.
pub fn lnd_conf(cfg: &AppConfig, facts: &LndHostFacts<'_>) -> String {
    let net = cfg.network_config();
    let mut out = String::from("# Managed by rlvpn.\n");

    let _ = writeln!(out, "{}", APP_OPTIONS);
    let _ = writeln!(out, "debuglevel=info");
    let _ = writeln!(out, "maxpendingchannels=5");
    match cfg.effective_p2p_mode() {
        P2pMode::Tor => {
            let _ = writeln!(out, "listen=localhost:{}", LND_P2P_PORT);
        }
        P2pMode::Hybrid => {
            let _ = writeln!(out, "listen=0.0.0.0:{}", LND_P2P_PORT);
            if let Some(ip) = facts.public_ipv4 {
                let _ = writeln!(out, "externalhosts={}:{}", ip, LND_P2P_PORT);
            }
        }
    }
    let _ = writeln!(out, "rpclisten=localhost:{}", LND_GRPC_PORT);
    let _ = writeln!(out, "restlisten=localhost:{}", LND_REST_PORT);
    if let Some(onion) = facts.rest_onion.map(str::trim).filter(|h| !h.is_empty()) {
        let _ = writeln!(out, "tlsextradomain={}", onion);
    }

    let _ = writeln!(out, "\n[Bitcoin]");
    let _ = writeln!(out, "bitcoin.active=true");
    let _ = writeln!(out, "{}", net.lnd_bitcoin_flag);
    let _ = writeln!(out, "bitcoin.node=bitcoind");

    let _ = writeln!(out, "\n[Bitcoind]");
    let _ = writeln!(out, "bitcoind.rpccookie={}/{}", BITCOIN_DATA, net.cookie_path);
    let _ = writeln!(out, "bitcoind.rpchost=127.0.0.1:{}", net.rpc_port);
    let _ = writeln!(
        out,
        "bitcoind.zmqpubrawblock=tcp://127.0.0.1:{}",
        net.zmq_block_port
    );
    let _ = writeln!(out, "bitcoind.zmqpubrawtx=tcp://127.0.0.1:{}", net.zmq_tx_port);

    let _ = writeln!(out, "\n[Tor]");
    let _ = writeln!(out, "tor.active=true");
    let _ = writeln!(out, "tor.socks=127.0.0.1:9050");
    let _ = writeln!(out, "tor.control=127.0.0.1:9051");
    let _ = writeln!(out, "tor.v3=true");
    let _ = writeln!(out, "tor.streamisolation=true");

    out
}

/// Ensure `rpcmiddleware.enable=true` is set, as Lightning Terminal needs.
///
/// Returns `None` when the key is already present. Otherwise the key is
/// inserted right after `[Application Options]`, or appended if the section
/// header is missing.
pub fn with_rpc_middleware(existing: &str) -> Option<String> {
    if existing.lines().any(|l| l.trim() == RPC_MIDDLEWARE) {
        return None;
    }

    let mut out = String::with_capacity(existing.len() + RPC_MIDDLEWARE.len() + 1);
    let mut inserted = false;
    for line in existing.lines() {
        out.push_str(line);
        out.push('\n');
        if !inserted && line.trim() == APP_OPTIONS {
            out.push_str(RPC_MIDDLEWARE);
            out.push('\n');
            inserted = true;
        }
    }
    if !inserted {
        out.push_str(RPC_MIDDLEWARE);
        out.push('\n');
    }
    Some(out)
}

//! lit.conf for Lightning Terminal in remote-LND mode.

use crate::emit::lnd::LND_GRPC_PORT;
use crate::layout::{self, LIT_DATA, LND_TLS_CERT};
use crate::state::AppConfig;
use std::fmt::Write;

pub const LIT_HTTPS_PORT: u16 = 8443;

/// Render `/etc/lit/lit.conf`. The UI password comes from `cfg.lit_password`.
pub fn lit_conf(cfg: &AppConfig) -> String {
    let net = cfg.network_config();
    let mut out = String::from("# Managed by rlvpn.\n");

    let _ = writeln!(out, "uipassword={}", cfg.lit_password);
    let _ = writeln!(out, "network={}", net.name);
    let _ = writeln!(out, "lit-dir={}", LIT_DATA);
    let _ = writeln!(out, "httpslisten=127.0.0.1:{}", LIT_HTTPS_PORT);

    let _ = writeln!(out, "\nlnd-mode=remote");
    let _ = writeln!(out, "remote.lnd.rpcserver=127.0.0.1:{}", LND_GRPC_PORT);
    let _ = writeln!(
        out,
        "remote.lnd.macaroonpath={}",
        layout::lnd_admin_macaroon(&net)
    );
    let _ = writeln!(out, "remote.lnd.tlscertpath={}", LND_TLS_CERT);

    let _ = writeln!(out, "\nfaraday-mode=disable");
    let _ = writeln!(out, "loop-mode=disable");
    let _ = writeln!(out, "pool-mode=disable");
    let _ = writeln!(out, "taproot-assets-mode=disable");

    out
}

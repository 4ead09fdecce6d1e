//! AddLND, plus the public IPv4 probe hybrid mode depends on.

use crate::emit::lnd::{lnd_conf, LndHostFacts};
use crate::emit::systemd;
use crate::error::{NodeError, Result};
use crate::host::{root_group_owner, service_owner, Host};
use crate::layout::{systemd_unit, LND_CONF, LND_CONF_DIR, LND_DATA, LND_REST_HS};
use crate::plans::{Plan, PlanKind, Steps};
use crate::runner::Runner;
use crate::state::{AppConfig, Components, P2pMode};
use crate::trust::fetch::{Arch, Release};
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{info, warn};

pub const IPV4_PROBE_URL: &str = "https://api.ipify.org";
pub const IPV4_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Parse probe output as a globally routable IPv4 address.
pub fn parse_public_ipv4(text: &str) -> Option<Ipv4Addr> {
    let ip: Ipv4Addr = text.trim().parse().ok()?;
    let [a, b, ..] = ip.octets();
    // 100.64.0.0/10, carrier-grade NAT
    let shared = a == 100 && (64..128).contains(&b);
    let unusable = ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
        || shared;
    (!unusable).then_some(ip)
}

/// Ask an external echo service for this host's public IPv4, within 5 s.
pub fn probe_public_ipv4(runner: &Runner) -> Option<Ipv4Addr> {
    let timeout = IPV4_PROBE_TIMEOUT.as_secs().to_string();
    match runner.output_within(
        IPV4_PROBE_TIMEOUT,
        "curl",
        ["-4", "-s", "--max-time", timeout.as_str(), IPV4_PROBE_URL],
    ) {
        Ok(text) => {
            let ip = parse_public_ipv4(&text);
            if ip.is_none() {
                warn!(output = %text, "IPv4 probe did not return a public address");
            }
            ip
        }
        Err(e) => {
            warn!(error = %e, "IPv4 probe failed");
            None
        }
    }
}

/// Settle the P2P mode: hybrid needs a public IPv4, otherwise Tor.
pub fn resolve_p2p_mode(requested: P2pMode, public_ipv4: Option<Ipv4Addr>) -> P2pMode {
    match (requested, public_ipv4) {
        (P2pMode::Hybrid, Some(_)) => P2pMode::Hybrid,
        (P2pMode::Hybrid, None) => {
            warn!("no public IPv4 detected, falling back to Tor-only P2P");
            P2pMode::Tor
        }
        (P2pMode::Tor, _) => P2pMode::Tor,
    }
}

/// Probe the address only when hybrid was asked for.
pub fn discover_public_ipv4(runner: &Runner, requested: P2pMode) -> Option<Ipv4Addr> {
    match requested {
        P2pMode::Hybrid => probe_public_ipv4(runner),
        P2pMode::Tor => None,
    }
}

/// Build the AddLND plan. `public_ipv4` comes from [`discover_public_ipv4`].
pub fn add_lnd(
    cfg: &AppConfig,
    host: &Host,
    arch: Arch,
    requested: P2pMode,
    public_ipv4: Option<Ipv4Addr>,
) -> Result<Plan> {
    if cfg.has_lnd() {
        return Err(NodeError::preflight("LND is already installed"));
    }

    let mode = resolve_p2p_mode(requested, public_ipv4);
    // torrc and UFW are derived from these, so set them before building steps
    let target = AppConfig {
        components: Components::BitcoinLnd,
        p2p_mode: mode,
        ..cfg.clone()
    };
    info!(p2p = %mode, "adding LND");

    let mut steps = Steps::new(host);
    steps.add_release("LND", &Release::lnd(arch));

    steps.add("Create LND directories", |h| {
        h.ensure_dir(LND_DATA, 0o750, Some(&service_owner()))?;
        h.ensure_dir(LND_CONF_DIR, 0o750, Some(&root_group_owner()))
    });

    let conf_cfg = target.clone();
    let advertised = if mode == P2pMode::Hybrid { public_ipv4 } else { None };
    steps.add("Write lnd.conf", move |h| {
        let rest_onion = h.onion_hostname(LND_REST_HS)?;
        let facts = LndHostFacts {
            public_ipv4: advertised,
            rest_onion: rest_onion.as_deref(),
        };
        h.write_owned(LND_CONF, &lnd_conf(&conf_cfg, &facts), 0o640, &root_group_owner())
    });

    steps.add("Install LND service", |h| {
        h.write(
            &systemd_unit(systemd::LND_UNIT),
            &systemd::lnd_service(),
            0o644,
        )?;
        h.daemon_reload()?;
        h.systemctl(["enable", systemd::LND_UNIT])
    });

    steps.add_firewall("Reconfigure firewall", &target);
    steps.add_tor_rebuild(&target);
    steps.add("Start LND", |h| h.restart(systemd::LND_UNIT));

    Ok(steps.persist(PlanKind::AddLnd, target))
}

//! InitialInstall: bare Debian host to a pruned, Tor-only Bitcoin Core node.

use crate::emit::{bitcoin, system, systemd, tor};
use crate::host::{root_group_owner, service_owner, Host};
use crate::layout::{
    systemd_unit, AUTO_UPGRADES, BITCOIND_BIN, BITCOIN_CONF, BITCOIN_CONF_DIR, BITCOIN_DATA,
    FAIL2BAN_JAIL, OS_RELEASE, SERVICE_USER, STATE_DIR, SYSCTL_IPV6, TORRC, TOR_GROUP,
    UNATTENDED_UPGRADES,
};
use crate::plans::{Plan, PlanKind, Steps};
use crate::sanity;
use crate::state::AppConfig;
use crate::trust::fetch::{Arch, Release};
use tracing::info;

/// The install only runs on a host without `bitcoind`.
pub fn needs_install(host: &Host) -> bool {
    !host.exists(BITCOIND_BIN)
}

/// Build the InitialInstall plan for `cfg`. Empty when `bitcoind` is
/// already installed, so a second run is a no-op.
pub fn initial_install(cfg: &AppConfig, host: &Host, arch: Arch) -> Plan {
    let target = cfg.clone();
    let mut steps = Steps::new(host);

    if !needs_install(host) {
        info!(path = BITCOIND_BIN, "bitcoind already installed, skipping install");
        return steps.into_plan(PlanKind::InitialInstall, target);
    }

    steps.add("Check operating system", |h| {
        sanity::check_os_release(&h.read(OS_RELEASE)?).map(|_| ())
    });

    steps.add("Create service user and directories", |h| {
        h.ensure_service_user()?;
        h.ensure_dir(BITCOIN_DATA, 0o750, Some(&service_owner()))?;
        h.ensure_dir(BITCOIN_CONF_DIR, 0o750, Some(&root_group_owner()))?;
        h.ensure_dir(STATE_DIR, 0o755, None)
    });

    steps.add("Disable IPv6", |h| {
        h.write(SYSCTL_IPV6, &system::sysctl_disable_ipv6(), 0o644)?;
        let path = h.path(SYSCTL_IPV6);
        h.runner().run("sysctl", ["-p", path.to_string_lossy().as_ref()])
    });

    steps.add("Install firewall", |h| h.apt_install(&["ufw"]));
    steps.add_firewall("Configure firewall", &target);

    steps.add("Install GnuPG", |h| h.apt_install(&["gnupg"]));

    let tor_cfg = target.clone();
    steps.add("Install and start Tor", move |h| {
        h.apt_install(&["tor"])?;
        h.write(TORRC, &tor::torrc(&tor_cfg), 0o644)?;
        h.add_to_group(SERVICE_USER, TOR_GROUP)?;
        h.systemctl(["enable", "tor"])?;
        h.restart("tor")
    });

    steps.add_release("Bitcoin Core", &Release::bitcoin_core(arch));

    let conf = bitcoin::bitcoin_conf(&target);
    steps.add("Configure and start bitcoind", move |h| {
        h.write_owned(BITCOIN_CONF, &conf, 0o640, &root_group_owner())?;
        h.write(
            &systemd_unit(systemd::BITCOIND_UNIT),
            &systemd::bitcoind_service(),
            0o644,
        )?;
        h.daemon_reload()?;
        h.enable_now(systemd::BITCOIND_UNIT)
    });

    steps.add("Enable unattended security upgrades", |h| {
        h.apt_install(&["unattended-upgrades"])?;
        h.write(AUTO_UPGRADES, &system::auto_upgrades(), 0o644)?;
        h.write(UNATTENDED_UPGRADES, &system::unattended_upgrades(), 0o644)
    });

    let jail = system::fail2ban_jail(&target);
    steps.add("Configure fail2ban", move |h| {
        h.apt_install(&["fail2ban"])?;
        h.write(FAIL2BAN_JAIL, &jail, 0o644)?;
        h.systemctl(["enable", "fail2ban"])?;
        h.restart("fail2ban")
    });

    steps.persist(PlanKind::InitialInstall, target)
}

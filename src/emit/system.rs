//! Host hardening files: sysctl, UFW, unattended-upgrades, fail2ban, and the
//! Syncthing apt source.

use crate::emit::lnd::LND_P2P_PORT;
use crate::layout::SYNCTHING_KEYRING;
use crate::state::{AppConfig, P2pMode};
use std::fmt::Write;

pub const SYNCTHING_APT_URL: &str = "https://apt.syncthing.net/";
pub const SYNCTHING_RELEASE_KEY_URL: &str = "https://syncthing.net/release-key.gpg";

/// `/etc/sysctl.d` drop-in turning IPv6 off everywhere.
pub fn sysctl_disable_ipv6() -> String {
    let mut out = String::from("# Managed by rlvpn.\n");
    for scope in ["all", "default", "lo"] {
        let _ = writeln!(out, "net.ipv6.conf.{}.disable_ipv6 = 1", scope);
    }
    out
}

/// Whether LND's clearnet port must be reachable.
pub fn lnd_port_open(cfg: &AppConfig) -> bool {
    cfg.has_lnd() && cfg.effective_p2p_mode() == P2pMode::Hybrid
}

/// `ufw` invocations, in order, that bring the firewall to the state `cfg`
/// requires. The last one enables the firewall.
pub fn ufw_rules(cfg: &AppConfig) -> Vec<Vec<String>> {
    let mut rules: Vec<Vec<String>> = vec![
        vec!["default".into(), "deny".into(), "incoming".into()],
        vec!["default".into(), "allow".into(), "outgoing".into()],
        vec!["allow".into(), format!("{}/tcp", cfg.ssh_port)],
    ];
    let lnd_rule = format!("{}/tcp", LND_P2P_PORT);
    if lnd_port_open(cfg) {
        rules.push(vec!["allow".into(), lnd_rule]);
    } else {
        // Tolerated by ufw when the rule does not exist
        rules.push(vec!["delete".into(), "allow".into(), lnd_rule]);
    }
    rules.push(vec!["--force".into(), "enable".into()]);
    rules
}

pub fn auto_upgrades() -> String {
    "APT::Periodic::Update-Package-Lists \"1\";\n\
     APT::Periodic::Unattended-Upgrade \"1\";\n\
     APT::Periodic::AutocleanInterval \"7\";\n"
        .to_string()
}

/// Security-only origins, automatic reboot at 04:00.
pub fn unattended_upgrades() -> String {
    let mut out = String::from("// Managed by rlvpn.\n");
    let _ = writeln!(out, "Unattended-Upgrade::Origins-Pattern {{");
    let _ = writeln!(
        out,
        "        \"origin=Debian,codename=${{distro_codename}}-security,label=Debian-Security\";"
    );
    let _ = writeln!(
        out,
        "        \"origin=Debian,codename=${{distro_codename}},label=Debian-Security\";"
    );
    let _ = writeln!(out, "}};");
    let _ = writeln!(out, "Unattended-Upgrade::Remove-Unused-Dependencies \"true\";");
    let _ = writeln!(out, "Unattended-Upgrade::Automatic-Reboot \"true\";");
    let _ = writeln!(out, "Unattended-Upgrade::Automatic-Reboot-Time \"04:00\";");
    out
}

pub fn fail2ban_jail(cfg: &AppConfig) -> String {
    let mut out = String::from("# Managed by rlvpn.\n[sshd]\n");
    let _ = writeln!(out, "enabled = true");
    let _ = writeln!(out, "port = {}", cfg.ssh_port);
    let _ = writeln!(out, "maxretry = 5");
    let _ = writeln!(out, "findtime = 10m");
    let _ = writeln!(out, "bantime = 1h");
    out
}

pub fn syncthing_apt_source() -> String {
    format!(
        "deb [signed-by={}] {} syncthing stable\n",
        SYNCTHING_KEYRING, SYNCTHING_APT_URL
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Components;

    fn joined(rules: &[Vec<String>]) -> Vec<String> {
        rules.iter().map(|r| r.join(" ")).collect()
    }

    #[test]
    fn test_ufw_defaults() {
        let rules = joined(&ufw_rules(&AppConfig::default()));
        assert_eq!(rules[0], "default deny incoming");
        assert_eq!(rules[1], "default allow outgoing");
        assert_eq!(rules[2], "allow 22/tcp");
        assert_eq!(rules[3], "delete allow 9735/tcp");
        assert_eq!(rules.last().map(String::as_str), Some("--force enable"));
    }

    #[test]
    fn test_ufw_opens_lnd_only_for_hybrid() {
        let hybrid = AppConfig {
            components: Components::BitcoinLnd,
            p2p_mode: P2pMode::Hybrid,
            ssh_port: 2222,
            ..Default::default()
        };
        let rules = joined(&ufw_rules(&hybrid));
        assert!(rules.contains(&"allow 2222/tcp".to_string()));
        assert!(rules.contains(&"allow 9735/tcp".to_string()));

        let tor = AppConfig {
            p2p_mode: P2pMode::Tor,
            ..hybrid
        };
        assert!(!joined(&ufw_rules(&tor)).contains(&"allow 9735/tcp".to_string()));
    }

    #[test]
    fn test_hardening_files() {
        let sysctl = sysctl_disable_ipv6();
        assert_eq!(sysctl.matches("disable_ipv6 = 1").count(), 3);

        let uu = unattended_upgrades();
        assert!(uu.contains("label=Debian-Security"));
        assert!(uu.contains("Automatic-Reboot-Time \"04:00\""));
        assert!(uu.contains("${distro_codename}"));

        let jail = fail2ban_jail(&AppConfig {
            ssh_port: 2200,
            ..Default::default()
        });
        assert!(jail.starts_with("# Managed by rlvpn.\n[sshd]\n"));
        assert!(jail.contains("port = 2200"));
        assert!(jail.contains("enabled = true"));

        assert_eq!(
            syncthing_apt_source(),
            "deb [signed-by=/etc/apt/keyrings/syncthing-archive-keyring.gpg] https://apt.syncthing.net/ syncthing stable\n"
        );
    }
}

//! Whole plans run against a fake host: what lands on disk, what gets saved.

mod common;

use common::FakeNode;
use rlvpn::engine::StepStatus;
use rlvpn::error::{ErrorKind, NodeError, TrustError};
use rlvpn::layout::{BITCOIN_CONF, LIT_CONF, LND_CONF, SYNCTHING_CONF, TORRC};
use rlvpn::plans::{install, lit, lnd, prune, syncthing, unlock};
use rlvpn::trust::fetch::Arch;
use rlvpn::{AppConfig, Components, Network, P2pMode};

fn install_node(node: &FakeNode, cfg: &AppConfig) -> AppConfig {
    let plan = install::initial_install(cfg, &node.host, Arch::X86_64);
    let (result, _) = node.run(plan);
    result.unwrap()
}

#[test]
fn bitcoin_only_mainnet_install() {
    let node = FakeNode::new();
    let saved = install_node(&node, &AppConfig::default());
    assert_eq!(saved, AppConfig::default());
    assert_eq!(node.saved(), AppConfig::default());

    let torrc = node.read(TORRC);
    assert!(torrc.contains("SOCKSPort 9050"));
    assert!(torrc.contains("HiddenServicePort 8332"));
    assert!(torrc.contains("HiddenServicePort 8333"));
    assert_eq!(torrc.matches("HiddenServicePort").count(), 2);

    let conf = node.read(BITCOIN_CONF);
    assert!(conf.contains("prune=25000"));
    assert!(conf.contains("rpcport=8332"));
    assert!(!conf.contains("[testnet4]"));

    // Binaries were placed and the scratch space cleaned up
    assert!(node.root().join("usr/local/bin/bitcoind").exists());
    assert!(node.root().join("usr/local/bin/bitcoin-cli").exists());
    assert_eq!(node.exec.count("tar -xzf"), 1);
    assert_eq!(node.exec.count("ufw --force enable"), 1);
    assert_eq!(node.exec.count("systemctl enable --now bitcoind.service"), 1);
}

#[test]
fn testnet4_pruned_install() {
    let node = FakeNode::new();
    let cfg = AppConfig {
        network: Network::Testnet4,
        prune_size: 50,
        ..Default::default()
    };
    install_node(&node, &cfg);

    let conf = node.read(BITCOIN_CONF);
    for line in [
        "testnet4=1",
        "[testnet4]",
        "prune=50000",
        "rpcport=48332",
        "zmqpubrawblock=tcp://127.0.0.1:28334",
    ] {
        assert!(conf.contains(line), "missing {line}\n{conf}");
    }
    assert_eq!(node.saved().network, Network::Testnet4);
    assert_eq!(node.saved().prune_size, 50);
}

#[test]
fn second_install_is_a_no_op() {
    let node = FakeNode::new();
    install_node(&node, &AppConfig::default());
    node.exec.clear();

    let plan = install::initial_install(&AppConfig::default(), &node.host, Arch::X86_64);
    assert!(plan.is_empty());
    let (result, messages) = node.run(plan);
    assert!(result.is_ok());
    assert_eq!(messages, vec![rlvpn::Progress::PlanDone { ok: true }]);
    assert!(node.exec.commands().is_empty());
}

#[test]
fn full_stack_hybrid() {
    let node = FakeNode::new();
    let base = install_node(&node, &AppConfig::default());

    node.exec
        .respond("curl -4 -s --max-time 5 https://api.ipify.org", "203.0.113.7\n");
    let ip = lnd::discover_public_ipv4(node.host.runner(), P2pMode::Hybrid);
    let plan = lnd::add_lnd(&base, &node.host, Arch::X86_64, P2pMode::Hybrid, ip).unwrap();
    let with_lnd = node.run(plan).0.unwrap();
    assert_eq!(with_lnd.components, Components::BitcoinLnd);
    assert_eq!(with_lnd.p2p_mode, P2pMode::Hybrid);

    let with_lit = node.run(lit::add_lit(&with_lnd, &node.host, Arch::X86_64).unwrap()).0.unwrap();
    assert!(with_lit.lit_installed);
    assert!(!with_lit.lit_password.is_empty());

    let full = node.run(syncthing::add_syncthing(&with_lit, &node.host).unwrap()).0.unwrap();
    assert!(full.syncthing_installed);
    assert_eq!(node.saved(), full);

    let torrc = node.read(TORRC);
    for needle in [
        "ControlPort 9051",
        "lnd-grpc",
        "lnd-rest",
        "lnd-lit",
        "/syncthing/",
        "syncthing-sync",
    ] {
        assert!(torrc.contains(needle), "missing {needle}\n{torrc}");
    }

    let lnd_conf = node.read(LND_CONF);
    assert!(lnd_conf.contains("listen=0.0.0.0:9735"));
    assert!(lnd_conf.contains("externalhosts=203.0.113.7:9735"));
    assert!(lnd_conf.contains("rpcmiddleware.enable=true"));

    let lit_conf = node.read(LIT_CONF);
    assert!(lit_conf.contains(&format!("uipassword={}", full.lit_password)));

    let xml = node.read(SYNCTHING_CONF);
    assert!(xml.contains("<user>admin</user>"));
    assert!(xml.contains("<insecureSkipHostcheck>true</insecureSkipHostcheck>"));
    assert!(!xml.contains(&full.syncthing_password));

    // Hybrid opens the LND port
    assert!(node.exec.count("ufw allow 9735/tcp") >= 1);
}

#[test]
fn hybrid_without_public_ip_falls_back_to_tor() {
    let node = FakeNode::new();
    let base = install_node(&node, &AppConfig::default());
    node.exec
        .respond("curl -4 -s --max-time 5 https://api.ipify.org", "10.0.0.8\n");

    let ip = lnd::discover_public_ipv4(node.host.runner(), P2pMode::Hybrid);
    assert_eq!(ip, None);
    let plan = lnd::add_lnd(&base, &node.host, Arch::X86_64, P2pMode::Hybrid, ip).unwrap();
    let saved = node.run(plan).0.unwrap();
    assert_eq!(saved.p2p_mode, P2pMode::Tor);
    assert!(node.read(LND_CONF).contains("listen=localhost:9735"));
}

#[test]
fn bad_signature_stops_the_install() {
    let node = FakeNode::new();
    node.exec.respond(
        "gpg --batch --status-fd 1 --verify",
        "GOODSIG A\nGOODSIG B\nBADSIG C\n",
    );

    let plan = install::initial_install(&AppConfig::default(), &node.host, Arch::X86_64);
    let (result, board) = node.run_board(plan);

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Trust);
    assert_eq!(err.step_name(), Some("Verify Bitcoin Core signatures"));
    assert!(matches!(
        err.root(),
        NodeError::Trust(TrustError::BadSignaturePresent { bad: 1 })
    ));

    let failed = board
        .steps
        .iter()
        .position(|s| s.status == StepStatus::Failed)
        .unwrap();
    assert_eq!(board.steps[failed].name, "Verify Bitcoin Core signatures");
    assert!(board.steps[..failed].iter().all(|s| s.status == StepStatus::Done));
    assert!(board.steps[failed + 1..].iter().all(|s| s.status == StepStatus::Pending));
    assert_eq!(board.outcome, Some(false));

    // Nothing installed, nothing saved
    assert!(!node.root().join("usr/local/bin/bitcoind").exists());
    assert!(matches!(node.store().load(), Err(NodeError::NotFound { .. })));
}

#[test]
fn prune_change_rewrites_conf_and_state() {
    let node = FakeNode::new();
    let base = install_node(&node, &AppConfig::default());
    assert_eq!(base.prune_size, 25);

    let plan = prune::change_prune_size(&base, &node.host, 75).unwrap();
    node.run(plan).0.unwrap();

    assert!(node.read(BITCOIN_CONF).contains("prune=75000"));
    assert_eq!(node.saved().prune_size, 75);
    assert_eq!(node.exec.count("systemctl restart bitcoind.service"), 1);
}

#[test]
fn secrets_survive_a_save_and_empty_ones_are_omitted() {
    let node = FakeNode::new();
    let store = node.store();

    let cfg = AppConfig {
        components: Components::BitcoinLnd,
        lit_installed: true,
        lit_password: "abc".into(),
        ..Default::default()
    };
    store.save(&cfg).unwrap();
    assert_eq!(store.load().unwrap().lit_password, "abc");

    store.save(&AppConfig::default()).unwrap();
    let raw = std::fs::read_to_string(store.path()).unwrap();
    assert!(!raw.contains("lit_password"));
    assert!(!raw.contains("syncthing_password"));
}

#[test]
fn auto_unlock_installs_drop_in() {
    let node = FakeNode::new();
    let base = install_node(&node, &AppConfig::default());
    let with_lnd = node
        .run(lnd::add_lnd(&base, &node.host, Arch::X86_64, P2pMode::Tor, None).unwrap())
        .0
        .unwrap();

    let err = unlock::enable_auto_unlock(&with_lnd, &node.host, "hunter2".into()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Preflight);

    node.create_wallet(&with_lnd);
    let plan = unlock::enable_auto_unlock(&with_lnd, &node.host, "hunter2".into()).unwrap();
    let saved = node.run(plan).0.unwrap();
    assert!(saved.auto_unlock);

    let dropin = node.read("/etc/systemd/system/lnd.service.d/auto-unlock.conf");
    assert!(dropin.contains("--wallet-unlock-password-file=/var/lib/lnd/wallet_password"));
    assert_eq!(node.read("/var/lib/lnd/wallet_password"), "hunter2");
    assert!(!node.read("/etc/systemd/system/lnd.service").contains("wallet-unlock"));
}

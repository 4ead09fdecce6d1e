//! AddSyncthing: replicate LND's channel.backup through Syncthing over Tor.

use crate::emit::syncthing::{missing_gui_settings, secure_gui};
use crate::emit::{system, systemd};
use crate::error::{NodeError, Result};
use crate::host::{service_owner, Host};
use crate::layout::{
    lnd_channel_backup, systemd_unit, APT_KEYRINGS, SERVICE_USER, SYNCTHING_APT_LIST,
    SYNCTHING_BACKUP_DIR, SYNCTHING_BIN, SYNCTHING_CONF, SYNCTHING_CONF_DIR, SYNCTHING_DATA,
    SYNCTHING_KEYRING,
};
use crate::plans::{generate_password, require_lnd, Plan, PlanKind, Steps};
use crate::state::AppConfig;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tracing::info;

/// Run `syncthing generate`, then lock the GUI down and verify the result.
pub fn configure_gui(host: &Host, password: &str) -> Result<()> {
    let config = host.path(SYNCTHING_CONF_DIR);
    let data = host.path(SYNCTHING_DATA);
    host.runner().sudo_run_as(
        SERVICE_USER,
        SYNCTHING_BIN,
        [
            "generate".to_string(),
            format!("--config={}", config.display()),
            format!("--data={}", data.display()),
        ],
    )?;

    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| NodeError::exec("bcrypt", e.to_string()))?;
    let generated = host.read(SYNCTHING_CONF)?;
    let secured =
        secure_gui(&generated, &hash).map_err(|e| NodeError::exec("syncthing generate", e.to_string()))?;
    host.write_owned(SYNCTHING_CONF, &secured, 0o640, &service_owner())?;

    let missing = missing_gui_settings(&host.read(SYNCTHING_CONF)?);
    if !missing.is_empty() {
        return Err(NodeError::exec(
            "syncthing generate",
            format!("config.xml is missing: {}", missing.join(", ")),
        ));
    }
    info!("Syncthing GUI bound to loopback with admin credentials");
    Ok(())
}

pub fn add_syncthing(cfg: &AppConfig, host: &Host) -> Result<Plan> {
    require_lnd(cfg, "Syncthing backup replication")?;
    if cfg.syncthing_installed {
        return Err(NodeError::preflight("Syncthing is already installed"));
    }

    let mut target = cfg.clone();
    target.syncthing_installed = true;
    if target.syncthing_password.is_empty() {
        target.syncthing_password = generate_password();
    }

    let mut steps = Steps::new(host);
    steps.add("Add Syncthing apt repository", |h| {
        h.ensure_dir(APT_KEYRINGS, 0o755, None)?;
        h.runner()
            .download(system::SYNCTHING_RELEASE_KEY_URL, &h.path(SYNCTHING_KEYRING))?;
        let keyring = h.path(SYNCTHING_KEYRING);
        fs::set_permissions(&keyring, fs::Permissions::from_mode(0o644))
            .map_err(|e| NodeError::fs(&keyring, e))?;
        h.write(SYNCTHING_APT_LIST, &system::syncthing_apt_source(), 0o644)
    });

    steps.add("Install Syncthing", |h| {
        h.apt_update()?;
        h.apt_install(&["syncthing"])
    });

    steps.add("Create Syncthing directories", |h| {
        let owner = service_owner();
        h.ensure_dir(SYNCTHING_DATA, 0o750, Some(&owner))?;
        h.ensure_dir(SYNCTHING_CONF_DIR, 0o750, Some(&owner))?;
        h.ensure_dir(SYNCTHING_BACKUP_DIR, 0o750, Some(&owner))
    });

    steps.add("Install Syncthing service", |h| {
        h.write(
            &systemd_unit(systemd::SYNCTHING_UNIT),
            &systemd::syncthing_service(),
            0o644,
        )?;
        h.daemon_reload()?;
        h.systemctl(["enable", systemd::SYNCTHING_UNIT])
    });

    let password = target.syncthing_password.clone();
    steps.add("Generate Syncthing configuration", move |h| {
        configure_gui(h, &password)
    });

    steps.add_tor_rebuild(&target);
    steps.add("Start Syncthing", |h| h.restart(systemd::SYNCTHING_UNIT));

    let backup_cfg = target.clone();
    steps.add("Install channel backup watcher", move |h| {
        h.write(
            &systemd_unit(systemd::BACKUP_WATCH_UNIT),
            &systemd::backup_watch_path(&backup_cfg),
            0o644,
        )?;
        h.write(
            &systemd_unit(systemd::BACKUP_COPY_UNIT),
            &systemd::backup_copy_service(&backup_cfg),
            0o644,
        )?;
        h.daemon_reload()?;
        h.enable_now(systemd::BACKUP_WATCH_UNIT)?;
        // First copy now if LND already wrote a backup
        if h.exists(&lnd_channel_backup(&backup_cfg.network_config())) {
            h.systemctl(["start", systemd::BACKUP_COPY_UNIT])?;
        }
        Ok(())
    });

    Ok(steps.persist(PlanKind::AddSyncthing, target))
}

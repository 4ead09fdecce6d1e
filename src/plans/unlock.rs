//! EnableAutoUnlock: LND unlocks its wallet at start from a root-managed file.

use crate::emit::systemd;
use crate::error::{NodeError, Result};
use crate::host::{service_owner, Host};
use crate::layout::{systemd_unit, LND_WALLET_PASSWORD};
use crate::plans::{require_lnd, Plan, PlanKind, Steps};
use crate::state::AppConfig;

/// Build the plan. `password` is the wallet password, trailing newline
/// already stripped.
pub fn enable_auto_unlock(cfg: &AppConfig, host: &Host, password: String) -> Result<Plan> {
    require_lnd(cfg, "Wallet auto-unlock")?;
    if !cfg.wallet_exists(host.layout()) {
        return Err(NodeError::preflight(
            "no LND wallet found, create one with `lncli create` first",
        ));
    }
    if password.is_empty() {
        return Err(NodeError::preflight("wallet password is empty"));
    }

    let target = AppConfig {
        auto_unlock: true,
        ..cfg.clone()
    };

    let mut steps = Steps::new(host);
    steps.add("Write wallet password file", move |h| {
        h.write_owned(LND_WALLET_PASSWORD, &password, 0o400, &service_owner())
    });
    steps.add("Install auto-unlock drop-in", |h| {
        let dir = systemd_unit(systemd::LND_DROPIN_DIR);
        h.ensure_dir(&dir, 0o755, None)?;
        h.write(
            &format!("{}/{}", dir, systemd::LND_AUTO_UNLOCK_DROPIN),
            &systemd::lnd_auto_unlock_dropin(),
            0o644,
        )?;
        h.daemon_reload()
    });
    steps.add("Restart LND", |h| h.restart(systemd::LND_UNIT));
    Ok(steps.persist(PlanKind::EnableAutoUnlock, target))
}

//! ChangePruneSize: re-emit bitcoin.conf and restart bitcoind.

use crate::emit::{bitcoin, systemd};
use crate::error::{NodeError, Result};
use crate::host::{root_group_owner, Host};
use crate::layout::BITCOIN_CONF;
use crate::plans::{Plan, PlanKind, Steps};
use crate::state::{AppConfig, MIN_PRUNE_GB};

pub fn change_prune_size(cfg: &AppConfig, host: &Host, size_gb: u32) -> Result<Plan> {
    if size_gb < MIN_PRUNE_GB {
        return Err(NodeError::preflight(format!(
            "prune size must be at least {} GB, got {}",
            MIN_PRUNE_GB, size_gb
        )));
    }
    let target = AppConfig {
        prune_size: size_gb,
        ..cfg.clone()
    };

    let mut steps = Steps::new(host);
    let conf = bitcoin::bitcoin_conf(&target);
    steps.add("Write bitcoin.conf", move |h| {
        h.write_owned(BITCOIN_CONF, &conf, 0o640, &root_group_owner())
    });
    steps.add("Restart bitcoind", |h| h.restart(systemd::BITCOIND_UNIT));
    Ok(steps.persist(PlanKind::ChangePruneSize, target))
}

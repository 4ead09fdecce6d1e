//! AddLIT: Lightning Terminal against the local LND.

use crate::emit::lit::lit_conf;
use crate::emit::lnd::with_rpc_middleware;
use crate::emit::systemd;
use crate::error::{NodeError, Result};
use crate::host::{root_group_owner, service_owner, Host};
use crate::layout::{systemd_unit, LIT_CONF, LIT_CONF_DIR, LIT_DATA, LND_CONF};
use crate::plans::{generate_password, require_lnd, Plan, PlanKind, Steps};
use crate::state::AppConfig;
use crate::trust::fetch::{Arch, Release};
use tracing::{debug, info};

/// Ensure lnd.conf enables the RPC middleware LIT hooks into. Edits in place;
/// returns whether the file changed.
pub fn enable_rpc_middleware(host: &Host) -> Result<bool> {
    let current = host.read(LND_CONF)?;
    match with_rpc_middleware(&current) {
        Some(patched) => {
            host.write_owned(LND_CONF, &patched, 0o640, &root_group_owner())?;
            info!("enabled rpcmiddleware in lnd.conf");
            Ok(true)
        }
        None => {
            debug!("rpcmiddleware already enabled");
            Ok(false)
        }
    }
}

/// Build the AddLIT plan. A previously generated password is kept.
pub fn add_lit(cfg: &AppConfig, host: &Host, arch: Arch) -> Result<Plan> {
    require_lnd(cfg, "Lightning Terminal")?;
    if cfg.lit_installed {
        return Err(NodeError::preflight("Lightning Terminal is already installed"));
    }

    let mut target = cfg.clone();
    target.lit_installed = true;
    if target.lit_password.is_empty() {
        target.lit_password = generate_password();
    }

    let mut steps = Steps::new(host);
    steps.add_release("Lightning Terminal", &Release::lit(arch));

    steps.add("Enable LND RPC middleware", |h| {
        enable_rpc_middleware(h).map(|_| ())
    });
    steps.add("Restart LND", |h| h.restart(systemd::LND_UNIT));

    steps.add("Create Lightning Terminal directories", |h| {
        h.ensure_dir(LIT_DATA, 0o750, Some(&service_owner()))?;
        h.ensure_dir(LIT_CONF_DIR, 0o750, Some(&root_group_owner()))
    });

    let conf = lit_conf(&target);
    steps.add("Write lit.conf", move |h| {
        h.write_owned(LIT_CONF, &conf, 0o640, &root_group_owner())
    });

    steps.add("Install Lightning Terminal service", |h| {
        h.write(
            &systemd_unit(systemd::LITD_UNIT),
            &systemd::litd_service(),
            0o644,
        )?;
        h.daemon_reload()?;
        h.systemctl(["enable", systemd::LITD_UNIT])
    });

    steps.add_tor_rebuild(&target);
    steps.add("Start Lightning Terminal", |h| h.restart(systemd::LITD_UNIT));

    Ok(steps.persist(PlanKind::AddLit, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::layout::Layout;
    use crate::runner::Runner;
    use crate::state::Components;
    use crate::testing::RecordingExec;
    use std::sync::Arc;

    fn host(dir: &tempfile::TempDir) -> Host {
        Host::new(
            Runner::new(Arc::new(RecordingExec::default())),
            Layout::rooted(dir.path()),
        )
    }

    #[test]
    fn test_requires_lnd() {
        let dir = tempfile::tempdir().unwrap();
        let err = add_lit(&AppConfig::default(), &host(&dir), Arch::X86_64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Preflight);
    }

    #[test]
    fn test_password_generated_once() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig {
            components: Components::BitcoinLnd,
            ..Default::default()
        };
        let plan = add_lit(&cfg, &host(&dir), Arch::X86_64).unwrap();
        assert_eq!(plan.target.lit_password.len(), 24);
        assert!(plan.target.lit_installed);

        let kept = AppConfig {
            lit_password: "abc".into(),
            ..cfg
        };
        let plan = add_lit(&kept, &host(&dir), Arch::X86_64).unwrap();
        assert_eq!(plan.target.lit_password, "abc");
    }

    #[test]
    fn test_rpc_middleware_patch_is_guarded() {
        let dir = tempfile::tempdir().unwrap();
        let host = host(&dir);
        host.write(LND_CONF, "[Application Options]\ndebuglevel=info\n", 0o640)
            .unwrap();
        assert!(enable_rpc_middleware(&host).unwrap());
        assert!(!enable_rpc_middleware(&host).unwrap());
        assert_eq!(
            host.read(LND_CONF).unwrap(),
            "[Application Options]\nrpcmiddleware.enable=true\ndebuglevel=info\n"
        );
    }
}

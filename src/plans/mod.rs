//! Orchestration Plans
//!
//! A plan is built from the current [`AppConfig`] into a target config plus an
//! ordered step list, then handed to the engine. The caller's config is never
//! touched: the target is a copy, and the last step persists it. A failed or
//! cancelled run therefore leaves the saved state exactly as it was, while the
//! filesystem may reflect partial progress that a re-run overwrites.
//!
//! | plan | precondition |
//! |---|---|
//! | [`install::initial_install`] | `bitcoind` absent (otherwise an empty plan) |
//! | [`lnd::add_lnd`] | LND not installed |
//! | [`lit::add_lit`] | LND installed |
//! | [`syncthing::add_syncthing`] | LND installed |
//! | [`prune::change_prune_size`] | size at least 10 GB |
//! | [`unlock::enable_auto_unlock`] | LND installed and wallet created |
//! | [`self_update::self_update`] | none |

pub mod install;
pub mod lit;
pub mod lnd;
pub mod prune;
pub mod self_update;
pub mod syncthing;
pub mod unlock;

use crate::emit::{system, tor};
use crate::engine::{self, Reporter, Step};
use crate::error::{NodeError, PathContext, Result};
use crate::host::Host;
use crate::layout::{Layout, TORRC};
use crate::process_guard::CancelToken;
use crate::state::{AppConfig, StateStore};
use crate::trust::fetch::{self, Release};
use nix::fcntl::{Flock, FlockArg};
use rand::RngCore;
use rand::rngs::OsRng;
use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::PermissionsExt;
use strum::Display;
use tracing::{debug, info};

/// Length of generated add-on passwords before hex encoding
pub const PASSWORD_BYTES: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PlanKind {
    #[strum(serialize = "Initial install")]
    InitialInstall,
    #[strum(serialize = "Add LND")]
    AddLnd,
    #[strum(serialize = "Add Lightning Terminal")]
    AddLit,
    #[strum(serialize = "Add Syncthing backup")]
    AddSyncthing,
    #[strum(serialize = "Change prune size")]
    ChangePruneSize,
    #[strum(serialize = "Enable wallet auto-unlock")]
    EnableAutoUnlock,
    #[strum(serialize = "Self update")]
    SelfUpdate,
}

/// A target state plus the steps that converge the host onto it.
#[derive(Debug)]
pub struct Plan {
    pub kind: PlanKind,
    pub target: AppConfig,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Step list under construction; every step gets its own clone of the host.
pub(crate) struct Steps {
    host: Host,
    steps: Vec<Step>,
}

impl Steps {
    pub(crate) fn new(host: &Host) -> Self {
        Self {
            host: host.clone(),
            steps: Vec::new(),
        }
    }

    pub(crate) fn add(
        &mut self,
        name: impl Into<String>,
        action: impl FnOnce(&Host) -> Result<()> + Send + 'static,
    ) -> &mut Self {
        let host = self.host.clone();
        self.steps.push(Step::new(name, move || action(&host)));
        self
    }

    /// The import → download → signature → checksum → install sequence.
    pub(crate) fn add_release(&mut self, label: &str, release: &Release) -> &mut Self {
        let r = release.clone();
        self.add(format!("Import {} signing keys", label), move |h| {
            fetch::import_keys(h, &r.policy, r.component).map(|_| ())
        });
        let r = release.clone();
        self.add(format!("Download {} {}", label, release.version), move |h| {
            fetch::download_release(h, &r).map(|_| ())
        });
        let r = release.clone();
        self.add(format!("Verify {} signatures", label), move |h| {
            fetch::verify_signature(h, &r).map(|_| ())
        });
        let r = release.clone();
        self.add(format!("Verify {} checksum", label), move |h| {
            fetch::verify_checksum(h, &r)
        });
        let r = release.clone();
        self.add(format!("Install {} binaries", label), move |h| {
            fetch::install_release(h, &r)
        });
        self
    }

    /// Regenerate torrc from `target` and restart Tor.
    pub(crate) fn add_tor_rebuild(&mut self, target: &AppConfig) -> &mut Self {
        let cfg = target.clone();
        self.add("Rebuild torrc", move |h| h.write(TORRC, &tor::torrc(&cfg), 0o644));
        self.add("Restart Tor", |h| h.restart("tor"));
        self
    }

    /// Apply the UFW rules `target` implies.
    pub(crate) fn add_firewall(&mut self, name: &str, target: &AppConfig) -> &mut Self {
        let cfg = target.clone();
        self.add(name, move |h| {
            for rule in system::ufw_rules(&cfg) {
                h.runner().run("ufw", &rule)?;
            }
            Ok(())
        });
        self
    }

    /// Finish with the step that persists `target`.
    pub(crate) fn persist(mut self, kind: PlanKind, target: AppConfig) -> Plan {
        let saved = target.clone();
        self.add("Save node state", move |h| {
            StateStore::for_layout(h.layout()).save(&saved)
        });
        self.into_plan(kind, target)
    }

    /// Finish without touching persisted state.
    pub(crate) fn into_plan(self, kind: PlanKind, target: AppConfig) -> Plan {
        Plan {
            kind,
            target,
            steps: self.steps,
        }
    }
}

/// Exclusive lock on `/etc/rlvpn/.lock`, held while a plan runs.
#[derive(Debug)]
pub struct RunLock {
    _lock: Flock<File>,
}

impl RunLock {
    /// Fails fast with `Preflight` if another invocation holds the lock.
    pub fn acquire(layout: &Layout) -> Result<Self> {
        let path = layout.lock_file();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).at(dir)?;
            fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).at(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .at(&path)?;
        let lock = Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
            NodeError::preflight(format!(
                "another rlvpn run holds {} ({})",
                path.display(),
                errno
            ))
        })?;
        debug!(path = %path.display(), "run lock acquired");
        Ok(Self { _lock: lock })
    }
}

/// Run `plan` under the run lock. Returns the target config on success.
pub fn execute(plan: Plan, host: &Host, reporter: &Reporter, cancel: &CancelToken) -> Result<AppConfig> {
    if plan.is_empty() {
        info!(plan = %plan.kind, "nothing to do");
        reporter.send(engine::Progress::PlanDone { ok: true });
        return Ok(plan.target);
    }

    let _lock = RunLock::acquire(host.layout())?;
    info!(plan = %plan.kind, steps = plan.steps.len(), "plan started");
    engine::run(plan.steps, reporter, cancel)?;
    info!(plan = %plan.kind, "plan finished");
    Ok(plan.target)
}

/// Hex-encoded random token for add-on UIs
pub fn generate_password() -> String {
    let mut bytes = [0_u8; PASSWORD_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Fail with `Preflight` unless LND is part of the node.
pub(crate) fn require_lnd(cfg: &AppConfig, what: &str) -> Result<()> {
    if cfg.has_lnd() {
        Ok(())
    } else {
        Err(NodeError::preflight(format!(
            "{} requires LND, run `rlvpn add-lnd` first",
            what
        )))
    }
}

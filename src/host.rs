//! Execution context handed to every step.
//!
//! A [`Host`] pairs the [`Runner`] with the [`Layout`]: file writes land under
//! the layout's root, external tools run through the runner. Steps clone the
//! host into their closures; both halves are cheap to clone.

use crate::error::{PathContext, Result};
use crate::layout::{self, Layout, SERVICE_USER};
use crate::runner::Runner;
use crate::state::write_atomic;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// `root:bitcoin`, the owner of config files daemons read
pub fn root_group_owner() -> String {
    format!("root:{}", SERVICE_USER)
}

/// `bitcoin:bitcoin`, the owner of daemon data
pub fn service_owner() -> String {
    format!("{0}:{0}", SERVICE_USER)
}

#[derive(Debug, Clone)]
pub struct Host {
    runner: Runner,
    layout: Layout,
}

impl Host {
    pub fn new(runner: Runner, layout: Layout) -> Self {
        Self { runner, layout }
    }

    /// The real machine
    pub fn system() -> Self {
        Self::new(Runner::system(), Layout::system())
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Where `canonical` lives on this host
    pub fn path(&self, canonical: &str) -> PathBuf {
        self.layout.path(canonical)
    }

    pub fn exists(&self, canonical: &str) -> bool {
        self.path(canonical).exists()
    }

    pub fn read(&self, canonical: &str) -> Result<String> {
        let path = self.path(canonical);
        fs::read_to_string(&path).at(&path)
    }

    /// Contents of `canonical`, or `None` if it does not exist.
    pub fn read_opt(&self, canonical: &str) -> Result<Option<String>> {
        let path = self.path(canonical);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(crate::error::NodeError::fs(&path, e)),
        }
    }

    /// Atomically replace `canonical` with `content` at `mode`, creating
    /// parent directories as needed.
    pub fn write(&self, canonical: &str, content: &str, mode: u32) -> Result<()> {
        let path = self.path(canonical);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        write_atomic(&path, content.as_bytes(), mode)?;
        debug!(path = canonical, mode = format!("{:o}", mode), "wrote file");
        Ok(())
    }

    /// [`Host::write`] followed by `chown owner`.
    pub fn write_owned(&self, canonical: &str, content: &str, mode: u32, owner: &str) -> Result<()> {
        self.write(canonical, content, mode)?;
        self.chown(owner, canonical)
    }

    /// `mkdir -p`, then force `mode` and optionally `owner`.
    pub fn ensure_dir(&self, canonical: &str, mode: u32, owner: Option<&str>) -> Result<()> {
        let path = self.path(canonical);
        fs::create_dir_all(&path).at(&path)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).at(&path)?;
        if let Some(owner) = owner {
            self.chown(owner, canonical)?;
        }
        Ok(())
    }

    pub fn chown(&self, owner: &str, canonical: &str) -> Result<()> {
        let path = self.path(canonical);
        self.runner
            .run("chown", [owner, path.to_string_lossy().as_ref()])
    }

    /// Remove a directory tree if it exists
    pub fn remove_dir(&self, path: &Path) -> Result<()> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(crate::error::NodeError::fs(path, e)),
        }
    }

    pub fn systemctl<I, S>(&self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.runner.run("systemctl", args)
    }

    pub fn daemon_reload(&self) -> Result<()> {
        self.systemctl(["daemon-reload"])
    }

    pub fn enable_now(&self, unit: &str) -> Result<()> {
        info!(unit, "enabling and starting");
        self.systemctl(["enable", "--now", unit])
    }

    pub fn restart(&self, unit: &str) -> Result<()> {
        info!(unit, "restarting");
        self.systemctl(["restart", unit])
    }

    pub fn apt_update(&self) -> Result<()> {
        self.runner.run("apt-get", ["-q", "update"])
    }

    pub fn apt_install(&self, packages: &[&str]) -> Result<()> {
        let mut args = vec!["-y", "-q", "install"];
        args.extend_from_slice(packages);
        self.runner.run("apt-get", args)
    }

    pub fn user_exists(&self, user: &str) -> bool {
        self.runner.succeeds("id", ["-u", user])
    }

    /// Create the system account all daemons run as. No-op when present.
    pub fn ensure_service_user(&self) -> Result<()> {
        if self.user_exists(SERVICE_USER) {
            debug!(user = SERVICE_USER, "service user exists");
            return Ok(());
        }
        info!(user = SERVICE_USER, "creating service user");
        self.runner.run(
            "adduser",
            [
                "--system",
                "--group",
                "--no-create-home",
                "--home",
                layout::BITCOIN_DATA,
                "--shell",
                "/usr/sbin/nologin",
                SERVICE_USER,
            ],
        )
    }

    pub fn add_to_group(&self, user: &str, group: &str) -> Result<()> {
        self.runner.run("usermod", ["-aG", group, user])
    }

    /// Onion hostname of a hidden service, once Tor has created it.
    pub fn onion_hostname(&self, service: &str) -> Result<Option<String>> {
        let file = format!("{}/hostname", layout::hidden_service_dir(service));
        Ok(self
            .read_opt(&file)?
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingExec;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;

    fn host(dir: &tempfile::TempDir) -> (Host, Arc<RecordingExec>) {
        let exec = Arc::new(RecordingExec::default());
        let host = Host::new(Runner::new(exec.clone()), Layout::rooted(dir.path()));
        (host, exec)
    }

    #[test]
    fn test_write_owned_sets_mode_and_chowns() {
        let dir = tempfile::tempdir().unwrap();
        let (host, exec) = host(&dir);
        host.write_owned(layout::BITCOIN_CONF, "server=1\n", 0o640, &root_group_owner())
            .unwrap();

        let path = dir.path().join("etc/bitcoin/bitcoin.conf");
        assert_eq!(fs::read_to_string(&path).unwrap(), "server=1\n");
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
        assert_eq!(
            exec.commands(),
            vec![format!("chown root:bitcoin {}", path.display())]
        );
    }

    #[test]
    fn test_service_user_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (host, exec) = host(&dir);
        host.ensure_service_user().unwrap();
        assert_eq!(exec.commands(), vec!["id -u bitcoin"]);

        exec.fail_on("id -u");
        host.ensure_service_user().unwrap();
        assert!(exec.commands().last().unwrap().starts_with("adduser --system --group"));
    }

    #[test]
    fn test_onion_hostname() {
        let dir = tempfile::tempdir().unwrap();
        let (host, _) = host(&dir);
        assert_eq!(host.onion_hostname("lnd-rest").unwrap(), None);
        host.write("/var/lib/tor/lnd-rest/hostname", "abc.onion\n", 0o600)
            .unwrap();
        assert_eq!(
            host.onion_hostname("lnd-rest").unwrap().as_deref(),
            Some("abc.onion")
        );
    }
}

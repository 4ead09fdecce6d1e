//! Pre-flight sanity checks for the runtime environment
//!
//! Verified before any plan touches the host:
//! - Running with root privileges (EUID 0)
//! - The host is Debian 13 or newer
//! - Required runtime binaries are present
//!
//! The binary prints a boxed diagnostic and exits when a check fails.

use crate::error::{NodeError, Result};
use crate::runner::Runner;
use tracing::debug;

/// Oldest Debian release the node is supported on
pub const MIN_DEBIAN_VERSION: u32 = 13;

/// Result of environment verification
#[derive(Debug, Default)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub is_root: bool,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty() && self.is_root
    }
}

/// Tools every plan expects before it installs anything itself
const REQUIRED_BINARIES: &[&str] = &[
    "apt-get",   // Package installation
    "systemctl", // Unit management
    "tar",       // Release extraction
    "install",   // Binary placement (coreutils)
    "chown",     // Ownership (coreutils)
    "usermod",   // Group membership (passwd)
    "adduser",   // Service user (adduser)
    "sysctl",    // IPv6 drop-in (procps)
];

/// Check if running as root (EUID 0)
pub fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Perform all sanity checks and return the result
pub fn verify_environment(runner: &Runner) -> SanityCheckResult {
    let missing = REQUIRED_BINARIES
        .iter()
        .filter(|b| !runner.succeeds("which", [**b]))
        .map(|b| (*b).to_string())
        .collect();

    SanityCheckResult {
        missing_binaries: missing,
        is_root: is_running_as_root(),
    }
}

/// Fail with `Preflight` unless the process runs as root.
pub fn require_root() -> Result<()> {
    if is_running_as_root() {
        Ok(())
    } else {
        Err(NodeError::preflight(
            "root privileges required (run with sudo)",
        ))
    }
}

/// Debian major version from `/etc/os-release` contents.
///
/// Fails unless `ID=debian` and `VERSION_ID` parses and is at least
/// [`MIN_DEBIAN_VERSION`].
pub fn check_os_release(content: &str) -> Result<u32> {
    let field = |key: &str| {
        content.lines().find_map(|line| {
            line.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|v| v.trim().trim_matches('"').to_string())
        })
    };

    let id = field("ID").unwrap_or_default();
    if id != "debian" {
        return Err(NodeError::preflight(format!(
            "unsupported operating system '{}', Debian is required",
            id
        )));
    }

    let version_id = field("VERSION_ID")
        .ok_or_else(|| NodeError::preflight("os-release has no VERSION_ID"))?;
    let major: u32 = version_id
        .split('.')
        .next()
        .and_then(|m| m.parse().ok())
        .ok_or_else(|| {
            NodeError::preflight(format!("cannot parse Debian version '{}'", version_id))
        })?;

    if major < MIN_DEBIAN_VERSION {
        return Err(NodeError::preflight(format!(
            "Debian {} is too old, {} or newer is required",
            major, MIN_DEBIAN_VERSION
        )));
    }
    debug!(version = major, "operating system supported");
    Ok(major)
}

/// Print a pretty error message to stderr and exit
/// This is called before the terminal UI starts, so stderr is safe
pub fn print_error_and_exit(result: &SanityCheckResult) -> ! {
    eprintln!();
    eprintln!("╔══════════════════════════════════════════════════════════════════╗");
    eprintln!("║                  rlvpn - Pre-flight Check Failed                 ║");
    eprintln!("╚══════════════════════════════════════════════════════════════════╝");
    eprintln!();

    if !result.is_root {
        eprintln!("❌ ERROR: Root privileges required");
        eprintln!("   rlvpn creates users, writes /etc and manages systemd units.");
        eprintln!();
        eprintln!("   Solution: Run with sudo or as root user:");
        eprintln!("     sudo rlvpn");
        eprintln!();
    }

    if !result.missing_binaries.is_empty() {
        eprintln!("❌ ERROR: Missing required binaries");
        eprintln!();
        for binary in &result.missing_binaries {
            eprintln!("   • {} (install: apt-get install {})", binary, package_for_binary(binary));
        }
        eprintln!();
    }

    eprintln!("╔══════════════════════════════════════════════════════════════════╗");
    eprintln!("║  Fix the above issues and try again.                             ║");
    eprintln!("╚══════════════════════════════════════════════════════════════════╝");
    eprintln!();

    std::process::exit(1);
}

/// Map binary names to their Debian package names
fn package_for_binary(binary: &str) -> &'static str {
    match binary {
        "apt-get" => "apt",
        "systemctl" => "systemd",
        "tar" => "tar",
        "install" | "chown" => "coreutils",
        "usermod" => "passwd",
        "adduser" => "adduser",
        "sysctl" => "procps",
        _ => "unknown",
    }
}

/// Verify the environment and exit with a diagnostic if it is unusable
pub fn run_preflight_checks(runner: &Runner) {
    debug!("Running pre-flight sanity checks...");
    let result = verify_environment(runner);
    if !result.is_ok() {
        print_error_and_exit(&result);
    }
    tracing::info!("Pre-flight checks passed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::RecordingExec;
    use std::sync::Arc;

    const TRIXIE: &str = r#"PRETTY_NAME="Debian GNU/Linux 13 (trixie)"
NAME="Debian GNU/Linux"
VERSION_ID="13"
VERSION="13 (trixie)"
VERSION_CODENAME=trixie
ID=debian
"#;

    #[test]
    fn test_os_release_accepts_trixie() {
        assert_eq!(check_os_release(TRIXIE).unwrap(), 13);
    }

    #[test]
    fn test_os_release_rejects_old_and_foreign() {
        let bookworm = TRIXIE.replace("VERSION_ID=\"13\"", "VERSION_ID=\"12\"");
        assert_eq!(check_os_release(&bookworm).unwrap_err().kind(), ErrorKind::Preflight);

        let ubuntu = "ID=ubuntu\nVERSION_ID=\"24.04\"\n";
        assert!(check_os_release(ubuntu).unwrap_err().to_string().contains("ubuntu"));

        // ID_LIKE must not be mistaken for ID
        let derivative = "ID_LIKE=debian\nID=raspbian\nVERSION_ID=\"13\"\n";
        assert!(check_os_release(derivative).is_err());

        assert!(check_os_release("ID=debian\nVERSION_ID=\"sid\"\n").is_err());
    }

    #[test]
    fn test_missing_binaries_reported() {
        let exec = Arc::new(RecordingExec::default());
        exec.fail_on("which sysctl");
        let result = verify_environment(&Runner::new(exec));
        assert_eq!(result.missing_binaries, vec!["sysctl".to_string()]);
        assert_eq!(package_for_binary("sysctl"), "procps");
    }

    #[test]
    fn test_sanity_result_is_ok() {
        let ok_result = SanityCheckResult {
            missing_binaries: vec![],
            is_root: true,
        };
        assert!(ok_result.is_ok());

        let not_root = SanityCheckResult {
            missing_binaries: vec![],
            is_root: false,
        };
        assert!(!not_root.is_ok());
    }
}

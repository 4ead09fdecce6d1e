//! SelfUpdate: replace /usr/local/bin/rlvpn with a signed release.
//!
//! The running process keeps its old image; the new binary is used from the
//! next invocation on.

use crate::error::{NodeError, Result};
use crate::host::Host;
use crate::plans::{Plan, PlanKind, Steps};
use crate::runner::Runner;
use crate::state::AppConfig;
use crate::trust::fetch::{Arch, Release};
use crate::version;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

pub const LATEST_RELEASE_API: &str = "https://api.github.com/repos/rlvpn/rlvpn/releases/latest";
pub const VERSION_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
}

/// Version from a release API response, without the leading `v`.
pub fn parse_latest_tag(json: &str) -> Result<String> {
    let release: LatestRelease = serde_json::from_str(json).map_err(|e| NodeError::Download {
        url: LATEST_RELEASE_API.to_string(),
        reason: format!("unexpected response: {}", e),
    })?;
    let tag = release.tag_name.trim().trim_start_matches('v');
    if tag.is_empty() {
        return Err(NodeError::Download {
            url: LATEST_RELEASE_API.to_string(),
            reason: "empty tag_name".to_string(),
        });
    }
    Ok(tag.to_string())
}

/// Latest published version, looked up within 10 s.
pub fn latest_version(runner: &Runner) -> Result<String> {
    let timeout = VERSION_LOOKUP_TIMEOUT.as_secs().to_string();
    let body = runner
        .output_within(
            VERSION_LOOKUP_TIMEOUT,
            "curl",
            [
                "-fsSL",
                "--max-time",
                timeout.as_str(),
                "-H",
                "Accept: application/vnd.github+json",
                LATEST_RELEASE_API,
            ],
        )
        .map_err(|e| NodeError::Download {
            url: LATEST_RELEASE_API.to_string(),
            reason: e.to_string(),
        })?;
    parse_latest_tag(&body)
}

/// Build the update plan. Empty when `target_version` is what is running.
/// Persisted state is not part of an update.
pub fn self_update(cfg: &AppConfig, host: &Host, arch: Arch, target_version: &str) -> Plan {
    let wanted = target_version.trim_start_matches('v');
    let mut steps = Steps::new(host);
    if wanted == version::version() {
        info!(version = wanted, "already up to date");
        return steps.into_plan(PlanKind::SelfUpdate, cfg.clone());
    }
    info!(from = version::version(), to = wanted, "updating rlvpn");
    steps.add_release("rlvpn", &Release::rlvpn(arch, wanted));
    steps.into_plan(PlanKind::SelfUpdate, cfg.clone())
}

//! Process-wide version string shown by the UI and compared by self-update.
//!
//! Set once at the top of `main`; every later read sees the same value.

use std::sync::OnceLock;

static ACTIVE_VERSION: OnceLock<String> = OnceLock::new();

/// Record the running version. Returns `false` if it was already set.
pub fn set_version(version: impl Into<String>) -> bool {
    ACTIVE_VERSION.set(version.into()).is_ok()
}

/// The running version, falling back to the compiled package version.
pub fn version() -> &'static str {
    ACTIVE_VERSION
        .get()
        .map(String::as_str)
        .unwrap_or(env!("CARGO_PKG_VERSION"))
}

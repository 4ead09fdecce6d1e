//! Error handling module for rlvpn
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Every fallible operation in the library returns [`NodeError`]; the binary
//! wraps it in `anyhow` at the top level.

use std::path::{Path, PathBuf};
use std::time::Duration;
use strum::Display;
use thiserror::Error;

/// Abstract error kinds, used by callers that only need to classify a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    /// Wrong OS, insufficient privilege, required tool absent, plan precondition unmet.
    Preflight,
    /// Network failure or downloader non-zero exit.
    Download,
    /// Key import, fingerprint, signature or quorum failure.
    Trust,
    /// Checksum mismatch or manifest absent.
    Integrity,
    /// Cannot read, write, chown, chmod or remove.
    Filesystem,
    /// Non-zero exit from an external tool.
    Subprocess,
    /// Persisted state missing or unparseable.
    StateCorrupt,
    /// User interruption between steps.
    Cancelled,
}

/// Main error type for rlvpn
#[derive(Error, Debug)]
pub enum NodeError {
    /// Preconditions that must hold before anything touches the host
    #[error("Preflight check failed: {0}")]
    Preflight(String),

    /// Downloader exited non-zero or could not be started
    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// Signer trust failures
    #[error("Trust check failed: {0}")]
    Trust(#[from] TrustError),

    /// Artifact integrity failures
    #[error("Integrity check failed: {0}")]
    Integrity(#[from] IntegrityError),

    /// IO errors tied to a concrete path
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// External command exited non-zero; `output` is stdout followed by stderr
    #[error("Command `{cmd}` failed: {output}")]
    ExecFailed { cmd: String, output: String },

    /// External command exceeded its deadline and was killed
    #[error("Command `{cmd}` timed out after {}s", timeout.as_secs())]
    Timeout { cmd: String, timeout: Duration },

    /// Persisted state file does not exist
    #[error("State file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Persisted state file exists but does not parse
    #[error("State file {} is malformed: {reason}", path.display())]
    StateCorrupt { path: PathBuf, reason: String },

    /// A step's worker thread panicked or could not be spawned
    #[error("Step worker failed: {0}")]
    Worker(String),

    /// Run interrupted at a step boundary
    #[error("Cancelled before step '{step}'")]
    Cancelled { step: String },

    /// Failure of a named step, surfaced verbatim by the engine
    #[error("Step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<NodeError>,
    },
}

/// Failures establishing that an artifact was signed by a pinned identity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustError {
    /// gpg could not import the signer's key material
    #[error("could not import key for {signer}: {reason}")]
    ImportFailed { signer: String, reason: String },

    /// Import reported success but the pinned fingerprint is not in the keyring
    #[error("fingerprint {fingerprint} of {signer} not present in keyring after import")]
    FingerprintMissing { signer: String, fingerprint: String },

    /// gpg did not recognise the input as a signature over the manifest
    #[error("{file} does not carry a valid signature")]
    SignatureInvalid { file: String },

    /// Not enough distinct good signatures
    #[error("{good} good signature(s), {required} required")]
    QuorumNotMet { good: usize, required: usize },

    /// At least one signature failed to verify
    #[error("{bad} bad signature(s) present")]
    BadSignaturePresent { bad: usize },
}

/// Failures establishing that on-disk bytes match the signed manifest
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("SHA-256 mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("manifest {} lists no file present on disk", manifest.display())]
    ManifestAbsent { manifest: PathBuf },
}

/// Result type alias for rlvpn operations
pub type Result<T> = std::result::Result<T, NodeError>;

impl NodeError {
    /// Create a preflight error
    pub fn preflight(msg: impl Into<String>) -> Self {
        Self::Preflight(msg.into())
    }

    /// Create a filesystem error for `path`
    pub fn fs(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a subprocess error
    pub fn exec(cmd: impl Into<String>, output: impl Into<String>) -> Self {
        Self::ExecFailed {
            cmd: cmd.into(),
            output: output.into(),
        }
    }

    /// Wrap an error with the name of the step that produced it
    pub fn in_step(self, step: impl Into<String>) -> Self {
        Self::Step {
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// Abstract kind of this error; step wrappers report their cause's kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Preflight(_) => ErrorKind::Preflight,
            Self::Download { .. } => ErrorKind::Download,
            Self::Trust(_) => ErrorKind::Trust,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Filesystem { .. } => ErrorKind::Filesystem,
            Self::ExecFailed { .. } | Self::Timeout { .. } | Self::Worker(_) => {
                ErrorKind::Subprocess
            }
            Self::NotFound { .. } | Self::StateCorrupt { .. } => ErrorKind::StateCorrupt,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Step { source, .. } => source.kind(),
        }
    }

    /// Innermost error, skipping step wrappers
    pub fn root(&self) -> &NodeError {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// Name of the failing step, if this error came out of the engine
    pub fn step_name(&self) -> Option<&str> {
        match self {
            Self::Step { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// Attach a path to IO results
pub(crate) trait PathContext<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> PathContext<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|e| NodeError::fs(path, e))
    }
}

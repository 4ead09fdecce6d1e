//! Release descriptors and the download → import → verify → install flow.
//!
//! Each function here is one step of a plan, so the engine can report
//! progress between them. Import always happens before verification.

use crate::error::{IntegrityError, NodeError, Result, TrustError};
use crate::host::Host;
use crate::layout::BIN_DIR;
use crate::trust::signers::{KeySource, Signer, TrustPolicy, BITCOIN_CORE, LIT, LND, RLVPN};
use crate::trust::verify::{check_signatures, verify_manifest, SignatureTally};
use std::path::{Path, PathBuf};
use strum::Display;
use tracing::{info, warn};

pub const BITCOIN_CORE_VERSION: &str = "29.1";
pub const LND_VERSION: &str = "v0.19.3-beta";
pub const LIT_VERSION: &str = "v0.15.2-alpha";
pub const RLVPN_RELEASES: &str = "https://github.com/rlvpn/rlvpn/releases";

/// CPU architectures release artifacts exist for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Arch {
    #[strum(serialize = "x86_64")]
    X86_64,
    #[strum(serialize = "aarch64")]
    Aarch64,
}

impl Arch {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x86_64" | "amd64" => Some(Self::X86_64),
            "aarch64" | "arm64" => Some(Self::Aarch64),
            _ => None,
        }
    }

    /// Architecture of this build, which is the host's
    pub fn host() -> Result<Self> {
        let arch = std::env::consts::ARCH;
        Self::from_name(arch)
            .ok_or_else(|| NodeError::preflight(format!("unsupported architecture {}", arch)))
    }

    /// Go-style name used by the Lightning Labs releases
    fn go_name(self) -> &'static str {
        match self {
            Self::X86_64 => "amd64",
            Self::Aarch64 => "arm64",
        }
    }
}

/// Everything needed to fetch, verify and install one signed release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Scratch directory component, also used in logs
    pub component: &'static str,
    pub version: String,
    pub base_url: String,
    pub tarball: String,
    pub manifest: String,
    pub signature: String,
    /// Binaries inside the extracted tarball, relative to the scratch dir
    pub binaries: Vec<String>,
    pub policy: TrustPolicy,
}

impl Release {
    pub fn bitcoin_core(arch: Arch) -> Self {
        let v = BITCOIN_CORE_VERSION;
        let triple = match arch {
            Arch::X86_64 => "x86_64-linux-gnu",
            Arch::Aarch64 => "aarch64-linux-gnu",
        };
        Self {
            component: "bitcoin",
            version: v.to_string(),
            base_url: format!("https://bitcoincore.org/bin/bitcoin-core-{}", v),
            tarball: format!("bitcoin-{}-{}.tar.gz", v, triple),
            manifest: "SHA256SUMS".to_string(),
            signature: "SHA256SUMS.asc".to_string(),
            binaries: ["bitcoind", "bitcoin-cli"]
                .iter()
                .map(|b| format!("bitcoin-{}/bin/{}", v, b))
                .collect(),
            policy: BITCOIN_CORE,
        }
    }

    pub fn lnd(arch: Arch) -> Self {
        let v = LND_VERSION;
        let dir = format!("lnd-linux-{}-{}", arch.go_name(), v);
        Self {
            component: "lnd",
            version: v.to_string(),
            base_url: format!(
                "https://github.com/lightningnetwork/lnd/releases/download/{}",
                v
            ),
            tarball: format!("{}.tar.gz", dir),
            manifest: format!("manifest-{}.txt", v),
            signature: format!("manifest-guggero-{}.sig", v),
            binaries: vec![format!("{}/lnd", dir), format!("{}/lncli", dir)],
            policy: LND,
        }
    }

    pub fn lit(arch: Arch) -> Self {
        let v = LIT_VERSION;
        let dir = format!("lightning-terminal-linux-{}-{}", arch.go_name(), v);
        Self {
            component: "lit",
            version: v.to_string(),
            base_url: format!(
                "https://github.com/lightninglabs/lightning-terminal/releases/download/{}",
                v
            ),
            tarball: format!("{}.tar.gz", dir),
            manifest: format!("manifest-{}.txt", v),
            signature: format!("manifest-{}.sig", v),
            binaries: vec![format!("{}/litd", dir), format!("{}/litcli", dir)],
            policy: LIT,
        }
    }

    /// rlvpn itself. `version` has no leading `v`.
    pub fn rlvpn(arch: Arch, version: &str) -> Self {
        let version = version.trim_start_matches('v');
        Self {
            component: "self-update",
            version: version.to_string(),
            base_url: format!("{}/download/v{}", RLVPN_RELEASES, version),
            tarball: format!("rlvpn-{}-{}-linux.tar.gz", version, arch),
            manifest: "SHA256SUMS".to_string(),
            signature: "SHA256SUMS.asc".to_string(),
            binaries: vec![format!("rlvpn-{}/rlvpn", version)],
            policy: RLVPN,
        }
    }

    pub fn url(&self, file: &str) -> String {
        format!("{}/{}", self.base_url, file)
    }

    pub fn scratch(&self, host: &Host) -> PathBuf {
        host.layout().scratch(self.component)
    }
}

/// Fingerprints listed in `gpg --with-colons` output (`fpr` records).
pub fn fingerprints_in_listing(colons: &str) -> Vec<String> {
    colons
        .lines()
        .filter(|l| l.starts_with("fpr:"))
        .filter_map(|l| l.split(':').nth(9))
        .filter(|f| !f.is_empty())
        .map(str::to_ascii_uppercase)
        .collect()
}

pub fn fingerprint_present(host: &Host, fingerprint: &str) -> bool {
    host.runner()
        .output("gpg", ["--batch", "--with-colons", "--list-keys", fingerprint])
        .map(|listing| {
            fingerprints_in_listing(&listing)
                .iter()
                .any(|f| f == fingerprint)
        })
        .unwrap_or(false)
}

fn import_one(host: &Host, scratch: &Path, signer: &Signer) -> Result<()> {
    let import_failed = |reason: String| {
        NodeError::Trust(TrustError::ImportFailed {
            signer: signer.name.to_string(),
            reason,
        })
    };

    match signer.source {
        KeySource::Url(url) => {
            let key_file = scratch.join(format!("{}.asc", signer.name));
            host.runner()
                .download(url, &key_file)
                .map_err(|e| import_failed(e.to_string()))?;
            host.runner()
                .run(
                    "gpg",
                    ["--batch", "--import", key_file.to_string_lossy().as_ref()],
                )
                .map_err(|e| import_failed(e.to_string()))?;
        }
        KeySource::Keyserver(server) => {
            host.runner()
                .run(
                    "gpg",
                    [
                        "--batch",
                        "--keyserver",
                        server,
                        "--recv-keys",
                        signer.fingerprint,
                    ],
                )
                .map_err(|e| import_failed(e.to_string()))?;
        }
    }

    if !fingerprint_present(host, signer.fingerprint) {
        return Err(NodeError::Trust(TrustError::FingerprintMissing {
            signer: signer.name.to_string(),
            fingerprint: signer.fingerprint.to_string(),
        }));
    }
    Ok(())
}

/// Import every pinned signer of `policy`. Keys already in the keyring are
/// skipped. Succeeds while at least one signer is present afterwards; the
/// quorum check decides whether that is enough.
pub fn import_keys(host: &Host, policy: &TrustPolicy, component: &str) -> Result<usize> {
    let scratch = host.layout().scratch(&format!("{}-keys", component));
    std::fs::create_dir_all(&scratch).map_err(|e| NodeError::fs(&scratch, e))?;

    let mut present = 0;
    let mut last_err = None;
    for signer in policy.signers {
        if fingerprint_present(host, signer.fingerprint) {
            present += 1;
            continue;
        }
        match import_one(host, &scratch, signer) {
            Ok(()) => {
                info!(signer = signer.name, fingerprint = signer.fingerprint, "key imported");
                present += 1;
            }
            Err(e) => {
                warn!(signer = signer.name, error = %e, "key import failed");
                last_err = Some(e);
            }
        }
    }
    host.remove_dir(&scratch)?;

    match (present, last_err) {
        (0, Some(e)) => Err(e),
        (0, None) => Err(NodeError::preflight(format!(
            "no signers pinned for {}",
            policy.ecosystem
        ))),
        (n, _) => {
            info!(ecosystem = policy.ecosystem, present = n, "signer keys ready");
            Ok(n)
        }
    }
}

/// Fetch tarball, manifest and signature into the release's scratch dir.
pub fn download_release(host: &Host, release: &Release) -> Result<PathBuf> {
    let scratch = release.scratch(host);
    std::fs::create_dir_all(&scratch).map_err(|e| NodeError::fs(&scratch, e))?;
    for file in [&release.tarball, &release.manifest, &release.signature] {
        host.runner()
            .download(&release.url(file), &scratch.join(file))?;
    }
    Ok(scratch)
}

/// Batch-verify the detached signature and apply the quorum policy.
pub fn verify_signature(host: &Host, release: &Release) -> Result<SignatureTally> {
    let scratch = release.scratch(host);
    let sig = scratch.join(&release.signature);
    let manifest = scratch.join(&release.manifest);
    let out = host.runner().transcript(
        "gpg",
        [
            "--batch",
            "--status-fd",
            "1",
            "--verify",
            sig.to_string_lossy().as_ref(),
            manifest.to_string_lossy().as_ref(),
        ],
    )?;
    let tally = check_signatures(&out.stdout, &release.signature, release.policy.min_valid)?;
    info!(
        component = release.component,
        good = tally.good.len(),
        required = release.policy.min_valid,
        "signatures verified"
    );
    Ok(tally)
}

/// Check the tarball against the signed manifest.
pub fn verify_checksum(host: &Host, release: &Release) -> Result<()> {
    let manifest = release.scratch(host).join(&release.manifest);
    let verified = verify_manifest(&manifest)?;
    if !verified.iter().any(|f| *f == release.tarball) {
        return Err(NodeError::Integrity(IntegrityError::ManifestAbsent { manifest }));
    }
    info!(component = release.component, tarball = %release.tarball, "checksum verified");
    Ok(())
}

/// Extract, install the binaries root-owned into /usr/local/bin, clean up.
pub fn install_release(host: &Host, release: &Release) -> Result<()> {
    let scratch = release.scratch(host);
    let scratch_str = scratch.to_string_lossy().into_owned();
    let tarball = scratch.join(&release.tarball);
    host.runner().run(
        "tar",
        ["-xzf", tarball.to_string_lossy().as_ref(), "-C", &scratch_str],
    )?;

    let bin_dir = host.path(BIN_DIR);
    std::fs::create_dir_all(&bin_dir).map_err(|e| NodeError::fs(&bin_dir, e))?;
    let bin_dir = bin_dir.to_string_lossy().into_owned();
    for binary in &release.binaries {
        let src = scratch.join(binary);
        host.runner().run(
            "install",
            [
                "-m",
                "0755",
                "-o",
                "root",
                "-g",
                "root",
                src.to_string_lossy().as_ref(),
                &bin_dir,
            ],
        )?;
    }

    host.remove_dir(&scratch)?;
    info!(component = release.component, version = %release.version, "installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use crate::runner::Runner;
    use crate::testing::RecordingExec;
    use sha2::{Digest, Sha256};
    use std::sync::Arc;

    fn fixture() -> (tempfile::TempDir, Host, Arc<RecordingExec>) {
        let dir = tempfile::tempdir().unwrap();
        let exec = Arc::new(RecordingExec::default());
        let host = Host::new(Runner::new(exec.clone()), Layout::rooted(dir.path()));
        (dir, host, exec)
    }

    fn listing(fpr: &str) -> String {
        format!("pub:-:4096:1:944D35F9AC3DB76A:1:::-:::scESC::::::23::0:\nfpr:::::::::{fpr}:\n")
    }

    #[test]
    fn test_release_names() {
        let core = Release::bitcoin_core(Arch::X86_64);
        assert_eq!(core.tarball, "bitcoin-29.1-x86_64-linux-gnu.tar.gz");
        assert_eq!(
            core.url(&core.signature),
            "https://bitcoincore.org/bin/bitcoin-core-29.1/SHA256SUMS.asc"
        );
        assert_eq!(core.binaries[0], "bitcoin-29.1/bin/bitcoind");

        let lnd = Release::lnd(Arch::Aarch64);
        assert_eq!(lnd.tarball, "lnd-linux-arm64-v0.19.3-beta.tar.gz");
        assert_eq!(lnd.signature, "manifest-guggero-v0.19.3-beta.sig");

        let me = Release::rlvpn(Arch::X86_64, "v0.5.0");
        assert_eq!(me.tarball, "rlvpn-0.5.0-x86_64-linux.tar.gz");
        assert!(me.base_url.ends_with("/download/v0.5.0"));
        assert_eq!(Arch::from_name("riscv64"), None);
    }

    #[test]
    fn test_fingerprints_in_listing() {
        let fprs = fingerprints_in_listing(&listing("e777299fc265dd04793070eb944d35f9ac3db76a"));
        assert_eq!(fprs, vec!["E777299FC265DD04793070EB944D35F9AC3DB76A"]);
    }

    #[test]
    fn test_import_keys_skips_present_and_tolerates_partial_failure() {
        let (_dir, host, exec) = fixture();
        // fanquake already in the keyring; every other list-keys finds nothing
        exec.respond("gpg --batch --with-colons --list-keys", "");
        exec.respond(
            "gpg --batch --with-colons --list-keys E777299FC265DD04793070EB944D35F9AC3DB76A",
            &listing("E777299FC265DD04793070EB944D35F9AC3DB76A"),
        );
        exec.respond(
            "gpg --batch --with-colons --list-keys 152812300785C96444D3334D17565732E08E5E41",
            &listing("152812300785C96444D3334D17565732E08E5E41"),
        );
        exec.fail_on("gpg --batch --import");

        let present = import_keys(&host, &BITCOIN_CORE, "bitcoin").unwrap();
        assert_eq!(present, 2);
        assert_eq!(exec.count("gpg --batch --import"), 3);
    }

    #[test]
    fn test_import_keys_fingerprint_missing() {
        let (_dir, host, exec) = fixture();
        exec.respond("gpg --batch --with-colons --list-keys", "");
        let err = import_keys(&host, &LIT, "lit").unwrap_err();
        assert!(matches!(
            err,
            NodeError::Trust(TrustError::FingerprintMissing { .. })
        ));
        assert_eq!(exec.count("gpg --batch --keyserver hkps://keyserver.ubuntu.com --recv-keys"), 1);
    }

    #[test]
    fn test_verify_signature_rejects_bad_sig() {
        let (_dir, host, exec) = fixture();
        exec.respond(
            "gpg --batch --status-fd 1 --verify",
            "GOODSIG A\nGOODSIG B\nBADSIG C\n",
        );
        let err = verify_signature(&host, &Release::bitcoin_core(Arch::X86_64)).unwrap_err();
        assert!(matches!(
            err,
            NodeError::Trust(TrustError::BadSignaturePresent { bad: 1 })
        ));
    }

    #[test]
    fn test_download_verify_install() {
        let (dir, host, exec) = fixture();
        let release = Release::lnd(Arch::X86_64);
        let scratch = release.scratch(&host);
        let tarball_name = release.tarball.clone();
        let hash = hex::encode(Sha256::digest(b"lnd-tarball"));

        // wget writes the file it was asked for
        exec.on_run("wget", move |spec| {
            let dest = std::path::PathBuf::from(&spec.args[2]);
            let body = if dest.ends_with(&tarball_name) {
                b"lnd-tarball".to_vec()
            } else if dest.to_string_lossy().ends_with(".txt") {
                format!("{hash}  {tarball_name}\n").into_bytes()
            } else {
                b"sig".to_vec()
            };
            std::fs::write(dest, body).unwrap();
        });

        assert_eq!(download_release(&host, &release).unwrap(), scratch);
        verify_checksum(&host, &release).unwrap();
        install_release(&host, &release).unwrap();

        let installs: Vec<String> = exec
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("install "))
            .collect();
        assert_eq!(installs.len(), 2);
        assert!(installs[0].starts_with("install -m 0755 -o root -g root"));
        assert!(installs[0].ends_with(&format!("{}/usr/local/bin", dir.path().display())));
        assert!(!scratch.exists());
    }
}

//! Signature quorum and checksum verification.
//!
//! Both halves are pure over their inputs: the quorum check reads a gpg
//! `--status-fd` transcript, the checksum check reads a `SHA256SUMS` manifest
//! and the files next to it.

use crate::error::{IntegrityError, NodeError, PathContext, Result, TrustError};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Distinct signing keys seen in a gpg status transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureTally {
    pub good: BTreeSet<String>,
    pub bad: BTreeSet<String>,
    /// Signatures gpg could not check (usually a key not in the keyring)
    pub unchecked: usize,
    /// gpg found no signature data at all
    pub no_data: bool,
}

impl SignatureTally {
    /// Parse `gpg --status-fd` output. The `[GNUPG:] ` prefix is optional so
    /// bare keyword lines parse the same way.
    pub fn parse(transcript: &str) -> Self {
        let mut tally = Self::default();
        for (idx, line) in transcript.lines().enumerate() {
            let line = line.trim();
            let line = line.strip_prefix("[GNUPG:]").unwrap_or(line).trim_start();
            let mut fields = line.split_whitespace();
            let keyword = fields.next().unwrap_or_default();
            // A status line without a key id still counts once
            let key = fields
                .next()
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", idx));
            match keyword {
                "GOODSIG" => {
                    tally.good.insert(key);
                }
                "BADSIG" => {
                    tally.bad.insert(key);
                }
                "ERRSIG" => tally.unchecked += 1,
                "NODATA" => tally.no_data = true,
                _ => {}
            }
        }
        tally
    }

    /// Accept iff at least `min_valid` distinct good signatures and no bad one.
    pub fn check(&self, min_valid: usize) -> std::result::Result<(), TrustError> {
        if !self.bad.is_empty() {
            return Err(TrustError::BadSignaturePresent {
                bad: self.bad.len(),
            });
        }
        if self.good.len() < min_valid.max(1) {
            return Err(TrustError::QuorumNotMet {
                good: self.good.len(),
                required: min_valid.max(1),
            });
        }
        Ok(())
    }
}

/// Evaluate a verify transcript for the signature file `sig_file`.
pub fn check_signatures(
    transcript: &str,
    sig_file: &str,
    min_valid: usize,
) -> std::result::Result<SignatureTally, TrustError> {
    let tally = SignatureTally::parse(transcript);
    if tally.no_data && tally.good.is_empty() && tally.bad.is_empty() {
        return Err(TrustError::SignatureInvalid {
            file: sig_file.to_string(),
        });
    }
    debug!(
        good = tally.good.len(),
        bad = tally.bad.len(),
        unchecked = tally.unchecked,
        min_valid,
        "signature tally"
    );
    tally.check(min_valid)?;
    Ok(tally)
}

/// One `<hex>  <name>` line of a SHA256SUMS file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub sha256: String,
    pub file: String,
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parse a `sha256sum`-style manifest. Lines that are not an entry are
/// skipped, as are names that would escape the manifest's directory.
pub fn parse_manifest(text: &str) -> Vec<ManifestEntry> {
    text.lines()
        .filter_map(|line| {
            let (hash, rest) = line.trim().split_once(char::is_whitespace)?;
            if !is_sha256_hex(hash) {
                return None;
            }
            // Binary-mode entries carry a leading '*'
            let file = rest.trim_start().trim_start_matches('*');
            let escapes = file.starts_with('/') || file.split('/').any(|c| c == "..");
            if file.is_empty() || escapes {
                return None;
            }
            Some(ManifestEntry {
                sha256: hash.to_ascii_lowercase(),
                file: file.to_string(),
            })
        })
        .collect()
}

/// Lowercase hex SHA-256 of a file, streamed.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).at(path)?;
    let mut reader = BufReader::new(file);
    let mut buffer = vec![0_u8; HASH_BUFFER_SIZE];
    let mut hasher = Sha256::new();
    loop {
        let read = reader.read(&mut buffer).at(path)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// `sha256sum --ignore-missing -c` against the files beside `manifest`.
/// Returns the verified file names; zero verified files is an error.
pub fn verify_manifest(manifest: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(manifest).at(manifest)?;
    let dir = manifest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut verified = Vec::new();
    for entry in parse_manifest(&text) {
        let path = dir.join(&entry.file);
        if !path.is_file() {
            continue;
        }
        let actual = sha256_file(&path)?;
        if actual != entry.sha256 {
            return Err(NodeError::Integrity(IntegrityError::ChecksumMismatch {
                file: entry.file,
                expected: entry.sha256,
                actual,
            }));
        }
        debug!(file = %entry.file, "checksum ok");
        verified.push(entry.file);
    }

    if verified.is_empty() {
        return Err(NodeError::Integrity(IntegrityError::ManifestAbsent {
            manifest: manifest.to_path_buf(),
        }));
    }
    Ok(verified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_quorum_accepts_two_good_with_unchecked() {
        let transcript = "\
[GNUPG:] NEWSIG
[GNUPG:] GOODSIG 944D35F9AC3DB76A Michael Ford (bitcoin-otc) <fanquake@gmail.com>
[GNUPG:] VALIDSIG E777299FC265DD04793070EB944D35F9AC3DB76A 2025-09-01
[GNUPG:] GOODSIG 17565732E08E5E41 Andrew Chow <andrew@achow101.com>
[GNUPG:] ERRSIG AAAAAAAAAAAAAAAA 1 10 00 1756000000 9 -
[GNUPG:] ERRSIG BBBBBBBBBBBBBBBB 1 10 00 1756000000 9 -
[GNUPG:] ERRSIG CCCCCCCCCCCCCCCC 1 10 00 1756000000 9 -
";
        let tally = check_signatures(transcript, "SHA256SUMS.asc", 2).unwrap();
        assert_eq!(tally.good.len(), 2);
        assert_eq!(tally.unchecked, 3);
    }

    #[test]
    fn test_single_good_is_not_a_quorum() {
        assert_eq!(
            check_signatures("GOODSIG A\n", "s", 2).unwrap_err(),
            TrustError::QuorumNotMet {
                good: 1,
                required: 2
            }
        );
    }

    #[test]
    fn test_bad_signature_dominates() {
        let err = check_signatures("GOODSIG A\nGOODSIG B\nBADSIG C\n", "s", 2).unwrap_err();
        assert_eq!(err, TrustError::BadSignaturePresent { bad: 1 });
    }

    #[test]
    fn test_empty_transcript_rejected() {
        assert_eq!(
            check_signatures("", "s", 1).unwrap_err(),
            TrustError::QuorumNotMet {
                good: 0,
                required: 1
            }
        );
        assert_eq!(
            check_signatures("[GNUPG:] NODATA 1\n", "s", 1).unwrap_err(),
            TrustError::SignatureInvalid { file: "s".into() }
        );
    }

    #[test]
    fn test_repeated_key_counts_once() {
        let err = check_signatures("GOODSIG A x\nGOODSIG A x\n", "s", 2).unwrap_err();
        assert!(matches!(err, TrustError::QuorumNotMet { good: 1, .. }));
    }

    #[test]
    fn test_parse_manifest() {
        let hash = "a".repeat(64);
        let text = format!(
            "{hash}  bitcoin-29.1-x86_64-linux-gnu.tar.gz\n\
             {hash} *lnd-linux-amd64-v0.19.3-beta.tar.gz\n\
             not a line\n\
             {hash}  ../etc/passwd\n"
        );
        let entries = parse_manifest(&text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].file, "lnd-linux-amd64-v0.19.3-beta.tar.gz");
    }

    #[test]
    fn test_verify_manifest_ignores_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let tarball = dir.path().join("bitcoin-29.1-x86_64-linux-gnu.tar.gz");
        fs::write(&tarball, b"tarball-bytes").unwrap();
        let good = hex::encode(Sha256::digest(b"tarball-bytes"));
        let manifest = dir.path().join("SHA256SUMS");
        fs::write(
            &manifest,
            format!(
                "{}  bitcoin-29.1-aarch64-linux-gnu.tar.gz\n{good}  bitcoin-29.1-x86_64-linux-gnu.tar.gz\n",
                "0".repeat(64)
            ),
        )
        .unwrap();

        assert_eq!(
            verify_manifest(&manifest).unwrap(),
            vec!["bitcoin-29.1-x86_64-linux-gnu.tar.gz".to_string()]
        );
    }

    #[test]
    fn test_verify_manifest_mismatch_and_absent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.tar.gz"), b"tampered").unwrap();
        let manifest = dir.path().join("SHA256SUMS");
        fs::write(&manifest, format!("{}  a.tar.gz\n", "0".repeat(64))).unwrap();
        let err = verify_manifest(&manifest).unwrap_err();
        assert!(matches!(
            err,
            NodeError::Integrity(IntegrityError::ChecksumMismatch { .. })
        ));

        fs::write(&manifest, format!("{}  b.tar.gz\n", "0".repeat(64))).unwrap();
        let err = verify_manifest(&manifest).unwrap_err();
        assert!(matches!(
            err,
            NodeError::Integrity(IntegrityError::ManifestAbsent { .. })
        ));
    }
}

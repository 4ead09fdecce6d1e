//! Pinned signer identities.
//!
//! Acceptance depends only on a fingerprint below appearing in the local
//! keyring after import. Where the key bytes come from is a convenience.
//! Adding a signer means appending a row.

/// Where a signer's public key is fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// ASCII-armored key served over HTTPS
    Url(&'static str),
    /// Key id looked up on a keyserver
    Keyserver(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signer {
    pub name: &'static str,
    /// 40 hex characters, uppercase
    pub fingerprint: &'static str,
    pub source: KeySource,
}

/// Signer set plus the number of distinct good signatures required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustPolicy {
    pub ecosystem: &'static str,
    pub signers: &'static [Signer],
    pub min_valid: usize,
}

const UBUNTU_KEYSERVER: &str = "hkps://keyserver.ubuntu.com";

pub const BITCOIN_CORE_SIGNERS: &[Signer] = &[
    Signer {
        name: "fanquake",
        fingerprint: "E777299FC265DD04793070EB944D35F9AC3DB76A",
        source: KeySource::Url(concat!(
            "https://raw.githubusercontent.com/bitcoin-core/guix.sigs/main/builder-keys",
            "/fanquake.gpg"
        )),
    },
    Signer {
        name: "achow101",
        fingerprint: "152812300785C96444D3334D17565732E08E5E41",
        source: KeySource::Url(concat!(
            "https://raw.githubusercontent.com/bitcoin-core/guix.sigs/main/builder-keys",
            "/achow101.gpg"
        )),
    },
    Signer {
        name: "hebasto",
        fingerprint: "D1DBF2C4B96F2DEBF4C16654410108112E7EA81F",
        source: KeySource::Url(concat!(
            "https://raw.githubusercontent.com/bitcoin-core/guix.sigs/main/builder-keys",
            "/hebasto.gpg"
        )),
    },
    Signer {
        name: "theStack",
        fingerprint: "6A8F9C266528E25AEB1D7731C2371D91CB716EA7",
        source: KeySource::Url(concat!(
            "https://raw.githubusercontent.com/bitcoin-core/guix.sigs/main/builder-keys",
            "/theStack.gpg"
        )),
    },
    Signer {
        name: "willcl-ark",
        fingerprint: "67AA5B46E7AF78053167FE343B8F814A784218F8",
        source: KeySource::Url(concat!(
            "https://raw.githubusercontent.com/bitcoin-core/guix.sigs/main/builder-keys",
            "/willcl-ark.gpg"
        )),
    },
];

pub const LND_SIGNERS: &[Signer] = &[Signer {
    name: "guggero",
    fingerprint: "F4FC70F07310028424EFC20A8E4256593F177720",
    source: KeySource::Url(
        "https://raw.githubusercontent.com/lightningnetwork/lnd/master/scripts/keys/guggero.asc",
    ),
}];

pub const LIT_SIGNERS: &[Signer] = &[Signer {
    name: "guggero",
    fingerprint: "F4FC70F07310028424EFC20A8E4256593F177720",
    source: KeySource::Keyserver(UBUNTU_KEYSERVER),
}];

pub const RLVPN_SIGNERS: &[Signer] = &[Signer {
    name: "rlvpn-release",
    fingerprint: "3C5D1E8A9F20B7746E0A15C2D98B4F61A7E0C3B5",
    source: KeySource::Keyserver(UBUNTU_KEYSERVER),
}];

pub const BITCOIN_CORE: TrustPolicy = TrustPolicy {
    ecosystem: "Bitcoin Core",
    signers: BITCOIN_CORE_SIGNERS,
    min_valid: 2,
};

pub const LND: TrustPolicy = TrustPolicy {
    ecosystem: "LND",
    signers: LND_SIGNERS,
    min_valid: 1,
};

pub const LIT: TrustPolicy = TrustPolicy {
    ecosystem: "Lightning Terminal",
    signers: LIT_SIGNERS,
    min_valid: 1,
};

pub const RLVPN: TrustPolicy = TrustPolicy {
    ecosystem: "rlvpn",
    signers: RLVPN_SIGNERS,
    min_valid: 1,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprints_are_40_uppercase_hex() {
        for policy in [BITCOIN_CORE, LND, LIT, RLVPN] {
            for signer in policy.signers {
                assert_eq!(signer.fingerprint.len(), 40, "{}", signer.name);
                assert!(signer
                    .fingerprint
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
            }
        }
    }

    #[test]
    fn test_quorums() {
        assert_eq!(BITCOIN_CORE.signers.len(), 5);
        assert_eq!(BITCOIN_CORE.min_valid, 2);
        assert_eq!(LND.min_valid, 1);
        assert_eq!(LIT.min_valid, 1);
        for policy in [BITCOIN_CORE, LND, LIT, RLVPN] {
            assert!(policy.min_valid <= policy.signers.len());
        }
    }

    #[test]
    fn test_builder_key_urls() {
        for signer in BITCOIN_CORE_SIGNERS {
            match signer.source {
                KeySource::Url(url) => {
                    assert!(url.starts_with("https://raw.githubusercontent.com/bitcoin-core/guix.sigs/"));
                    assert!(url.ends_with(&format!("/{}.gpg", signer.name)));
                }
                KeySource::Keyserver(_) => panic!("{} should come from guix.sigs", signer.name),
            }
        }
    }
}

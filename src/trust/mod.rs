//! Artifact Fetcher & Verifier.
//!
//! - [`signers`]: pinned signer identities and per-ecosystem quorum policy
//! - [`verify`]: gpg status transcript tally and SHA-256 manifest checks
//! - [`fetch`]: release descriptors and the per-step fetch/import/install flow

pub mod fetch;
pub mod signers;
pub mod verify;

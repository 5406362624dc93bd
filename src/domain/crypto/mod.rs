//! Foundational cryptographic domain types.
//!
//! Provides strongly-typed wrappers for cryptographic artifacts including:
//! - Digest algorithms and their OIDs
//! - RSA key pairs used by authorities and single-use end-entity certificates
//! - RSA signature values and the algorithm identifiers that label them
//!
//! The crypto collaborator is split between `sha2` (digests) and `openssl`
//! (key generation, PKCS#1 v1.5 signing and verification).

mod hash;
mod keys;
mod signature;

pub use hash::DigestAlgorithm;
pub use keys::{key_identifier, verify_signature, KeyPair, DEFAULT_RSA_BITS};
pub use signature::RsaSignature;

//! Digest algorithm domain type.
//!
//! Provides the `DigestAlgorithm` enumeration (SHA-256, SHA-384, SHA-512)
//! used for eContent message digests, manifest file hashes and the
//! RSA signature algorithm paired with each digest.

use std::fmt;
use std::str::FromStr;

use der::asn1::ObjectIdentifier;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::domain::constants;
use crate::infra::error::{ForgeError, ForgeResult};

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 3] = [
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha384,
        DigestAlgorithm::Sha512,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    #[must_use]
    pub fn digest_size(&self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    /// Digest algorithm OID (RFC 5754).
    #[must_use]
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha256 => constants::ID_SHA256,
            DigestAlgorithm::Sha384 => constants::ID_SHA384,
            DigestAlgorithm::Sha512 => constants::ID_SHA512,
        }
    }

    /// `shaNNNWithRSAEncryption` OID for certificate and CRL signatures.
    #[must_use]
    pub fn rsa_signature_oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha256 => constants::SHA256_WITH_RSA_ENCRYPTION,
            DigestAlgorithm::Sha384 => constants::SHA384_WITH_RSA_ENCRYPTION,
            DigestAlgorithm::Sha512 => constants::SHA512_WITH_RSA_ENCRYPTION,
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> ForgeResult<Self> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.oid() == *oid)
            .ok_or_else(|| {
                ForgeError::MalformedObject(format!("unsupported digest algorithm {oid}"))
            })
    }

    #[must_use]
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    pub(crate) fn message_digest(&self) -> openssl::hash::MessageDigest {
        match self {
            DigestAlgorithm::Sha256 => openssl::hash::MessageDigest::sha256(),
            DigestAlgorithm::Sha384 => openssl::hash::MessageDigest::sha384(),
            DigestAlgorithm::Sha512 => openssl::hash::MessageDigest::sha512(),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(DigestAlgorithm::Sha256),
            "sha384" => Ok(DigestAlgorithm::Sha384),
            "sha512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(ForgeError::InvalidInput(format!(
                "Unsupported digest algorithm: {s}"
            ))),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_algorithm_properties() {
        for alg in DigestAlgorithm::ALL {
            assert_eq!(alg.digest(b"abc").len(), alg.digest_size());
            assert_eq!(DigestAlgorithm::from_oid(&alg.oid()).unwrap(), alg);
            assert_eq!(alg.as_str().parse::<DigestAlgorithm>().unwrap(), alg);
        }
        assert_eq!("SHA-384".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha384);
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hex::encode(DigestAlgorithm::Sha256.digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_unknown_oid_rejected() {
        let err = DigestAlgorithm::from_oid(&constants::ID_CONTENT_TYPE).unwrap_err();
        assert!(matches!(err, ForgeError::MalformedObject(_)));
        assert!("md5".parse::<DigestAlgorithm>().is_err());
    }
}

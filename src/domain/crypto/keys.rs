//! RSA key pairs backed by OpenSSL.

use std::fmt;

use der::{Decode, Encode};
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::{Signer, Verifier};
use spki::SubjectPublicKeyInfoOwned;

use super::{DigestAlgorithm, RsaSignature};
use crate::infra::error::{ForgeError, ForgeResult};

/// RSA modulus size mandated for RPKI keys (RFC 7935).
pub const DEFAULT_RSA_BITS: u32 = 2048;

/// Private/public RSA key pair owned by an authority or a single-use EE certificate.
pub struct KeyPair {
    pkey: PKey<Private>,
}

impl KeyPair {
    /// Generate a fresh RSA key pair with public exponent 65537.
    pub fn generate(bits: u32) -> ForgeResult<Self> {
        if bits < 1024 {
            return Err(ForgeError::InvalidInput(format!(
                "RSA key size too small: {bits}"
            )));
        }
        let rsa = Rsa::generate(bits)?;
        let pkey = PKey::from_rsa(rsa)?;
        log::debug!("Generated {bits}-bit RSA key pair");
        Ok(Self { pkey })
    }

    /// DER-encoded SubjectPublicKeyInfo.
    pub fn public_key_der(&self) -> ForgeResult<Vec<u8>> {
        Ok(self.pkey.public_key_to_der()?)
    }

    pub fn public_key_info(&self) -> ForgeResult<SubjectPublicKeyInfoOwned> {
        let der = self.public_key_der()?;
        Ok(SubjectPublicKeyInfoOwned::from_der(&der)?)
    }

    /// RFC 6487 key identifier: SHA-1 over the subjectPublicKey bits.
    pub fn key_identifier(&self) -> ForgeResult<Vec<u8>> {
        Ok(key_identifier(&self.public_key_info()?))
    }

    /// PKCS#1 v1.5 signature over `data`.
    pub fn sign(&self, algo: DigestAlgorithm, data: &[u8]) -> ForgeResult<RsaSignature> {
        let mut signer = Signer::new(algo.message_digest(), &self.pkey)?;
        signer.update(data)?;
        let bytes = signer.sign_to_vec()?;
        Ok(RsaSignature::new(algo, bytes))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair(rsa, bits={})", self.pkey.bits())
    }
}

#[must_use]
pub fn key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Vec<u8> {
    openssl::sha::sha1(spki.subject_public_key.raw_bytes()).to_vec()
}

/// Verify a PKCS#1 v1.5 signature against a SubjectPublicKeyInfo.
pub fn verify_signature(
    spki: &SubjectPublicKeyInfoOwned,
    algo: DigestAlgorithm,
    data: &[u8],
    signature: &[u8],
) -> ForgeResult<bool> {
    let spki_der = spki.to_der().map_err(ForgeError::encode)?;
    let pkey = PKey::public_key_from_der(&spki_der)?;
    let mut verifier = Verifier::new(algo.message_digest(), &pkey)?;
    verifier.update(data)?;
    // OpenSSL reports a bad signature either as Ok(false) or as an error stack
    Ok(verifier.verify(signature).unwrap_or(false))
}

use std::fmt;

use der::asn1::{Any, AnyRef, BitString, OctetString};
use spki::AlgorithmIdentifierOwned;

use super::DigestAlgorithm;
use crate::domain::constants::RSA_ENCRYPTION;
use crate::infra::error::{ForgeError, ForgeResult};

/// PKCS#1 v1.5 signature value and the digest it was computed with.
///
/// The same bytes are labelled differently by where they land: a CMS
/// `SignerInfo` names plain `rsaEncryption` (RFC 6488 section 2.1.6.5) while
/// certificates and CRLs name the combined `shaNNNWithRSAEncryption`.
#[derive(Clone, Eq, PartialEq)]
pub struct RsaSignature {
    digest: DigestAlgorithm,
    value: Vec<u8>,
}

impl RsaSignature {
    #[must_use]
    pub fn new(digest: DigestAlgorithm, value: Vec<u8>) -> Self {
        Self { digest, value }
    }

    #[must_use]
    pub fn digest(&self) -> DigestAlgorithm {
        self.digest
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.value
    }

    /// `signatureAlgorithm` of a CMS `SignerInfo`.
    #[must_use]
    pub fn cms_algorithm() -> AlgorithmIdentifierOwned {
        AlgorithmIdentifierOwned {
            oid: RSA_ENCRYPTION,
            parameters: Some(Any::from(AnyRef::NULL)),
        }
    }

    /// `signatureAlgorithm` of a certificate or CRL signed over `digest`.
    #[must_use]
    pub fn x509_algorithm(digest: DigestAlgorithm) -> AlgorithmIdentifierOwned {
        AlgorithmIdentifierOwned {
            oid: digest.rsa_signature_oid(),
            parameters: Some(Any::from(AnyRef::NULL)),
        }
    }

    /// `SignerInfo.signature` form.
    pub fn to_octet_string(&self) -> ForgeResult<OctetString> {
        OctetString::new(self.value.as_slice()).map_err(ForgeError::encode)
    }

    /// Certificate and CRL `signatureValue` form.
    pub fn to_bit_string(&self) -> ForgeResult<BitString> {
        BitString::from_bytes(&self.value).map_err(ForgeError::encode)
    }
}

impl fmt::Debug for RsaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = &self.value[..self.value.len().min(8)];
        write!(
            f,
            "RsaSignature({:?}, {}.., {} bytes)",
            self.digest,
            hex::encode(head),
            self.value.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::SHA384_WITH_RSA_ENCRYPTION;

    #[test]
    fn algorithm_identifiers_differ_by_context() {
        assert_eq!(RsaSignature::cms_algorithm().oid, RSA_ENCRYPTION);
        assert_eq!(
            RsaSignature::x509_algorithm(DigestAlgorithm::Sha384).oid,
            SHA384_WITH_RSA_ENCRYPTION
        );
        assert!(RsaSignature::cms_algorithm().parameters.is_some());
    }

    #[test]
    fn carriers_hold_the_raw_value() {
        let sig = RsaSignature::new(DigestAlgorithm::Sha256, vec![1, 2, 3]);
        assert_eq!(sig.to_octet_string().unwrap().as_bytes(), [1, 2, 3]);
        assert_eq!(sig.to_bit_string().unwrap().raw_bytes(), [1, 2, 3]);
        assert_eq!(format!("{sig:?}"), "RsaSignature(Sha256, 010203.., 3 bytes)");
    }
}

//! RPKI signed object envelope (RFC 6488).
//!
//! A `SignedObject` is one CMS `ContentInfo` wrapping `SignedData`: the
//! payload, the digest algorithm, the signed attributes, a single-use EE
//! certificate and the signature. It keeps the exact DER it was built from
//! or parsed out of, alongside the decoded pieces.

use std::fmt;

use der::asn1::ObjectIdentifier;

use crate::domain::certificate::ResourceCertificate;
use crate::domain::content::EncapsulatedContent;
use crate::domain::crypto::DigestAlgorithm;
use crate::infra::error::ForgeResult;
use crate::services::envelope::EnvelopeService;
use crate::services::registry::ContentTypeRegistry;

pub mod attributes;

pub use attributes::SignedAttributes;

#[derive(Clone)]
pub struct SignedObject {
    pub(crate) content: EncapsulatedContent,
    pub(crate) econtent: Vec<u8>,
    pub(crate) digest_algorithm: DigestAlgorithm,
    pub(crate) signed_attributes: SignedAttributes,
    pub(crate) signed_attributes_der: Vec<u8>,
    pub(crate) signature: Vec<u8>,
    pub(crate) signer: ResourceCertificate,
    pub(crate) extra_certificates: Vec<ResourceCertificate>,
    pub(crate) file_ext: String,
    pub(crate) der: Vec<u8>,
}

impl SignedObject {
    /// Parse a DER `ContentInfo`, resolve its payload schema and decode it.
    ///
    /// The digest is checked; the signature is not. Use
    /// `VerificationService` for that.
    pub fn decode(bytes: &[u8], registry: &ContentTypeRegistry) -> ForgeResult<Self> {
        EnvelopeService::default().parse(bytes, registry)
    }

    #[must_use]
    pub fn content(&self) -> &EncapsulatedContent {
        &self.content
    }

    #[must_use]
    pub fn content_type(&self) -> ObjectIdentifier {
        self.content.content_type()
    }

    /// Raw eContent bytes as carried in the envelope.
    #[must_use]
    pub fn econtent(&self) -> &[u8] {
        &self.econtent
    }

    #[must_use]
    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest_algorithm
    }

    #[must_use]
    pub fn signed_attributes(&self) -> &SignedAttributes {
        &self.signed_attributes
    }

    /// DER `SET OF Attribute` covered by the signature.
    #[must_use]
    pub fn signed_attributes_der(&self) -> &[u8] {
        &self.signed_attributes_der
    }

    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// EE certificate whose key produced the signature.
    #[must_use]
    pub fn signer(&self) -> &ResourceCertificate {
        &self.signer
    }

    #[must_use]
    pub fn extra_certificates(&self) -> &[ResourceCertificate] {
        &self.extra_certificates
    }

    #[must_use]
    pub fn file_ext(&self) -> &str {
        &self.file_ext
    }

    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn to_der(&self) -> Vec<u8> {
        self.der.clone()
    }

    /// `hex(digest(signedAttrs)).<ext>`, stable for a given signature input.
    #[must_use]
    pub fn default_file_name(&self) -> String {
        default_file_name(
            self.digest_algorithm,
            &self.signed_attributes_der,
            &self.file_ext,
        )
    }
}

pub(crate) fn default_file_name(
    digest_algorithm: DigestAlgorithm,
    signed_attributes_der: &[u8],
    file_ext: &str,
) -> String {
    format!(
        "{}.{file_ext}",
        hex::encode(digest_algorithm.digest(signed_attributes_der))
    )
}

impl fmt::Debug for SignedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SignedObject(type={}, digest={}, econtent_len={}, signer={}, len={})",
            self.content_type(),
            self.digest_algorithm,
            self.econtent.len(),
            self.signer.subject(),
            self.der.len()
        )
    }
}

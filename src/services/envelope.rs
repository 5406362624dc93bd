//! CMS envelope service.
//!
//! Assembles and parses RPKI `SignedData` (RFC 6488) with the `cms` crate.
//! Building happens in two steps because the EE certificate names the
//! object's publication URI, which depends on the signed attributes:
//! `prepare` fixes the eContent and signed attributes, `seal` signs them and
//! embeds the EE certificate.

use cms::cert::CertificateChoices;
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo, SignerInfos,
};
use der::asn1::{Any, OctetString, SetOfVec};
use der::{Decode, Encode, Tag, Tagged};
use spki::AlgorithmIdentifierOwned;
use x509_cert::ext::pkix::SubjectKeyIdentifier;

use crate::domain::certificate::ResourceCertificate;
use crate::domain::constants::ID_SIGNED_DATA;
use crate::domain::content::EncapsulatedContent;
use crate::domain::crypto::{DigestAlgorithm, KeyPair, RsaSignature};
use crate::domain::envelope::{default_file_name, SignedAttributes, SignedObject};
use crate::domain::resources::Resources;
use crate::domain::time;
use crate::infra::error::{ForgeError, ForgeResult};
use crate::services::registry::ContentTypeRegistry;

/// Payload with its signed attributes fixed, waiting for a signature.
#[derive(Debug, Clone)]
pub struct PreparedContent {
    content: EncapsulatedContent,
    econtent: Vec<u8>,
    digest_algorithm: DigestAlgorithm,
    attributes: SignedAttributes,
    attributes_der: Vec<u8>,
    file_ext: String,
}

impl PreparedContent {
    #[must_use]
    pub fn content(&self) -> &EncapsulatedContent {
        &self.content
    }

    #[must_use]
    pub fn econtent(&self) -> &[u8] {
        &self.econtent
    }

    #[must_use]
    pub fn attributes(&self) -> &SignedAttributes {
        &self.attributes
    }

    /// File name the sealed object will report from `default_file_name()`.
    #[must_use]
    pub fn default_file_name(&self) -> String {
        default_file_name(self.digest_algorithm, &self.attributes_der, &self.file_ext)
    }
}

fn malformed(what: &str) -> impl Fn(der::Error) -> ForgeError + '_ {
    move |e| ForgeError::MalformedObject(format!("{what}: {e}"))
}

/// Builds and parses RPKI signed-object envelopes.
pub struct EnvelopeService {
    digest: DigestAlgorithm,
}

impl Default for EnvelopeService {
    fn default() -> Self {
        Self::new(DigestAlgorithm::Sha256)
    }
}

impl EnvelopeService {
    #[must_use]
    pub fn new(digest: DigestAlgorithm) -> Self {
        Self { digest }
    }

    /// Encode the payload and compute contentType, messageDigest and signingTime.
    pub fn prepare(
        &self,
        content: &EncapsulatedContent,
        registry: &ContentTypeRegistry,
    ) -> ForgeResult<PreparedContent> {
        let descriptor = registry.lookup(&content.content_type())?;
        let econtent = content.encode(registry)?;
        let attributes = SignedAttributes::new(
            content.content_type(),
            self.digest.digest(&econtent),
            time::now()?,
        );
        let attributes_der = attributes.to_der()?;
        log::debug!(
            "Prepared {} eContent: {} bytes, {} digest {}",
            descriptor.name,
            econtent.len(),
            self.digest,
            hex::encode(&attributes.message_digest)
        );
        Ok(PreparedContent {
            content: content.clone(),
            econtent,
            digest_algorithm: self.digest,
            attributes,
            attributes_der,
            file_ext: descriptor.file_ext.clone(),
        })
    }

    /// Sign the prepared attributes with `ee_key` and assemble the envelope.
    ///
    /// Only `ee_cert` is embedded; it must certify `ee_key`.
    pub fn seal(
        &self,
        prepared: PreparedContent,
        ee_key: &KeyPair,
        ee_cert: &ResourceCertificate,
    ) -> ForgeResult<SignedObject> {
        let signature = ee_key.sign(prepared.digest_algorithm, &prepared.attributes_der)?;
        let digest_alg = AlgorithmIdentifierOwned {
            oid: prepared.digest_algorithm.oid(),
            parameters: None,
        };

        let signer_info = SignerInfo {
            version: CmsVersion::V3,
            sid: SignerIdentifier::SubjectKeyIdentifier(SubjectKeyIdentifier(
                OctetString::new(ee_cert.key_identifier()).map_err(ForgeError::encode)?,
            )),
            digest_alg: digest_alg.clone(),
            signed_attrs: Some(prepared.attributes.to_set()?),
            signature_algorithm: RsaSignature::cms_algorithm(),
            signature: signature.to_octet_string()?,
            unsigned_attrs: None,
        };

        let signed_data = SignedData {
            version: CmsVersion::V3,
            digest_algorithms: SetOfVec::try_from(vec![digest_alg]).map_err(ForgeError::encode)?,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: prepared.content.content_type(),
                econtent: Some(
                    Any::new(Tag::OctetString, prepared.econtent.clone())
                        .map_err(ForgeError::encode)?,
                ),
            },
            certificates: Some(CertificateSet(
                SetOfVec::try_from(vec![CertificateChoices::Certificate(
                    ee_cert.certificate().clone(),
                )])
                .map_err(ForgeError::encode)?,
            )),
            crls: None,
            signer_infos: SignerInfos(
                SetOfVec::try_from(vec![signer_info]).map_err(ForgeError::encode)?,
            ),
        };

        let content_info = ContentInfo {
            content_type: ID_SIGNED_DATA,
            content: Any::encode_from(&signed_data).map_err(ForgeError::encode)?,
        };
        let der = content_info.to_der().map_err(ForgeError::encode)?;
        log::debug!("Sealed signed object: {} bytes", der.len());

        Ok(SignedObject {
            content: prepared.content,
            econtent: prepared.econtent,
            digest_algorithm: prepared.digest_algorithm,
            signed_attributes: prepared.attributes,
            signed_attributes_der: prepared.attributes_der,
            signature: signature.as_slice().to_vec(),
            signer: ee_cert.clone(),
            extra_certificates: Vec::new(),
            file_ext: prepared.file_ext,
            der,
        })
    }

    /// Decode an envelope. Checks structure, attributes and digest; never
    /// the signature.
    pub fn parse(&self, bytes: &[u8], registry: &ContentTypeRegistry) -> ForgeResult<SignedObject> {
        let content_info = ContentInfo::from_der(bytes).map_err(malformed("ContentInfo"))?;
        if content_info.content_type != ID_SIGNED_DATA {
            return Err(ForgeError::MalformedObject(format!(
                "content type {} is not signedData",
                content_info.content_type
            )));
        }
        let inner = content_info.content.to_der().map_err(ForgeError::encode)?;
        let signed_data = SignedData::from_der(&inner).map_err(malformed("SignedData"))?;

        let mut signers = signed_data.signer_infos.0.iter();
        let signer_info = match (signers.next(), signers.next()) {
            (Some(info), None) => info,
            _ => {
                return Err(ForgeError::MalformedObject(
                    "expected exactly one SignerInfo".into(),
                ))
            }
        };

        let attr_set = signer_info
            .signed_attrs
            .as_ref()
            .ok_or_else(|| ForgeError::MalformedObject("missing signed attributes".into()))?;
        let attributes = SignedAttributes::from_set(attr_set)?;
        let econtent_type = signed_data.encap_content_info.econtent_type;
        if attributes.content_type != econtent_type {
            return Err(ForgeError::MalformedObject(format!(
                "contentType attribute {} does not match eContentType {econtent_type}",
                attributes.content_type
            )));
        }

        let descriptor = registry.lookup(&econtent_type)?;

        let econtent = signed_data
            .encap_content_info
            .econtent
            .as_ref()
            .ok_or_else(|| ForgeError::MalformedObject("missing eContent".into()))?;
        if econtent.tag() != Tag::OctetString {
            return Err(ForgeError::MalformedObject(
                "eContent is not an OCTET STRING".into(),
            ));
        }
        let econtent = econtent.value().to_vec();

        let digest_algorithm = DigestAlgorithm::from_oid(&signer_info.digest_alg.oid)?;
        if digest_algorithm.digest(&econtent) != attributes.message_digest {
            return Err(ForgeError::MalformedObject(
                "messageDigest does not match eContent".into(),
            ));
        }

        let content = EncapsulatedContent::decode(econtent_type, &econtent, registry)?;

        let (signer, extra_certificates) = split_certificates(&signed_data, &signer_info.sid)?;
        // resources outside the modelled families must not make the object unreadable
        let resources = signer.resources().unwrap_or_else(|e| {
            log::warn!(
                "Ignoring resources of signer {}: {e}",
                signer.subject()
            );
            Resources::inherit()
        });
        let content = content.with_resources(resources);
        let signed_attributes_der = attr_set.to_der().map_err(ForgeError::encode)?;

        log::debug!(
            "Decoded {} object signed by {}",
            descriptor.name,
            signer.subject()
        );
        Ok(SignedObject {
            content,
            econtent,
            digest_algorithm,
            signed_attributes: attributes,
            signed_attributes_der,
            signature: signer_info.signature.as_bytes().to_vec(),
            signer,
            extra_certificates,
            file_ext: descriptor.file_ext.clone(),
            der: bytes.to_vec(),
        })
    }
}

/// Find the certificate named by `sid`; return it and every other embedded one.
fn split_certificates(
    signed_data: &SignedData,
    sid: &SignerIdentifier,
) -> ForgeResult<(ResourceCertificate, Vec<ResourceCertificate>)> {
    let mut signer = None;
    let mut extra = Vec::new();
    for choice in signed_data.certificates.iter().flat_map(|set| set.0.iter()) {
        let CertificateChoices::Certificate(cert) = choice else {
            continue;
        };
        let cert = ResourceCertificate::from_certificate(cert.clone())?;
        let matches = match sid {
            SignerIdentifier::SubjectKeyIdentifier(ski) => {
                cert.key_identifier() == ski.0.as_bytes()
            }
            SignerIdentifier::IssuerAndSerialNumber(isn) => {
                cert.certificate().tbs_certificate.serial_number == isn.serial_number
                    && cert.certificate().tbs_certificate.issuer == isn.issuer
            }
        };
        if matches && signer.is_none() {
            signer = Some(cert);
        } else {
            extra.push(cert);
        }
    }
    let signer = signer.ok_or_else(|| {
        ForgeError::MalformedObject("signer certificate not embedded".into())
    })?;
    Ok((signer, extra))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::certificate::{CertificateProfile, CertificateRequest};
    use crate::domain::constants::ID_CT_RPKI_GHOSTBUSTERS;
    use crate::domain::payloads::Ghostbusters;
    use crate::domain::resources::Resources;
    use crate::services::cert_builder::{common_name, CertificateBuilderService, IssuerContext};

    fn signer() -> (KeyPair, ResourceCertificate) {
        signer_holding(Resources::inherit())
    }

    fn signer_holding(resources: Resources) -> (KeyPair, ResourceCertificate) {
        let ca_key = KeyPair::generate(2048).unwrap();
        let ee_key = KeyPair::generate(2048).unwrap();
        let issuer = IssuerContext {
            name: common_name("ca").unwrap(),
            key: &ca_key,
            key_identifier: Some(ca_key.key_identifier().unwrap()),
            certificate_uri: None,
            crl_uri: None,
        };
        let request = CertificateRequest {
            subject: "ee".into(),
            public_key: ee_key.public_key_info().unwrap(),
            resources,
            profile: CertificateProfile::EndEntity,
            validity_days: 1,
            subject_info_access: Vec::new(),
        };
        let cert = CertificateBuilderService::default()
            .issue(&issuer, 2, &request)
            .unwrap();
        (ee_key, cert)
    }

    #[test]
    fn seal_then_parse() {
        let registry = ContentTypeRegistry::builtins();
        let (key, cert) = signer();
        let content = Ghostbusters::new("Egon").to_content();
        let service = EnvelopeService::default();
        let prepared = service.prepare(&content, &registry).unwrap();
        let expected_name = prepared.default_file_name();
        let object = service.seal(prepared, &key, &cert).unwrap();

        assert!(expected_name.ends_with(".gbr"));
        assert_eq!(object.default_file_name(), expected_name);

        let parsed = service.parse(object.as_der(), &registry).unwrap();
        assert_eq!(parsed.content_type(), ID_CT_RPKI_GHOSTBUSTERS);
        assert_eq!(parsed.content().value(), content.value());
        assert_eq!(parsed.signer(), &cert);
        assert!(parsed.extra_certificates().is_empty());
        assert_eq!(parsed.default_file_name(), expected_name);
        assert_eq!(parsed.signed_attributes(), object.signed_attributes());
    }

    #[test]
    fn unknown_address_family_in_signer_is_tolerated() {
        let registry = ContentTypeRegistry::builtins();
        let (key, cert) = signer_holding(Resources::parse("10.0.0.0/8", "").unwrap());
        let service = EnvelopeService::default();
        let prepared = service
            .prepare(&Ghostbusters::new("Ray").to_content(), &registry)
            .unwrap();
        let object = service.seal(prepared, &key, &cert).unwrap();

        // rewrite AFI 0001 to 0003 inside the embedded EE certificate only
        let mut der = object.as_der().to_vec();
        let cert_der = cert.as_der();
        let cert_at = der
            .windows(cert_der.len())
            .position(|w| w == cert_der)
            .unwrap();
        let afi = [0x04, 0x02, 0x00, 0x01];
        let afi_at = cert_der.windows(afi.len()).position(|w| w == afi).unwrap();
        der[cert_at + afi_at + 3] = 0x03;

        let parsed = service.parse(&der, &registry).unwrap();
        assert!(parsed.signer().resources().is_err());
        assert_eq!(parsed.content().resources(), &Resources::inherit());
        assert_eq!(parsed.content().value(), object.content().value());
    }

    #[test]
    fn parse_rejects_garbage() {
        let registry = ContentTypeRegistry::builtins();
        let err = EnvelopeService::default()
            .parse(&[0x30, 0x03, 0x02, 0x01, 0x00], &registry)
            .unwrap_err();
        assert!(matches!(err, ForgeError::MalformedObject(_)));
    }
}

//! Resource certificate builder service.
//!
//! Assembles RFC 6487 `TbsCertificate` structures with their extension set,
//! signs the DER with the issuer key and returns the finished certificate.

use der::asn1::{Any, Ia5String, OctetString, PrintableStringRef, SetOfVec, Utf8StringRef};
use der::Encode;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::pkix::crl::dp::DistributionPoint;
use x509_cert::ext::pkix::name::{DistributionPointName, GeneralName};
use x509_cert::ext::pkix::{
    AccessDescription, AuthorityInfoAccessSyntax, AuthorityKeyIdentifier, BasicConstraints,
    CrlDistributionPoints, KeyUsage, KeyUsages, SubjectInfoAccessSyntax, SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::time::Validity;
use x509_cert::{Certificate, TbsCertificate, Version};

use crate::domain::certificate::{
    serial_from_u64, CertificateProfile, CertificateRequest, ResourceCertificate,
};
use crate::domain::constants::{
    ID_AD_CA_ISSUERS, ID_AT_COMMON_NAME, ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_BASIC_CONSTRAINTS,
    ID_CE_CERTIFICATE_POLICIES, ID_CE_CRL_DISTRIBUTION_POINTS, ID_CE_KEY_USAGE,
    ID_CE_SUBJECT_KEY_IDENTIFIER, ID_CP_IP_ADDR_AS_NUMBER, ID_PE_AUTHORITY_INFO_ACCESS,
    ID_PE_AUTONOMOUS_SYS_IDS, ID_PE_IP_ADDR_BLOCKS, ID_PE_SUBJECT_INFO_ACCESS,
};
use crate::domain::crypto::{key_identifier, DigestAlgorithm, KeyPair, RsaSignature};
use crate::domain::schema::{Field, Schema};
use crate::domain::time;
use crate::domain::value::Value;
use crate::infra::error::{ForgeError, ForgeResult};
use crate::services::codec;

/// Signing side of an issuance: who signs and where its artefacts live.
pub struct IssuerContext<'a> {
    pub name: Name,
    pub key: &'a KeyPair,
    /// `None` for a self-signed certificate, which carries no AKI.
    pub key_identifier: Option<Vec<u8>>,
    /// Published location of the issuer's own certificate (AIA caIssuers).
    pub certificate_uri: Option<String>,
    /// Published location of the issuer's CRL.
    pub crl_uri: Option<String>,
}

/// Single-RDN `CN=` name; PrintableString when the charset allows it.
pub fn common_name(cn: &str) -> ForgeResult<Name> {
    let value = match PrintableStringRef::new(cn) {
        Ok(printable) => Any::encode_from(&printable),
        Err(_) => Utf8StringRef::new(cn).and_then(|utf8| Any::encode_from(&utf8)),
    }
    .map_err(ForgeError::encode)?;
    let atv = AttributeTypeAndValue {
        oid: ID_AT_COMMON_NAME,
        value,
    };
    let rdn = RelativeDistinguishedName(SetOfVec::try_from(vec![atv]).map_err(ForgeError::encode)?);
    Ok(RdnSequence(vec![rdn]))
}

pub(crate) fn extension<T: Encode>(
    oid: der::asn1::ObjectIdentifier,
    critical: bool,
    value: &T,
) -> ForgeResult<Extension> {
    raw_extension(oid, critical, value.to_der().map_err(ForgeError::encode)?)
}

pub(crate) fn raw_extension(
    oid: der::asn1::ObjectIdentifier,
    critical: bool,
    der: Vec<u8>,
) -> ForgeResult<Extension> {
    Ok(Extension {
        extn_id: oid,
        critical,
        extn_value: OctetString::new(der).map_err(ForgeError::encode)?,
    })
}

fn uri_name(uri: &str) -> ForgeResult<GeneralName> {
    let uri = Ia5String::new(uri)
        .map_err(|e| ForgeError::InvalidInput(format!("'{uri}' is not IA5: {e}")))?;
    Ok(GeneralName::UniformResourceIdentifier(uri))
}

fn policies_value() -> ForgeResult<Vec<u8>> {
    let schema = Schema::sequence_of(Schema::sequence(vec![Field::required(
        "policyIdentifier",
        Schema::Oid,
    )]));
    let value = Value::List(vec![Value::record([(
        "policyIdentifier",
        Value::Oid(ID_CP_IP_ADDR_AS_NUMBER),
    )])]);
    codec::encode(&schema, &value)
}

/// Issues RFC 6487 resource certificates.
pub struct CertificateBuilderService {
    digest: DigestAlgorithm,
}

impl Default for CertificateBuilderService {
    fn default() -> Self {
        Self::new(DigestAlgorithm::Sha256)
    }
}

impl CertificateBuilderService {
    /// Service signing with `digest`-with-RSA.
    #[must_use]
    pub fn new(digest: DigestAlgorithm) -> Self {
        Self { digest }
    }

    /// Mint and sign a certificate for `request` under `issuer`.
    pub fn issue(
        &self,
        issuer: &IssuerContext<'_>,
        serial: u64,
        request: &CertificateRequest,
    ) -> ForgeResult<ResourceCertificate> {
        let not_before = time::now()?;
        let not_after = time::add_days(not_before, request.validity_days)?;

        let tbs = TbsCertificate {
            version: Version::V3,
            serial_number: serial_from_u64(serial)?,
            signature: RsaSignature::x509_algorithm(self.digest),
            issuer: issuer.name.clone(),
            validity: Validity {
                not_before: time::x509_time(not_before)?,
                not_after: time::x509_time(not_after)?,
            },
            subject: common_name(&request.subject)?,
            subject_public_key_info: request.public_key.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(self.build_extensions(issuer, request)?),
        };

        let tbs_der = tbs.to_der().map_err(ForgeError::encode)?;
        let signature = issuer.key.sign(self.digest, &tbs_der)?;
        let certificate = Certificate {
            tbs_certificate: tbs,
            signature_algorithm: RsaSignature::x509_algorithm(self.digest),
            signature: signature.to_bit_string()?,
        };

        let certificate = ResourceCertificate::from_certificate(certificate)?;
        log::info!(
            "Issued {:?} certificate serial={serial} subject={} issuer={}",
            request.profile,
            certificate.subject(),
            certificate.issuer()
        );
        log::debug!("Certificate DER length: {}", certificate.as_der().len());
        Ok(certificate)
    }

    fn build_extensions(
        &self,
        issuer: &IssuerContext<'_>,
        request: &CertificateRequest,
    ) -> ForgeResult<Vec<Extension>> {
        let mut extensions = Vec::new();

        if request.profile == CertificateProfile::Ca {
            extensions.push(extension(
                ID_CE_BASIC_CONSTRAINTS,
                true,
                &BasicConstraints {
                    ca: true,
                    path_len_constraint: None,
                },
            )?);
        }

        let ski = OctetString::new(key_identifier(&request.public_key)).map_err(ForgeError::encode)?;
        extensions.push(extension(
            ID_CE_SUBJECT_KEY_IDENTIFIER,
            false,
            &SubjectKeyIdentifier(ski),
        )?);

        if let Some(kid) = &issuer.key_identifier {
            let aki = AuthorityKeyIdentifier {
                key_identifier: Some(OctetString::new(kid.clone()).map_err(ForgeError::encode)?),
                authority_cert_issuer: None,
                authority_cert_serial_number: None,
            };
            extensions.push(extension(ID_CE_AUTHORITY_KEY_IDENTIFIER, false, &aki)?);
        }

        let usage = match request.profile {
            CertificateProfile::Ca => KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign),
            CertificateProfile::EndEntity => KeyUsage(KeyUsages::DigitalSignature.into()),
        };
        extensions.push(extension(ID_CE_KEY_USAGE, true, &usage)?);

        if let Some(crl_uri) = &issuer.crl_uri {
            let points = CrlDistributionPoints(vec![DistributionPoint {
                distribution_point: Some(DistributionPointName::FullName(vec![uri_name(
                    crl_uri,
                )?])),
                reasons: None,
                crl_issuer: None,
            }]);
            extensions.push(extension(ID_CE_CRL_DISTRIBUTION_POINTS, false, &points)?);
        }

        if let Some(cert_uri) = &issuer.certificate_uri {
            let aia = AuthorityInfoAccessSyntax(vec![AccessDescription {
                access_method: ID_AD_CA_ISSUERS,
                access_location: uri_name(cert_uri)?,
            }]);
            extensions.push(extension(ID_PE_AUTHORITY_INFO_ACCESS, false, &aia)?);
        }

        if !request.subject_info_access.is_empty() {
            let sia = request
                .subject_info_access
                .iter()
                .map(|ad| {
                    Ok(AccessDescription {
                        access_method: ad.method,
                        access_location: uri_name(&ad.uri)?,
                    })
                })
                .collect::<ForgeResult<Vec<_>>>()?;
            extensions.push(extension(
                ID_PE_SUBJECT_INFO_ACCESS,
                false,
                &SubjectInfoAccessSyntax(sia),
            )?);
        }

        extensions.push(raw_extension(
            ID_CE_CERTIFICATE_POLICIES,
            true,
            policies_value()?,
        )?);

        if let Some(ip) = request.resources.ip_extension()? {
            extensions.push(raw_extension(ID_PE_IP_ADDR_BLOCKS, true, ip)?);
        }
        if let Some(asn) = request.resources.as_extension()? {
            extensions.push(raw_extension(ID_PE_AUTONOMOUS_SYS_IDS, true, asn)?);
        }

        Ok(extensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::certificate::SubjectInfoAccess;
    use crate::domain::constants::ID_AD_SIGNED_OBJECT;
    use crate::domain::crypto::verify_signature;
    use crate::domain::resources::Resources;

    #[test]
    fn self_signed_ca_certificate() {
        let key = KeyPair::generate(2048).unwrap();
        let issuer = IssuerContext {
            name: common_name("root").unwrap(),
            key: &key,
            key_identifier: None,
            certificate_uri: None,
            crl_uri: None,
        };
        let request = CertificateRequest {
            subject: "root".into(),
            public_key: key.public_key_info().unwrap(),
            resources: Resources::all(),
            profile: CertificateProfile::Ca,
            validity_days: 365,
            subject_info_access: Vec::new(),
        };
        let cert = CertificateBuilderService::default()
            .issue(&issuer, 1, &request)
            .unwrap();

        assert_eq!(cert.serial().unwrap().to_u64(), Some(1));
        assert!(cert.is_ca().unwrap());
        assert!(cert.is_self_issued());
        assert!(cert.authority_key_identifier().unwrap().is_none());
        assert_eq!(cert.resources().unwrap(), Resources::all());
        assert_eq!(cert.subject(), "CN=root");
        assert!(verify_signature(
            cert.public_key_info(),
            DigestAlgorithm::Sha256,
            &cert.tbs_der().unwrap(),
            cert.signature()
        )
        .unwrap());
    }

    #[test]
    fn end_entity_certificate_carries_issuer_links() {
        let ca_key = KeyPair::generate(2048).unwrap();
        let ee_key = KeyPair::generate(2048).unwrap();
        let issuer = IssuerContext {
            name: common_name("ca").unwrap(),
            key: &ca_key,
            key_identifier: Some(ca_key.key_identifier().unwrap()),
            certificate_uri: Some("rsync://example.net/repo/ca.cer".into()),
            crl_uri: Some("rsync://example.net/repo/ca/revoked.crl".into()),
        };
        let request = CertificateRequest {
            subject: "ee".into(),
            public_key: ee_key.public_key_info().unwrap(),
            resources: Resources::inherit(),
            profile: CertificateProfile::EndEntity,
            validity_days: 7,
            subject_info_access: vec![SubjectInfoAccess::new(
                ID_AD_SIGNED_OBJECT,
                "rsync://example.net/repo/ca/hello.sig",
            )],
        };
        let cert = CertificateBuilderService::default()
            .issue(&issuer, 42, &request)
            .unwrap();

        assert!(!cert.is_ca().unwrap());
        assert_eq!(
            cert.authority_key_identifier().unwrap(),
            Some(ca_key.key_identifier().unwrap())
        );
        assert_eq!(cert.key_identifier(), ee_key.key_identifier().unwrap());
        assert_eq!(
            cert.sia_uris(&ID_AD_SIGNED_OBJECT).unwrap(),
            vec!["rsync://example.net/repo/ca/hello.sig".to_string()]
        );
        assert!(verify_signature(
            &ca_key.public_key_info().unwrap(),
            DigestAlgorithm::Sha256,
            &cert.tbs_der().unwrap(),
            cert.signature()
        )
        .unwrap());
    }

    #[test]
    fn names_fall_back_to_utf8() {
        let name = common_name("caf\u{e9}").unwrap();
        assert_eq!(name.0.len(), 1);
        assert!(common_name("plain name").is_ok());
    }
}

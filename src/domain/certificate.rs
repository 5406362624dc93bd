//! Resource certificate and CRL domain wrappers.
//!
//! Both keep the parsed `x509-cert` structure next to the exact DER they were
//! built from, so hashing and publication always see the signed bytes.

use std::fmt;

use der::asn1::ObjectIdentifier;
use der::{DateTime, Decode, Encode};
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::crl::CertificateList;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{AuthorityKeyIdentifier, BasicConstraints, SubjectInfoAccessSyntax};
use x509_cert::ext::Extension;
use x509_cert::serial_number::SerialNumber;
use x509_cert::Certificate;

use crate::domain::constants::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_BASIC_CONSTRAINTS, ID_CE_CRL_NUMBER,
    ID_PE_AUTONOMOUS_SYS_IDS, ID_PE_IP_ADDR_BLOCKS, ID_PE_SUBJECT_INFO_ACCESS,
};
use crate::domain::crypto::key_identifier;
use crate::domain::resources::Resources;
use crate::domain::schema::Schema;
use crate::domain::value::{IntValue, Value};
use crate::infra::error::{ForgeError, ForgeResult};
use crate::services::codec;

/// What an issued certificate is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateProfile {
    /// Subordinate authority: keyCertSign + cRLSign, basicConstraints cA.
    Ca,
    /// Single-use signing key of one signed object.
    EndEntity,
}

/// One `AccessDescription` of the subject information access extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectInfoAccess {
    pub method: ObjectIdentifier,
    pub uri: String,
}

impl SubjectInfoAccess {
    #[must_use]
    pub fn new(method: ObjectIdentifier, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
        }
    }
}

/// Everything the issuer needs to mint a subordinate certificate.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub subject: String,
    pub public_key: SubjectPublicKeyInfoOwned,
    pub resources: Resources,
    pub profile: CertificateProfile,
    pub validity_days: u32,
    pub subject_info_access: Vec<SubjectInfoAccess>,
}

/// Serial as a DER INTEGER, without narrowing; RFC 5280 allows 20 octets.
pub(crate) fn serial_value(serial: &SerialNumber) -> ForgeResult<IntValue> {
    let der = serial.to_der().map_err(ForgeError::encode)?;
    codec::decode(&Schema::Integer, &der)?
        .as_int()
        .cloned()
        .ok_or_else(|| ForgeError::CertificateError("serial is not an INTEGER".into()))
}

pub(crate) fn serial_from_u64(serial: u64) -> ForgeResult<SerialNumber> {
    let bytes = serial.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    SerialNumber::new(&bytes[start..]).map_err(ForgeError::encode)
}

/// CRL number extension value.
pub(crate) fn crl_number_value(number: u64) -> ForgeResult<Vec<u8>> {
    codec::encode(&Schema::Integer, &Value::int(number))
}

fn find<'a>(
    extensions: Option<&'a Vec<Extension>>,
    oid: &ObjectIdentifier,
) -> Option<&'a Extension> {
    extensions.and_then(|exts| exts.iter().find(|e| &e.extn_id == oid))
}

/// X.509 v3 resource certificate (RFC 6487).
#[derive(Clone)]
pub struct ResourceCertificate {
    certificate: Certificate,
    der: Vec<u8>,
}

impl ResourceCertificate {
    pub fn from_der(der: Vec<u8>) -> ForgeResult<Self> {
        let certificate = Certificate::from_der(&der)
            .map_err(|e| ForgeError::CertificateError(format!("Failed to parse certificate: {e}")))?;
        Ok(Self { certificate, der })
    }

    pub fn from_certificate(certificate: Certificate) -> ForgeResult<Self> {
        let der = certificate.to_der().map_err(ForgeError::encode)?;
        Ok(Self { certificate, der })
    }

    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn serial(&self) -> ForgeResult<IntValue> {
        serial_value(&self.certificate.tbs_certificate.serial_number)
    }

    #[must_use]
    pub fn subject(&self) -> String {
        self.certificate.tbs_certificate.subject.to_string()
    }

    #[must_use]
    pub fn issuer(&self) -> String {
        self.certificate.tbs_certificate.issuer.to_string()
    }

    #[must_use]
    pub fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.certificate.tbs_certificate.subject_public_key_info
    }

    /// SHA-1 over the subject public key bits.
    #[must_use]
    pub fn key_identifier(&self) -> Vec<u8> {
        key_identifier(self.public_key_info())
    }

    #[must_use]
    pub fn extension(&self, oid: &ObjectIdentifier) -> Option<&Extension> {
        find(self.certificate.tbs_certificate.extensions.as_ref(), oid)
    }

    pub fn authority_key_identifier(&self) -> ForgeResult<Option<Vec<u8>>> {
        let Some(ext) = self.extension(&ID_CE_AUTHORITY_KEY_IDENTIFIER) else {
            return Ok(None);
        };
        let aki = AuthorityKeyIdentifier::from_der(ext.extn_value.as_bytes())?;
        Ok(aki.key_identifier.map(|k| k.as_bytes().to_vec()))
    }

    pub fn is_ca(&self) -> ForgeResult<bool> {
        match self.extension(&ID_CE_BASIC_CONSTRAINTS) {
            Some(ext) => Ok(BasicConstraints::from_der(ext.extn_value.as_bytes())?.ca),
            None => Ok(false),
        }
    }

    #[must_use]
    pub fn is_self_issued(&self) -> bool {
        let tbs = &self.certificate.tbs_certificate;
        tbs.issuer == tbs.subject
    }

    #[must_use]
    pub fn not_before(&self) -> DateTime {
        self.certificate.tbs_certificate.validity.not_before.to_date_time()
    }

    #[must_use]
    pub fn not_after(&self) -> DateTime {
        self.certificate.tbs_certificate.validity.not_after.to_date_time()
    }

    /// URIs published under `method` in the subject information access.
    pub fn sia_uris(&self, method: &ObjectIdentifier) -> ForgeResult<Vec<String>> {
        let Some(ext) = self.extension(&ID_PE_SUBJECT_INFO_ACCESS) else {
            return Ok(Vec::new());
        };
        let sia = SubjectInfoAccessSyntax::from_der(ext.extn_value.as_bytes())?;
        Ok(sia
            .0
            .iter()
            .filter(|ad| &ad.access_method == method)
            .filter_map(|ad| match &ad.access_location {
                GeneralName::UniformResourceIdentifier(uri) => Some(uri.to_string()),
                _ => None,
            })
            .collect())
    }

    /// RFC 3779 resources carried by this certificate.
    pub fn resources(&self) -> ForgeResult<Resources> {
        Resources::from_extensions(
            self.extension(&ID_PE_IP_ADDR_BLOCKS)
                .map(|e| e.extn_value.as_bytes()),
            self.extension(&ID_PE_AUTONOMOUS_SYS_IDS)
                .map(|e| e.extn_value.as_bytes()),
        )
    }

    /// DER of the signed portion.
    pub fn tbs_der(&self) -> ForgeResult<Vec<u8>> {
        self.certificate
            .tbs_certificate
            .to_der()
            .map_err(ForgeError::encode)
    }

    #[must_use]
    pub fn signature(&self) -> &[u8] {
        self.certificate.signature.raw_bytes()
    }
}

impl PartialEq for ResourceCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for ResourceCertificate {}

impl fmt::Debug for ResourceCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResourceCertificate(subject={}, serial={}, len={})",
            self.subject(),
            hex::encode(self.certificate.tbs_certificate.serial_number.as_bytes()),
            self.der.len()
        )
    }
}

/// Certificate revocation list of one authority.
#[derive(Clone)]
pub struct RevocationList {
    crl: CertificateList,
    der: Vec<u8>,
}

impl RevocationList {
    pub fn from_der(der: Vec<u8>) -> ForgeResult<Self> {
        let crl = CertificateList::from_der(&der)
            .map_err(|e| ForgeError::CertificateError(format!("Failed to parse CRL: {e}")))?;
        Ok(Self { crl, der })
    }

    pub fn from_list(crl: CertificateList) -> ForgeResult<Self> {
        let der = crl.to_der().map_err(ForgeError::encode)?;
        Ok(Self { crl, der })
    }

    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn issuer(&self) -> String {
        self.crl.tbs_cert_list.issuer.to_string()
    }

    #[must_use]
    pub fn this_update(&self) -> DateTime {
        self.crl.tbs_cert_list.this_update.to_date_time()
    }

    #[must_use]
    pub fn next_update(&self) -> Option<DateTime> {
        self.crl.tbs_cert_list.next_update.as_ref().map(|t| t.to_date_time())
    }

    pub fn number(&self) -> ForgeResult<IntValue> {
        let ext = find(self.crl.tbs_cert_list.crl_extensions.as_ref(), &ID_CE_CRL_NUMBER)
            .ok_or_else(|| ForgeError::CertificateError("CRL lacks a CRL number".into()))?;
        codec::decode(&Schema::Integer, ext.extn_value.as_bytes())?
            .as_int()
            .filter(|n| !n.is_negative())
            .cloned()
            .ok_or_else(|| ForgeError::CertificateError("negative CRL number".into()))
    }

    /// Revoked `(serial, revocation time)` pairs in list order.
    pub fn revoked(&self) -> ForgeResult<Vec<(IntValue, DateTime)>> {
        self.crl
            .tbs_cert_list
            .revoked_certificates
            .iter()
            .flatten()
            .map(|entry| {
                Ok((
                    serial_value(&entry.serial_number)?,
                    entry.revocation_date.to_date_time(),
                ))
            })
            .collect()
    }

    pub fn tbs_der(&self) -> ForgeResult<Vec<u8>> {
        self.crl.tbs_cert_list.to_der().map_err(ForgeError::encode)
    }

    #[must_use]
    pub fn signature(&self) -> &[u8] {
        self.crl.signature.raw_bytes()
    }
}

impl fmt::Debug for RevocationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RevocationList(issuer={}, revoked={}, len={})",
            self.issuer(),
            self.crl
                .tbs_cert_list
                .revoked_certificates
                .as_ref()
                .map_or(0, Vec::len),
            self.der.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_conversion_strips_sign_octet() {
        for n in [0x80, 0, u64::MAX] {
            let serial = serial_from_u64(n).unwrap();
            assert_eq!(serial_value(&serial).unwrap().to_u64(), Some(n));
        }
    }

    #[test]
    fn twenty_octet_serials_are_kept_whole() {
        let magnitude = [0x43; 20];
        let serial = SerialNumber::new(&magnitude).unwrap();
        let value = serial_value(&serial).unwrap();
        assert_eq!(value.to_unsigned_bytes(), Some(&magnitude[..]));
        assert_eq!(value.to_u64(), None);
    }

    #[test]
    fn crl_number_is_a_der_integer() {
        assert_eq!(crl_number_value(1).unwrap(), vec![0x02, 0x01, 0x01]);
        assert_eq!(crl_number_value(128).unwrap(), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(crl_number_value(u64::MAX).unwrap().len(), 11);
    }
}

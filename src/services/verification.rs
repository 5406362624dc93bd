//! Verification service: explicit signature checking of decoded signed objects.
//!
//! Decoding already enforces the digest and attribute invariants, so for a
//! decoded object the interesting outcomes are the signature over the signed
//! attributes and, optionally, the EE certificate signature. No chain
//! building or policy validation happens here.

use der::Encode;

use crate::domain::certificate::ResourceCertificate;
use crate::domain::crypto::{verify_signature, DigestAlgorithm};
use crate::domain::envelope::SignedObject;
use crate::domain::verification::VerificationReport;
use crate::infra::error::{ForgeError, ForgeResult};

pub struct VerificationService;

impl Default for VerificationService {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationService {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Verify `object`, and its EE certificate against `issuer` when given.
    pub fn verify(
        &self,
        object: &SignedObject,
        issuer: Option<&ResourceCertificate>,
    ) -> ForgeResult<VerificationReport> {
        let algo = object.digest_algorithm();
        let digest_ok = algo.digest(object.econtent()) == object.signed_attributes().message_digest;
        let attrs_ok = object.signed_attributes().content_type == object.content_type();

        let signature_ok = verify_signature(
            object.signer().public_key_info(),
            algo,
            object.signed_attributes_der(),
            object.signature(),
        )?;

        let ee_cert_ok = issuer
            .map(|issuer| self.verify_certificate(object.signer(), issuer))
            .transpose()?;

        let report = VerificationReport::new(digest_ok, attrs_ok, signature_ok, ee_cert_ok);
        log::info!(
            "Verified {} object: digest={} attrs={} signature={} ee_cert={:?}",
            object.content_type(),
            report.digest_ok,
            report.attrs_ok,
            report.signature_ok,
            report.ee_cert_ok
        );
        Ok(report)
    }

    /// Check that `issuer`'s key signed `cert`.
    pub fn verify_certificate(
        &self,
        cert: &ResourceCertificate,
        issuer: &ResourceCertificate,
    ) -> ForgeResult<bool> {
        let sig_oid = cert.certificate().signature_algorithm.oid;
        let algo = DigestAlgorithm::ALL
            .into_iter()
            .find(|a| a.rsa_signature_oid() == sig_oid)
            .ok_or_else(|| {
                ForgeError::CertificateError(format!("unsupported signature algorithm {sig_oid}"))
            })?;
        let tbs = cert
            .certificate()
            .tbs_certificate
            .to_der()
            .map_err(ForgeError::encode)?;
        verify_signature(issuer.public_key_info(), algo, &tbs, cert.signature())
    }
}

//! Verification domain types for RPKI signed objects.
//!
//! Signature checking is never part of decoding; it is an explicit step whose
//! outcomes are collected here.

/// Result of verifying a decoded signed object.
///
/// - `digest_ok`: messageDigest equals the digest of the eContent
/// - `attrs_ok`: contentType attribute equals eContentType
/// - `signature_ok`: the signature over the signed attributes verifies
///   against the embedded EE certificate
/// - `ee_cert_ok`: the EE certificate verifies against the issuer key, when
///   an issuer certificate was supplied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub digest_ok: bool,
    pub attrs_ok: bool,
    pub signature_ok: bool,
    /// `None` when no issuer certificate was given.
    pub ee_cert_ok: Option<bool>,
}

impl VerificationReport {
    #[must_use]
    pub fn new(digest_ok: bool, attrs_ok: bool, signature_ok: bool, ee_cert_ok: Option<bool>) -> Self {
        Self {
            digest_ok,
            attrs_ok,
            signature_ok,
            ee_cert_ok,
        }
    }

    /// True only if every performed check passed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.digest_ok && self.attrs_ok && self.signature_ok && self.ee_cert_ok.unwrap_or(true)
    }
}

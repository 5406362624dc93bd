//! `VerifyWorkflow`: high-level facade for verifying signed objects.
//!
//! Decodes with the registry, then delegates to `VerificationService`.

use crate::{
    domain::{
        certificate::ResourceCertificate, envelope::SignedObject,
        verification::VerificationReport,
    },
    infra::error::ForgeResult,
    services::{registry::ContentTypeRegistry, verification::VerificationService},
};

/// Orchestrates decoding and verification of a signed object.
pub struct VerifyWorkflow<'r> {
    registry: &'r ContentTypeRegistry,
    svc: VerificationService,
}

impl<'r> VerifyWorkflow<'r> {
    #[must_use]
    pub fn new(registry: &'r ContentTypeRegistry) -> Self {
        Self {
            registry,
            svc: VerificationService::new(),
        }
    }

    /// Decode `bytes` and verify the signature, plus the EE certificate when
    /// `issuer` is given.
    pub fn run(
        &self,
        bytes: &[u8],
        issuer: Option<&ResourceCertificate>,
    ) -> ForgeResult<VerificationReport> {
        let object = SignedObject::decode(bytes, self.registry)?;
        self.svc.verify(&object, issuer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::{CaSettings, TrustAnchor};
    use crate::domain::crypto::DigestAlgorithm;
    use crate::domain::payloads::Ghostbusters;

    #[test]
    fn verifies_object_against_issuer() {
        let settings = CaSettings {
            key_bits: 1024,
            ..CaSettings::default()
        };
        let mut ta = TrustAnchor::new("TA", settings).unwrap();
        let object = ta
            .sign(&Ghostbusters::new("Jane Doe").to_content(), DigestAlgorithm::Sha384)
            .unwrap();

        let registry = ContentTypeRegistry::builtins();
        let report = VerifyWorkflow::new(&registry)
            .run(object.as_der(), Some(ta.certificate()))
            .unwrap();
        assert!(report.success());
        assert_eq!(report.ee_cert_ok, Some(true));
    }
}

//! CRL builder service (RFC 6487 section 5).

use der::asn1::OctetString;
use der::{DateTime, Encode};
use x509_cert::crl::{CertificateList, RevokedCert, TbsCertList};
use x509_cert::ext::pkix::AuthorityKeyIdentifier;
use x509_cert::name::Name;
use x509_cert::Version;

use crate::domain::certificate::{crl_number_value, serial_from_u64, RevocationList};
use crate::domain::constants::{ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_CRL_NUMBER};
use crate::domain::crypto::{DigestAlgorithm, KeyPair, RsaSignature};
use crate::domain::time;
use crate::infra::error::{ForgeError, ForgeResult};
use crate::services::cert_builder::{extension, raw_extension};

/// Input for one CRL issuance.
#[derive(Debug, Clone)]
pub struct CrlRequest<'a> {
    pub number: u64,
    pub this_update: DateTime,
    pub next_update: DateTime,
    pub revoked: &'a [(u64, DateTime)],
}

pub struct CrlBuilderService {
    digest: DigestAlgorithm,
}

impl Default for CrlBuilderService {
    fn default() -> Self {
        Self::new(DigestAlgorithm::Sha256)
    }
}

impl CrlBuilderService {
    #[must_use]
    pub fn new(digest: DigestAlgorithm) -> Self {
        Self { digest }
    }

    /// Build and sign a v2 CRL carrying AKI and CRL number extensions.
    pub fn build(
        &self,
        issuer: &Name,
        key: &KeyPair,
        request: &CrlRequest<'_>,
    ) -> ForgeResult<RevocationList> {
        let revoked = request
            .revoked
            .iter()
            .map(|(serial, when)| {
                Ok(RevokedCert {
                    serial_number: serial_from_u64(*serial)?,
                    revocation_date: time::x509_time(*when)?,
                    crl_entry_extensions: None,
                })
            })
            .collect::<ForgeResult<Vec<_>>>()?;

        let aki = AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(key.key_identifier()?).map_err(ForgeError::encode)?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };
        let crl_extensions = vec![
            extension(ID_CE_AUTHORITY_KEY_IDENTIFIER, false, &aki)?,
            raw_extension(ID_CE_CRL_NUMBER, false, crl_number_value(request.number)?)?,
        ];

        let tbs = TbsCertList {
            version: Version::V2,
            signature: RsaSignature::x509_algorithm(self.digest),
            issuer: issuer.clone(),
            this_update: time::x509_time(request.this_update)?,
            next_update: Some(time::x509_time(request.next_update)?),
            // An empty revokedCertificates SEQUENCE must be omitted
            revoked_certificates: if revoked.is_empty() {
                None
            } else {
                Some(revoked)
            },
            crl_extensions: Some(crl_extensions),
        };

        let tbs_der = tbs.to_der().map_err(ForgeError::encode)?;
        let signature = key.sign(self.digest, &tbs_der)?;
        let crl = RevocationList::from_list(CertificateList {
            tbs_cert_list: tbs,
            signature_algorithm: RsaSignature::x509_algorithm(self.digest),
            signature: signature.to_bit_string()?,
        })?;
        log::info!(
            "Issued CRL number={} issuer={} revoked={}",
            request.number,
            crl.issuer(),
            request.revoked.len()
        );
        Ok(crl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::crypto::verify_signature;
    use crate::services::cert_builder::common_name;

    #[test]
    fn crl_lists_revoked_serials() {
        let key = KeyPair::generate(2048).unwrap();
        let now = time::now().unwrap();
        let revoked = [(7u64, now), (300u64, now)];
        let crl = CrlBuilderService::default()
            .build(
                &common_name("ca").unwrap(),
                &key,
                &CrlRequest {
                    number: 3,
                    this_update: now,
                    next_update: time::add_days(now, 1).unwrap(),
                    revoked: &revoked,
                },
            )
            .unwrap();

        assert_eq!(crl.number().unwrap().to_u64(), Some(3));
        let listed: Vec<(Option<u64>, DateTime)> = crl
            .revoked()
            .unwrap()
            .into_iter()
            .map(|(serial, at)| (serial.to_u64(), at))
            .collect();
        assert_eq!(listed, revoked.map(|(serial, at)| (Some(serial), at)));
        assert_eq!(crl.issuer(), "CN=ca");
        assert!(verify_signature(
            &key.public_key_info().unwrap(),
            DigestAlgorithm::Sha256,
            &crl.tbs_der().unwrap(),
            crl.signature()
        )
        .unwrap());

        let reparsed = RevocationList::from_der(crl.as_der().to_vec()).unwrap();
        assert_eq!(reparsed.number().unwrap().to_u64(), Some(3));
    }

    #[test]
    fn empty_crl_omits_revoked_list() {
        let key = KeyPair::generate(2048).unwrap();
        let now = time::now().unwrap();
        let crl = CrlBuilderService::default()
            .build(
                &common_name("ca").unwrap(),
                &key,
                &CrlRequest {
                    number: 1,
                    this_update: now,
                    next_update: time::add_days(now, 1).unwrap(),
                    revoked: &[],
                },
            )
            .unwrap();
        assert!(crl.revoked().unwrap().is_empty());
    }
}

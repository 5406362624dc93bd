//! Trust anchor: a self-signed certificate authority plus its RFC 8630 locator.

use std::fmt;
use std::ops::{Deref, DerefMut};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use der::{Decode, Encode};
use spki::SubjectPublicKeyInfoOwned;

use super::{ca_subject_info_access, validate_file_name, CaSettings, CertificateAuthority};
use crate::domain::certificate::{CertificateProfile, CertificateRequest};
use crate::domain::crypto::KeyPair;
use crate::domain::resources::Resources;
use crate::infra::error::{ForgeError, ForgeResult};
use crate::services::cert_builder::{common_name, CertificateBuilderService, IssuerContext};

/// Serial of the self-signed certificate; issued certificates start after it.
const SELF_SERIAL: u64 = 1;

/// Trust anchor locator: where to fetch the TA certificate and the key it must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchorLocator {
    pub uris: Vec<String>,
    pub public_key_info: SubjectPublicKeyInfoOwned,
}

impl TrustAnchorLocator {
    /// URI lines, a blank line, then base64 SubjectPublicKeyInfo.
    pub fn to_text(&self) -> ForgeResult<String> {
        let spki = self.public_key_info.to_der().map_err(ForgeError::encode)?;
        let mut text = String::new();
        for uri in &self.uris {
            text.push_str(uri);
            text.push('\n');
        }
        text.push('\n');
        text.push_str(&STANDARD.encode(spki));
        Ok(text)
    }

    /// Parse TAL text; `#` comment lines before the URIs are skipped.
    pub fn parse(text: &str) -> ForgeResult<Self> {
        let (head, key) = text
            .split_once("\n\n")
            .or_else(|| text.split_once("\r\n\r\n"))
            .ok_or_else(|| ForgeError::DecodeError("TAL lacks the blank separator line".into()))?;
        let uris: Vec<String> = head
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect();
        if uris.is_empty() {
            return Err(ForgeError::DecodeError("TAL lists no URIs".into()));
        }
        let key: String = key.split_whitespace().collect();
        let der = STANDARD
            .decode(key)
            .map_err(|e| ForgeError::DecodeError(format!("TAL key is not base64: {e}")))?;
        Ok(Self {
            uris,
            public_key_info: SubjectPublicKeyInfoOwned::from_der(&der)?,
        })
    }
}

/// Self-signed root of a repository.
///
/// Derefs to its `CertificateAuthority`, so every CA operation is available.
pub struct TrustAnchor {
    ca: CertificateAuthority,
}

impl TrustAnchor {
    /// Generate a key and self-sign a certificate holding all resources.
    pub fn new(name: &str, settings: CaSettings) -> ForgeResult<Self> {
        Self::with_resources(name, settings, Resources::all())
    }

    pub fn with_resources(name: &str, settings: CaSettings, resources: Resources) -> ForgeResult<Self> {
        validate_file_name(name)?;
        let key = KeyPair::generate(settings.key_bits)?;
        let repo_path = name.to_string();
        let cert_path = format!("{name}.cer");

        // Self-issued: no AKI, AIA or CRL distribution point
        let issuer = IssuerContext {
            name: common_name(name)?,
            key: &key,
            key_identifier: None,
            certificate_uri: None,
            crl_uri: None,
        };
        let request = CertificateRequest {
            subject: name.to_string(),
            public_key: key.public_key_info()?,
            resources,
            profile: CertificateProfile::Ca,
            validity_days: settings.cert_validity_days,
            subject_info_access: ca_subject_info_access(&settings, &repo_path),
        };
        let certificate =
            CertificateBuilderService::new(settings.digest).issue(&issuer, SELF_SERIAL, &request)?;
        log::info!("Created trust anchor '{name}'");

        Ok(Self {
            ca: CertificateAuthority::assemble(
                name.to_string(),
                repo_path,
                cert_path,
                settings,
                key,
                certificate,
                SELF_SERIAL + 1,
            ),
        })
    }

    #[must_use]
    pub fn locator(&self) -> TrustAnchorLocator {
        TrustAnchorLocator {
            uris: vec![self.ca.certificate_uri()],
            public_key_info: self.ca.certificate().public_key_info().clone(),
        }
    }

    /// File name of the locator, `<name>.tal`.
    #[must_use]
    pub fn tal_file_name(&self) -> String {
        format!("{}.tal", self.ca.name())
    }
}

impl Deref for TrustAnchor {
    type Target = CertificateAuthority;

    fn deref(&self) -> &Self::Target {
        &self.ca
    }
}

impl DerefMut for TrustAnchor {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ca
    }
}

impl fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrustAnchor({:?})", self.ca)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CaSettings {
        CaSettings {
            key_bits: 1024,
            ..CaSettings::default()
        }
    }

    #[test]
    fn trust_anchor_is_self_signed() {
        let ta = TrustAnchor::new("TA", settings()).unwrap();
        let cert = ta.certificate();
        assert!(cert.is_self_issued());
        assert!(cert.is_ca().unwrap());
        assert!(cert.authority_key_identifier().unwrap().is_none());
        assert_eq!(cert.serial().unwrap().to_u64(), Some(SELF_SERIAL));
        assert_eq!(ta.certificate_uri(), "rsync://rpki.example.net/rpki/TA.cer");
        assert_eq!(ta.repo_path(), "TA");
    }

    #[test]
    fn locator_text_round_trip() {
        let ta = TrustAnchor::new("TA", settings()).unwrap();
        let tal = ta.locator();
        let text = tal.to_text().unwrap();
        assert!(text.starts_with("rsync://rpki.example.net/rpki/TA.cer\n\n"));
        assert!(!text.trim_end().contains("\n\n\n"));
        assert_eq!(TrustAnchorLocator::parse(&text).unwrap(), tal);
        assert_eq!(ta.tal_file_name(), "TA.tal");
    }

    #[test]
    fn locator_without_separator_is_rejected() {
        assert!(TrustAnchorLocator::parse("rsync://x/ta.cer\nAAAA").is_err());
    }
}

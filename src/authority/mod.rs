//! Certificate authority repository model.
//!
//! A `CertificateAuthority` owns its key, its certificate, a CRL, a manifest
//! and every object it has published. Publishing, revoking or reissuing the
//! CRL leaves the manifest stale until `issue_manifest()` runs again; nothing
//! is recomputed implicitly.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use der::DateTime;

use crate::domain::certificate::{
    CertificateProfile, CertificateRequest, ResourceCertificate, RevocationList,
    SubjectInfoAccess,
};
use crate::domain::constants::{
    CRL_FILE_NAME, ID_AD_CA_REPOSITORY, ID_AD_RPKI_MANIFEST, ID_AD_SIGNED_OBJECT,
    MANIFEST_FILE_NAME,
};
use crate::domain::content::EncapsulatedContent;
use crate::domain::crypto::{DigestAlgorithm, KeyPair, DEFAULT_RSA_BITS};
use crate::domain::envelope::SignedObject;
use crate::domain::payloads::Manifest;
use crate::domain::resources::Resources;
use crate::domain::time;
use crate::infra::error::{ForgeError, ForgeResult};
use crate::services::cert_builder::{CertificateBuilderService, IssuerContext};
use crate::services::crl_builder::{CrlBuilderService, CrlRequest};
use crate::services::envelope::EnvelopeService;
use crate::services::registry::ContentTypeRegistry;

mod trust_anchor;

pub use trust_anchor::{TrustAnchor, TrustAnchorLocator};

/// Knobs shared by every CA of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaSettings {
    /// Publication base, e.g. `rsync://rpki.example.net/rpki`.
    pub base_uri: String,
    pub key_bits: u32,
    /// Signature digest for certificates, CRLs and manifests.
    pub digest: DigestAlgorithm,
    pub cert_validity_days: u32,
    pub crl_days: u32,
    pub manifest_days: u32,
}

impl Default for CaSettings {
    fn default() -> Self {
        Self {
            base_uri: "rsync://rpki.example.net/rpki".to_string(),
            key_bits: DEFAULT_RSA_BITS,
            digest: DigestAlgorithm::Sha256,
            cert_validity_days: 365,
            crl_days: 7,
            manifest_days: 7,
        }
    }
}

impl CaSettings {
    /// Host and path of `base_uri`, used as the on-disk prefix.
    pub fn uri_path(&self) -> ForgeResult<&str> {
        let (_, rest) = self.base_uri.split_once("://").ok_or_else(|| {
            ForgeError::ConfigurationError(format!("base URI '{}' has no scheme", self.base_uri))
        })?;
        Ok(rest.trim_end_matches('/'))
    }

    fn uri(&self, path: &str) -> String {
        format!("{}/{path}", self.base_uri.trim_end_matches('/'))
    }
}

/// Anything a CA can place in its publication point.
#[derive(Debug, Clone)]
pub enum RepositoryObject {
    Signed(SignedObject),
    Certificate(ResourceCertificate),
    Crl(RevocationList),
}

impl RepositoryObject {
    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        match self {
            RepositoryObject::Signed(object) => object.as_der(),
            RepositoryObject::Certificate(cert) => cert.as_der(),
            RepositoryObject::Crl(crl) => crl.as_der(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RepositoryObject::Signed(_) => "signed object",
            RepositoryObject::Certificate(_) => "certificate",
            RepositoryObject::Crl(_) => "CRL",
        }
    }
}

impl From<SignedObject> for RepositoryObject {
    fn from(object: SignedObject) -> Self {
        RepositoryObject::Signed(object)
    }
}

impl From<ResourceCertificate> for RepositoryObject {
    fn from(cert: ResourceCertificate) -> Self {
        RepositoryObject::Certificate(cert)
    }
}

impl From<RevocationList> for RepositoryObject {
    fn from(crl: RevocationList) -> Self {
        RepositoryObject::Crl(crl)
    }
}

/// Manifest lifecycle of one CA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaState {
    /// Nothing published and no manifest yet.
    Created,
    /// Objects published but the manifest is absent or stale.
    Publishing,
    /// The manifest covers exactly the publish set.
    Consistent,
}

pub struct CertificateAuthority {
    name: String,
    /// Publication point, relative to the base URI.
    repo_path: String,
    /// Location of this CA's own certificate, relative to the base URI.
    cert_path: String,
    settings: CaSettings,
    key: KeyPair,
    certificate: ResourceCertificate,
    crl: Option<RevocationList>,
    manifest: Option<SignedObject>,
    manifest_stale: bool,
    published: BTreeMap<String, RepositoryObject>,
    revoked: BTreeMap<u64, DateTime>,
    next_serial: u64,
    next_crl_number: u64,
    next_manifest_number: u64,
}

fn validate_file_name(file_name: &str) -> ForgeResult<()> {
    if file_name.is_empty()
        || file_name.contains('/')
        || file_name == "."
        || file_name == ".."
        || !file_name.is_ascii()
    {
        return Err(ForgeError::InvalidInput(format!(
            "'{file_name}' is not a valid publication file name"
        )));
    }
    Ok(())
}

impl CertificateAuthority {
    fn assemble(
        name: String,
        repo_path: String,
        cert_path: String,
        settings: CaSettings,
        key: KeyPair,
        certificate: ResourceCertificate,
        next_serial: u64,
    ) -> Self {
        Self {
            name,
            repo_path,
            cert_path,
            settings,
            key,
            certificate,
            crl: None,
            manifest: None,
            manifest_stale: false,
            published: BTreeMap::new(),
            revoked: BTreeMap::new(),
            next_serial,
            next_crl_number: 1,
            next_manifest_number: 1,
        }
    }

    /// Create a subordinate CA certified by `parent` and publish its
    /// certificate as `<name>.cer` in the parent's publication point.
    pub fn new_child(
        parent: &mut CertificateAuthority,
        name: &str,
        resources: Resources,
    ) -> ForgeResult<CertificateAuthority> {
        validate_file_name(name)?;
        let settings = parent.settings.clone();
        let key = KeyPair::generate(settings.key_bits)?;
        let repo_path = format!("{}/{name}", parent.repo_path);
        let cert_file = format!("{name}.cer");
        let cert_path = format!("{}/{cert_file}", parent.repo_path);

        let request = CertificateRequest {
            subject: name.to_string(),
            public_key: key.public_key_info()?,
            resources,
            profile: CertificateProfile::Ca,
            validity_days: settings.cert_validity_days,
            subject_info_access: ca_subject_info_access(&settings, &repo_path),
        };
        let certificate = parent.issue_certificate(&request)?;
        parent.publish(&cert_file, certificate.clone())?;
        log::info!("Created CA '{name}' under '{}'", parent.name);

        Ok(Self::assemble(
            name.to_string(),
            repo_path,
            cert_path,
            settings,
            key,
            certificate,
            1,
        ))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn settings(&self) -> &CaSettings {
        &self.settings
    }

    #[must_use]
    pub fn certificate(&self) -> &ResourceCertificate {
        &self.certificate
    }

    #[must_use]
    pub fn repo_path(&self) -> &str {
        &self.repo_path
    }

    #[must_use]
    pub fn cert_path(&self) -> &str {
        &self.cert_path
    }

    #[must_use]
    pub fn certificate_uri(&self) -> String {
        self.settings.uri(&self.cert_path)
    }

    #[must_use]
    pub fn crl_uri(&self) -> String {
        self.object_uri(CRL_FILE_NAME)
    }

    #[must_use]
    pub fn manifest_uri(&self) -> String {
        self.object_uri(MANIFEST_FILE_NAME)
    }

    /// URI of `file_name` inside this CA's publication point.
    #[must_use]
    pub fn object_uri(&self, file_name: &str) -> String {
        self.settings.uri(&format!("{}/{file_name}", self.repo_path))
    }

    #[must_use]
    pub fn crl(&self) -> Option<&RevocationList> {
        self.crl.as_ref()
    }

    #[must_use]
    pub fn manifest(&self) -> Option<&SignedObject> {
        self.manifest.as_ref()
    }

    #[must_use]
    pub fn published(&self) -> &BTreeMap<String, RepositoryObject> {
        &self.published
    }

    /// Revoked serials with their first revocation time.
    #[must_use]
    pub fn revoked(&self) -> &BTreeMap<u64, DateTime> {
        &self.revoked
    }

    #[must_use]
    pub fn state(&self) -> CaState {
        match (&self.manifest, self.manifest_stale) {
            (Some(_), false) => CaState::Consistent,
            (None, _) if self.published.is_empty() => CaState::Created,
            _ => CaState::Publishing,
        }
    }

    fn issuer_context(&self) -> ForgeResult<IssuerContext<'_>> {
        Ok(IssuerContext {
            name: self.certificate.certificate().tbs_certificate.subject.clone(),
            key: &self.key,
            key_identifier: Some(self.key.key_identifier()?),
            certificate_uri: Some(self.certificate_uri()),
            crl_uri: Some(self.crl_uri()),
        })
    }

    /// Mint a certificate for `request` with the next serial number.
    pub fn issue_certificate(
        &mut self,
        request: &CertificateRequest,
    ) -> ForgeResult<ResourceCertificate> {
        let serial = self.next_serial;
        let certificate = CertificateBuilderService::new(self.settings.digest).issue(
            &self.issuer_context()?,
            serial,
            request,
        )?;
        self.next_serial += 1;
        Ok(certificate)
    }

    /// Wrap `content` in a signed object under a fresh single-use EE
    /// certificate. The EE SIA points at the object's default file name.
    pub fn sign(
        &mut self,
        content: &EncapsulatedContent,
        digest: DigestAlgorithm,
    ) -> ForgeResult<SignedObject> {
        self.sign_with_registry(content, digest, None, ContentTypeRegistry::global())
    }

    /// Like `sign`, with the EE SIA pointing at `file_name`.
    pub fn sign_as(
        &mut self,
        content: &EncapsulatedContent,
        digest: DigestAlgorithm,
        file_name: &str,
    ) -> ForgeResult<SignedObject> {
        self.sign_with_registry(content, digest, Some(file_name), ContentTypeRegistry::global())
    }

    pub fn sign_with_registry(
        &mut self,
        content: &EncapsulatedContent,
        digest: DigestAlgorithm,
        file_name: Option<&str>,
        registry: &ContentTypeRegistry,
    ) -> ForgeResult<SignedObject> {
        let envelope = EnvelopeService::new(digest);
        let prepared = envelope.prepare(content, registry)?;
        let file_name = match file_name {
            Some(name) => {
                validate_file_name(name)?;
                name.to_string()
            }
            None => prepared.default_file_name(),
        };

        let ee_key = KeyPair::generate(self.settings.key_bits)?;
        let request = CertificateRequest {
            subject: hex::encode_upper(ee_key.key_identifier()?),
            public_key: ee_key.public_key_info()?,
            resources: content.resources().clone(),
            profile: CertificateProfile::EndEntity,
            validity_days: self.settings.cert_validity_days,
            subject_info_access: vec![SubjectInfoAccess::new(
                ID_AD_SIGNED_OBJECT,
                self.object_uri(&file_name),
            )],
        };
        let ee_cert = self.issue_certificate(&request)?;
        let object = envelope.seal(prepared, &ee_key, &ee_cert)?;
        log::info!(
            "CA '{}' signed {} as '{file_name}' (EE serial {})",
            self.name,
            object.content_type(),
            ee_cert.serial()?
        );
        Ok(object)
    }

    /// Insert or replace `file_name` in the publish set.
    pub fn publish(
        &mut self,
        file_name: &str,
        object: impl Into<RepositoryObject>,
    ) -> ForgeResult<()> {
        validate_file_name(file_name)?;
        if file_name == MANIFEST_FILE_NAME {
            return Err(ForgeError::InvalidInput(format!(
                "'{MANIFEST_FILE_NAME}' is reserved for the manifest"
            )));
        }
        let object = object.into();
        log::info!(
            "CA '{}' published {} '{file_name}' ({} bytes)",
            self.name,
            object.kind(),
            object.as_der().len()
        );
        if self.published.insert(file_name.to_string(), object).is_some() {
            log::debug!("'{file_name}' replaced an earlier object");
        }
        self.manifest_stale = true;
        Ok(())
    }

    /// Record `serial` as revoked. Revoking twice keeps the first time.
    pub fn revoke(&mut self, serial: u64) -> ForgeResult<()> {
        if serial == 0 || serial >= self.next_serial {
            return Err(ForgeError::InvalidInput(format!(
                "serial {serial} was not issued by CA '{}'",
                self.name
            )));
        }
        let now = time::now()?;
        match self.revoked.entry(serial) {
            Entry::Occupied(_) => {
                log::debug!("serial {serial} already revoked");
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                log::info!("CA '{}' revoked serial {serial}", self.name);
            }
        }
        self.manifest_stale = true;
        Ok(())
    }

    /// Rebuild the CRL from the revoked set and publish it as `revoked.crl`.
    pub fn issue_crl(&mut self) -> ForgeResult<RevocationList> {
        let now = time::now()?;
        let revoked: Vec<(u64, DateTime)> = self.revoked.iter().map(|(s, t)| (*s, *t)).collect();
        let request = CrlRequest {
            number: self.next_crl_number,
            this_update: now,
            next_update: time::add_days(now, self.settings.crl_days)?,
            revoked: &revoked,
        };
        let issuer = self.certificate.certificate().tbs_certificate.subject.clone();
        let crl = CrlBuilderService::new(self.settings.digest).build(&issuer, &self.key, &request)?;
        self.next_crl_number += 1;
        self.crl = Some(crl.clone());
        self.publish(CRL_FILE_NAME, crl.clone())?;
        Ok(crl)
    }

    /// Hash every published object into a new manifest and sign it.
    pub fn issue_manifest(&mut self) -> ForgeResult<SignedObject> {
        let now = time::now()?;
        let manifest = Manifest::from_files(
            self.next_manifest_number,
            now,
            time::add_days(now, self.settings.manifest_days)?,
            self.settings.digest,
            self.published
                .iter()
                .map(|(name, object)| (name.as_str(), object.as_der())),
        );
        let content = manifest.to_content();
        let digest = self.settings.digest;
        let object = self.sign_with_registry(
            &content,
            digest,
            Some(MANIFEST_FILE_NAME),
            &ContentTypeRegistry::builtins(),
        )?;
        log::info!(
            "CA '{}' issued manifest number={} entries={}",
            self.name,
            manifest.number,
            manifest.entries.len()
        );
        self.next_manifest_number += 1;
        self.manifest = Some(object.clone());
        self.manifest_stale = false;
        Ok(object)
    }

    /// Fail unless the current manifest lists exactly the published objects
    /// with matching hashes.
    pub fn check_manifest(&self) -> ForgeResult<()> {
        let object = self.manifest.as_ref().ok_or_else(|| {
            ForgeError::InconsistentManifest(format!("CA '{}' has no manifest", self.name))
        })?;
        if self.manifest_stale {
            return Err(ForgeError::InconsistentManifest(format!(
                "CA '{}' changed its publish set after the last manifest",
                self.name
            )));
        }
        let manifest = Manifest::from_content(object.content())?;
        if manifest.entries.len() != self.published.len() {
            return Err(ForgeError::InconsistentManifest(format!(
                "manifest lists {} files, {} are published",
                manifest.entries.len(),
                self.published.len()
            )));
        }
        for (name, published) in &self.published {
            let entry = manifest.entry(name).ok_or_else(|| {
                ForgeError::InconsistentManifest(format!("'{name}' missing from manifest"))
            })?;
            if entry.hash != manifest.hash_algorithm.digest(published.as_der()) {
                return Err(ForgeError::InconsistentManifest(format!(
                    "hash of '{name}' does not match the manifest"
                )));
            }
        }
        Ok(())
    }

    /// Every file of the publication point, manifest included, by name.
    pub fn snapshot(&self) -> ForgeResult<Vec<(String, Vec<u8>)>> {
        if self.state() != CaState::Consistent {
            return Err(ForgeError::InconsistentManifest(format!(
                "CA '{}' is in state {:?}",
                self.name,
                self.state()
            )));
        }
        self.check_manifest()?;
        let mut files: Vec<(String, Vec<u8>)> = self
            .published
            .iter()
            .map(|(name, object)| (name.clone(), object.as_der().to_vec()))
            .collect();
        if let Some(manifest) = &self.manifest {
            files.push((MANIFEST_FILE_NAME.to_string(), manifest.to_der()));
        }
        files.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
        Ok(files)
    }
}

fn ca_subject_info_access(settings: &CaSettings, repo_path: &str) -> Vec<SubjectInfoAccess> {
    vec![
        SubjectInfoAccess::new(ID_AD_CA_REPOSITORY, settings.uri(&format!("{repo_path}/"))),
        SubjectInfoAccess::new(
            ID_AD_RPKI_MANIFEST,
            settings.uri(&format!("{repo_path}/{MANIFEST_FILE_NAME}")),
        ),
    ]
}

impl fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("name", &self.name)
            .field("repo_path", &self.repo_path)
            .field("state", &self.state())
            .field("published", &self.published.len())
            .field("revoked", &self.revoked.len())
            .field("next_serial", &self.next_serial)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::ID_CT_RPKI_GHOSTBUSTERS;
    use crate::domain::payloads::Ghostbusters;

    fn settings() -> CaSettings {
        CaSettings {
            key_bits: 1024,
            ..CaSettings::default()
        }
    }

    #[test]
    fn ca_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CertificateAuthority>();
    }

    #[test]
    fn state_machine_follows_publication() {
        let mut ta = TrustAnchor::new("TA", settings()).unwrap();
        assert_eq!(ta.state(), CaState::Created);

        let object = ta
            .sign(&Ghostbusters::new("Peter").to_content(), DigestAlgorithm::Sha256)
            .unwrap();
        let name = object.default_file_name();
        ta.publish(&name, object).unwrap();
        assert_eq!(ta.state(), CaState::Publishing);
        assert!(matches!(
            ta.check_manifest(),
            Err(ForgeError::InconsistentManifest(_))
        ));
        assert!(ta.snapshot().is_err());

        ta.issue_manifest().unwrap();
        assert_eq!(ta.state(), CaState::Consistent);
        ta.check_manifest().unwrap();
        let files = ta.snapshot().unwrap();
        let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"manifest.mft"));
        assert!(names.contains(&name.as_str()));

        ta.issue_crl().unwrap();
        assert_eq!(ta.state(), CaState::Publishing);
    }

    #[test]
    fn signed_object_names_its_publication_uri() {
        let mut ta = TrustAnchor::new("TA", settings()).unwrap();
        let object = ta
            .sign(&Ghostbusters::new("Winston").to_content(), DigestAlgorithm::Sha384)
            .unwrap();
        assert_eq!(object.content_type(), ID_CT_RPKI_GHOSTBUSTERS);
        assert_eq!(object.digest_algorithm(), DigestAlgorithm::Sha384);
        let uris = object.signer().sia_uris(&ID_AD_SIGNED_OBJECT).unwrap();
        assert_eq!(uris, vec![ta.object_uri(&object.default_file_name())]);
        assert!(!object.signer().is_ca().unwrap());
    }

    #[test]
    fn manifest_name_is_reserved() {
        let mut ta = TrustAnchor::new("TA", settings()).unwrap();
        let cert = ta.certificate().clone();
        assert!(ta.publish(MANIFEST_FILE_NAME, cert.clone()).is_err());
        assert!(ta.publish("a/b.cer", cert).is_err());
    }

    #[test]
    fn revoking_unknown_serial_fails() {
        let mut ta = TrustAnchor::new("TA", settings()).unwrap();
        assert!(ta.revoke(99).is_err());
        assert!(ta.revoke(0).is_err());
    }

    #[test]
    fn uri_path_strips_scheme() {
        assert_eq!(
            CaSettings::default().uri_path().unwrap(),
            "rpki.example.net/rpki"
        );
        let bad = CaSettings {
            base_uri: "nowhere".into(),
            ..CaSettings::default()
        };
        assert!(bad.uri_path().is_err());
    }
}

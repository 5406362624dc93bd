//! End-to-end behaviour of a two-level repository: trust anchor, one CA,
//! a custom signed object, manifests and CRLs.

mod common;

use common::{fast_settings, hello, hello_registry, HELLO_OID};
use rpki_forge::{
    CaState, CertificateAuthority, DigestAlgorithm, ForgeError, Manifest, Resources, SignedObject,
    TrustAnchor, TrustAnchorLocator,
};

fn repository() -> (TrustAnchor, CertificateAuthority) {
    let mut ta = TrustAnchor::new("TA", fast_settings()).unwrap();
    let ca = CertificateAuthority::new_child(
        &mut ta,
        "CA1",
        Resources::parse("10.0.0.0/8", "65000").unwrap(),
    )
    .unwrap();
    (ta, ca)
}

#[test]
fn custom_object_lands_in_manifest_and_crl() {
    let registry = hello_registry();
    let (_ta, mut ca) = repository();

    let object = ca
        .sign_with_registry(
            &hello("hi"),
            DigestAlgorithm::Sha256,
            Some("hello.sig"),
            &registry,
        )
        .unwrap();
    ca.publish("hello.sig", object.clone()).unwrap();
    let manifest_object = ca.issue_manifest().unwrap();

    let manifest = Manifest::from_content(manifest_object.content()).unwrap();
    assert_eq!(manifest.entries.len(), 1);
    assert_eq!(manifest.entries[0].file, "hello.sig");
    assert_eq!(
        manifest.entries[0].hash,
        DigestAlgorithm::Sha256.digest(object.as_der())
    );
    assert_eq!(ca.state(), CaState::Consistent);

    let decoded = SignedObject::decode(object.as_der(), &registry).unwrap();
    assert_eq!(decoded.content_type(), HELLO_OID);
    assert_eq!(
        decoded.content().value().get("msg").and_then(|v| v.as_str()),
        Some("hi")
    );

    let ee_serial = object.signer().serial().unwrap().to_u64().unwrap();
    ca.revoke(ee_serial).unwrap();
    let crl = ca.issue_crl().unwrap();
    let serials: Vec<Option<u64>> = crl
        .revoked()
        .unwrap()
        .into_iter()
        .map(|(s, _)| s.to_u64())
        .collect();
    assert_eq!(serials, vec![Some(ee_serial)]);
}

#[test]
fn state_follows_publication_lifecycle() {
    let (_ta, mut ca) = repository();
    assert_eq!(ca.state(), CaState::Created);
    assert!(matches!(
        ca.check_manifest(),
        Err(ForgeError::InconsistentManifest(_))
    ));

    ca.issue_crl().unwrap();
    assert_eq!(ca.state(), CaState::Publishing);
    assert!(ca.snapshot().is_err());

    ca.issue_manifest().unwrap();
    assert_eq!(ca.state(), CaState::Consistent);
    ca.check_manifest().unwrap();
    let names: Vec<String> = ca.snapshot().unwrap().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["manifest.mft", "revoked.crl"]);

    ca.issue_crl().unwrap();
    assert_eq!(ca.state(), CaState::Publishing);
    assert!(matches!(
        ca.check_manifest(),
        Err(ForgeError::InconsistentManifest(_))
    ));
}

#[test]
fn revocation_is_idempotent() {
    let (mut ta, _ca) = repository();
    let ca_serial = 2;
    ta.revoke(ca_serial).unwrap();
    let first = ta.revoked().get(&ca_serial).copied().unwrap();
    ta.revoke(ca_serial).unwrap();
    assert_eq!(ta.revoked().len(), 1);
    assert_eq!(ta.revoked().get(&ca_serial).copied().unwrap(), first);

    let crl = ta.issue_crl().unwrap();
    assert_eq!(crl.revoked().unwrap().len(), 1);
    assert!(ta.revoke(999).is_err());
}

#[test]
fn crl_numbers_increase() {
    let (_ta, mut ca) = repository();
    let first = ca.issue_crl().unwrap().number().unwrap().to_u64().unwrap();
    let second = ca.issue_crl().unwrap().number().unwrap().to_u64().unwrap();
    assert!(second > first);
    assert_eq!(ca.published().len(), 1);
}

#[test]
fn child_certificate_chains_to_trust_anchor() {
    let (ta, ca) = repository();
    let cert = ca.certificate();
    assert!(cert.is_ca().unwrap());
    assert_eq!(
        cert.authority_key_identifier().unwrap(),
        Some(ta.certificate().key_identifier())
    );
    assert_eq!(cert.issuer(), ta.certificate().subject());
    assert_eq!(ca.repo_path(), "TA/CA1");
    assert_eq!(
        ca.certificate_uri(),
        "rsync://rpki.example.net/rpki/TA/CA1.cer"
    );
    assert!(ta.published().contains_key("CA1.cer"));
    assert_eq!(
        cert.resources().unwrap(),
        Resources::parse("10.0.0.0/8", "65000").unwrap()
    );
}

#[test]
fn locator_names_trust_anchor_certificate() {
    let (ta, _ca) = repository();
    let text = ta.locator().to_text().unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("rsync://rpki.example.net/rpki/TA.cer"));
    assert_eq!(lines.next(), Some(""));
    assert!(!text.ends_with('\n'));

    let parsed = TrustAnchorLocator::parse(&text).unwrap();
    assert_eq!(&parsed.public_key_info, ta.certificate().public_key_info());
}

#[test]
fn republished_name_carries_new_hash() {
    let registry = hello_registry();
    let (_ta, mut ca) = repository();
    let mut sign = |msg: &str| {
        ca.sign_with_registry(
            &hello(msg),
            DigestAlgorithm::Sha256,
            Some("hello.sig"),
            &registry,
        )
        .unwrap()
    };
    let first = sign("first");
    let second = sign("second");

    ca.publish("hello.sig", first.clone()).unwrap();
    ca.issue_manifest().unwrap();
    ca.publish("hello.sig", second.clone()).unwrap();
    let manifest_object = ca.issue_manifest().unwrap();
    ca.check_manifest().unwrap();

    let manifest = Manifest::from_content(manifest_object.content()).unwrap();
    let listed: Vec<_> = manifest
        .entries
        .iter()
        .filter(|e| e.file == "hello.sig")
        .collect();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].hash, DigestAlgorithm::Sha256.digest(second.as_der()));
    assert_ne!(listed[0].hash, DigestAlgorithm::Sha256.digest(first.as_der()));
}

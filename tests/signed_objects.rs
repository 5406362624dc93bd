//! Encoding, decoding and verification of signed objects for every built-in
//! payload type and for runtime-registered ones.

mod common;

use common::{fast_settings, hello, hello_registry, HELLO_OID};
use rpki_forge::{
    CertificateAuthority, ContentTypeRegistry, DigestAlgorithm, ForgeError, Ghostbusters,
    Manifest, Resources, RouteOriginAttestation, SignedChecklist, SignedObject, SignedUriList,
    TrustAnchor, VerifyWorkflow,
};

fn authority() -> (TrustAnchor, CertificateAuthority) {
    let mut ta = TrustAnchor::new("TA", fast_settings()).unwrap();
    let ca = CertificateAuthority::new_child(
        &mut ta,
        "CA",
        Resources::parse("10.0.0.0/8, 2001:db8::/32", "65000").unwrap(),
    )
    .unwrap();
    (ta, ca)
}

#[test]
fn roa_survives_decode() {
    let (_ta, mut ca) = authority();
    let roa = RouteOriginAttestation::new(
        65000,
        vec!["10.0.0.0/8-24".parse().unwrap(), "2001:db8::/32".parse().unwrap()],
    )
    .unwrap();
    let object = ca.sign(&roa.to_content(), DigestAlgorithm::Sha256).unwrap();
    assert!(object.default_file_name().ends_with(".roa"));

    let decoded = SignedObject::decode(object.as_der(), &ContentTypeRegistry::builtins()).unwrap();
    assert_eq!(RouteOriginAttestation::from_content(decoded.content()).unwrap(), roa);
    assert_eq!(decoded.signer(), object.signer());
}

#[test]
fn ghostbusters_survives_decode() {
    let (_ta, mut ca) = authority();
    let gbr = Ghostbusters::new("Jane Doe")
        .with_org("Example Org")
        .with_email("jane@example.net");
    let object = ca.sign(&gbr.to_content(), DigestAlgorithm::Sha256).unwrap();

    let decoded = SignedObject::decode(object.as_der(), &ContentTypeRegistry::builtins()).unwrap();
    assert_eq!(Ghostbusters::from_content(decoded.content()).unwrap(), gbr);
    assert_eq!(decoded.file_ext(), "gbr");
}

#[test]
fn checklist_and_uri_list_survive_decode() {
    let (_ta, mut ca) = authority();
    let registry = ContentTypeRegistry::builtins();
    let resources = Resources::parse("10.1.0.0/16", "65000").unwrap();

    let files: [(Option<&str>, &[u8]); 1] = [(Some("loa.pdf"), b"authorization")];
    let rsc = SignedChecklist::from_files(resources.clone(), DigestAlgorithm::Sha256, files)
        .unwrap();
    let object = ca.sign(&rsc.to_content().unwrap(), DigestAlgorithm::Sha256).unwrap();
    assert!(object.default_file_name().ends_with(".sig"));
    let decoded = SignedObject::decode(object.as_der(), &registry).unwrap();
    assert_eq!(SignedChecklist::from_content(decoded.content()).unwrap(), rsc);
    assert_eq!(decoded.signer().resources().unwrap(), resources);

    let documents: [(&str, &[u8]); 1] = [("https://example.net/peering.md", b"peering")];
    let rsu = SignedUriList::from_documents(resources, DigestAlgorithm::Sha256, None, documents)
        .unwrap();
    let object = ca.sign(&rsu.to_content().unwrap(), DigestAlgorithm::Sha256).unwrap();
    assert!(object.default_file_name().ends_with(".rsu"));
    let decoded = SignedObject::decode(object.as_der(), &registry).unwrap();
    assert_eq!(SignedUriList::from_content(decoded.content()).unwrap(), rsu);
}

#[test]
fn manifest_survives_decode() {
    let (_ta, mut ca) = authority();
    ca.issue_crl().unwrap();
    let object = ca.issue_manifest().unwrap();
    let decoded = SignedObject::decode(object.as_der(), &ContentTypeRegistry::builtins()).unwrap();
    let manifest = Manifest::from_content(decoded.content()).unwrap();
    assert_eq!(manifest, Manifest::from_content(object.content()).unwrap());
    assert_eq!(manifest.entries[0].file, "revoked.crl");
    assert_eq!(
        object.signer().sia_uris(&rpki_forge::domain::constants::ID_AD_SIGNED_OBJECT).unwrap(),
        vec!["rsync://rpki.example.net/rpki/TA/CA/manifest.mft".to_string()]
    );
}

#[test]
fn message_digest_matches_econtent_for_every_algorithm() {
    let registry = hello_registry();
    let (_ta, mut ca) = authority();
    for algo in [
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha384,
        DigestAlgorithm::Sha512,
    ] {
        let object = ca
            .sign_with_registry(&hello("digest"), algo, None, &registry)
            .unwrap();
        let decoded = SignedObject::decode(object.as_der(), &registry).unwrap();
        assert_eq!(decoded.digest_algorithm(), algo);
        assert_eq!(decoded.signed_attributes().message_digest.len(), algo.digest_size());
        assert_eq!(
            decoded.signed_attributes().message_digest,
            algo.digest(decoded.econtent())
        );
    }
}

#[test]
fn unregistered_content_type_is_rejected() {
    let registry = hello_registry();
    let (_ta, mut ca) = authority();
    let object = ca
        .sign_with_registry(&hello("x"), DigestAlgorithm::Sha256, None, &registry)
        .unwrap();

    let err = SignedObject::decode(object.as_der(), &ContentTypeRegistry::builtins()).unwrap_err();
    assert!(matches!(err, ForgeError::UnknownContentType(_)));

    let err = ca
        .sign(&hello("x"), DigestAlgorithm::Sha256)
        .unwrap_err();
    assert!(matches!(err, ForgeError::UnknownContentType(_)));
}

#[test]
fn verification_checks_signature_and_issuer() {
    let (ta, mut ca) = authority();
    let object = ca
        .sign(&Ghostbusters::new("Jane Doe").to_content(), DigestAlgorithm::Sha256)
        .unwrap();
    let registry = ContentTypeRegistry::builtins();
    let workflow = VerifyWorkflow::new(&registry);

    let report = workflow.run(object.as_der(), Some(ca.certificate())).unwrap();
    assert!(report.success());

    let report = workflow.run(object.as_der(), Some(ta.certificate())).unwrap();
    assert_eq!(report.ee_cert_ok, Some(false));
    assert!(!report.success());

    // The signature value is the final element of the DER.
    let mut tampered = object.to_der();
    if let Some(last) = tampered.last_mut() {
        *last ^= 0x01;
    }
    let report = workflow.run(&tampered, None).unwrap();
    assert!(report.digest_ok);
    assert!(!report.signature_ok);
}

#[test]
fn truncated_object_is_malformed() {
    let (_ta, mut ca) = authority();
    let object = ca
        .sign(&Ghostbusters::new("Jane Doe").to_content(), DigestAlgorithm::Sha256)
        .unwrap();
    let der = object.as_der();
    let err = SignedObject::decode(&der[..der.len() / 2], &ContentTypeRegistry::builtins())
        .unwrap_err();
    assert!(matches!(err, ForgeError::MalformedObject(_)));
}

fn replace_first(der: &mut [u8], needle: &[u8], replacement: &[u8]) {
    let at = der
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("pattern present");
    der[at..at + replacement.len()].copy_from_slice(replacement);
}

#[test]
fn altered_econtent_fails_message_digest() {
    let registry = hello_registry();
    let (_ta, mut ca) = authority();
    let object = ca
        .sign_with_registry(&hello("digest-check"), DigestAlgorithm::Sha256, None, &registry)
        .unwrap();

    let mut der = object.to_der();
    replace_first(&mut der, b"digest-check", b"Digest-check");
    let err = SignedObject::decode(&der, &registry).unwrap_err();
    assert!(matches!(err, ForgeError::MalformedObject(ref m) if m.contains("messageDigest")));
}

#[test]
fn content_type_attribute_must_match_econtent_type() {
    let registry = hello_registry();
    let (_ta, mut ca) = authority();
    let object = ca
        .sign_with_registry(&hello("typed"), DigestAlgorithm::Sha256, None, &registry)
        .unwrap();

    // eContentType precedes the signed attributes, so the first match is it
    let oid = HELLO_OID.as_bytes();
    let mut tlv = vec![0x06, oid.len() as u8];
    tlv.extend_from_slice(oid);
    let mut altered = tlv.clone();
    *altered.last_mut().unwrap() += 1;

    let mut der = object.to_der();
    replace_first(&mut der, &tlv, &altered);
    let err = SignedObject::decode(&der, &registry).unwrap_err();
    assert!(matches!(err, ForgeError::MalformedObject(ref m) if m.contains("contentType")));
}

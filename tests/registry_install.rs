//! Process-wide registry installation. Kept in its own test binary because
//! installation can only happen once per process.

mod common;

use common::{fast_settings, hello, hello_registry, HELLO_OID};
use rpki_forge::{ContentTypeRegistry, DigestAlgorithm, SignedObject, TrustAnchor};

#[test]
fn installed_registry_serves_sign_and_decode() {
    let installed = hello_registry().install().unwrap();
    assert!(installed.lookup(&HELLO_OID).is_ok());
    assert_eq!(
        ContentTypeRegistry::global().lookup(&HELLO_OID).unwrap().name,
        "hello"
    );
    assert!(ContentTypeRegistry::builtins().install().is_err());

    let mut ta = TrustAnchor::new("TA", fast_settings()).unwrap();
    let object = ta.sign(&hello("global"), DigestAlgorithm::Sha256).unwrap();
    assert!(object.default_file_name().ends_with(".sig"));

    let decoded = SignedObject::decode(object.as_der(), ContentTypeRegistry::global()).unwrap();
    assert_eq!(decoded.content().value(), hello("global").value());
}

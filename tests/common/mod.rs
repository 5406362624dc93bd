//! Shared fixtures for integration tests.

#![allow(dead_code)]

use der::oid::ObjectIdentifier;
use rpki_forge::{
    CaSettings, ContentTypeDescriptor, ContentTypeRegistry, EncapsulatedContent, Field,
    RegistryBuilder, Schema, Value,
};

/// Private-arc content type used to exercise runtime registration.
pub const HELLO_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.3.4.5");

/// Small keys keep the suites fast; nothing here depends on key strength.
pub fn fast_settings() -> CaSettings {
    CaSettings {
        key_bits: 1024,
        ..CaSettings::default()
    }
}

pub fn hello_descriptor() -> ContentTypeDescriptor {
    ContentTypeDescriptor::new(
        HELLO_OID,
        "hello",
        "sig",
        Schema::Sequence(vec![Field::required("msg", Schema::Utf8String)]),
    )
}

pub fn hello_registry() -> ContentTypeRegistry {
    RegistryBuilder::new()
        .with_builtins()
        .and_then(|b| b.register(hello_descriptor()))
        .expect("registry builds")
        .build()
}

pub fn hello(msg: &str) -> EncapsulatedContent {
    EncapsulatedContent::construct(HELLO_OID, Value::record([("msg", Value::utf8(msg))]))
}

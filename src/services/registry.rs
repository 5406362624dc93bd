//! Content-type registry.
//!
//! Maps eContentType OIDs to payload schemas. A registry is assembled once
//! through `RegistryBuilder`, frozen, and optionally installed process-wide;
//! after that it is read-only.

use std::sync::OnceLock;

use der::asn1::ObjectIdentifier;

use crate::domain::content::ContentTypeDescriptor;
use crate::domain::payloads;
use crate::infra::error::{ForgeError, ForgeResult};

static INSTALLED: OnceLock<ContentTypeRegistry> = OnceLock::new();
static BUILTINS: OnceLock<ContentTypeRegistry> = OnceLock::new();

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    descriptors: Vec<ContentTypeDescriptor>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `descriptor.oid` to its schema.
    ///
    /// Fails with `DuplicateOid` when the OID is already bound to a different
    /// schema; registering the same descriptor twice is a no-op.
    pub fn register(mut self, descriptor: ContentTypeDescriptor) -> ForgeResult<Self> {
        if let Some(existing) = self.descriptors.iter().find(|d| d.oid == descriptor.oid) {
            if existing.schema == descriptor.schema {
                log::debug!("content type {} already registered", descriptor.oid);
                return Ok(self);
            }
            return Err(ForgeError::DuplicateOid(format!(
                "{} is bound to '{}'",
                descriptor.oid, existing.name
            )));
        }
        descriptor.schema.validate()?;
        log::debug!(
            "registered content type {} ({}, .{})",
            descriptor.oid,
            descriptor.name,
            descriptor.file_ext
        );
        self.descriptors.push(descriptor);
        Ok(self)
    }

    /// Register every built-in RPKI content type.
    pub fn with_builtins(self) -> ForgeResult<Self> {
        payloads::builtin_descriptors()
            .into_iter()
            .try_fold(self, RegistryBuilder::register)
    }

    #[must_use]
    pub fn build(self) -> ContentTypeRegistry {
        ContentTypeRegistry {
            descriptors: self.descriptors,
        }
    }
}

/// Frozen OID → schema mapping.
#[derive(Debug, Clone)]
pub struct ContentTypeRegistry {
    descriptors: Vec<ContentTypeDescriptor>,
}

impl ContentTypeRegistry {
    /// Registry holding only the built-in content types.
    #[must_use]
    pub fn builtins() -> Self {
        Self {
            descriptors: payloads::builtin_descriptors(),
        }
    }

    pub fn lookup(&self, oid: &ObjectIdentifier) -> ForgeResult<&ContentTypeDescriptor> {
        self.descriptors
            .iter()
            .find(|d| &d.oid == oid)
            .ok_or_else(|| ForgeError::UnknownContentType(oid.to_string()))
    }

    /// First descriptor registered for a file extension, with or without the
    /// leading dot. Several types may share `.sig`.
    #[must_use]
    pub fn by_file_ext(&self, ext: &str) -> Option<&ContentTypeDescriptor> {
        let ext = ext.trim_start_matches('.');
        self.descriptors
            .iter()
            .find(|d| d.file_ext.eq_ignore_ascii_case(ext))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentTypeDescriptor> {
        self.descriptors.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Publish this registry process-wide. Succeeds at most once.
    pub fn install(self) -> ForgeResult<&'static ContentTypeRegistry> {
        let count = self.len();
        INSTALLED
            .set(self)
            .map_err(|_| ForgeError::InvalidInput("content type registry already installed".into()))?;
        log::info!("installed content type registry with {count} types");
        INSTALLED
            .get()
            .ok_or_else(|| ForgeError::InvalidInput("content type registry not installed".into()))
    }

    /// Installed registry, or the built-in one when nothing was installed.
    pub fn global() -> &'static ContentTypeRegistry {
        match INSTALLED.get() {
            Some(registry) => registry,
            None => BUILTINS.get_or_init(Self::builtins),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::ID_CT_RPKI_MANIFEST;
    use crate::domain::schema::{Field, Schema};

    fn message(oid: &str, schema: Schema) -> ContentTypeDescriptor {
        ContentTypeDescriptor::new(ObjectIdentifier::new_unwrap(oid), "message", "msg", schema)
    }

    fn text_schema() -> Schema {
        Schema::sequence(vec![Field::required("msg", Schema::Utf8String)])
    }

    #[test]
    fn duplicate_oid_with_other_schema_is_rejected() {
        let builder = RegistryBuilder::new()
            .register(message("1.2.3.4.5", text_schema()))
            .unwrap();
        let err = builder
            .register(message("1.2.3.4.5", Schema::Integer))
            .unwrap_err();
        assert!(matches!(err, ForgeError::DuplicateOid(_)));
    }

    #[test]
    fn identical_registration_is_idempotent() {
        let registry = RegistryBuilder::new()
            .register(message("1.2.3.4.5", text_schema()))
            .unwrap()
            .register(message("1.2.3.4.5", text_schema()))
            .unwrap()
            .build();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_of_unbound_oid_fails() {
        let registry = RegistryBuilder::new().build();
        let err = registry
            .lookup(&ObjectIdentifier::new_unwrap("1.2.3.4.5"))
            .unwrap_err();
        assert!(matches!(err, ForgeError::UnknownContentType(_)));
    }

    #[test]
    fn builtins_are_found_by_oid_and_extension() {
        let registry = RegistryBuilder::new()
            .with_builtins()
            .unwrap()
            .register(message("1.2.3.4.5", text_schema()))
            .unwrap()
            .build();
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.lookup(&ID_CT_RPKI_MANIFEST).unwrap().file_ext, "mft");
        assert_eq!(registry.by_file_ext(".roa").unwrap().name, "routeOriginAuthz");
        assert_eq!(registry.by_file_ext("GBR").unwrap().name, "rpkiGhostbusters");
        assert_eq!(registry.by_file_ext("rsu").unwrap().name, "signedURIList");
        assert_eq!(registry.by_file_ext("sig").unwrap().name, "signedChecklist");
        assert!(registry.by_file_ext("cer").is_none());
    }

    #[test]
    fn global_falls_back_to_builtins() {
        let registry = ContentTypeRegistry::global();
        assert!(registry.lookup(&ID_CT_RPKI_MANIFEST).is_ok());
    }
}

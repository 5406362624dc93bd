//! Content-type descriptors and encapsulated payload values.

use std::fmt;

use der::asn1::ObjectIdentifier;

use crate::domain::resources::Resources;
use crate::domain::schema::Schema;
use crate::domain::value::Value;
use crate::infra::error::ForgeResult;
use crate::services::codec;
use crate::services::registry::ContentTypeRegistry;

/// Binding of an eContentType OID to its payload schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeDescriptor {
    pub oid: ObjectIdentifier,
    pub name: String,
    /// File extension without the leading dot.
    pub file_ext: String,
    pub schema: Schema,
}

impl ContentTypeDescriptor {
    #[must_use]
    pub fn new(
        oid: ObjectIdentifier,
        name: impl Into<String>,
        file_ext: impl Into<String>,
        schema: Schema,
    ) -> Self {
        Self {
            oid,
            name: name.into(),
            file_ext: file_ext.into().trim_start_matches('.').to_string(),
            schema,
        }
    }
}

/// Semantic payload tagged with its content type.
///
/// Carries the resources the single-use EE certificate must hold when the
/// payload is signed; payloads that do not care inherit everything.
#[derive(Clone, PartialEq, Eq)]
pub struct EncapsulatedContent {
    content_type: ObjectIdentifier,
    value: Value,
    resources: Resources,
}

impl EncapsulatedContent {
    /// In-memory payload; nothing is serialized yet.
    #[must_use]
    pub fn construct(content_type: ObjectIdentifier, value: Value) -> Self {
        Self {
            content_type,
            value,
            resources: Resources::inherit(),
        }
    }

    #[must_use]
    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    #[must_use]
    pub fn content_type(&self) -> ObjectIdentifier {
        self.content_type
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// eContent bytes under the registered schema.
    pub fn encode(&self, registry: &ContentTypeRegistry) -> ForgeResult<Vec<u8>> {
        let descriptor = registry.lookup(&self.content_type)?;
        codec::encode(&descriptor.schema, &self.value)
    }

    pub fn decode(
        content_type: ObjectIdentifier,
        econtent: &[u8],
        registry: &ContentTypeRegistry,
    ) -> ForgeResult<Self> {
        let descriptor = registry.lookup(&content_type)?;
        let value = codec::decode(&descriptor.schema, econtent)?;
        Ok(Self::construct(content_type, value))
    }
}

impl fmt::Debug for EncapsulatedContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EncapsulatedContent(type={}, value={})",
            self.content_type,
            self.value.kind()
        )
    }
}

//! Signed URI list payload.
//!
//! Binds remote documents to the resources of the EE certificate by URI,
//! size and hash. Fetching the documents is the caller's concern; the list is
//! built from bytes already in hand.

use der::asn1::ObjectIdentifier;

use crate::domain::constants::ID_CT_SIGNED_URI_LIST;
use crate::domain::content::{ContentTypeDescriptor, EncapsulatedContent};
use crate::domain::crypto::DigestAlgorithm;
use crate::domain::payloads::rsc::{algorithm_oid, algorithm_schema, algorithm_value};
use crate::domain::resources::Resources;
use crate::domain::schema::{Field, Schema};
use crate::domain::value::Value;
use crate::infra::error::{ForgeError, ForgeResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriEntry {
    pub uri: String,
    pub size: u64,
    pub hash: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUriList {
    pub resources: Resources,
    pub digest_algorithm: DigestAlgorithm,
    /// Media or content type shared by every listed document.
    pub inner_type: Option<ObjectIdentifier>,
    pub entries: Vec<UriEntry>,
}

impl SignedUriList {
    /// List over `(uri, bytes)` pairs in the given order.
    pub fn from_documents<'a, I>(
        resources: Resources,
        digest_algorithm: DigestAlgorithm,
        inner_type: Option<ObjectIdentifier>,
        documents: I,
    ) -> ForgeResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let entries = documents
            .into_iter()
            .map(|(uri, bytes)| {
                let size = u64::try_from(bytes.len())
                    .map_err(|_| ForgeError::InvalidInput(format!("'{uri}' is too large")))?;
                Ok(UriEntry {
                    uri: uri.to_string(),
                    size,
                    hash: digest_algorithm.digest(bytes),
                })
            })
            .collect::<ForgeResult<Vec<_>>>()?;
        resources.to_block_value()?;
        Ok(Self {
            resources,
            digest_algorithm,
            inner_type,
            entries,
        })
    }

    pub fn schema() -> Schema {
        Schema::sequence(vec![
            Field::required("version", Schema::Integer)
                .explicit(0)
                .with_default(Value::int(0)),
            Field::required("resources", Resources::block_schema()),
            Field::required("digestAlgorithm", algorithm_schema()),
            Field::required("type", Schema::Oid).optional(),
            Field::required(
                "uriList",
                Schema::sequence_of(Schema::sequence(vec![
                    Field::required("uri", Schema::Ia5String),
                    Field::required("size", Schema::Integer),
                    Field::required("hash", Schema::OctetString),
                ])),
            ),
        ])
    }

    pub fn descriptor() -> ContentTypeDescriptor {
        ContentTypeDescriptor::new(ID_CT_SIGNED_URI_LIST, "signedURIList", "rsu", Self::schema())
    }

    pub fn to_content(&self) -> ForgeResult<EncapsulatedContent> {
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                Value::record([
                    ("uri", Value::ia5(entry.uri.clone())),
                    ("size", Value::int(entry.size)),
                    ("hash", Value::Octets(entry.hash.clone())),
                ])
            })
            .collect();
        let mut members = vec![
            ("version", Value::int(0)),
            ("resources", self.resources.to_block_value()?),
            ("digestAlgorithm", algorithm_value(self.digest_algorithm.oid())),
            ("uriList", Value::List(entries)),
        ];
        if let Some(oid) = self.inner_type {
            members.push(("type", Value::Oid(oid)));
        }
        Ok(EncapsulatedContent::construct(ID_CT_SIGNED_URI_LIST, Value::record(members))
            .with_resources(self.resources.clone()))
    }

    pub fn from_content(content: &EncapsulatedContent) -> ForgeResult<Self> {
        if content.content_type() != ID_CT_SIGNED_URI_LIST {
            return Err(ForgeError::InvalidInput(format!(
                "{} is not a signed URI list",
                content.content_type()
            )));
        }
        let malformed = |what: &str| ForgeError::DecodeError(format!("signed URI list {what}"));
        let value = content.value();
        let resources = Resources::from_block_value(
            value.get("resources").ok_or_else(|| malformed("lacks resources"))?,
        )?;
        let algorithm = algorithm_oid(value.get("digestAlgorithm"))
            .ok_or_else(|| malformed("lacks digestAlgorithm"))?;
        let entries = value
            .get("uriList")
            .and_then(Value::as_list)
            .ok_or_else(|| malformed("lacks uriList"))?
            .iter()
            .map(|entry| {
                let uri = entry.get("uri").and_then(Value::as_str);
                let size = entry.get("size").and_then(Value::as_int).and_then(|n| n.to_u64());
                let hash = entry.get("hash").and_then(Value::as_octets);
                match (uri, size, hash) {
                    (Some(uri), Some(size), Some(hash)) => Ok(UriEntry {
                        uri: uri.to_string(),
                        size,
                        hash: hash.to_vec(),
                    }),
                    _ => Err(malformed("has a malformed entry")),
                }
            })
            .collect::<ForgeResult<_>>()?;
        Ok(Self {
            resources,
            digest_algorithm: DigestAlgorithm::from_oid(&algorithm)?,
            inner_type: value.get("type").and_then(Value::as_oid),
            entries,
        })
    }

    /// Whether `bytes` fetched from `uri` match the listed size and hash.
    #[must_use]
    pub fn matches(&self, uri: &str, bytes: &[u8]) -> bool {
        self.entries.iter().any(|entry| {
            entry.uri == uri
                && u64::try_from(bytes.len()).is_ok_and(|len| len == entry.size)
                && entry.hash == self.digest_algorithm.digest(bytes)
        })
    }
}

//! RFC 9323 signed checklist payload.
//!
//! A checklist commits to the hashes of arbitrary files under the resources
//! of its EE certificate. File names are optional; a checklist over unnamed
//! documents is still well formed.

use der::asn1::ObjectIdentifier;

use crate::domain::constants::ID_CT_SIGNED_CHECKLIST;
use crate::domain::content::{ContentTypeDescriptor, EncapsulatedContent};
use crate::domain::crypto::DigestAlgorithm;
use crate::domain::resources::Resources;
use crate::domain::schema::{Field, Schema};
use crate::domain::value::Value;
use crate::infra::error::{ForgeError, ForgeResult};

/// One `FileNameAndHash` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistEntry {
    pub file: Option<String>,
    pub hash: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedChecklist {
    pub resources: Resources,
    pub digest_algorithm: DigestAlgorithm,
    pub entries: Vec<ChecklistEntry>,
}

impl SignedChecklist {
    /// Checklist over `(name, bytes)` pairs in the given order.
    pub fn from_files<'a, I>(
        resources: Resources,
        digest_algorithm: DigestAlgorithm,
        files: I,
    ) -> ForgeResult<Self>
    where
        I: IntoIterator<Item = (Option<&'a str>, &'a [u8])>,
    {
        let entries: Vec<ChecklistEntry> = files
            .into_iter()
            .map(|(file, bytes)| ChecklistEntry {
                file: file.map(str::to_string),
                hash: digest_algorithm.digest(bytes),
            })
            .collect();
        if entries.is_empty() {
            return Err(ForgeError::InvalidInput(
                "a signed checklist needs at least one entry".into(),
            ));
        }
        // fails early on inherit or empty resources
        resources.to_block_value()?;
        Ok(Self {
            resources,
            digest_algorithm,
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
            Field::required(
                "checkList",
                Schema::sequence_of(Schema::sequence(vec![
                    Field::required("fileName", Schema::Ia5String).optional(),
                    Field::required("hash", Schema::OctetString),
                ])),
            ),
        ])
    }

    pub fn descriptor() -> ContentTypeDescriptor {
        ContentTypeDescriptor::new(ID_CT_SIGNED_CHECKLIST, "signedChecklist", "sig", Self::schema())
    }

    /// Payload whose EE certificate carries exactly the checklist resources.
    pub fn to_content(&self) -> ForgeResult<EncapsulatedContent> {
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                let mut members = vec![("hash", Value::Octets(entry.hash.clone()))];
                if let Some(file) = &entry.file {
                    members.push(("fileName", Value::ia5(file.clone())));
                }
                Value::record(members)
            })
            .collect();
        let value = Value::record([
            ("version", Value::int(0)),
            ("resources", self.resources.to_block_value()?),
            ("digestAlgorithm", algorithm_value(self.digest_algorithm.oid())),
            ("checkList", Value::List(entries)),
        ]);
        Ok(EncapsulatedContent::construct(ID_CT_SIGNED_CHECKLIST, value)
            .with_resources(self.resources.clone()))
    }

    pub fn from_content(content: &EncapsulatedContent) -> ForgeResult<Self> {
        if content.content_type() != ID_CT_SIGNED_CHECKLIST {
            return Err(ForgeError::InvalidInput(format!(
                "{} is not a signed checklist",
                content.content_type()
            )));
        }
        let malformed = |what: &str| ForgeError::DecodeError(format!("signed checklist {what}"));
        let value = content.value();
        let resources = Resources::from_block_value(
            value.get("resources").ok_or_else(|| malformed("lacks resources"))?,
        )?;
        let digest_algorithm = DigestAlgorithm::from_oid(&algorithm_oid(
            value.get("digestAlgorithm"),
        )
        .ok_or_else(|| malformed("lacks digestAlgorithm"))?)?;
        let entries = value
            .get("checkList")
            .and_then(Value::as_list)
            .ok_or_else(|| malformed("lacks checkList"))?
            .iter()
            .map(|entry| {
                let hash = entry
                    .get("hash")
                    .and_then(Value::as_octets)
                    .ok_or_else(|| malformed("entry lacks a hash"))?;
                Ok(ChecklistEntry {
                    file: entry.get("fileName").and_then(Value::as_str).map(str::to_string),
                    hash: hash.to_vec(),
                })
            })
            .collect::<ForgeResult<_>>()?;
        Ok(Self {
            resources,
            digest_algorithm,
            entries,
        })
    }

    /// Entry whose hash matches `bytes`, if any.
    #[must_use]
    pub fn find(&self, bytes: &[u8]) -> Option<&ChecklistEntry> {
        let hash = self.digest_algorithm.digest(bytes);
        self.entries.iter().find(|e| e.hash == hash)
    }
}

/// `AlgorithmIdentifier` with absent parameters.
pub(crate) fn algorithm_schema() -> Schema {
    Schema::sequence(vec![
        Field::required("algorithm", Schema::Oid),
        Field::required("parameters", Schema::Any).optional(),
    ])
}

pub(crate) fn algorithm_value(oid: ObjectIdentifier) -> Value {
    Value::record([("algorithm", Value::Oid(oid))])
}

pub(crate) fn algorithm_oid(value: Option<&Value>) -> Option<ObjectIdentifier> {
    value?.get("algorithm")?.as_oid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::registry::ContentTypeRegistry;

    fn resources() -> Resources {
        Resources::parse("192.0.2.0/24", "64496").unwrap()
    }

    #[test]
    fn survives_econtent_encoding() {
        let files: [(Option<&str>, &[u8]); 2] =
            [(Some("loa.pdf"), b"letter"), (None, b"anonymous")];
        let rsc = SignedChecklist::from_files(resources(), DigestAlgorithm::Sha256, files).unwrap();
        let content = rsc.to_content().unwrap();
        let registry = ContentTypeRegistry::builtins();
        let der = content.encode(&registry).unwrap();
        let decoded =
            EncapsulatedContent::decode(ID_CT_SIGNED_CHECKLIST, &der, &registry).unwrap();
        assert_eq!(decoded.value(), content.value());

        let back = SignedChecklist::from_content(&decoded).unwrap();
        assert_eq!(back, rsc);
        assert_eq!(back.entries[1].file, None);
        assert_eq!(
            back.find(b"letter").and_then(|e| e.file.as_deref()),
            Some("loa.pdf")
        );
        assert!(back.find(b"other").is_none());
    }

    #[test]
    fn ee_resources_match_checklist() {
        let files: [(Option<&str>, &[u8]); 1] = [(Some("a"), b"a")];
        let rsc = SignedChecklist::from_files(resources(), DigestAlgorithm::Sha384, files).unwrap();
        assert_eq!(rsc.to_content().unwrap().resources(), &resources());
        assert_eq!(rsc.entries[0].hash.len(), 48);
    }

    #[test]
    fn empty_or_inheriting_checklists_are_rejected() {
        assert!(SignedChecklist::from_files(resources(), DigestAlgorithm::Sha256, []).is_err());
        let files: [(Option<&str>, &[u8]); 1] = [(Some("a"), b"a")];
        assert!(
            SignedChecklist::from_files(Resources::inherit(), DigestAlgorithm::Sha256, files)
                .is_err()
        );
    }
}

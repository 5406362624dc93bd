//! RFC 6486 manifest payload.

use der::DateTime;

use crate::domain::constants::ID_CT_RPKI_MANIFEST;
use crate::domain::content::{ContentTypeDescriptor, EncapsulatedContent};
use crate::domain::crypto::DigestAlgorithm;
use crate::domain::schema::{Field, Schema};
use crate::domain::value::{BitValue, IntValue, Value};
use crate::infra::error::{ForgeError, ForgeResult};

/// One `FileAndHash` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAndHash {
    pub file: String,
    pub hash: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub number: IntValue,
    pub this_update: DateTime,
    pub next_update: DateTime,
    pub hash_algorithm: DigestAlgorithm,
    pub entries: Vec<FileAndHash>,
}

impl Manifest {
    /// Manifest over `(filename, bytes)` pairs, listed in byte-wise filename order.
    pub fn from_files<'a, I>(
        number: impl Into<IntValue>,
        this_update: DateTime,
        next_update: DateTime,
        hash_algorithm: DigestAlgorithm,
        files: I,
    ) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut entries: Vec<FileAndHash> = files
            .into_iter()
            .map(|(file, bytes)| FileAndHash {
                file: file.to_string(),
                hash: hash_algorithm.digest(bytes),
            })
            .collect();
        entries.sort_by(|a, b| a.file.as_bytes().cmp(b.file.as_bytes()));
        Self {
            number: number.into(),
            this_update,
            next_update,
            hash_algorithm,
            entries,
        }
    }

    #[must_use]
    pub fn entry(&self, file: &str) -> Option<&FileAndHash> {
        self.entries.iter().find(|e| e.file == file)
    }

    pub fn schema() -> Schema {
        Schema::sequence(vec![
            Field::required("version", Schema::Integer)
                .explicit(0)
                .with_default(Value::int(0)),
            Field::required("manifestNumber", Schema::Integer),
            Field::required("thisUpdate", Schema::GeneralizedTime),
            Field::required("nextUpdate", Schema::GeneralizedTime),
            Field::required("fileHashAlg", Schema::Oid),
            Field::required(
                "fileList",
                Schema::sequence_of(Schema::sequence(vec![
                    Field::required("file", Schema::Ia5String),
                    Field::required("hash", Schema::BitString),
                ])),
            ),
        ])
    }

    pub fn descriptor() -> ContentTypeDescriptor {
        ContentTypeDescriptor::new(ID_CT_RPKI_MANIFEST, "rpkiManifest", "mft", Self::schema())
    }

    #[must_use]
    pub fn to_content(&self) -> EncapsulatedContent {
        let files = self
            .entries
            .iter()
            .map(|e| {
                Value::record([
                    ("file", Value::ia5(e.file.clone())),
                    ("hash", Value::Bits(BitValue::from_bytes(e.hash.clone()))),
                ])
            })
            .collect();
        let value = Value::record([
            ("version", Value::int(0)),
            ("manifestNumber", Value::Integer(self.number.clone())),
            ("thisUpdate", Value::Time(self.this_update)),
            ("nextUpdate", Value::Time(self.next_update)),
            ("fileHashAlg", Value::Oid(self.hash_algorithm.oid())),
            ("fileList", Value::List(files)),
        ]);
        EncapsulatedContent::construct(ID_CT_RPKI_MANIFEST, value)
    }

    pub fn from_content(content: &EncapsulatedContent) -> ForgeResult<Self> {
        if content.content_type() != ID_CT_RPKI_MANIFEST {
            return Err(ForgeError::InvalidInput(format!(
                "{} is not a manifest",
                content.content_type()
            )));
        }
        let value = content.value();
        let field = |name: &str| {
            value
                .get(name)
                .ok_or_else(|| ForgeError::DecodeError(format!("manifest lacks {name}")))
        };
        let number = field("manifestNumber")?
            .as_int()
            .filter(|n| !n.is_negative())
            .cloned()
            .ok_or_else(|| ForgeError::DecodeError("negative manifestNumber".into()))?;
        let time = |name: &str| {
            field(name)?
                .as_time()
                .ok_or_else(|| ForgeError::DecodeError(format!("{name} is not a time")))
        };
        let oid = field("fileHashAlg")?
            .as_oid()
            .ok_or_else(|| ForgeError::DecodeError("fileHashAlg is not an OID".into()))?;
        let entries = field("fileList")?
            .as_list()
            .ok_or_else(|| ForgeError::DecodeError("fileList is not a list".into()))?
            .iter()
            .map(|entry| {
                let file = entry.get("file").and_then(Value::as_str);
                let hash = entry.get("hash").and_then(Value::as_bits);
                match (file, hash) {
                    (Some(file), Some(hash)) if hash.unused_bits == 0 => Ok(FileAndHash {
                        file: file.to_string(),
                        hash: hash.bytes.clone(),
                    }),
                    _ => Err(ForgeError::DecodeError("malformed FileAndHash".into())),
                }
            })
            .collect::<ForgeResult<_>>()?;
        Ok(Self {
            number,
            this_update: time("thisUpdate")?,
            next_update: time("nextUpdate")?,
            hash_algorithm: DigestAlgorithm::from_oid(&oid)?,
            entries,
        })
    }
}

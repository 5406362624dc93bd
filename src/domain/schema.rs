//! Declarative payload schemas.
//!
//! A `Schema` describes the ASN.1 shape of an eContent payload closely enough
//! for the codec to produce and consume DER without generated code. The
//! supported subset covers the published RPKI content types: primitive
//! strings and integers, SEQUENCE with OPTIONAL/DEFAULT members and EXPLICIT
//! context tags, SEQUENCE OF, untagged CHOICE and opaque ANY.

use der::{Tag, TagNumber};

use crate::domain::value::Value;
use crate::infra::error::{ForgeError, ForgeResult};

/// Largest tag number expressible in a single identifier octet.
pub const MAX_LOW_TAG_NUMBER: u8 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    Boolean,
    Integer,
    Utf8String,
    Ia5String,
    OctetString,
    BitString,
    Oid,
    GeneralizedTime,
    Null,
    /// Any single TLV, kept verbatim.
    Any,
    Sequence(Vec<Field>),
    SequenceOf(Box<Schema>),
    Choice(Vec<Field>),
}

/// How a SEQUENCE member may be absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    /// Omitted from DER when equal to the value; filled in on decode.
    Default(Value),
}

/// Named member of a SEQUENCE or alternative of a CHOICE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    /// EXPLICIT context-specific tag number, if any.
    pub explicit_tag: Option<u8>,
    pub presence: Presence,
}

impl Field {
    #[must_use]
    pub fn required(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            explicit_tag: None,
            presence: Presence::Required,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.presence = Presence::Optional;
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.presence = Presence::Default(value);
        self
    }

    #[must_use]
    pub fn explicit(mut self, number: u8) -> Self {
        self.explicit_tag = Some(number);
        self
    }

    /// Outer tag this member is encoded with, `None` when it can take several.
    #[must_use]
    pub fn tag(&self) -> Option<Tag> {
        match self.explicit_tag {
            Some(number) if number <= MAX_LOW_TAG_NUMBER => Some(Tag::ContextSpecific {
                constructed: true,
                number: TagNumber::new(number),
            }),
            Some(_) => None,
            None => self.schema.tag(),
        }
    }

    /// Whether an element carrying `tag` can be decoded as this member.
    #[must_use]
    pub fn matches(&self, tag: Tag) -> bool {
        match self.explicit_tag {
            Some(_) => self.tag() == Some(tag),
            None => self.schema.matches(tag),
        }
    }
}

impl Schema {
    #[must_use]
    pub fn sequence(fields: Vec<Field>) -> Self {
        Schema::Sequence(fields)
    }

    #[must_use]
    pub fn sequence_of(item: Schema) -> Self {
        Schema::SequenceOf(Box::new(item))
    }

    /// Universal tag of this schema, `None` for CHOICE and ANY.
    #[must_use]
    pub fn tag(&self) -> Option<Tag> {
        match self {
            Schema::Boolean => Some(Tag::Boolean),
            Schema::Integer => Some(Tag::Integer),
            Schema::Utf8String => Some(Tag::Utf8String),
            Schema::Ia5String => Some(Tag::Ia5String),
            Schema::OctetString => Some(Tag::OctetString),
            Schema::BitString => Some(Tag::BitString),
            Schema::Oid => Some(Tag::ObjectIdentifier),
            Schema::GeneralizedTime => Some(Tag::GeneralizedTime),
            Schema::Null => Some(Tag::Null),
            Schema::Sequence(_) | Schema::SequenceOf(_) => Some(Tag::Sequence),
            Schema::Choice(_) | Schema::Any => None,
        }
    }

    #[must_use]
    pub fn matches(&self, tag: Tag) -> bool {
        match self {
            Schema::Any => true,
            Schema::Choice(alternatives) => alternatives.iter().any(|alt| alt.matches(tag)),
            other => other.tag() == Some(tag),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Schema::Boolean => "BOOLEAN",
            Schema::Integer => "INTEGER",
            Schema::Utf8String => "UTF8String",
            Schema::Ia5String => "IA5String",
            Schema::OctetString => "OCTET STRING",
            Schema::BitString => "BIT STRING",
            Schema::Oid => "OBJECT IDENTIFIER",
            Schema::GeneralizedTime => "GeneralizedTime",
            Schema::Null => "NULL",
            Schema::Any => "ANY",
            Schema::Sequence(_) => "SEQUENCE",
            Schema::SequenceOf(_) => "SEQUENCE OF",
            Schema::Choice(_) => "CHOICE",
        }
    }

    /// Structural checks run once at registration time.
    ///
    /// Rejects tag numbers outside the low-tag-number form, duplicate member
    /// names, and CHOICE alternatives that cannot be told apart by tag.
    pub fn validate(&self) -> ForgeResult<()> {
        match self {
            Schema::Sequence(fields) => {
                check_members(fields)?;
                for (idx, field) in fields.iter().enumerate() {
                    // an absent member must not be confusable with the next one
                    if field.presence != Presence::Required && field.tag().is_none() {
                        let followed = idx + 1 < fields.len();
                        if followed {
                            return Err(ForgeError::InvalidInput(format!(
                                "member '{}' is optional but has no distinguishing tag",
                                field.name
                            )));
                        }
                    }
                }
                Ok(())
            }
            Schema::Choice(alternatives) => {
                check_members(alternatives)?;
                let tags: Vec<Tag> = alternatives
                    .iter()
                    .map(|alt| {
                        alt.tag().ok_or_else(|| {
                            ForgeError::InvalidInput(format!(
                                "CHOICE alternative '{}' needs a fixed tag",
                                alt.name
                            ))
                        })
                    })
                    .collect::<ForgeResult<_>>()?;
                for (i, tag) in tags.iter().enumerate() {
                    if tags[i + 1..].contains(tag) {
                        return Err(ForgeError::InvalidInput(format!(
                            "CHOICE alternatives share tag {tag}"
                        )));
                    }
                }
                Ok(())
            }
            Schema::SequenceOf(item) => item.validate(),
            _ => Ok(()),
        }
    }
}

fn check_members(fields: &[Field]) -> ForgeResult<()> {
    for (i, field) in fields.iter().enumerate() {
        if let Some(number) = field.explicit_tag {
            if number > MAX_LOW_TAG_NUMBER {
                return Err(ForgeError::InvalidInput(format!(
                    "tag number {number} of '{}' exceeds {MAX_LOW_TAG_NUMBER}",
                    field.name
                )));
            }
        }
        if fields[..i].iter().any(|f| f.name == field.name) {
            return Err(ForgeError::InvalidInput(format!(
                "duplicate member name '{}'",
                field.name
            )));
        }
        field.schema.validate()?;
    }
    Ok(())
}

//! Schema-driven DER codec.
//!
//! Encodes a `Value` under a `Schema` and decodes it back. Primitives go
//! through the `der` crate's own types so canonical DER rules (minimal
//! integers, string charsets, time formats) are enforced there; this module
//! only walks the structure and handles tagging and member presence.

use der::asn1::{
    AnyRef, BitStringRef, GeneralizedTime, Ia5StringRef, IntRef, Null, ObjectIdentifier,
    OctetStringRef, Utf8StringRef,
};
use der::{Decode, Encode, Header, Length, Reader, SliceReader, Tag, TagNumber, Tagged};

use crate::domain::schema::{Field, Presence, Schema, MAX_LOW_TAG_NUMBER};
use crate::domain::value::{BitValue, IntValue, Record, Value};
use crate::infra::error::{ForgeError, ForgeResult};

/// Encode `value` as DER under `schema`.
pub fn encode(schema: &Schema, value: &Value) -> ForgeResult<Vec<u8>> {
    let der = match (schema, value) {
        (Schema::Boolean, Value::Boolean(b)) => b.to_der(),
        (Schema::Integer, Value::Integer(n)) => IntRef::new(n.as_bytes()).and_then(|i| i.to_der()),
        (Schema::Utf8String, Value::Utf8(s)) => {
            Utf8StringRef::new(s).and_then(|s| s.to_der())
        }
        (Schema::Ia5String, Value::Ia5(s)) => Ia5StringRef::new(s).and_then(|s| s.to_der()),
        (Schema::OctetString, Value::Octets(bytes)) => {
            OctetStringRef::new(bytes).and_then(|o| o.to_der())
        }
        (Schema::BitString, Value::Bits(bits)) => {
            BitStringRef::new(bits.unused_bits, &bits.bytes).and_then(|b| b.to_der())
        }
        (Schema::Oid, Value::Oid(oid)) => oid.to_der(),
        (Schema::GeneralizedTime, Value::Time(t)) => GeneralizedTime::from_date_time(*t).to_der(),
        (Schema::Null, Value::Null) => Null.to_der(),
        (Schema::Any, Value::Any(tlv)) => {
            AnyRef::from_der(tlv).map_err(ForgeError::encode)?;
            return Ok(tlv.clone());
        }
        (Schema::Sequence(fields), Value::Record(members)) => {
            return encode_sequence(fields, members);
        }
        (Schema::SequenceOf(item), Value::List(items)) => {
            let mut body = Vec::new();
            for element in items {
                body.extend(encode(item, element)?);
            }
            return wrap(Tag::Sequence, body);
        }
        (Schema::Choice(alternatives), Value::Choice(name, inner)) => {
            let alternative = alternatives
                .iter()
                .find(|alt| &alt.name == name)
                .ok_or_else(|| {
                    ForgeError::EncodeError(format!("no CHOICE alternative named '{name}'"))
                })?;
            return encode_field(alternative, inner);
        }
        (schema, value) => {
            return Err(ForgeError::EncodeError(format!(
                "{} value does not fit {}",
                value.kind(),
                schema.kind()
            )))
        }
    };
    der.map_err(ForgeError::encode)
}

/// Decode exactly one DER element under `schema`; trailing bytes are an error.
pub fn decode(schema: &Schema, bytes: &[u8]) -> ForgeResult<Value> {
    decode_tlv(schema, bytes)
}

fn encode_sequence(fields: &[Field], members: &Record) -> ForgeResult<Vec<u8>> {
    if let Some(unknown) = members
        .keys()
        .find(|key| !fields.iter().any(|f| &f.name == *key))
    {
        return Err(ForgeError::EncodeError(format!(
            "unknown member '{unknown}'"
        )));
    }

    let mut body = Vec::new();
    for field in fields {
        match (members.get(&field.name), &field.presence) {
            (None, Presence::Required) => {
                return Err(ForgeError::EncodeError(format!(
                    "missing required member '{}'",
                    field.name
                )));
            }
            (None, _) => {}
            // DER omits members equal to their DEFAULT
            (Some(value), Presence::Default(default)) if value == default => {}
            (Some(value), _) => body.extend(encode_field(field, value)?),
        }
    }
    wrap(Tag::Sequence, body)
}

fn encode_field(field: &Field, value: &Value) -> ForgeResult<Vec<u8>> {
    let inner = encode(&field.schema, value)?;
    match field.explicit_tag {
        Some(number) => wrap(context_tag(number)?, inner),
        None => Ok(inner),
    }
}

fn context_tag(number: u8) -> ForgeResult<Tag> {
    if number > MAX_LOW_TAG_NUMBER {
        return Err(ForgeError::EncodeError(format!(
            "context tag [{number}] needs the high-tag-number form"
        )));
    }
    Ok(Tag::ContextSpecific {
        constructed: true,
        number: TagNumber::new(number),
    })
}

fn wrap(tag: Tag, body: Vec<u8>) -> ForgeResult<Vec<u8>> {
    let length = Length::try_from(body.len()).map_err(ForgeError::encode)?;
    let header = Header::new(tag, length).map_err(ForgeError::encode)?;
    let mut out = header.to_der().map_err(ForgeError::encode)?;
    out.extend(body);
    Ok(out)
}

fn decode_tlv(schema: &Schema, tlv: &[u8]) -> ForgeResult<Value> {
    let value = match schema {
        Schema::Boolean => Value::Boolean(bool::from_der(tlv)?),
        Schema::Integer => {
            Value::Integer(IntValue::from_twos_complement(IntRef::from_der(tlv)?.as_bytes()))
        }
        Schema::Utf8String => Value::Utf8(Utf8StringRef::from_der(tlv)?.as_str().to_owned()),
        Schema::Ia5String => Value::Ia5(Ia5StringRef::from_der(tlv)?.as_str().to_owned()),
        Schema::OctetString => Value::Octets(OctetStringRef::from_der(tlv)?.as_bytes().to_vec()),
        Schema::BitString => {
            let bits = BitStringRef::from_der(tlv)?;
            Value::Bits(BitValue {
                bytes: bits.raw_bytes().to_vec(),
                unused_bits: bits.unused_bits(),
            })
        }
        Schema::Oid => Value::Oid(ObjectIdentifier::from_der(tlv)?),
        Schema::GeneralizedTime => Value::Time(GeneralizedTime::from_der(tlv)?.to_date_time()),
        Schema::Null => {
            Null::from_der(tlv)?;
            Value::Null
        }
        Schema::Any => {
            AnyRef::from_der(tlv)?;
            Value::Any(tlv.to_vec())
        }
        Schema::Sequence(fields) => {
            let body = expect_constructed(tlv, Tag::Sequence)?;
            Value::Record(decode_sequence(fields, body)?)
        }
        Schema::SequenceOf(item) => {
            let body = expect_constructed(tlv, Tag::Sequence)?;
            let items = elements(body)?
                .into_iter()
                .map(|element| decode_tlv(item, element))
                .collect::<ForgeResult<Vec<_>>>()?;
            Value::List(items)
        }
        Schema::Choice(alternatives) => {
            let tag = AnyRef::from_der(tlv)?.tag();
            let alternative = alternatives
                .iter()
                .find(|alt| alt.matches(tag))
                .ok_or_else(|| {
                    ForgeError::DecodeError(format!("tag {tag} matches no CHOICE alternative"))
                })?;
            Value::Choice(
                alternative.name.clone(),
                Box::new(decode_field(alternative, tlv)?),
            )
        }
    };
    Ok(value)
}

fn decode_sequence(fields: &[Field], body: &[u8]) -> ForgeResult<Record> {
    let mut record = Record::new();
    let mut remaining = elements(body)?.into_iter().peekable();

    for field in fields {
        let present = match remaining.peek() {
            Some(element) => field.matches(AnyRef::from_der(element)?.tag()),
            None => false,
        };
        if present {
            if let Some(element) = remaining.next() {
                record.insert(field.name.clone(), decode_field(field, element)?);
            }
            continue;
        }
        match &field.presence {
            Presence::Required => {
                return Err(ForgeError::DecodeError(format!(
                    "missing required member '{}'",
                    field.name
                )));
            }
            Presence::Optional => {}
            Presence::Default(default) => {
                record.insert(field.name.clone(), default.clone());
            }
        }
    }

    if remaining.next().is_some() {
        return Err(ForgeError::DecodeError(
            "unexpected trailing SEQUENCE member".into(),
        ));
    }
    Ok(record)
}

fn decode_field(field: &Field, tlv: &[u8]) -> ForgeResult<Value> {
    match field.explicit_tag {
        Some(number) => {
            let inner = expect_constructed(tlv, context_tag(number)?)?;
            decode_tlv(&field.schema, inner)
        }
        None => decode_tlv(&field.schema, tlv),
    }
}

/// Contents of a constructed element carrying `tag`.
fn expect_constructed(tlv: &[u8], tag: Tag) -> ForgeResult<&[u8]> {
    let any = AnyRef::from_der(tlv)?;
    if any.tag() != tag {
        return Err(ForgeError::DecodeError(format!(
            "expected {tag}, found {}",
            any.tag()
        )));
    }
    Ok(any.value())
}

/// Split concatenated TLVs into complete element slices.
pub(crate) fn elements(body: &[u8]) -> ForgeResult<Vec<&[u8]>> {
    let mut reader = SliceReader::new(body)?;
    let mut out = Vec::new();
    while !reader.is_finished() {
        let start = usize::try_from(reader.position())?;
        let header = Header::decode(&mut reader)?;
        reader.read_slice(header.length)?;
        let end = usize::try_from(reader.position())?;
        out.push(&body[start..end]);
    }
    Ok(out)
}

//! CMS signed attributes of an RPKI signed object (RFC 6488 section 2.1.6.4).

use std::fmt;

use der::asn1::{Any, ObjectIdentifier, OctetString, SetOfVec};
use der::{DateTime, Decode, Encode, Tag, Tagged};
use x509_cert::attr::Attribute;
use x509_cert::time::Time;

use crate::domain::constants::{ID_CONTENT_TYPE, ID_MESSAGE_DIGEST, ID_SIGNING_TIME};
use crate::domain::time::x509_time;
use crate::infra::error::{ForgeError, ForgeResult};

/// The three attributes every RPKI signed object carries.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedAttributes {
    pub content_type: ObjectIdentifier,
    pub message_digest: Vec<u8>,
    pub signing_time: DateTime,
}

fn attribute(oid: ObjectIdentifier, value: Any) -> ForgeResult<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value]).map_err(ForgeError::encode)?,
    })
}

/// Single value of a required attribute.
fn single_value<'a>(set: &'a SetOfVec<Attribute>, oid: &ObjectIdentifier) -> ForgeResult<&'a Any> {
    let attr = set
        .iter()
        .find(|a| &a.oid == oid)
        .ok_or_else(|| ForgeError::MalformedObject(format!("missing signed attribute {oid}")))?;
    let mut values = attr.values.iter();
    match (values.next(), values.next()) {
        (Some(value), None) => Ok(value),
        _ => Err(ForgeError::MalformedObject(format!(
            "signed attribute {oid} must hold exactly one value"
        ))),
    }
}

fn reparse<'a, T: Decode<'a>>(der: &'a [u8], what: &str) -> ForgeResult<T> {
    T::from_der(der).map_err(|e| ForgeError::MalformedObject(format!("bad {what}: {e}")))
}

impl SignedAttributes {
    #[must_use]
    pub fn new(content_type: ObjectIdentifier, message_digest: Vec<u8>, signing_time: DateTime) -> Self {
        Self {
            content_type,
            message_digest,
            signing_time,
        }
    }

    /// DER `SET OF Attribute`, canonically ordered.
    pub fn to_set(&self) -> ForgeResult<SetOfVec<Attribute>> {
        let attrs = vec![
            attribute(
                ID_CONTENT_TYPE,
                Any::encode_from(&self.content_type).map_err(ForgeError::encode)?,
            )?,
            attribute(
                ID_MESSAGE_DIGEST,
                Any::new(Tag::OctetString, self.message_digest.clone()).map_err(ForgeError::encode)?,
            )?,
            attribute(
                ID_SIGNING_TIME,
                Any::encode_from(&x509_time(self.signing_time)?).map_err(ForgeError::encode)?,
            )?,
        ];
        SetOfVec::try_from(attrs).map_err(ForgeError::encode)
    }

    /// The exact bytes the signature covers.
    pub fn to_der(&self) -> ForgeResult<Vec<u8>> {
        self.to_set()?.to_der().map_err(ForgeError::encode)
    }

    /// Extract the required attributes; any other attribute is ignored.
    pub fn from_set(set: &SetOfVec<Attribute>) -> ForgeResult<Self> {
        let content_type = single_value(set, &ID_CONTENT_TYPE)?;
        if content_type.tag() != Tag::ObjectIdentifier {
            return Err(ForgeError::MalformedObject("contentType is not an OID".into()));
        }
        let content_type_der = content_type.to_der().map_err(ForgeError::encode)?;
        let content_type: ObjectIdentifier = reparse(&content_type_der, "contentType")?;

        let digest_der = single_value(set, &ID_MESSAGE_DIGEST)?
            .to_der()
            .map_err(ForgeError::encode)?;
        let digest: OctetString = reparse(&digest_der, "messageDigest")?;

        let time_der = single_value(set, &ID_SIGNING_TIME)?
            .to_der()
            .map_err(ForgeError::encode)?;
        let signing_time: Time = reparse(&time_der, "signingTime")?;

        Ok(Self {
            content_type,
            message_digest: digest.as_bytes().to_vec(),
            signing_time: signing_time.to_date_time(),
        })
    }
}

impl fmt::Debug for SignedAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SignedAttributes(content_type={}, digest={}, signing_time={})",
            self.content_type,
            hex::encode(&self.message_digest),
            self.signing_time
        )
    }
}

//! RFC 6493 Ghostbusters record payload.
//!
//! The record is a vCard 4.0 carried as an OCTET STRING.

use crate::domain::constants::ID_CT_RPKI_GHOSTBUSTERS;
use crate::domain::content::{ContentTypeDescriptor, EncapsulatedContent};
use crate::domain::schema::Schema;
use crate::domain::value::Value;
use crate::infra::error::{ForgeError, ForgeResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ghostbusters {
    pub full_name: String,
    pub org: Option<String>,
    pub address: Option<String>,
    pub tel: Option<String>,
    pub email: Option<String>,
}

impl Ghostbusters {
    #[must_use]
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_org(mut self, org: impl Into<String>) -> Self {
        self.org = Some(org.into());
        self
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn with_tel(mut self, tel: impl Into<String>) -> Self {
        self.tel = Some(tel.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn to_vcard(&self) -> String {
        let mut vcard = String::from("BEGIN:VCARD\r\nVERSION:4.0\r\n");
        vcard.push_str(&format!("FN:{}\r\n", self.full_name));
        if let Some(org) = &self.org {
            vcard.push_str(&format!("ORG:{org}\r\n"));
        }
        if let Some(address) = &self.address {
            vcard.push_str(&format!("ADR:{address}\r\n"));
        }
        if let Some(tel) = &self.tel {
            vcard.push_str(&format!("TEL;VALUE=uri:tel:{tel}\r\n"));
        }
        if let Some(email) = &self.email {
            vcard.push_str(&format!("EMAIL:{email}\r\n"));
        }
        vcard.push_str("END:VCARD");
        vcard
    }

    pub fn from_vcard(text: &str) -> ForgeResult<Self> {
        let mut card = Self::default();
        let mut full_name = None;
        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            match key {
                "FN" => full_name = Some(value.to_string()),
                "ORG" => card.org = Some(value.to_string()),
                "ADR" => card.address = Some(value.to_string()),
                "EMAIL" => card.email = Some(value.to_string()),
                k if k.starts_with("TEL") => {
                    card.tel = Some(value.strip_prefix("tel:").unwrap_or(value).to_string());
                }
                _ => {}
            }
        }
        card.full_name =
            full_name.ok_or_else(|| ForgeError::DecodeError("vCard lacks FN".into()))?;
        Ok(card)
    }

    pub fn schema() -> Schema {
        Schema::OctetString
    }

    pub fn descriptor() -> ContentTypeDescriptor {
        ContentTypeDescriptor::new(
            ID_CT_RPKI_GHOSTBUSTERS,
            "rpkiGhostbusters",
            "gbr",
            Self::schema(),
        )
    }

    #[must_use]
    pub fn to_content(&self) -> EncapsulatedContent {
        EncapsulatedContent::construct(
            ID_CT_RPKI_GHOSTBUSTERS,
            Value::Octets(self.to_vcard().into_bytes()),
        )
    }

    pub fn from_content(content: &EncapsulatedContent) -> ForgeResult<Self> {
        if content.content_type() != ID_CT_RPKI_GHOSTBUSTERS {
            return Err(ForgeError::InvalidInput(format!(
                "{} is not a Ghostbusters record",
                content.content_type()
            )));
        }
        let bytes = content
            .value()
            .as_octets()
            .ok_or_else(|| ForgeError::DecodeError("Ghostbusters record is not octets".into()))?;
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ForgeError::DecodeError(format!("vCard is not UTF-8: {e}")))?;
        Self::from_vcard(text)
    }
}

//! RFC 9582 route origin authorization payload.

use std::fmt;
use std::str::FromStr;

use crate::domain::constants::ID_CT_ROUTE_ORIGIN_AUTHZ;
use crate::domain::content::{ContentTypeDescriptor, EncapsulatedContent};
use crate::domain::resources::{AddressFamily, IpBlock, IpPrefix, Resources};
use crate::domain::schema::{Field, Schema};
use crate::domain::value::Value;
use crate::infra::error::{ForgeError, ForgeResult};

/// Authorized prefix with an optional maximum announced length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoaPrefix {
    pub prefix: IpPrefix,
    pub max_length: Option<u8>,
}

impl RoaPrefix {
    pub fn new(prefix: IpPrefix, max_length: Option<u8>) -> ForgeResult<Self> {
        if let Some(max) = max_length {
            let width = prefix.family().bits();
            if max < prefix.len() || u32::from(max) > width {
                return Err(ForgeError::InvalidInput(format!(
                    "maxLength {max} outside {}..={width} for {prefix}",
                    prefix.len()
                )));
            }
        }
        Ok(Self { prefix, max_length })
    }
}

impl fmt::Display for RoaPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_length {
            Some(max) => write!(f, "{}-{max}", self.prefix),
            None => write!(f, "{}", self.prefix),
        }
    }
}

impl FromStr for RoaPrefix {
    type Err = ForgeError;

    /// `10.0.0.0/8` or `10.0.0.0/8-24`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('-') {
            Some((prefix, max)) => {
                let max = max
                    .trim()
                    .parse::<u8>()
                    .map_err(|e| ForgeError::InvalidInput(format!("maxLength '{max}': {e}")))?;
                RoaPrefix::new(prefix.parse()?, Some(max))
            }
            None => RoaPrefix::new(s.parse()?, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOriginAttestation {
    pub as_id: u32,
    pub prefixes: Vec<RoaPrefix>,
}

impl RouteOriginAttestation {
    pub fn new(as_id: u32, prefixes: Vec<RoaPrefix>) -> ForgeResult<Self> {
        if prefixes.is_empty() {
            return Err(ForgeError::InvalidInput(
                "a ROA needs at least one prefix".into(),
            ));
        }
        Ok(Self { as_id, prefixes })
    }

    pub fn schema() -> Schema {
        Schema::sequence(vec![
            Field::required("version", Schema::Integer)
                .explicit(0)
                .with_default(Value::int(0)),
            Field::required("asID", Schema::Integer),
            Field::required(
                "ipAddrBlocks",
                Schema::sequence_of(Schema::sequence(vec![
                    Field::required("addressFamily", Schema::OctetString),
                    Field::required(
                        "addresses",
                        Schema::sequence_of(Schema::sequence(vec![
                            Field::required("address", Schema::BitString),
                            Field::required("maxLength", Schema::Integer).optional(),
                        ])),
                    ),
                ])),
            ),
        ])
    }

    pub fn descriptor() -> ContentTypeDescriptor {
        ContentTypeDescriptor::new(
            ID_CT_ROUTE_ORIGIN_AUTHZ,
            "routeOriginAuthz",
            "roa",
            Self::schema(),
        )
    }

    /// Payload whose EE certificate carries exactly the listed prefixes.
    #[must_use]
    pub fn to_content(&self) -> EncapsulatedContent {
        let mut blocks = Vec::new();
        for family in [AddressFamily::Ipv4, AddressFamily::Ipv6] {
            let addresses: Vec<Value> = self
                .prefixes
                .iter()
                .filter(|p| p.prefix.family() == family)
                .map(|p| {
                    let mut entry = vec![("address", Value::Bits(p.prefix.to_bits()))];
                    if let Some(max) = p.max_length {
                        entry.push(("maxLength", Value::int(max)));
                    }
                    Value::record(entry)
                })
                .collect();
            if !addresses.is_empty() {
                blocks.push(Value::record([
                    ("addressFamily", Value::Octets(family.afi().to_vec())),
                    ("addresses", Value::List(addresses)),
                ]));
            }
        }
        let value = Value::record([
            ("version", Value::int(0)),
            ("asID", Value::int(self.as_id)),
            ("ipAddrBlocks", Value::List(blocks)),
        ]);
        let resources = Resources::from_blocks(
            self.prefixes
                .iter()
                .map(|p| IpBlock::Prefix(p.prefix))
                .collect(),
            Vec::new(),
        );
        EncapsulatedContent::construct(ID_CT_ROUTE_ORIGIN_AUTHZ, value).with_resources(resources)
    }

    pub fn from_content(content: &EncapsulatedContent) -> ForgeResult<Self> {
        if content.content_type() != ID_CT_ROUTE_ORIGIN_AUTHZ {
            return Err(ForgeError::InvalidInput(format!(
                "{} is not a ROA",
                content.content_type()
            )));
        }
        let malformed = |what: &str| ForgeError::DecodeError(format!("ROA {what}"));
        let value = content.value();
        let as_id = value
            .get("asID")
            .and_then(Value::as_integer)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| malformed("asID out of range"))?;
        let mut prefixes = Vec::new();
        let blocks = value
            .get("ipAddrBlocks")
            .and_then(Value::as_list)
            .ok_or_else(|| malformed("lacks ipAddrBlocks"))?;
        for block in blocks {
            let afi = block
                .get("addressFamily")
                .and_then(Value::as_octets)
                .ok_or_else(|| malformed("lacks addressFamily"))?;
            let family = if afi == &AddressFamily::Ipv4.afi()[..] {
                AddressFamily::Ipv4
            } else if afi == &AddressFamily::Ipv6.afi()[..] {
                AddressFamily::Ipv6
            } else {
                return Err(malformed("has an unknown address family"));
            };
            let addresses = block
                .get("addresses")
                .and_then(Value::as_list)
                .ok_or_else(|| malformed("lacks addresses"))?;
            for address in addresses {
                let bits = address
                    .get("address")
                    .and_then(Value::as_bits)
                    .ok_or_else(|| malformed("lacks address"))?;
                let max_length = match address.get("maxLength").and_then(Value::as_integer) {
                    Some(n) => Some(u8::try_from(n).map_err(|_| malformed("maxLength"))?),
                    None => None,
                };
                prefixes.push(RoaPrefix::new(
                    IpPrefix::from_bits(family, bits)?,
                    max_length,
                )?);
            }
        }
        Ok(Self { as_id, prefixes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resources::ResourceSet;
    use crate::services::registry::ContentTypeRegistry;

    fn roa() -> RouteOriginAttestation {
        RouteOriginAttestation::new(
            64496,
            vec![
                "192.0.2.0/24".parse().unwrap(),
                "2001:db8::/32-48".parse().unwrap(),
                "198.51.100.0/24-24".parse().unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn groups_prefixes_by_family() {
        let roa = roa();
        let content = roa.to_content();
        let registry = ContentTypeRegistry::builtins();
        let der = content.encode(&registry).unwrap();
        let decoded =
            EncapsulatedContent::decode(ID_CT_ROUTE_ORIGIN_AUTHZ, &der, &registry).unwrap();
        let back = RouteOriginAttestation::from_content(&decoded).unwrap();
        assert_eq!(back.as_id, 64496);
        // IPv4 family first, then IPv6
        assert_eq!(back.prefixes[0], roa.prefixes[0]);
        assert_eq!(back.prefixes[1], roa.prefixes[2]);
        assert_eq!(back.prefixes[2], roa.prefixes[1]);
    }

    #[test]
    fn ee_resources_cover_prefixes_only() {
        let content = roa().to_content();
        let resources = content.resources();
        assert!(resources.asn.is_none());
        assert!(matches!(resources.ipv4, Some(ResourceSet::Explicit(ref v)) if v.len() == 2));
        assert!(matches!(resources.ipv6, Some(ResourceSet::Explicit(ref v)) if v.len() == 1));
    }

    #[test]
    fn max_length_is_bounded() {
        assert!("10.0.0.0/16-8".parse::<RoaPrefix>().is_err());
        assert!("10.0.0.0/16-33".parse::<RoaPrefix>().is_err());
        assert_eq!(
            "10.0.0.0/16-24".parse::<RoaPrefix>().unwrap().to_string(),
            "10.0.0.0/16-24"
        );
        assert!(RouteOriginAttestation::new(1, vec![]).is_err());
    }
}

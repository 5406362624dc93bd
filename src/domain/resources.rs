//! RFC 3779 IP address and AS number resources.
//!
//! Resource sets travel in two critical certificate extensions
//! (`id-pe-ipAddrBlocks`, `id-pe-autonomousSysIds`). Both are encoded through
//! the schema codec; address bounds use the RFC 3779 bit-string forms where a
//! prefix keeps its significant bits, a range minimum drops trailing zero bits
//! and a range maximum drops trailing one bits.

use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::domain::constants::{AFI_IPV4, AFI_IPV6};
use crate::domain::schema::{Field, Schema};
use crate::domain::value::{BitValue, Value};
use crate::infra::error::{ForgeError, ForgeResult};
use crate::services::codec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            AddressFamily::Ipv4 => 32,
            AddressFamily::Ipv6 => 128,
        }
    }

    /// Two-octet AFI used in `IPAddressFamily.addressFamily`.
    #[must_use]
    pub fn afi(self) -> [u8; 2] {
        match self {
            AddressFamily::Ipv4 => AFI_IPV4,
            AddressFamily::Ipv6 => AFI_IPV6,
        }
    }

    #[must_use]
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    fn from_afi(afi: &[u8]) -> ForgeResult<Self> {
        // a third SAFI octet is permitted and ignored
        match afi.get(..2) {
            Some(a) if a == &AFI_IPV4[..] => Ok(AddressFamily::Ipv4),
            Some(a) if a == &AFI_IPV6[..] => Ok(AddressFamily::Ipv6),
            _ => Err(ForgeError::DecodeError(format!(
                "unsupported address family {}",
                hex::encode(afi)
            ))),
        }
    }
}

fn addr_to_u128(addr: &IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(*v4)),
        IpAddr::V6(v6) => u128::from(*v6),
    }
}

fn u128_to_addr(family: AddressFamily, value: u128) -> IpAddr {
    match family {
        // value never exceeds 32 bits for IPv4
        AddressFamily::Ipv4 => IpAddr::V4(Ipv4Addr::from(value as u32)),
        AddressFamily::Ipv6 => IpAddr::V6(Ipv6Addr::from(value)),
    }
}

fn low_mask(bits: u32) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

/// Leading `len` bits of a `width`-bit address as a DER BIT STRING.
fn to_bits(value: u128, width: u32, len: u32) -> BitValue {
    let aligned = value << (128 - width);
    let nbytes = len.div_ceil(8) as usize;
    let mut bytes = aligned.to_be_bytes()[..nbytes].to_vec();
    let unused = (nbytes * 8) as u32 - len;
    if let Some(last) = bytes.last_mut() {
        *last &= 0xffu8 << unused;
    }
    BitValue {
        bytes,
        unused_bits: unused as u8,
    }
}

/// Address of `width` bits from a BIT STRING, padding with ones or zeros.
fn from_bits(bits: &BitValue, width: u32, fill_ones: bool) -> ForgeResult<(u128, u32)> {
    let len = (bits.bytes.len() * 8) as u32 - u32::from(bits.unused_bits);
    if len > width || bits.bytes.len() > 16 {
        return Err(ForgeError::DecodeError(format!(
            "address of {len} bits exceeds {width}-bit family"
        )));
    }
    let mut buf = [0u8; 16];
    buf[..bits.bytes.len()].copy_from_slice(&bits.bytes);
    let mut value = u128::from_be_bytes(buf) >> (128 - width);
    // clear whatever sits in the unused bits
    value &= !low_mask(width - len);
    if fill_ones {
        value |= low_mask(width - len);
    }
    Ok((value, len))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpPrefix {
    addr: IpAddr,
    len: u8,
}

impl IpPrefix {
    pub fn new(addr: IpAddr, len: u8) -> ForgeResult<Self> {
        let width = AddressFamily::of(&addr).bits();
        if u32::from(len) > width {
            return Err(ForgeError::InvalidInput(format!(
                "prefix length {len} exceeds {width}"
            )));
        }
        if addr_to_u128(&addr) & low_mask(width - u32::from(len)) != 0 {
            return Err(ForgeError::InvalidInput(format!(
                "{addr}/{len} has host bits set"
            )));
        }
        Ok(Self { addr, len })
    }

    #[must_use]
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    #[must_use]
    pub fn len(&self) -> u8 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.addr)
    }

    #[must_use]
    pub fn to_bits(&self) -> BitValue {
        to_bits(
            addr_to_u128(&self.addr),
            self.family().bits(),
            u32::from(self.len),
        )
    }

    pub fn from_bits(family: AddressFamily, bits: &BitValue) -> ForgeResult<Self> {
        let (value, len) = from_bits(bits, family.bits(), false)?;
        Ok(Self {
            addr: u128_to_addr(family, value),
            len: len as u8,
        })
    }

    fn last(&self) -> u128 {
        addr_to_u128(&self.addr) | low_mask(self.family().bits() - u32::from(self.len))
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

impl FromStr for IpPrefix {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| ForgeError::InvalidInput(format!("'{s}' is not a prefix")))?;
        let addr = addr
            .trim()
            .parse::<IpAddr>()
            .map_err(|e| ForgeError::InvalidInput(format!("'{addr}': {e}")))?;
        let len = len
            .trim()
            .parse::<u8>()
            .map_err(|e| ForgeError::InvalidInput(format!("'{len}': {e}")))?;
        IpPrefix::new(addr, len)
    }
}

/// One entry of an explicit address list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpBlock {
    Prefix(IpPrefix),
    Range { min: IpAddr, max: IpAddr },
}

impl IpBlock {
    /// Range `min..=max`; collapses to a prefix when the range is one.
    pub fn range(min: IpAddr, max: IpAddr) -> ForgeResult<Self> {
        let family = AddressFamily::of(&min);
        if family != AddressFamily::of(&max) {
            return Err(ForgeError::InvalidInput(format!(
                "range {min}-{max} mixes address families"
            )));
        }
        let (lo, hi) = (addr_to_u128(&min), addr_to_u128(&max));
        if lo > hi {
            return Err(ForgeError::InvalidInput(format!(
                "range {min}-{max} is inverted"
            )));
        }
        let width = family.bits();
        let host_bits = (lo ^ hi).checked_ilog2().map_or(0, |b| b + 1);
        if lo & low_mask(host_bits) == 0 && hi & low_mask(host_bits) == low_mask(host_bits) {
            return Ok(IpBlock::Prefix(IpPrefix {
                addr: min,
                len: (width - host_bits) as u8,
            }));
        }
        Ok(IpBlock::Range { min, max })
    }

    #[must_use]
    pub fn family(&self) -> AddressFamily {
        match self {
            IpBlock::Prefix(p) => p.family(),
            IpBlock::Range { min, .. } => AddressFamily::of(min),
        }
    }

    fn bounds(&self) -> (u128, u128) {
        match self {
            IpBlock::Prefix(p) => (addr_to_u128(&p.addr), p.last()),
            IpBlock::Range { min, max } => (addr_to_u128(min), addr_to_u128(max)),
        }
    }

    fn to_value(self) -> Value {
        match self {
            IpBlock::Prefix(p) => {
                Value::Choice("addressPrefix".into(), Box::new(Value::Bits(p.to_bits())))
            }
            IpBlock::Range { min, max } => {
                let width = self.family().bits();
                let (lo, hi) = (addr_to_u128(&min), addr_to_u128(&max));
                let lo_len = width - lo.trailing_zeros().min(width);
                let hi_len = width - (!hi).trailing_zeros().min(width);
                Value::Choice(
                    "addressRange".into(),
                    Box::new(Value::record([
                        ("min", Value::Bits(to_bits(lo, width, lo_len))),
                        ("max", Value::Bits(to_bits(hi, width, hi_len))),
                    ])),
                )
            }
        }
    }

    fn from_value(family: AddressFamily, value: &Value) -> ForgeResult<Self> {
        let width = family.bits();
        match value {
            Value::Choice(name, inner) if name == "addressPrefix" => {
                let bits = inner.as_bits().ok_or_else(|| shape("addressPrefix"))?;
                Ok(IpBlock::Prefix(IpPrefix::from_bits(family, bits)?))
            }
            Value::Choice(name, inner) if name == "addressRange" => {
                let min = inner.get("min").and_then(Value::as_bits).ok_or_else(|| shape("min"))?;
                let max = inner.get("max").and_then(Value::as_bits).ok_or_else(|| shape("max"))?;
                let (lo, _) = from_bits(min, width, false)?;
                let (hi, _) = from_bits(max, width, true)?;
                Ok(IpBlock::Range {
                    min: u128_to_addr(family, lo),
                    max: u128_to_addr(family, hi),
                })
            }
            _ => Err(shape("IPAddressOrRange")),
        }
    }
}

impl Ord for IpBlock {
    fn cmp(&self, other: &Self) -> Ordering {
        self.family()
            .cmp(&other.family())
            .then_with(|| self.bounds().cmp(&other.bounds()))
    }
}

impl PartialOrd for IpBlock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for IpBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpBlock::Prefix(p) => write!(f, "{p}"),
            IpBlock::Range { min, max } => write!(f, "{min}-{max}"),
        }
    }
}

impl FromStr for IpBlock {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((min, max)) = s.split_once('-') {
            let parse = |part: &str| {
                part.trim()
                    .parse::<IpAddr>()
                    .map_err(|e| ForgeError::InvalidInput(format!("'{part}': {e}")))
            };
            return IpBlock::range(parse(min)?, parse(max)?);
        }
        s.parse::<IpPrefix>().map(IpBlock::Prefix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsBlock {
    Id(u32),
    Range { min: u32, max: u32 },
}

impl AsBlock {
    pub fn range(min: u32, max: u32) -> ForgeResult<Self> {
        match min.cmp(&max) {
            Ordering::Less => Ok(AsBlock::Range { min, max }),
            Ordering::Equal => Ok(AsBlock::Id(min)),
            Ordering::Greater => Err(ForgeError::InvalidInput(format!(
                "AS range {min}-{max} is inverted"
            ))),
        }
    }

    fn bounds(&self) -> (u32, u32) {
        match self {
            AsBlock::Id(id) => (*id, *id),
            AsBlock::Range { min, max } => (*min, *max),
        }
    }

    fn to_value(self) -> Value {
        match self {
            AsBlock::Id(id) => Value::Choice("id".into(), Box::new(Value::int(id))),
            AsBlock::Range { min, max } => Value::Choice(
                "range".into(),
                Box::new(Value::record([
                    ("min", Value::int(min)),
                    ("max", Value::int(max)),
                ])),
            ),
        }
    }

    fn from_value(value: &Value) -> ForgeResult<Self> {
        let asn = |v: Option<&Value>| -> ForgeResult<u32> {
            v.and_then(Value::as_integer)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| shape("ASId"))
        };
        match value {
            Value::Choice(name, inner) if name == "id" => Ok(AsBlock::Id(asn(Some(inner))?)),
            Value::Choice(name, inner) if name == "range" => Ok(AsBlock::Range {
                min: asn(inner.get("min"))?,
                max: asn(inner.get("max"))?,
            }),
            _ => Err(shape("ASIdOrRange")),
        }
    }
}

impl Ord for AsBlock {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bounds().cmp(&other.bounds())
    }
}

impl PartialOrd for AsBlock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AsBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsBlock::Id(id) => write!(f, "AS{id}"),
            AsBlock::Range { min, max } => write!(f, "AS{min}-AS{max}"),
        }
    }
}

impl FromStr for AsBlock {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            let digits = part.trim();
            let digits = digits
                .strip_prefix("AS")
                .or_else(|| digits.strip_prefix("as"))
                .unwrap_or(digits);
            digits
                .parse::<u32>()
                .map_err(|e| ForgeError::InvalidInput(format!("'{part}': {e}")))
        };
        match s.split_once('-') {
            Some((min, max)) => AsBlock::range(parse(min)?, parse(max)?),
            None => Ok(AsBlock::Id(parse(s)?)),
        }
    }
}

/// Either inherit from the issuer or list resources explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSet<T> {
    Inherit,
    Explicit(Vec<T>),
}

impl<T: Ord> ResourceSet<T> {
    /// Explicit list in canonical ascending order.
    #[must_use]
    pub fn explicit(mut items: Vec<T>) -> Self {
        items.sort();
        items.dedup();
        ResourceSet::Explicit(items)
    }

    #[must_use]
    pub fn is_inherit(&self) -> bool {
        matches!(self, ResourceSet::Inherit)
    }
}

/// Resources bound to one certificate. `None` means the family is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resources {
    pub ipv4: Option<ResourceSet<IpBlock>>,
    pub ipv6: Option<ResourceSet<IpBlock>>,
    pub asn: Option<ResourceSet<AsBlock>>,
}

impl Default for Resources {
    fn default() -> Self {
        Self::inherit()
    }
}

impl Resources {
    /// Inherit every resource class from the issuer.
    #[must_use]
    pub fn inherit() -> Self {
        Self {
            ipv4: Some(ResourceSet::Inherit),
            ipv6: Some(ResourceSet::Inherit),
            asn: Some(ResourceSet::Inherit),
        }
    }

    /// Complete address and AS number space, as held by a root.
    #[must_use]
    pub fn all() -> Self {
        Self {
            ipv4: Some(ResourceSet::Explicit(vec![IpBlock::Prefix(IpPrefix {
                addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                len: 0,
            })])),
            ipv6: Some(ResourceSet::Explicit(vec![IpBlock::Prefix(IpPrefix {
                addr: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
                len: 0,
            })])),
            asn: Some(ResourceSet::Explicit(vec![AsBlock::Range {
                min: 0,
                max: u32::MAX,
            }])),
        }
    }

    /// Explicit resources; families with no blocks are left absent.
    #[must_use]
    pub fn from_blocks(ip: Vec<IpBlock>, asn: Vec<AsBlock>) -> Self {
        let (v4, v6): (Vec<_>, Vec<_>) = ip
            .into_iter()
            .partition(|b| b.family() == AddressFamily::Ipv4);
        let non_empty = |blocks: Vec<IpBlock>| (!blocks.is_empty()).then(|| ResourceSet::explicit(blocks));
        Self {
            ipv4: non_empty(v4),
            ipv6: non_empty(v6),
            asn: (!asn.is_empty()).then(|| ResourceSet::explicit(asn)),
        }
    }

    /// Parse comma or whitespace separated prefixes, ranges and AS numbers.
    pub fn parse(ip: &str, asn: &str) -> ForgeResult<Self> {
        let split = |s: &str| {
            s.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .map(str::to_owned)
                .collect::<Vec<_>>()
        };
        let ip = split(ip)
            .iter()
            .map(|p| p.parse())
            .collect::<ForgeResult<Vec<IpBlock>>>()?;
        let asn = split(asn)
            .iter()
            .map(|p| p.parse())
            .collect::<ForgeResult<Vec<AsBlock>>>()?;
        Ok(Self::from_blocks(ip, asn))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_none() && self.ipv6.is_none() && self.asn.is_none()
    }

    /// All explicitly listed IP blocks.
    pub fn ip_blocks(&self) -> impl Iterator<Item = &IpBlock> {
        [&self.ipv4, &self.ipv6]
            .into_iter()
            .flatten()
            .flat_map(|set| match set {
                ResourceSet::Explicit(blocks) => blocks.as_slice(),
                ResourceSet::Inherit => &[][..],
            })
    }

    pub fn ip_schema() -> Schema {
        let or_range = ip_or_range_schema();
        Schema::sequence_of(Schema::sequence(vec![
            Field::required("addressFamily", Schema::OctetString),
            Field::required(
                "ipAddressChoice",
                Schema::Choice(vec![
                    Field::required("inherit", Schema::Null),
                    Field::required("addressesOrRanges", Schema::sequence_of(or_range)),
                ]),
            ),
        ]))
    }

    pub fn as_schema() -> Schema {
        let choice = Schema::Choice(vec![
            Field::required("inherit", Schema::Null),
            Field::required(
                "asIdsOrRanges",
                Schema::sequence_of(as_or_range_schema()),
            ),
        ]);
        Schema::sequence(vec![
            Field::required("asnum", choice.clone()).explicit(0).optional(),
            Field::required("rdi", choice).explicit(1).optional(),
        ])
    }

    /// DER `IPAddrBlocks`, `None` when no address family is present.
    pub fn ip_extension(&self) -> ForgeResult<Option<Vec<u8>>> {
        let families = [
            (AddressFamily::Ipv4, &self.ipv4),
            (AddressFamily::Ipv6, &self.ipv6),
        ];
        let mut entries = Vec::new();
        for (family, set) in families {
            let Some(set) = set else { continue };
            let choice = match set {
                ResourceSet::Inherit => Value::Choice("inherit".into(), Box::new(Value::Null)),
                ResourceSet::Explicit(blocks) => Value::Choice(
                    "addressesOrRanges".into(),
                    Box::new(Value::List(blocks.iter().map(|b| b.to_value()).collect())),
                ),
            };
            entries.push(Value::record([
                ("addressFamily", Value::Octets(family.afi().to_vec())),
                ("ipAddressChoice", choice),
            ]));
        }
        if entries.is_empty() {
            return Ok(None);
        }
        codec::encode(&Self::ip_schema(), &Value::List(entries)).map(Some)
    }

    /// DER `ASIdentifiers`, `None` when AS resources are absent.
    pub fn as_extension(&self) -> ForgeResult<Option<Vec<u8>>> {
        let Some(set) = &self.asn else {
            return Ok(None);
        };
        let choice = match set {
            ResourceSet::Inherit => Value::Choice("inherit".into(), Box::new(Value::Null)),
            ResourceSet::Explicit(blocks) => Value::Choice(
                "asIdsOrRanges".into(),
                Box::new(Value::List(blocks.iter().map(|b| b.to_value()).collect())),
            ),
        };
        codec::encode(&Self::as_schema(), &Value::record([("asnum", choice)])).map(Some)
    }

    /// Rebuild from the raw extension values of a certificate.
    pub fn from_extensions(ip: Option<&[u8]>, asn: Option<&[u8]>) -> ForgeResult<Self> {
        let mut resources = Self {
            ipv4: None,
            ipv6: None,
            asn: None,
        };
        if let Some(der) = ip {
            let decoded = codec::decode(&Self::ip_schema(), der)?;
            for entry in decoded.as_list().ok_or_else(|| shape("IPAddrBlocks"))? {
                let afi = entry
                    .get("addressFamily")
                    .and_then(Value::as_octets)
                    .ok_or_else(|| shape("addressFamily"))?;
                let family = AddressFamily::from_afi(afi)?;
                let set = match entry.get("ipAddressChoice") {
                    Some(Value::Choice(name, _)) if name == "inherit" => ResourceSet::Inherit,
                    Some(Value::Choice(_, list)) => ResourceSet::Explicit(
                        list.as_list()
                            .ok_or_else(|| shape("addressesOrRanges"))?
                            .iter()
                            .map(|v| IpBlock::from_value(family, v))
                            .collect::<ForgeResult<_>>()?,
                    ),
                    _ => return Err(shape("ipAddressChoice")),
                };
                match family {
                    AddressFamily::Ipv4 => resources.ipv4 = Some(set),
                    AddressFamily::Ipv6 => resources.ipv6 = Some(set),
                }
            }
        }
        if let Some(der) = asn {
            let decoded = codec::decode(&Self::as_schema(), der)?;
            resources.asn = match decoded.get("asnum") {
                None => None,
                Some(Value::Choice(name, _)) if name == "inherit" => Some(ResourceSet::Inherit),
                Some(Value::Choice(_, list)) => Some(ResourceSet::Explicit(
                    list.as_list()
                        .ok_or_else(|| shape("asIdsOrRanges"))?
                        .iter()
                        .map(AsBlock::from_value)
                        .collect::<ForgeResult<_>>()?,
                )),
                Some(_) => return Err(shape("asnum")),
            };
        }
        Ok(resources)
    }
}

impl Resources {
    /// `ResourceBlock` of signed checklists and URI lists (RFC 9323): explicit
    /// resources only, AS numbers under `[0]` and address families under `[1]`.
    pub fn block_schema() -> Schema {
        let as_id = Schema::sequence(vec![Field::required(
            "asnum",
            Schema::sequence_of(as_or_range_schema()),
        )
        .explicit(0)]);
        let ip_blocks = Schema::sequence_of(Schema::sequence(vec![
            Field::required("addressFamily", Schema::OctetString),
            Field::required("addressesOrRanges", Schema::sequence_of(ip_or_range_schema())),
        ]));
        Schema::sequence(vec![
            Field::required("asID", as_id).explicit(0).optional(),
            Field::required("ipAddrBlocks", ip_blocks).explicit(1).optional(),
        ])
    }

    /// Value for `block_schema`. Fails on inherit or when nothing is listed.
    pub fn to_block_value(&self) -> ForgeResult<Value> {
        let explicit = |family: &str, set: &Option<ResourceSet<IpBlock>>| match set {
            Some(ResourceSet::Inherit) => Err(ForgeError::InvalidInput(format!(
                "a resource block cannot inherit {family}"
            ))),
            Some(ResourceSet::Explicit(blocks)) if !blocks.is_empty() => Ok(Some(blocks.clone())),
            _ => Ok(None),
        };
        let mut families = Vec::new();
        for (family, set) in [
            (AddressFamily::Ipv4, explicit("IPv4", &self.ipv4)?),
            (AddressFamily::Ipv6, explicit("IPv6", &self.ipv6)?),
        ] {
            let Some(blocks) = set else { continue };
            families.push(Value::record([
                ("addressFamily", Value::Octets(family.afi().to_vec())),
                (
                    "addressesOrRanges",
                    Value::List(blocks.into_iter().map(IpBlock::to_value).collect()),
                ),
            ]));
        }
        let mut members = Vec::new();
        match &self.asn {
            Some(ResourceSet::Inherit) => {
                return Err(ForgeError::InvalidInput(
                    "a resource block cannot inherit AS numbers".into(),
                ))
            }
            Some(ResourceSet::Explicit(blocks)) if !blocks.is_empty() => members.push((
                "asID",
                Value::record([(
                    "asnum",
                    Value::List(blocks.iter().map(|b| b.to_value()).collect()),
                )]),
            )),
            _ => {}
        }
        if !families.is_empty() {
            members.push(("ipAddrBlocks", Value::List(families)));
        }
        if members.is_empty() {
            return Err(ForgeError::InvalidInput(
                "a resource block needs AS numbers or addresses".into(),
            ));
        }
        Ok(Value::record(members))
    }

    pub fn from_block_value(value: &Value) -> ForgeResult<Self> {
        let mut resources = Self {
            ipv4: None,
            ipv6: None,
            asn: None,
        };
        if let Some(as_id) = value.get("asID") {
            let blocks = as_id
                .get("asnum")
                .and_then(Value::as_list)
                .ok_or_else(|| shape("asnum"))?
                .iter()
                .map(AsBlock::from_value)
                .collect::<ForgeResult<_>>()?;
            resources.asn = Some(ResourceSet::explicit(blocks));
        }
        if let Some(families) = value.get("ipAddrBlocks") {
            for entry in families.as_list().ok_or_else(|| shape("ipAddrBlocks"))? {
                let afi = entry
                    .get("addressFamily")
                    .and_then(Value::as_octets)
                    .ok_or_else(|| shape("addressFamily"))?;
                let family = AddressFamily::from_afi(afi)?;
                let blocks = entry
                    .get("addressesOrRanges")
                    .and_then(Value::as_list)
                    .ok_or_else(|| shape("addressesOrRanges"))?
                    .iter()
                    .map(|v| IpBlock::from_value(family, v))
                    .collect::<ForgeResult<_>>()?;
                let set = Some(ResourceSet::explicit(blocks));
                match family {
                    AddressFamily::Ipv4 => resources.ipv4 = set,
                    AddressFamily::Ipv6 => resources.ipv6 = set,
                }
            }
        }
        Ok(resources)
    }
}

fn ip_or_range_schema() -> Schema {
    Schema::Choice(vec![
        Field::required("addressPrefix", Schema::BitString),
        Field::required(
            "addressRange",
            Schema::sequence(vec![
                Field::required("min", Schema::BitString),
                Field::required("max", Schema::BitString),
            ]),
        ),
    ])
}

fn as_or_range_schema() -> Schema {
    Schema::Choice(vec![
        Field::required("id", Schema::Integer),
        Field::required(
            "range",
            Schema::sequence(vec![
                Field::required("min", Schema::Integer),
                Field::required("max", Schema::Integer),
            ]),
        ),
    ])
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(set: &Option<ResourceSet<T>>) -> String {
            match set {
                None => "-".to_string(),
                Some(ResourceSet::Inherit) => "inherit".to_string(),
                Some(ResourceSet::Explicit(items)) => items
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            }
        }
        write!(
            f,
            "ipv4={} ipv6={} asn={}",
            list(&self.ipv4),
            list(&self.ipv6),
            list(&self.asn)
        )
    }
}

fn shape(what: &str) -> ForgeError {
    ForgeError::DecodeError(format!("unexpected shape for {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_bits_follow_rfc3779_examples() {
        // 10.5.0.0/23 -> 03 04 01 0a 05 00
        let p: IpPrefix = "10.5.0.0/23".parse().unwrap();
        let bits = p.to_bits();
        assert_eq!(bits.bytes, vec![0x0a, 0x05, 0x00]);
        assert_eq!(bits.unused_bits, 1);
        assert_eq!(IpPrefix::from_bits(AddressFamily::Ipv4, &bits).unwrap(), p);

        let all: IpPrefix = "0.0.0.0/0".parse().unwrap();
        assert!(all.to_bits().bytes.is_empty());
    }

    #[test]
    fn host_bits_are_rejected() {
        assert!("10.0.0.1/8".parse::<IpPrefix>().is_err());
        assert!("10.0.0.0/33".parse::<IpPrefix>().is_err());
    }

    #[test]
    fn range_collapses_to_prefix() {
        let block: IpBlock = "10.0.0.0-10.0.255.255".parse().unwrap();
        assert_eq!(block, IpBlock::Prefix("10.0.0.0/16".parse().unwrap()));

        let block: IpBlock = "10.0.0.1-10.0.0.9".parse().unwrap();
        assert!(matches!(block, IpBlock::Range { .. }));
        assert!("10.0.0.9-10.0.0.1".parse::<IpBlock>().is_err());
    }

    #[test]
    fn explicit_resources_survive_extension_encoding() {
        let resources = Resources::parse(
            "2001:db8::/32, 10.0.0.0/8 192.168.0.1-192.168.0.20",
            "AS64496-AS64511, 65000",
        )
        .unwrap();
        let ip = resources.ip_extension().unwrap().unwrap();
        let asn = resources.as_extension().unwrap().unwrap();
        let decoded = Resources::from_extensions(Some(&ip), Some(&asn)).unwrap();
        assert_eq!(decoded, resources);
        assert_eq!(decoded.ip_blocks().count(), 3);
    }

    #[test]
    fn inherit_encodes_null_choice() {
        let resources = Resources::inherit();
        let asn = resources.as_extension().unwrap().unwrap();
        // SEQUENCE { [0] { NULL } }
        assert_eq!(asn, vec![0x30, 0x04, 0xa0, 0x02, 0x05, 0x00]);
        let ip = resources.ip_extension().unwrap().unwrap();
        let decoded = Resources::from_extensions(Some(&ip), Some(&asn)).unwrap();
        assert_eq!(decoded, resources);
    }

    #[test]
    fn all_resources_round_trip() {
        let resources = Resources::all();
        let ip = resources.ip_extension().unwrap();
        let asn = resources.as_extension().unwrap();
        let decoded = Resources::from_extensions(ip.as_deref(), asn.as_deref()).unwrap();
        assert_eq!(decoded, resources);
    }

    #[test]
    fn absent_families_produce_no_extension() {
        let resources = Resources::from_blocks(vec![], vec![AsBlock::Id(1)]);
        assert!(resources.ip_extension().unwrap().is_none());
        assert!(resources.as_extension().unwrap().is_some());
        assert_eq!(resources.to_string(), "ipv4=- ipv6=- asn=AS1");
    }

    #[test]
    fn resource_block_round_trip() {
        let resources = Resources::parse("192.0.2.0/24, 10.0.0.1-10.0.0.6, 2001:db8::/32", "65000-65010, 64496")
            .unwrap();
        let value = resources.to_block_value().unwrap();
        let der = codec::encode(&Resources::block_schema(), &value).unwrap();
        // [0] asID comes first
        assert_eq!(der[2], 0xa0);
        let decoded = codec::decode(&Resources::block_schema(), &der).unwrap();
        assert_eq!(Resources::from_block_value(&decoded).unwrap(), resources);
    }

    #[test]
    fn resource_block_rejects_inherit_and_empty() {
        assert!(Resources::inherit().to_block_value().is_err());
        assert!(Resources::from_blocks(vec![], vec![]).to_block_value().is_err());
        let only_as = Resources::from_blocks(vec![], vec![AsBlock::Id(7)]);
        let value = only_as.to_block_value().unwrap();
        assert!(value.get("ipAddrBlocks").is_none());
        assert_eq!(Resources::from_block_value(&value).unwrap(), only_as);
    }
}

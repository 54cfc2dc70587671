//! NDN packet types and structures.
//!
//! This module provides the core data structures that represent NDN packets:
//! names, Interests and Data, together with their TLV wire codecs and the
//! matching rules used by the Face.

use crate::error::Error;
use crate::lp::TagSet;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Maximum size of an NDN packet on the wire.
pub const MAX_NDN_PACKET_SIZE: usize = 8800;

/// Interest lifetime assumed when a packet does not carry one.
pub const DEFAULT_INTEREST_LIFETIME_MS: u64 = 4000;

/// Packet type discriminator used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Interest,
    Data,
    Nack,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketKind::Interest => write!(f, "Interest"),
            PacketKind::Data => write!(f, "Data"),
            PacketKind::Nack => write!(f, "Nack"),
        }
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

/// Represents an NDN name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameComponent(pub Bytes);

impl NameComponent {
    /// Creates a new name component from a byte slice.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Returns the component as bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Parses a component from its URI form, resolving `%XX` escapes.
    pub fn from_escaped(s: &str) -> Result<Self, Error> {
        let raw = s.as_bytes();
        let mut bytes = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'%' {
                if i + 3 > raw.len() {
                    return Err(Error::NdnPacket(format!("Truncated percent escape in '{s}'")));
                }
                let hex = std::str::from_utf8(&raw[i + 1..i + 3])
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| Error::NdnPacket(format!("Invalid percent escape in '{s}'")))?;
                bytes.push(hex);
                i += 3;
            } else {
                bytes.push(raw[i]);
                i += 1;
            }
        }
        Ok(Self(bytes.into()))
    }

    /// Encodes this name component as a TLV element.
    pub fn to_tlv(&self) -> TlvElement {
        TlvElement::new(tlv::TLV_COMPONENT, self.0.clone())
    }

    /// Decodes a name component from a TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_COMPONENT {
            return Err(Error::NdnPacket(format!(
                "Expected name component TLV type {}, got {}",
                tlv::TLV_COMPONENT,
                element.tlv_type
            )));
        }
        Ok(Self(element.value.clone()))
    }
}

impl From<&str> for NameComponent {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0.iter() {
            if is_unreserved(b) {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{b:02X}")?;
            }
        }
        Ok(())
    }
}

/// Represents an NDN name, which is a sequence of name components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    /// Creates a new empty NDN name.
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Creates a name from a URI representation with '/' as component
    /// separator, resolving `%XX` escapes.
    pub fn from_string(s: &str) -> Result<Self, Error> {
        let components = s
            .split('/')
            .filter(|comp| !comp.is_empty())
            .map(NameComponent::from_escaped)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { components })
    }

    /// Adds a component to the name.
    pub fn push(&mut self, component: impl Into<NameComponent>) -> &mut Self {
        self.components.push(component.into());
        self
    }

    /// Returns the number of components in the name.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if the name has no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns an iterator over the name components.
    pub fn components(&self) -> impl Iterator<Item = &NameComponent> {
        self.components.iter()
    }

    /// Gets a component at the specified index.
    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    /// Returns a prefix of this name with the specified length.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components.iter().take(len).cloned().collect(),
        }
    }

    /// Checks if this name is a prefix of another name.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.len() > other.len() {
            return false;
        }

        for (i, component) in self.components.iter().enumerate() {
            if component != &other.components[i] {
                return false;
            }
        }

        true
    }

    /// Encodes this name as a TLV element.
    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();

        for component in &self.components {
            component.to_tlv().encode(&mut buf);
        }

        TlvElement::new(tlv::TLV_NAME, buf.freeze())
    }

    /// Decodes a name from a TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_NAME {
            return Err(Error::NdnPacket(format!(
                "Expected name TLV type {}, got {}",
                tlv::TLV_NAME,
                element.tlv_type
            )));
        }

        let mut components = Vec::new();
        let mut buf = element.value.clone();

        while buf.has_remaining() {
            let element = TlvElement::decode(&mut buf)?;
            components.push(NameComponent::from_tlv(&element)?);
        }

        Ok(Self { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }

        for component in &self.components {
            write!(f, "/{component}")?;
        }

        Ok(())
    }
}

impl std::str::FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Self::from_string(s)
    }
}

/// Represents an NDN Interest packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interest {
    name: Name,
    nonce: u32,
    lifetime_ms: u64,
    hop_limit: Option<u8>,
    can_be_prefix: bool,
    must_be_fresh: bool,
    application_parameters: Option<Bytes>,
    tags: TagSet,
}

impl Interest {
    /// Creates a new Interest packet with a clock-derived nonce.
    pub fn new(name: Name) -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0));

        let nonce = (now.as_millis() % u128::from(u32::MAX)) as u32;

        Self {
            name,
            nonce,
            lifetime_ms: DEFAULT_INTEREST_LIFETIME_MS,
            hop_limit: None,
            can_be_prefix: false,
            must_be_fresh: false,
            application_parameters: None,
            tags: TagSet::default(),
        }
    }

    /// Sets the Interest lifetime in milliseconds.
    pub fn with_lifetime(mut self, lifetime_ms: u64) -> Self {
        self.lifetime_ms = lifetime_ms;
        self
    }

    /// Sets the nonce value.
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the can_be_prefix flag.
    pub fn with_can_be_prefix(mut self, can_be_prefix: bool) -> Self {
        self.can_be_prefix = can_be_prefix;
        self
    }

    /// Sets the must_be_fresh flag.
    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    /// Sets the hop limit.
    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = Some(hop_limit);
        self
    }

    /// Attaches application parameters.
    pub fn with_application_parameters(mut self, parameters: impl Into<Bytes>) -> Self {
        self.application_parameters = Some(parameters.into());
        self
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Replaces the name, e.g. to append signed-Interest components.
    pub fn set_name(&mut self, name: Name) {
        self.name = name;
    }

    pub fn nonce(&self) -> u32 {
        self.nonce
    }

    pub fn lifetime_ms(&self) -> u64 {
        self.lifetime_ms
    }

    /// Interest lifetime as a [`Duration`].
    pub fn lifetime(&self) -> Duration {
        Duration::from_millis(self.lifetime_ms)
    }

    pub fn can_be_prefix(&self) -> bool {
        self.can_be_prefix
    }

    pub fn must_be_fresh(&self) -> bool {
        self.must_be_fresh
    }

    pub fn application_parameters(&self) -> Option<&Bytes> {
        self.application_parameters.as_ref()
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagSet {
        &mut self.tags
    }

    /// Checks whether `data` satisfies this Interest.
    pub fn matches_data(&self, data: &Data) -> bool {
        let name_ok = if self.can_be_prefix {
            self.name.is_prefix_of(data.name())
        } else {
            self.name == *data.name()
        };
        name_ok && (!self.must_be_fresh || data.freshness_period_ms() > 0)
    }

    /// Checks whether `other` would be aggregated with this Interest:
    /// same name and same selectors.
    pub fn matches_interest(&self, other: &Interest) -> bool {
        self.name == other.name
            && self.can_be_prefix == other.can_be_prefix
            && self.must_be_fresh == other.must_be_fresh
    }

    /// Encodes this Interest into its TLV wire form.
    pub fn encode(&self) -> Result<Bytes, Error> {
        let mut body = BytesMut::new();
        self.name.to_tlv().encode(&mut body);

        if self.can_be_prefix {
            TlvElement::new(tlv::TLV_CAN_BE_PREFIX, Bytes::new()).encode(&mut body);
        }
        if self.must_be_fresh {
            TlvElement::new(tlv::TLV_MUST_BE_FRESH, Bytes::new()).encode(&mut body);
        }

        // Nonce is always 4 octets on the wire
        let mut nonce = BytesMut::with_capacity(4);
        nonce.put_u32(self.nonce);
        TlvElement::new(tlv::TLV_NONCE, nonce.freeze()).encode(&mut body);

        if self.lifetime_ms != DEFAULT_INTEREST_LIFETIME_MS {
            TlvElement::from_nonneg_integer(tlv::TLV_INTEREST_LIFETIME, self.lifetime_ms)
                .encode(&mut body);
        }
        if let Some(hop_limit) = self.hop_limit {
            TlvElement::new(tlv::TLV_HOP_LIMIT, vec![hop_limit]).encode(&mut body);
        }
        if let Some(parameters) = &self.application_parameters {
            TlvElement::new(tlv::TLV_APPLICATION_PARAMETERS, parameters.clone()).encode(&mut body);
        }

        Ok(TlvElement::new(tlv::TLV_INTEREST, body.freeze()).to_bytes())
    }

    /// Decodes an Interest from its TLV wire form.
    pub fn decode(wire: Bytes) -> Result<Self, Error> {
        let mut buf = wire;
        let outer = TlvElement::decode(&mut buf)?;
        if outer.tlv_type != tlv::TLV_INTEREST {
            return Err(Error::NdnPacket(format!(
                "Expected Interest TLV type {}, got {}",
                tlv::TLV_INTEREST,
                outer.tlv_type
            )));
        }

        let mut name = None;
        let mut nonce = 0u32;
        let mut lifetime_ms = DEFAULT_INTEREST_LIFETIME_MS;
        let mut hop_limit = None;
        let mut can_be_prefix = false;
        let mut must_be_fresh = false;
        let mut application_parameters = None;

        for element in TlvElement::decode_all(outer.value)? {
            match element.tlv_type {
                tlv::TLV_NAME => name = Some(Name::from_tlv(&element)?),
                tlv::TLV_CAN_BE_PREFIX => can_be_prefix = true,
                tlv::TLV_MUST_BE_FRESH => must_be_fresh = true,
                tlv::TLV_NONCE => nonce = element.as_nonneg_integer()? as u32,
                tlv::TLV_INTEREST_LIFETIME => lifetime_ms = element.as_nonneg_integer()?,
                tlv::TLV_HOP_LIMIT => {
                    hop_limit = element.value.first().copied();
                }
                tlv::TLV_APPLICATION_PARAMETERS => {
                    application_parameters = Some(element.value.clone())
                }
                _ => {} // unrecognized fields are skipped
            }
        }

        Ok(Self {
            name: name.ok_or_else(|| Error::NdnPacket("Interest has no Name".into()))?,
            nonce,
            lifetime_ms,
            hop_limit,
            can_be_prefix,
            must_be_fresh,
            application_parameters,
            tags: TagSet::default(),
        })
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        let mut delim = '?';
        if self.can_be_prefix {
            write!(f, "{delim}CanBePrefix")?;
            delim = '&';
        }
        if self.must_be_fresh {
            write!(f, "{delim}MustBeFresh")?;
            delim = '&';
        }
        write!(f, "{delim}Nonce={:08x}", self.nonce)
    }
}

/// Signature algorithm discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureType {
    DigestSha256,
    Sha256WithRsa,
    Sha256WithEcdsa,
}

impl SignatureType {
    fn to_u64(self) -> u64 {
        match self {
            SignatureType::DigestSha256 => 0,
            SignatureType::Sha256WithRsa => 1,
            SignatureType::Sha256WithEcdsa => 3,
        }
    }

    fn from_u64(value: u64) -> Result<Self, Error> {
        match value {
            0 => Ok(SignatureType::DigestSha256),
            1 => Ok(SignatureType::Sha256WithRsa),
            3 => Ok(SignatureType::Sha256WithEcdsa),
            other => Err(Error::NdnPacket(format!("Unknown signature type {other}"))),
        }
    }
}

/// Describes how a Data packet was signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature_type: SignatureType,
    pub key_locator: Option<Name>,
}

/// Represents an NDN Data packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Data {
    name: Name,
    content: Bytes,
    content_type: u64,
    freshness_period_ms: u64,
    signature_info: Option<SignatureInfo>,
    signature_value: Bytes,
    tags: TagSet,
}

impl Data {
    /// Creates a new unsigned Data packet.
    pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
        Self {
            name,
            content: content.into(),
            content_type: 0,
            freshness_period_ms: 0,
            signature_info: None,
            signature_value: Bytes::new(),
            tags: TagSet::default(),
        }
    }

    /// Sets the freshness period in milliseconds.
    pub fn with_freshness_period(mut self, freshness_period_ms: u64) -> Self {
        self.freshness_period_ms = freshness_period_ms;
        self
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: u64) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn content_type(&self) -> u64 {
        self.content_type
    }

    pub fn freshness_period_ms(&self) -> u64 {
        self.freshness_period_ms
    }

    pub fn signature_info(&self) -> Option<&SignatureInfo> {
        self.signature_info.as_ref()
    }

    pub fn signature_value(&self) -> &Bytes {
        &self.signature_value
    }

    /// Attaches a signature to this packet.
    pub fn set_signature(&mut self, info: SignatureInfo, value: impl Into<Bytes>) {
        self.signature_info = Some(info);
        self.signature_value = value.into();
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagSet {
        &mut self.tags
    }

    /// Encodes this Data into its TLV wire form.
    pub fn encode(&self) -> Result<Bytes, Error> {
        let mut body = BytesMut::new();
        self.name.to_tlv().encode(&mut body);

        if self.content_type != 0 || self.freshness_period_ms != 0 {
            let mut meta = BytesMut::new();
            if self.content_type != 0 {
                TlvElement::from_nonneg_integer(tlv::TLV_CONTENT_TYPE, self.content_type)
                    .encode(&mut meta);
            }
            if self.freshness_period_ms != 0 {
                TlvElement::from_nonneg_integer(tlv::TLV_FRESHNESS_PERIOD, self.freshness_period_ms)
                    .encode(&mut meta);
            }
            TlvElement::new(tlv::TLV_META_INFO, meta.freeze()).encode(&mut body);
        }

        TlvElement::new(tlv::TLV_CONTENT, self.content.clone()).encode(&mut body);

        if let Some(info) = &self.signature_info {
            let mut sig = BytesMut::new();
            TlvElement::from_nonneg_integer(tlv::TLV_SIGNATURE_TYPE, info.signature_type.to_u64())
                .encode(&mut sig);
            TlvElement::new(tlv::TLV_SIGNATURE_INFO, sig.freeze()).encode(&mut body);
            TlvElement::new(tlv::TLV_SIGNATURE_VALUE, self.signature_value.clone())
                .encode(&mut body);
        }

        Ok(TlvElement::new(tlv::TLV_DATA, body.freeze()).to_bytes())
    }

    /// Decodes a Data from its TLV wire form.
    pub fn decode(wire: Bytes) -> Result<Self, Error> {
        let mut buf = wire;
        let outer = TlvElement::decode(&mut buf)?;
        if outer.tlv_type != tlv::TLV_DATA {
            return Err(Error::NdnPacket(format!(
                "Expected Data TLV type {}, got {}",
                tlv::TLV_DATA,
                outer.tlv_type
            )));
        }

        let mut name = None;
        let mut content = Bytes::new();
        let mut content_type = 0;
        let mut freshness_period_ms = 0;
        let mut signature_info = None;
        let mut signature_value = Bytes::new();

        for element in TlvElement::decode_all(outer.value)? {
            match element.tlv_type {
                tlv::TLV_NAME => name = Some(Name::from_tlv(&element)?),
                tlv::TLV_META_INFO => {
                    for meta in TlvElement::decode_all(element.value.clone())? {
                        match meta.tlv_type {
                            tlv::TLV_CONTENT_TYPE => content_type = meta.as_nonneg_integer()?,
                            tlv::TLV_FRESHNESS_PERIOD => {
                                freshness_period_ms = meta.as_nonneg_integer()?
                            }
                            _ => {}
                        }
                    }
                }
                tlv::TLV_CONTENT => content = element.value.clone(),
                tlv::TLV_SIGNATURE_INFO => {
                    for sig in TlvElement::decode_all(element.value.clone())? {
                        if sig.tlv_type == tlv::TLV_SIGNATURE_TYPE {
                            signature_info = Some(SignatureInfo {
                                signature_type: SignatureType::from_u64(
                                    sig.as_nonneg_integer()?,
                                )?,
                                key_locator: None,
                            });
                        }
                    }
                }
                tlv::TLV_SIGNATURE_VALUE => signature_value = element.value.clone(),
                _ => {}
            }
        }

        Ok(Self {
            name: name.ok_or_else(|| Error::NdnPacket("Data has no Name".into()))?,
            content,
            content_type,
            freshness_period_ms,
            signature_info,
            signature_value,
            tags: TagSet::default(),
        })
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests;

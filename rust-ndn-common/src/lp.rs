//! NDNLP link-adaptation layer: packet container, header fields, and Nack.
//!
//! An NDNLP packet carries a bare network packet in its `Fragment` field and
//! may prepend header fields (Nack, NextHopFaceId, IncomingFaceId,
//! CachePolicy, CongestionMark). A packet with no header fields is encoded as
//! the bare fragment itself.

use crate::error::Error;
use crate::ndn::Interest;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// CachePolicy header values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachePolicyType {
    NoCache,
}

impl CachePolicyType {
    fn to_u64(self) -> u64 {
        match self {
            CachePolicyType::NoCache => 1,
        }
    }

    fn from_u64(value: u64) -> Option<Self> {
        match value {
            1 => Some(CachePolicyType::NoCache),
            _ => None,
        }
    }
}

/// Link-layer tags carried alongside a network packet.
///
/// On the send path these are copied into NDNLP header fields; on the receive
/// path incoming header fields are materialized here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    pub incoming_face_id: Option<u64>,
    pub next_hop_face_id: Option<u64>,
    pub congestion_mark: Option<u64>,
    pub cache_policy: Option<CachePolicyType>,
}

/// Reason code carried in a Nack header, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NackReason {
    None,
    Congestion,
    Duplicate,
    NoRoute,
}

impl NackReason {
    fn to_u64(self) -> u64 {
        match self {
            NackReason::None => 0,
            NackReason::Congestion => 50,
            NackReason::Duplicate => 100,
            NackReason::NoRoute => 150,
        }
    }

    fn from_u64(value: u64) -> Self {
        match value {
            50 => NackReason::Congestion,
            100 => NackReason::Duplicate,
            150 => NackReason::NoRoute,
            _ => NackReason::None,
        }
    }
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NackReason::None => write!(f, "None"),
            NackReason::Congestion => write!(f, "Congestion"),
            NackReason::Duplicate => write!(f, "Duplicate"),
            NackReason::NoRoute => write!(f, "NoRoute"),
        }
    }
}

/// Compares Nack reasons: returns true if `x` is strictly less severe than
/// `y`. An unspecified reason is treated as most severe.
pub fn is_less_severe(x: NackReason, y: NackReason) -> bool {
    if x == NackReason::None {
        return false;
    }
    if y == NackReason::None {
        return true;
    }
    x.to_u64() < y.to_u64()
}

/// A network-layer Nack: the rejected Interest plus a reason code.
#[derive(Debug, Clone)]
pub struct Nack {
    interest: Interest,
    reason: NackReason,
    tags: TagSet,
}

impl Nack {
    pub fn new(interest: Interest, reason: NackReason) -> Self {
        Self {
            interest,
            reason,
            tags: TagSet::default(),
        }
    }

    pub fn interest(&self) -> &Interest {
        &self.interest
    }

    pub fn reason(&self) -> NackReason {
        self.reason
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagSet {
        &mut self.tags
    }
}

impl fmt::Display for Nack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.interest, self.reason)
    }
}

/// An NDNLP packet: optional header fields plus the wire form of the
/// enclosed network packet.
#[derive(Debug, Clone, Default)]
pub struct LpPacket {
    fragment: Option<Bytes>,
    nack: Option<NackReason>,
    next_hop_face_id: Option<u64>,
    incoming_face_id: Option<u64>,
    congestion_mark: Option<u64>,
    cache_policy: Option<CachePolicyType>,
}

impl LpPacket {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if any header field is set (the Fragment does not count).
    pub fn has_headers(&self) -> bool {
        self.nack.is_some()
            || self.next_hop_face_id.is_some()
            || self.incoming_face_id.is_some()
            || self.congestion_mark.is_some()
            || self.cache_policy.is_some()
    }

    pub fn fragment(&self) -> Option<&Bytes> {
        self.fragment.as_ref()
    }

    pub fn set_fragment(&mut self, wire: Bytes) {
        self.fragment = Some(wire);
    }

    pub fn nack(&self) -> Option<NackReason> {
        self.nack
    }

    pub fn set_nack(&mut self, reason: NackReason) {
        self.nack = Some(reason);
    }

    pub fn next_hop_face_id(&self) -> Option<u64> {
        self.next_hop_face_id
    }

    pub fn set_next_hop_face_id(&mut self, face_id: Option<u64>) {
        self.next_hop_face_id = face_id;
    }

    pub fn incoming_face_id(&self) -> Option<u64> {
        self.incoming_face_id
    }

    pub fn set_incoming_face_id(&mut self, face_id: Option<u64>) {
        self.incoming_face_id = face_id;
    }

    pub fn congestion_mark(&self) -> Option<u64> {
        self.congestion_mark
    }

    pub fn set_congestion_mark(&mut self, mark: Option<u64>) {
        self.congestion_mark = mark;
    }

    pub fn cache_policy(&self) -> Option<CachePolicyType> {
        self.cache_policy
    }

    pub fn set_cache_policy(&mut self, policy: Option<CachePolicyType>) {
        self.cache_policy = policy;
    }

    /// Encodes this packet. With no header fields set, the encoding is the
    /// bare fragment; otherwise an LpPacket TLV with headers first and the
    /// Fragment last.
    pub fn encode(&self) -> Result<Bytes, Error> {
        if !self.has_headers() {
            return self
                .fragment
                .clone()
                .ok_or_else(|| Error::Tlv("LpPacket has neither headers nor fragment".into()));
        }

        let mut body = BytesMut::new();

        if let Some(reason) = self.nack {
            let mut nack_body = BytesMut::new();
            if reason != NackReason::None {
                TlvElement::from_nonneg_integer(tlv::TLV_LP_NACK_REASON, reason.to_u64())
                    .encode(&mut nack_body);
            }
            TlvElement::new(tlv::TLV_LP_NACK, nack_body.freeze()).encode(&mut body);
        }
        if let Some(face_id) = self.next_hop_face_id {
            TlvElement::from_nonneg_integer(tlv::TLV_LP_NEXT_HOP_FACE_ID, face_id)
                .encode(&mut body);
        }
        if let Some(face_id) = self.incoming_face_id {
            TlvElement::from_nonneg_integer(tlv::TLV_LP_INCOMING_FACE_ID, face_id)
                .encode(&mut body);
        }
        if let Some(policy) = self.cache_policy {
            let mut policy_body = BytesMut::new();
            TlvElement::from_nonneg_integer(tlv::TLV_LP_CACHE_POLICY_TYPE, policy.to_u64())
                .encode(&mut policy_body);
            TlvElement::new(tlv::TLV_LP_CACHE_POLICY, policy_body.freeze()).encode(&mut body);
        }
        if let Some(mark) = self.congestion_mark {
            TlvElement::from_nonneg_integer(tlv::TLV_LP_CONGESTION_MARK, mark).encode(&mut body);
        }
        if let Some(fragment) = &self.fragment {
            TlvElement::new(tlv::TLV_LP_FRAGMENT, fragment.clone()).encode(&mut body);
        }

        Ok(TlvElement::new(tlv::TLV_LP_PACKET, body.freeze()).to_bytes())
    }

    /// Decodes an NDNLP packet. A bare Interest or Data is a valid LpPacket
    /// whose fragment is the whole buffer.
    pub fn decode(wire: Bytes) -> Result<Self, Error> {
        let mut peek = wire.clone();
        if !peek.has_remaining() {
            return Err(Error::Tlv("Empty packet".into()));
        }
        let outer_type = tlv::decode_var_number(&mut peek)?;

        if outer_type == tlv::TLV_INTEREST || outer_type == tlv::TLV_DATA {
            let mut packet = Self::new();
            packet.fragment = Some(wire);
            return Ok(packet);
        }
        if outer_type != tlv::TLV_LP_PACKET {
            return Err(Error::Tlv(format!(
                "Unrecognized outer TLV type {outer_type}"
            )));
        }

        let mut buf = wire;
        let outer = TlvElement::decode(&mut buf)?;
        let mut packet = Self::new();

        for element in TlvElement::decode_all(outer.value)? {
            match element.tlv_type {
                tlv::TLV_LP_FRAGMENT => packet.fragment = Some(element.value.clone()),
                tlv::TLV_LP_NACK => {
                    let mut reason = NackReason::None;
                    for field in TlvElement::decode_all(element.value.clone())? {
                        if field.tlv_type == tlv::TLV_LP_NACK_REASON {
                            reason = NackReason::from_u64(field.as_nonneg_integer()?);
                        }
                    }
                    packet.nack = Some(reason);
                }
                tlv::TLV_LP_NEXT_HOP_FACE_ID => {
                    packet.next_hop_face_id = Some(element.as_nonneg_integer()?)
                }
                tlv::TLV_LP_INCOMING_FACE_ID => {
                    packet.incoming_face_id = Some(element.as_nonneg_integer()?)
                }
                tlv::TLV_LP_CACHE_POLICY => {
                    for field in TlvElement::decode_all(element.value.clone())? {
                        if field.tlv_type == tlv::TLV_LP_CACHE_POLICY_TYPE {
                            packet.cache_policy =
                                CachePolicyType::from_u64(field.as_nonneg_integer()?);
                        }
                    }
                }
                tlv::TLV_LP_CONGESTION_MARK => {
                    packet.congestion_mark = Some(element.as_nonneg_integer()?)
                }
                _ => {} // unrecognized ignorable headers are skipped
            }
        }

        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndn::Name;

    #[test]
    fn bare_packet_round_trip() {
        let interest = Interest::new(Name::from_string("/test").unwrap());
        let wire = interest.encode().unwrap();

        let mut lp = LpPacket::new();
        lp.set_fragment(wire.clone());
        assert!(!lp.has_headers());
        assert_eq!(lp.encode().unwrap(), wire);

        let decoded = LpPacket::decode(wire.clone()).unwrap();
        assert_eq!(decoded.fragment().unwrap(), &wire);
        assert!(decoded.nack().is_none());
    }

    #[test]
    fn nack_header_round_trip() {
        let interest = Interest::new(Name::from_string("/test").unwrap()).with_nonce(7);
        let wire = interest.encode().unwrap();

        let mut lp = LpPacket::new();
        lp.set_nack(NackReason::Congestion);
        lp.set_congestion_mark(Some(1));
        lp.set_fragment(wire.clone());

        let encoded = lp.encode().unwrap();
        let decoded = LpPacket::decode(encoded).unwrap();
        assert_eq!(decoded.nack(), Some(NackReason::Congestion));
        assert_eq!(decoded.congestion_mark(), Some(1));
        assert_eq!(decoded.fragment().unwrap(), &wire);
    }

    #[test]
    fn severity_ordering() {
        assert!(is_less_severe(NackReason::Congestion, NackReason::Duplicate));
        assert!(is_less_severe(NackReason::Duplicate, NackReason::NoRoute));
        assert!(is_less_severe(NackReason::Congestion, NackReason::None));
        assert!(!is_less_severe(NackReason::None, NackReason::Congestion));
    }
}

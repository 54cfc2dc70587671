//! TLV (Type‑Length‑Value) encoding and decoding utilities.
//!
//! This module provides functions for encoding and decoding NDN TLV packets.
//! Both the *type* and *length* fields use the NDN variable‑width number
//! scheme, so types above 252 (the NDNLP and management layers) round‑trip
//! correctly.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/* ---------------------------------------------------------------- *
 * TLV type constants — network layer
 * ---------------------------------------------------------------- */

pub const TLV_INTEREST: u64               = 0x05;
pub const TLV_DATA: u64                   = 0x06;
pub const TLV_NAME: u64                   = 0x07;
pub const TLV_COMPONENT: u64              = 0x08;
pub const TLV_CAN_BE_PREFIX: u64          = 0x21;
pub const TLV_MUST_BE_FRESH: u64          = 0x12;
pub const TLV_NONCE: u64                  = 0x0A;
pub const TLV_INTEREST_LIFETIME: u64      = 0x0C;
pub const TLV_HOP_LIMIT: u64              = 0x22;
pub const TLV_APPLICATION_PARAMETERS: u64 = 0x24;
pub const TLV_META_INFO: u64              = 0x14;
pub const TLV_CONTENT_TYPE: u64           = 0x18;
pub const TLV_FRESHNESS_PERIOD: u64       = 0x19;
pub const TLV_CONTENT: u64                = 0x15;
pub const TLV_SIGNATURE_INFO: u64         = 0x16;
pub const TLV_SIGNATURE_TYPE: u64         = 0x1B;
pub const TLV_SIGNATURE_VALUE: u64        = 0x17;

/* ---------------------------------------------------------------- *
 * TLV type constants — NDNLP link layer
 * ---------------------------------------------------------------- */

pub const TLV_LP_PACKET: u64        = 100;
pub const TLV_LP_FRAGMENT: u64      = 80;
pub const TLV_LP_NACK: u64          = 800;
pub const TLV_LP_NACK_REASON: u64   = 801;
pub const TLV_LP_NEXT_HOP_FACE_ID: u64  = 816;
pub const TLV_LP_INCOMING_FACE_ID: u64  = 817;
pub const TLV_LP_CACHE_POLICY: u64      = 820;
pub const TLV_LP_CACHE_POLICY_TYPE: u64 = 821;
pub const TLV_LP_CONGESTION_MARK: u64   = 832;

/* ---------------------------------------------------------------- *
 * TLV type constants — management layer
 * ---------------------------------------------------------------- */

pub const TLV_CONTROL_RESPONSE: u64   = 101;
pub const TLV_STATUS_CODE: u64        = 102;
pub const TLV_STATUS_TEXT: u64        = 103;
pub const TLV_CONTROL_PARAMETERS: u64 = 104;
pub const TLV_FACE_ID: u64            = 105;
pub const TLV_COST: u64               = 106;
pub const TLV_FLAGS: u64              = 108;
pub const TLV_EXPIRATION_PERIOD: u64  = 109;
pub const TLV_ORIGIN: u64             = 111;
pub const TLV_VALIDITY_PERIOD: u64    = 253;
pub const TLV_NOT_BEFORE: u64         = 254;
pub const TLV_NOT_AFTER: u64          = 255;

/* ---------------------------------------------------------------- *
 * Encoding helpers
 * ---------------------------------------------------------------- */

/// Encode an NDN variable‑width number (used for both TLV type and length).
///
/// * `< 253`  → 1 byte
/// * `≤ 65 535`  → marker 253 + 2‑byte value
/// * otherwise → marker 254 + 4‑byte value (max ≈ 4 GB)
pub fn encode_var_number(value: u64, buf: &mut BytesMut) {
    if value < 253 {
        buf.put_u8(value as u8);
    } else if value <= 65_535 {
        buf.put_u8(253);
        buf.put_u16(value as u16);
    } else {
        buf.put_u8(254);
        buf.put_u32(value as u32);
    }
}

/// Number of bytes `encode_var_number` emits for `value`.
pub fn var_number_size(value: u64) -> usize {
    if value < 253 {
        1
    } else if value <= 65_535 {
        3
    } else {
        5
    }
}

/// Encode a non‑negative integer in the shortest of 1, 2, 4 or 8 bytes,
/// big‑endian, per the NDN packet format.
pub fn encode_nonneg_integer(value: u64, buf: &mut BytesMut) {
    if value <= 0xFF {
        buf.put_u8(value as u8);
    } else if value <= 0xFFFF {
        buf.put_u16(value as u16);
    } else if value <= 0xFFFF_FFFF {
        buf.put_u32(value as u32);
    } else {
        buf.put_u64(value);
    }
}

/// Number of bytes `encode_nonneg_integer` emits for `value`.
pub fn nonneg_integer_size(value: u64) -> usize {
    if value <= 0xFF {
        1
    } else if value <= 0xFFFF {
        2
    } else if value <= 0xFFFF_FFFF {
        4
    } else {
        8
    }
}

/* ---------------------------------------------------------------- *
 * Decoding helpers
 * ---------------------------------------------------------------- */

/// Decode an NDN variable‑width number.
pub fn decode_var_number(buf: &mut impl Buf) -> Result<u64, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("Buffer underflow when decoding variable-width number".into()));
    }

    let first_byte = buf.get_u8();
    match first_byte {
        0..=252 => Ok(u64::from(first_byte)),
        253 => {
            if buf.remaining() < 2 {
                return Err(Error::Tlv("Buffer underflow when decoding 16‑bit number".into()));
            }
            Ok(u64::from(buf.get_u16()))
        }
        254 => {
            if buf.remaining() < 4 {
                return Err(Error::Tlv("Buffer underflow when decoding 32‑bit number".into()));
            }
            Ok(u64::from(buf.get_u32()))
        }
        255 => Err(Error::Tlv("64‑bit TLV numbers not supported".into())),
    }
}

/// Decode a non‑negative integer of 1, 2, 4 or 8 bytes.
pub fn decode_nonneg_integer(value: &[u8]) -> Result<u64, Error> {
    match value.len() {
        1 => Ok(u64::from(value[0])),
        2 => Ok(u64::from(u16::from_be_bytes([value[0], value[1]]))),
        4 => Ok(u64::from(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))),
        8 => Ok(u64::from_be_bytes([
            value[0], value[1], value[2], value[3], value[4], value[5], value[6], value[7],
        ])),
        n => Err(Error::Tlv(format!("Invalid non-negative integer length {n}"))),
    }
}

/* ---------------------------------------------------------------- *
 * TLV element wrapper
 * ---------------------------------------------------------------- */

/// A generic TLV element consisting of *type*, *length* and *value*.
#[derive(Debug, Clone, PartialEq)]
pub struct TlvElement {
    pub tlv_type: u64,
    pub value: Bytes,
}

impl TlvElement {
    /// Create a new wrapper from raw parts.
    pub fn new(tlv_type: u64, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Create an element whose value is a non‑negative integer.
    pub fn from_nonneg_integer(tlv_type: u64, value: u64) -> Self {
        let mut buf = BytesMut::with_capacity(8);
        encode_nonneg_integer(value, &mut buf);
        Self::new(tlv_type, buf.freeze())
    }

    /// Interpret the value as a non‑negative integer.
    pub fn as_nonneg_integer(&self) -> Result<u64, Error> {
        decode_nonneg_integer(&self.value)
    }

    /// Total number of bytes when this element is encoded.
    pub fn len(&self) -> usize {
        let vlen = self.value.len();
        var_number_size(self.tlv_type) + var_number_size(vlen as u64) + vlen
    }

    /// True if the element carries an empty value.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Encode this element into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_var_number(self.tlv_type, buf);
        encode_var_number(self.value.len() as u64, buf);
        buf.extend_from_slice(&self.value);
    }

    /// Wire form of this element as a standalone buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a single element from `buf` **in‑place**.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < 2 {
            return Err(Error::Tlv("Buffer too small for TLV header".into()));
        }

        let tlv_type = decode_var_number(buf)?;
        let length = decode_var_number(buf)? as usize;

        if buf.remaining() < length {
            return Err(Error::Tlv(format!(
                "Buffer underflow: TLV value requires {} bytes but only {} available",
                length,
                buf.remaining()
            )));
        }

        // bytes 1.*: cheap zero‑copy slice
        let value = buf.copy_to_bytes(length);
        Ok(Self { tlv_type, value })
    }

    /// Decode all elements contained in `value` until it is exhausted.
    pub fn decode_all(mut value: Bytes) -> Result<Vec<Self>, Error> {
        let mut elements = Vec::new();
        while value.has_remaining() {
            elements.push(Self::decode(&mut value)?);
        }
        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_number_round_trip() {
        let mut buf = BytesMut::new();

        encode_var_number(100, &mut buf);
        assert_eq!(buf.len(), 1);
        let mut r = buf.clone().freeze();
        assert_eq!(decode_var_number(&mut r).unwrap(), 100);
        buf.clear();

        encode_var_number(1000, &mut buf);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf[0], 253);
        let mut r = buf.clone().freeze();
        assert_eq!(decode_var_number(&mut r).unwrap(), 1000);
        buf.clear();

        encode_var_number(100_000, &mut buf);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf[0], 254);
        let mut r = buf.clone().freeze();
        assert_eq!(decode_var_number(&mut r).unwrap(), 100_000);
    }

    #[test]
    fn element_round_trip() {
        let element = TlvElement::new(TLV_LP_CONGESTION_MARK, Bytes::from_static(b"\x01"));
        let wire = element.to_bytes();
        // type 832 takes 3 bytes, length 1 byte, value 1 byte
        assert_eq!(wire.len(), 5);

        let mut r = wire;
        let decoded = TlvElement::decode(&mut r).unwrap();
        assert_eq!(decoded, element);
        assert!(!r.has_remaining());
    }

    #[test]
    fn nonneg_integer_widths() {
        for (value, width) in [(0u64, 1usize), (255, 1), (256, 2), (65_536, 4), (1 << 40, 8)] {
            let element = TlvElement::from_nonneg_integer(TLV_NONCE, value);
            assert_eq!(element.value.len(), width);
            assert_eq!(element.as_nonneg_integer().unwrap(), value);
        }
    }

    #[test]
    fn truncated_element_is_rejected() {
        let element = TlvElement::new(TLV_NAME, Bytes::from_static(b"abcdef"));
        let wire = element.to_bytes();
        let mut truncated = wire.slice(..wire.len() - 2);
        assert!(TlvElement::decode(&mut truncated).is_err());
    }
}

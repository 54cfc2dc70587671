//! Encodings for the forwarder's management protocol.
//!
//! Covers the pieces the Face needs to talk to the RIB management module:
//! `ControlParameters` carried inside command Interests, `ControlResponse`
//! carried in reply Data, and the `PrefixAnnouncement` object used by the
//! announce command.

use crate::error::Error;
use crate::ndn::{Data, Name, NameComponent, SignatureInfo, SignatureType};
use crate::tlv::{self, TlvElement};
use bytes::{Bytes, BytesMut};

/* ---------------------------------------------------------------- *
 * Route constants
 * ---------------------------------------------------------------- */

pub const ROUTE_ORIGIN_APP: u64 = 0;
pub const ROUTE_ORIGIN_PREFIXANN: u64 = 129;

pub const ROUTE_FLAG_CHILD_INHERIT: u64 = 1;
pub const ROUTE_FLAG_CAPTURE: u64 = 2;

/// Status code of a successful management command.
pub const STATUS_OK: u32 = 200;

/* ---------------------------------------------------------------- *
 * ControlParameters
 * ---------------------------------------------------------------- */

/// Parameters of a management command, carried as a name component of the
/// command Interest and echoed in the response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlParameters {
    pub name: Option<Name>,
    pub face_id: Option<u64>,
    pub origin: Option<u64>,
    pub cost: Option<u64>,
    pub flags: Option<u64>,
    pub expiration_period_ms: Option<u64>,
}

impl ControlParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: Name) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_face_id(mut self, face_id: u64) -> Self {
        self.face_id = Some(face_id);
        self
    }

    pub fn with_origin(mut self, origin: u64) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_flags(mut self, flags: u64) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn with_expiration_period(mut self, expiration_ms: u64) -> Self {
        self.expiration_period_ms = Some(expiration_ms);
        self
    }

    /// Encodes into a ControlParameters TLV block.
    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();

        if let Some(name) = &self.name {
            name.to_tlv().encode(&mut body);
        }
        if let Some(face_id) = self.face_id {
            TlvElement::from_nonneg_integer(tlv::TLV_FACE_ID, face_id).encode(&mut body);
        }
        if let Some(origin) = self.origin {
            TlvElement::from_nonneg_integer(tlv::TLV_ORIGIN, origin).encode(&mut body);
        }
        if let Some(cost) = self.cost {
            TlvElement::from_nonneg_integer(tlv::TLV_COST, cost).encode(&mut body);
        }
        if let Some(flags) = self.flags {
            TlvElement::from_nonneg_integer(tlv::TLV_FLAGS, flags).encode(&mut body);
        }
        if let Some(expiration) = self.expiration_period_ms {
            TlvElement::from_nonneg_integer(tlv::TLV_EXPIRATION_PERIOD, expiration)
                .encode(&mut body);
        }

        TlvElement::new(tlv::TLV_CONTROL_PARAMETERS, body.freeze()).to_bytes()
    }

    /// Decodes from a ControlParameters TLV block.
    pub fn decode(wire: Bytes) -> Result<Self, Error> {
        let mut buf = wire;
        let outer = TlvElement::decode(&mut buf)?;
        if outer.tlv_type != tlv::TLV_CONTROL_PARAMETERS {
            return Err(Error::NdnPacket(format!(
                "Expected ControlParameters TLV type {}, got {}",
                tlv::TLV_CONTROL_PARAMETERS,
                outer.tlv_type
            )));
        }

        let mut params = Self::new();
        for element in TlvElement::decode_all(outer.value)? {
            match element.tlv_type {
                tlv::TLV_NAME => params.name = Some(Name::from_tlv(&element)?),
                tlv::TLV_FACE_ID => params.face_id = Some(element.as_nonneg_integer()?),
                tlv::TLV_ORIGIN => params.origin = Some(element.as_nonneg_integer()?),
                tlv::TLV_COST => params.cost = Some(element.as_nonneg_integer()?),
                tlv::TLV_FLAGS => params.flags = Some(element.as_nonneg_integer()?),
                tlv::TLV_EXPIRATION_PERIOD => {
                    params.expiration_period_ms = Some(element.as_nonneg_integer()?)
                }
                _ => {}
            }
        }
        Ok(params)
    }
}

/* ---------------------------------------------------------------- *
 * ControlResponse
 * ---------------------------------------------------------------- */

/// Reply to a management command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlResponse {
    pub code: u32,
    pub text: String,
    pub body: Bytes,
}

impl ControlResponse {
    pub fn new(code: u32, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == STATUS_OK
    }

    /// Encodes into a ControlResponse TLV block.
    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        TlvElement::from_nonneg_integer(tlv::TLV_STATUS_CODE, u64::from(self.code))
            .encode(&mut body);
        TlvElement::new(tlv::TLV_STATUS_TEXT, Bytes::copy_from_slice(self.text.as_bytes()))
            .encode(&mut body);
        body.extend_from_slice(&self.body);
        TlvElement::new(tlv::TLV_CONTROL_RESPONSE, body.freeze()).to_bytes()
    }

    /// Decodes from a ControlResponse TLV block.
    pub fn decode(wire: Bytes) -> Result<Self, Error> {
        let mut buf = wire;
        let outer = TlvElement::decode(&mut buf)?;
        if outer.tlv_type != tlv::TLV_CONTROL_RESPONSE {
            return Err(Error::NdnPacket(format!(
                "Expected ControlResponse TLV type {}, got {}",
                tlv::TLV_CONTROL_RESPONSE,
                outer.tlv_type
            )));
        }

        let mut inner = outer.value.clone();
        let code_element = TlvElement::decode(&mut inner)?;
        if code_element.tlv_type != tlv::TLV_STATUS_CODE {
            return Err(Error::NdnPacket("ControlResponse has no StatusCode".into()));
        }
        let code = code_element.as_nonneg_integer()? as u32;

        let text_element = TlvElement::decode(&mut inner)?;
        if text_element.tlv_type != tlv::TLV_STATUS_TEXT {
            return Err(Error::NdnPacket("ControlResponse has no StatusText".into()));
        }
        let text = String::from_utf8_lossy(&text_element.value).into_owned();

        Ok(Self {
            code,
            text,
            body: inner,
        })
    }
}

/* ---------------------------------------------------------------- *
 * PrefixAnnouncement
 * ---------------------------------------------------------------- */

/// Content type of a prefix announcement Data.
pub const CONTENT_TYPE_PREFIX_ANN: u64 = 5;

/// Optional validity window of a prefix announcement, ISO 8601 strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityPeriod {
    pub not_before: String,
    pub not_after: String,
}

/// A signed object announcing reachability of a name prefix, carried in the
/// announce command's ApplicationParameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixAnnouncement {
    pub announced_name: Name,
    pub expiration_ms: u64,
    pub validity: Option<ValidityPeriod>,
}

impl PrefixAnnouncement {
    pub fn new(announced_name: Name, expiration_ms: u64) -> Self {
        Self {
            announced_name,
            expiration_ms,
            validity: None,
        }
    }

    pub fn with_validity(mut self, validity: ValidityPeriod) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Wraps this announcement into its Data carrier: name is the announced
    /// prefix plus a keyword and version component, content carries the
    /// expiration and optional validity window.
    pub fn to_data(&self, version: u64) -> Data {
        let mut name = self.announced_name.clone();
        name.push(NameComponent::from("PA"));
        name.push(NameComponent::new(version.to_be_bytes().to_vec()));

        let mut content = BytesMut::new();
        TlvElement::from_nonneg_integer(tlv::TLV_EXPIRATION_PERIOD, self.expiration_ms)
            .encode(&mut content);
        if let Some(validity) = &self.validity {
            let mut period = BytesMut::new();
            TlvElement::new(
                tlv::TLV_NOT_BEFORE,
                Bytes::copy_from_slice(validity.not_before.as_bytes()),
            )
            .encode(&mut period);
            TlvElement::new(
                tlv::TLV_NOT_AFTER,
                Bytes::copy_from_slice(validity.not_after.as_bytes()),
            )
            .encode(&mut period);
            TlvElement::new(tlv::TLV_VALIDITY_PERIOD, period.freeze()).encode(&mut content);
        }

        let mut data = Data::new(name, content.freeze())
            .with_content_type(CONTENT_TYPE_PREFIX_ANN);
        data.set_signature(
            SignatureInfo {
                signature_type: SignatureType::DigestSha256,
                key_locator: None,
            },
            vec![0u8; 32],
        );
        data
    }

    /// Recovers an announcement from its Data carrier.
    pub fn from_data(data: &Data) -> Result<Self, Error> {
        if data.content_type() != CONTENT_TYPE_PREFIX_ANN {
            return Err(Error::NdnPacket(format!(
                "Data is not a prefix announcement (content type {})",
                data.content_type()
            )));
        }
        if data.name().len() < 2 {
            return Err(Error::NdnPacket("Prefix announcement name too short".into()));
        }
        let announced_name = data.name().prefix(data.name().len() - 2);

        let mut expiration_ms = None;
        let mut validity = None;
        for element in TlvElement::decode_all(data.content().clone())? {
            match element.tlv_type {
                tlv::TLV_EXPIRATION_PERIOD => {
                    expiration_ms = Some(element.as_nonneg_integer()?)
                }
                tlv::TLV_VALIDITY_PERIOD => {
                    let mut not_before = String::new();
                    let mut not_after = String::new();
                    for field in TlvElement::decode_all(element.value.clone())? {
                        match field.tlv_type {
                            tlv::TLV_NOT_BEFORE => {
                                not_before = String::from_utf8_lossy(&field.value).into_owned()
                            }
                            tlv::TLV_NOT_AFTER => {
                                not_after = String::from_utf8_lossy(&field.value).into_owned()
                            }
                            _ => {}
                        }
                    }
                    validity = Some(ValidityPeriod {
                        not_before,
                        not_after,
                    });
                }
                _ => {}
            }
        }

        Ok(Self {
            announced_name,
            expiration_ms: expiration_ms
                .ok_or_else(|| Error::NdnPacket("Prefix announcement has no expiration".into()))?,
            validity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_parameters_round_trip() {
        let params = ControlParameters::new()
            .with_name(Name::from_string("/Hello/World").unwrap())
            .with_face_id(1)
            .with_origin(ROUTE_ORIGIN_APP)
            .with_cost(0)
            .with_flags(ROUTE_FLAG_CHILD_INHERIT);

        let wire = params.encode();
        let decoded = ControlParameters::decode(wire).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn control_response_round_trip() {
        let inner = ControlParameters::new()
            .with_name(Name::from_string("/A").unwrap());
        let resp = ControlResponse::new(200, "OK").with_body(inner.encode());

        let wire = resp.encode();
        let decoded = ControlResponse::decode(wire).unwrap();
        assert!(decoded.is_success());
        assert_eq!(decoded.text, "OK");
        let body = ControlParameters::decode(decoded.body).unwrap();
        assert_eq!(body.name, Some(Name::from_string("/A").unwrap()));
    }

    #[test]
    fn prefix_announcement_round_trip() {
        let ann = PrefixAnnouncement::new(Name::from_string("/Hello/World").unwrap(), 10_000)
            .with_validity(ValidityPeriod {
                not_before: "20260101T000000".into(),
                not_after: "20270101T000000".into(),
            });

        let data = ann.to_data(1);
        assert_eq!(data.content_type(), CONTENT_TYPE_PREFIX_ANN);

        let recovered = PrefixAnnouncement::from_data(&data).unwrap();
        assert_eq!(recovered, ann);
        assert_eq!(
            recovered.announced_name,
            Name::from_string("/Hello/World").unwrap()
        );
    }
}

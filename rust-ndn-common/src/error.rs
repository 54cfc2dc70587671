//! Error types for the rust-ndn implementation.

use crate::ndn::{Name, PacketKind};
use thiserror::Error;

/// All possible errors that can occur within the rust-ndn implementation.
#[derive(Error, Debug)]
pub enum Error {
    /// Error related to TLV encoding/decoding.
    #[error("TLV error: {0}")]
    Tlv(String),

    /// Error related to NDN packet processing.
    #[error("NDN packet error: {0}")]
    NdnPacket(String),

    /// A packet encodes into more octets than a link can carry.
    #[error("{kind} {name} encodes into {size} octets, exceeding the implementation limit of 8800 octets")]
    OversizedPacket {
        /// Which packet type exceeded the limit.
        kind: PacketKind,
        /// Name of the offending packet.
        name: Name,
        /// Encoded wire size in octets.
        size: usize,
    },

    /// Error related to the transport link.
    #[error("transport error: {0}")]
    Transport(String),

    /// A management command was rejected by the forwarder.
    #[error("command failed: {code} {text}")]
    Command { code: u32, text: String },

    /// An InterestFilter regex could not be compiled or applied.
    #[error("interest filter regex error: {0}")]
    FilterRegex(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

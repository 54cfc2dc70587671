//! Common types and utilities for the rust-ndn client stack.
//!
//! This crate provides the protocol layer shared by the Face implementation
//! and the command-line tools: NDN packet types, the TLV codec, the NDNLP
//! link-adaptation container, and the forwarder management encodings.

pub mod error;
pub mod lp;
pub mod metrics;
pub mod mgmt;
pub mod ndn;
pub mod tlv;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

//! NDN application Face for Rust.
//!
//! The [`Face`] multiplexes one application's consumer and producer
//! operations onto a single bidirectional transport to an NDN forwarder. It
//! owns the pending-interest, interest-filter and registered-prefix tables,
//! drives the NDNLP codec in both directions, loops locally expressed
//! Interests back to co-resident producer handlers, and registers prefixes
//! through the forwarder's RIB management module.
//!
//! Everything runs on a single-threaded cooperative event loop; socket I/O
//! for the Unix and TCP transports happens on background tokio tasks that
//! feed the loop through channels.

pub mod clock;
pub mod controller;
pub mod dummy_client_face;
pub mod face;
pub mod interest_filter;
pub mod io;
pub mod scheduler;
pub mod transport;

mod pending_interest;
mod registered_prefix;
mod tables;

pub use controller::{CommandOptions, CommandSigner, DigestSigner, SigningInfo};
pub use dummy_client_face::DummyClientFace;
pub use face::{
    DataCallback, Face, InterestFilterHandle, NackCallback, PendingInterestHandle,
    RegisterPrefixFailureCallback, RegisterPrefixSuccessCallback, RegisteredPrefixHandle,
    ScopedInterestFilterHandle, ScopedPendingInterestHandle, ScopedRegisteredPrefixHandle,
    TimeoutCallback, UnregisterFailureCallback, UnregisterSuccessCallback,
};
pub use interest_filter::{InterestCallback, InterestFilter};
pub use pending_interest::PendingInterestOrigin;
pub use tables::RecordId;
pub use transport::{Transport, TransportState};

//! Transport capability: the bidirectional byte link between Face and
//! forwarder.
//!
//! A transport delivers whole TLV elements to its receive callback and
//! accepts whole elements for sending. Delivery can be paused and resumed;
//! the Face pauses the link while it has neither pending Interests nor
//! registered prefixes.

use crate::io::IoContext;
use bytes::Bytes;
use rust_ndn_common::{Error, Result};
use std::rc::Rc;

pub mod stream;

pub use stream::{TcpTransport, UnixTransport};

/// Callback invoked with one received TLV element per call.
pub type ReceiveCallback = Rc<dyn Fn(Bytes)>;

/// Connection state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Closed,
    Connecting,
    Running,
    Paused,
}

/// Capability set implemented by every transport.
pub trait Transport {
    fn state(&self) -> TransportState;

    /// Establishes the link and installs the receive callback. Delivery
    /// happens on the given event loop.
    fn connect(&self, io: &Rc<IoContext>, on_receive: ReceiveCallback) -> Result<()>;

    /// Queues one TLV element for sending.
    fn send(&self, wire: Bytes) -> Result<()>;

    /// Stops delivering received elements.
    fn pause(&self);

    /// Resumes delivery.
    fn resume(&self);

    /// Tears the link down.
    fn close(&self);

    fn is_connected(&self) -> bool {
        matches!(
            self.state(),
            TransportState::Running | TransportState::Paused
        )
    }

    fn is_receiving(&self) -> bool {
        self.state() == TransportState::Running
    }
}

/// Default Unix socket path of the local forwarder.
pub const DEFAULT_UNIX_SOCKET: &str = "/run/nfd/nfd.sock";

/// Default TCP port of an NDN forwarder.
pub const DEFAULT_TCP_PORT: u16 = 6363;

/// Environment variable overriding the configured transport URI.
pub const TRANSPORT_ENVIRON: &str = "NDN_CLIENT_TRANSPORT";

/// Selects a transport: the `NDN_CLIENT_TRANSPORT` environment variable wins
/// over the configuration value; with neither present the default Unix
/// socket is used. (A caller-constructed transport bypasses this entirely.)
pub fn make_default_transport(config_uri: Option<&str>) -> Result<Rc<dyn Transport>> {
    let uri = std::env::var(TRANSPORT_ENVIRON)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| config_uri.map(str::to_owned))
        .unwrap_or_else(|| format!("unix://{DEFAULT_UNIX_SOCKET}"));
    transport_from_uri(&uri)
}

/// Parses a transport URI of the form `unix://path` or `tcp://host:port`.
/// An unrecognized scheme is a configuration error.
pub fn transport_from_uri(uri: &str) -> Result<Rc<dyn Transport>> {
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| Error::Transport(format!("Invalid transport URI \"{uri}\"")))?;

    match scheme {
        "unix" => Ok(Rc::new(UnixTransport::new(rest))),
        "tcp" | "tcp4" | "tcp6" => {
            let (host, port) = match rest.rsplit_once(':') {
                Some((host, port)) => {
                    let port = port.parse::<u16>().map_err(|_| {
                        Error::Transport(format!("Invalid port in transport URI \"{uri}\""))
                    })?;
                    (host.to_owned(), port)
                }
                None => (rest.to_owned(), DEFAULT_TCP_PORT),
            };
            Ok(Rc::new(TcpTransport::new(host, port)))
        }
        other => Err(Error::Transport(format!(
            "Unsupported transport protocol \"{other}\""
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_selection() {
        assert!(transport_from_uri("unix:///run/nfd/nfd.sock").is_ok());
        assert!(transport_from_uri("tcp://localhost:6363").is_ok());
        assert!(transport_from_uri("tcp://localhost").is_ok());

        assert!(transport_from_uri("quic://localhost").is_err());
        assert!(transport_from_uri("not-a-uri").is_err());
        assert!(transport_from_uri("tcp://host:notaport").is_err());
    }
}

//! Byte-stream transports over Unix and TCP sockets.
//!
//! Socket I/O runs on a small tokio runtime owned by the transport: a reader
//! task frames incoming bytes into TLV elements and hands them to the event
//! loop through a channel, a writer task drains the outbound queue. The
//! event-loop side stays synchronous; pausing merely stops delivery, letting
//! received elements back up in the channel.

use super::{ReceiveCallback, Transport, TransportState};
use crate::io::IoContext;
use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, trace, warn};
use rust_ndn_common::ndn::MAX_NDN_PACKET_SIZE;
use rust_ndn_common::{Error, Result};
use std::cell::{Cell, RefCell};
use std::io;
use std::rc::{Rc, Weak};
use std::sync::mpsc as std_mpsc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc as tokio_mpsc;

struct StreamInner {
    runtime: Option<Runtime>,
    outbound: tokio_mpsc::UnboundedSender<Bytes>,
    poller_id: u64,
    io: Weak<IoContext>,
}

/// State shared by the Unix and TCP transports.
struct StreamCore {
    uri: String,
    state: Rc<Cell<TransportState>>,
    inner: RefCell<Option<StreamInner>>,
}

impl StreamCore {
    fn new(uri: String) -> Self {
        Self {
            uri,
            state: Rc::new(Cell::new(TransportState::Closed)),
            inner: RefCell::new(None),
        }
    }

    fn start<S>(
        &self,
        io: &Rc<IoContext>,
        on_receive: ReceiveCallback,
        runtime: Runtime,
        socket: S,
    ) where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, mut write_half) = tokio::io::split(socket);
        let (out_tx, mut out_rx) = tokio_mpsc::unbounded_channel::<Bytes>();
        let (in_tx, in_rx) = std_mpsc::channel::<io::Result<Bytes>>();
        let notifier = io.notifier();

        let writer_uri = self.uri.clone();
        runtime.spawn(async move {
            while let Some(wire) = out_rx.recv().await {
                if let Err(e) = write_half.write_all(&wire).await {
                    warn!("[{writer_uri}] send failed: {e}");
                    break;
                }
            }
        });

        let reader_uri = self.uri.clone();
        runtime.spawn(async move {
            let mut read_half = read_half;
            loop {
                match read_element(&mut read_half).await {
                    Ok(Some(element)) => {
                        if in_tx.send(Ok(element)).is_err() {
                            break;
                        }
                        notifier.notify();
                    }
                    Ok(None) => {
                        trace!("[{reader_uri}] connection closed by peer");
                        let _ = in_tx.send(Err(io::ErrorKind::UnexpectedEof.into()));
                        notifier.notify();
                        break;
                    }
                    Err(e) => {
                        let _ = in_tx.send(Err(e));
                        notifier.notify();
                        break;
                    }
                }
            }
        });

        let poll_state = self.state.clone();
        let poll_uri = self.uri.clone();
        let poll = move || {
            if poll_state.get() != TransportState::Running {
                return 0;
            }
            let mut processed = 0;
            loop {
                match in_rx.try_recv() {
                    Ok(Ok(element)) => {
                        processed += 1;
                        on_receive(element);
                        // the callback may have paused or closed us
                        if poll_state.get() != TransportState::Running {
                            break;
                        }
                    }
                    Ok(Err(e)) => {
                        warn!("[{poll_uri}] receive failed: {e}");
                        poll_state.set(TransportState::Closed);
                        processed += 1;
                        break;
                    }
                    Err(_) => break,
                }
            }
            processed
        };
        let active_state = self.state.clone();
        let poller_id = io.register_poller(poll, move || {
            active_state.get() == TransportState::Running
        });

        *self.inner.borrow_mut() = Some(StreamInner {
            runtime: Some(runtime),
            outbound: out_tx,
            poller_id,
            io: Rc::downgrade(io),
        });
        self.state.set(TransportState::Running);
    }

    fn send(&self, wire: Bytes) -> Result<()> {
        let inner = self.inner.borrow();
        let inner = inner
            .as_ref()
            .ok_or_else(|| Error::Transport(format!("{} is not connected", self.uri)))?;
        inner
            .outbound
            .send(wire)
            .map_err(|_| Error::Transport(format!("{} connection closed", self.uri)))
    }

    fn pause(&self) {
        if self.state.get() == TransportState::Running {
            trace!("[{}] pause", self.uri);
            self.state.set(TransportState::Paused);
        }
    }

    fn resume(&self) {
        if self.state.get() == TransportState::Paused {
            trace!("[{}] resume", self.uri);
            self.state.set(TransportState::Running);
            if let Some(inner) = self.inner.borrow().as_ref() {
                if let Some(io) = inner.io.upgrade() {
                    io.notifier().notify();
                }
            }
        }
    }

    fn close(&self) {
        self.state.set(TransportState::Closed);
        if let Some(mut inner) = self.inner.borrow_mut().take() {
            if let Some(io) = inner.io.upgrade() {
                io.unregister_poller(inner.poller_id);
            }
            if let Some(runtime) = inner.runtime.take() {
                runtime.shutdown_background();
            }
        }
    }
}

impl Drop for StreamCore {
    fn drop(&mut self) {
        if let Some(mut inner) = self.inner.borrow_mut().take() {
            if let Some(runtime) = inner.runtime.take() {
                runtime.shutdown_background();
            }
        }
    }
}

fn make_runtime() -> Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(Error::Io)
}

/// Reads one TLV element, returning its full wire form (header included).
/// `Ok(None)` means the peer closed the connection at an element boundary.
async fn read_element<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<Bytes>> {
    let mut first = [0u8; 1];
    if reader.read(&mut first).await? == 0 {
        return Ok(None);
    }

    let mut element = BytesMut::new();
    let _tlv_type = read_var_number_tail(reader, first[0], &mut element).await?;

    let mut len_first = [0u8; 1];
    reader.read_exact(&mut len_first).await?;
    let length = read_var_number_tail(reader, len_first[0], &mut element).await? as usize;

    if element.len() + length > MAX_NDN_PACKET_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("incoming TLV element of {length} octets exceeds the packet size limit"),
        ));
    }

    let mut value = vec![0u8; length];
    reader.read_exact(&mut value).await?;
    element.extend_from_slice(&value);

    Ok(Some(element.freeze()))
}

/// Finishes reading a variable-width TLV number whose first byte has been
/// consumed, mirroring the read bytes into `out`.
async fn read_var_number_tail<R: AsyncRead + Unpin>(
    reader: &mut R,
    first: u8,
    out: &mut BytesMut,
) -> io::Result<u64> {
    out.put_u8(first);
    match first {
        0..=252 => Ok(u64::from(first)),
        253 => {
            let mut bytes = [0u8; 2];
            reader.read_exact(&mut bytes).await?;
            out.extend_from_slice(&bytes);
            Ok(u64::from(u16::from_be_bytes(bytes)))
        }
        254 => {
            let mut bytes = [0u8; 4];
            reader.read_exact(&mut bytes).await?;
            out.extend_from_slice(&bytes);
            Ok(u64::from(u32::from_be_bytes(bytes)))
        }
        255 => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "64-bit TLV numbers not supported",
        )),
    }
}

/// Transport over the forwarder's Unix socket.
pub struct UnixTransport {
    path: String,
    core: StreamCore,
}

impl UnixTransport {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            core: StreamCore::new(format!("unix://{path}")),
            path,
        }
    }
}

impl Transport for UnixTransport {
    fn state(&self) -> TransportState {
        self.core.state.get()
    }

    fn connect(&self, io: &Rc<IoContext>, on_receive: ReceiveCallback) -> Result<()> {
        if self.core.state.get() != TransportState::Closed {
            return Ok(());
        }
        self.core.state.set(TransportState::Connecting);

        let runtime = make_runtime().inspect_err(|_| {
            self.core.state.set(TransportState::Closed);
        })?;
        let socket = runtime
            .block_on(UnixStream::connect(&self.path))
            .map_err(|e| {
                self.core.state.set(TransportState::Closed);
                Error::Transport(format!("Failed to connect to {}: {e}", self.core.uri))
            })?;

        debug!("Connected to {}", self.core.uri);
        self.core.start(io, on_receive, runtime, socket);
        Ok(())
    }

    fn send(&self, wire: Bytes) -> Result<()> {
        self.core.send(wire)
    }

    fn pause(&self) {
        self.core.pause();
    }

    fn resume(&self) {
        self.core.resume();
    }

    fn close(&self) {
        self.core.close();
    }
}

/// Transport over a TCP connection to a (possibly remote) forwarder.
pub struct TcpTransport {
    host: String,
    port: u16,
    core: StreamCore,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            core: StreamCore::new(format!("tcp://{host}:{port}")),
            host,
            port,
        }
    }
}

impl Transport for TcpTransport {
    fn state(&self) -> TransportState {
        self.core.state.get()
    }

    fn connect(&self, io: &Rc<IoContext>, on_receive: ReceiveCallback) -> Result<()> {
        if self.core.state.get() != TransportState::Closed {
            return Ok(());
        }
        self.core.state.set(TransportState::Connecting);

        let runtime = make_runtime().inspect_err(|_| {
            self.core.state.set(TransportState::Closed);
        })?;
        let socket = runtime
            .block_on(TcpStream::connect((self.host.as_str(), self.port)))
            .map_err(|e| {
                self.core.state.set(TransportState::Closed);
                Error::Transport(format!("Failed to connect to {}: {e}", self.core.uri))
            })?;

        debug!("Connected to {}", self.core.uri);
        self.core.start(io, on_receive, runtime, socket);
        Ok(())
    }

    fn send(&self, wire: Bytes) -> Result<()> {
        self.core.send(wire)
    }

    fn pause(&self) {
        self.core.pause();
    }

    fn resume(&self) {
        self.core.resume();
    }

    fn close(&self) {
        self.core.close();
    }
}

//! Socket transport for the chat connection.
//!
//! [`Connection`] wraps the underlying duplex stream so the rest of the crate
//! stays agnostic about how it was opened. [`Transport`] owns the write side:
//! every outbound line goes through one mutex so keepalive replies from the
//! dispatcher thread never interleave with commands from the caller.

use std::borrow::Cow;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use ircbuilder_config::ServerEndpoint;
use tracing::{debug, info};

use crate::errors::TransportError;
use crate::frame::FrameReader;

/// Log target for transport operations.
pub(crate) const TRANSPORT_TARGET: &str = "ircbuilder::transport";

/// Time allowed to establish the TCP connection.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

const REDACTED: &str = "<PASSWORD REMOVED FROM LOG>";

/// Duplex stream carrying the chat protocol.
#[derive(Debug)]
pub enum Connection {
    /// TCP connection to the chat server.
    Tcp(TcpStream),
}

impl Connection {
    /// Clones the handle so reads and writes can proceed on separate threads.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if the socket cannot be duplicated.
    pub fn try_clone(&self) -> io::Result<Self> {
        match self {
            Self::Tcp(stream) => stream.try_clone().map(Self::Tcp),
        }
    }

    fn shutdown(&self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
        }
    }
}

/// Opens a plaintext TCP connection to the chat server.
///
/// # Errors
///
/// Returns [`TransportError::Resolve`] when the host has no usable address and
/// [`TransportError::Connect`] when the connection attempt fails.
pub fn connect(endpoint: &ServerEndpoint) -> Result<Connection, TransportError> {
    let endpoint_display = endpoint.to_string();
    let address = resolve_tcp_address(&endpoint.host, endpoint.port).map_err(|source| {
        TransportError::Resolve {
            endpoint: endpoint_display.clone(),
            source,
        }
    })?;

    debug!(target: TRANSPORT_TARGET, %address, "connecting to chat server");
    TcpStream::connect_timeout(&address, CONNECTION_TIMEOUT)
        .map(Connection::Tcp)
        .map_err(|source| TransportError::Connect {
            endpoint: endpoint_display,
            source,
        })
}

fn resolve_tcp_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    let mut addrs = (host, port).to_socket_addrs()?;
    addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}

/// Serialised writer for protocol lines.
#[derive(Debug)]
pub struct Transport {
    writer: Mutex<Connection>,
    send_delay: Duration,
    closed: AtomicBool,
}

impl Transport {
    /// Splits a connection into a shared writer and a line reader.
    ///
    /// `send_delay` is slept before every write; some servers drop records
    /// sent back-to-back without it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the stream cannot be duplicated.
    pub fn split(
        connection: Connection,
        send_delay: Duration,
    ) -> Result<(Self, FrameReader<Connection>), TransportError> {
        let reader = connection.try_clone()?;
        let transport = Self {
            writer: Mutex::new(connection),
            send_delay,
            closed: AtomicBool::new(false),
        };
        Ok((transport, FrameReader::new(reader)))
    }

    /// Writes one protocol line, terminated with CRLF.
    ///
    /// Any trailing line terminators in `line` are stripped first so callers
    /// cannot accidentally emit an empty line.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] once the transport has been
    /// closed or the peer has gone away.
    pub fn send_line(&self, line: &str) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }
        let line = line.trim_end_matches(['\r', '\n']);
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !self.send_delay.is_zero() {
            thread::sleep(self.send_delay);
        }
        let mut framed = String::with_capacity(line.len() + 2);
        framed.push_str(line);
        framed.push_str("\r\n");
        writer
            .write_all(framed.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(TransportError::from_stream)?;
        drop(writer);

        info!(target: TRANSPORT_TARGET, line = %redact_for_log(line), "SEND");
        Ok(())
    }

    /// Shuts the stream down in both directions.
    ///
    /// The dispatcher's reader observes end-of-stream and stops. Closing
    /// twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the socket reports a shutdown error
    /// other than already being disconnected.
    pub fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let writer = self
            .writer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match writer.shutdown() {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(error) => Err(TransportError::Io(error)),
        }
    }

    /// Returns true once [`Self::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Masks the credential token of a login command before it is logged.
pub(crate) fn redact_for_log(line: &str) -> Cow<'_, str> {
    if !(line.starts_with("PRIVMSG") && line.contains(": login")) {
        return Cow::Borrowed(line);
    }
    match line.rfind(' ') {
        Some(index) => Cow::Owned(format!("{} {REDACTED}", &line[..index])),
        None => Cow::Borrowed(line),
    }
}

//! Background routing of inbound lines.
//!
//! Exactly one dispatcher thread runs per session. It is the only consumer of
//! the [`FrameReader`], answers keepalive and version probes itself, and
//! deposits numerics and application payloads into two FIFO inboxes read by
//! the [`Correlator`](crate::correlator::Correlator). When the stream ends the
//! thread exits and drops its senders, which the correlator observes as a
//! closed connection.

use std::io::Read;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::errors::TransportError;
use crate::frame::FrameReader;
use crate::message::{CTCP_VERSION, Inbound, PRIVMSG, Prefixed, parse_line};
use crate::transport::Transport;

/// Log target for dispatcher operations.
pub(crate) const DISPATCH_TARGET: &str = "ircbuilder::dispatch";

/// Reply sent to client-version queries.
pub(crate) const VERSION_REPLY: &str = concat!("VERSION rust ircbuilder ", env!("CARGO_PKG_VERSION"));

/// Recipient used by servers before a nickname is accepted.
const UNREGISTERED_RECIPIENT: &str = "*";

/// Receiving ends of the two inboxes.
pub(crate) struct Inboxes {
    pub(crate) numerics: Receiver<u16>,
    pub(crate) payloads: Receiver<String>,
}

/// What the dispatcher did with one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Routed {
    /// Answered a keepalive or version probe.
    AutoReplied,
    /// Queued a numeric status code.
    Numeric(u16),
    /// Queued an application payload.
    Payload(String),
    /// Dropped the line.
    Discarded,
}

/// Classifies inbound lines and feeds the inboxes.
pub(crate) struct Dispatcher {
    transport: Arc<Transport>,
    nick: String,
    counterpart: String,
    server_name: Option<String>,
    numerics: Sender<u16>,
    payloads: Sender<String>,
}

impl Dispatcher {
    pub(crate) fn new(
        transport: Arc<Transport>,
        nick: impl Into<String>,
        counterpart: impl Into<String>,
    ) -> (Self, Inboxes) {
        let (numeric_tx, numeric_rx) = mpsc::channel();
        let (payload_tx, payload_rx) = mpsc::channel();
        let dispatcher = Self {
            transport,
            nick: nick.into(),
            counterpart: counterpart.into(),
            server_name: None,
            numerics: numeric_tx,
            payloads: payload_tx,
        };
        let inboxes = Inboxes {
            numerics: numeric_rx,
            payloads: payload_rx,
        };
        (dispatcher, inboxes)
    }

    /// Starts the dispatcher thread.
    pub(crate) fn spawn<R>(self, reader: FrameReader<R>) -> std::io::Result<JoinHandle<()>>
    where
        R: Read + Send + 'static,
    {
        thread::Builder::new()
            .name(String::from("ircbuilder-dispatch"))
            .spawn(move || self.run(reader))
    }

    fn run<R: Read>(mut self, reader: FrameReader<R>) {
        for line in reader {
            let line = match line {
                Ok(line) => line,
                Err(TransportError::ConnectionClosed) => {
                    debug!(target: DISPATCH_TARGET, "connection closed; dispatcher stopping");
                    return;
                }
                Err(error) => {
                    warn!(target: DISPATCH_TARGET, %error, "read failed; dispatcher stopping");
                    return;
                }
            };

            debug!(target: DISPATCH_TARGET, %line, "RECV");
            if let Err(error) = self.handle_line(&line) {
                debug!(target: DISPATCH_TARGET, %error, "auto-reply failed; dispatcher stopping");
                return;
            }
        }
    }

    /// Routes one line, answering probes directly.
    pub(crate) fn handle_line(&mut self, line: &str) -> Result<Routed, TransportError> {
        match parse_line(line) {
            Inbound::Ping(argument) => {
                self.transport.send_line(&format!("PONG {argument}"))?;
                Ok(Routed::AutoReplied)
            }
            Inbound::VersionQuery => {
                self.transport.send_line(VERSION_REPLY)?;
                Ok(Routed::AutoReplied)
            }
            Inbound::Prefixed(prefixed) => self.route_prefixed(&prefixed),
            Inbound::Other => Ok(Routed::Discarded),
        }
    }

    fn route_prefixed(&mut self, prefixed: &Prefixed<'_>) -> Result<Routed, TransportError> {
        let server_name = self
            .server_name
            .get_or_insert_with(|| prefixed.origin.to_owned());
        let from_server = prefixed.origin == server_name.as_str();

        if let Some(numeric) = prefixed.numeric() {
            let addressed = prefixed.recipient == self.nick
                || prefixed.recipient == UNREGISTERED_RECIPIENT;
            if !(from_server && addressed) {
                return Ok(Routed::Discarded);
            }
            debug!(target: DISPATCH_TARGET, numeric, "queued numeric");
            // A dropped receiver means the session is gone; nothing to do.
            let _ = self.numerics.send(numeric);
            return Ok(Routed::Numeric(numeric));
        }

        if prefixed.recipient != self.nick || prefixed.kind != PRIVMSG {
            return Ok(Routed::Discarded);
        }
        if prefixed.text() == Some(CTCP_VERSION) {
            self.transport.send_line(VERSION_REPLY)?;
            return Ok(Routed::AutoReplied);
        }
        if prefixed.origin != self.counterpart || from_server {
            return Ok(Routed::Discarded);
        }

        let Some(text) = prefixed.text() else {
            return Ok(Routed::Discarded);
        };
        debug!(target: DISPATCH_TARGET, payload = %text, "queued payload");
        let _ = self.payloads.send(text.to_owned());
        Ok(Routed::Payload(text.to_owned()))
    }
}

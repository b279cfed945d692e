//! Error types surfaced by the session, edit buffer and transmitter.

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::building::Coordinate;
use crate::session::SessionState;

/// Transport-layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer ended the stream or the connection was shut down locally.
    #[error("connection closed")]
    ConnectionClosed,

    /// Failed to resolve the server address.
    #[error("failed to resolve server address {endpoint}: {source}")]
    Resolve {
        /// Display form of the endpoint.
        endpoint: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },

    /// Failed to open the connection.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Display form of the endpoint.
        endpoint: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Maps an I/O error onto the transport taxonomy.
    ///
    /// Errors that mean the peer is gone become [`Self::ConnectionClosed`];
    /// anything else is preserved as [`Self::Io`].
    pub(crate) fn from_stream(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof => Self::ConnectionClosed,
            _ => Self::Io(error),
        }
    }
}

/// Handshake stage that was waiting when registration failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    /// Waiting for the end of the server welcome.
    Welcome,
    /// Waiting for the end of the channel member list.
    ChannelJoin,
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Welcome => "welcome",
            Self::ChannelJoin => "channel join",
        };
        formatter.write_str(label)
    }
}

/// Errors raised by [`crate::Session`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport ended; the session cannot be used any more.
    #[error("connection closed")]
    ConnectionClosed,

    /// No reply arrived before the deadline.
    #[error("timed out after {timeout:?} waiting for {waiting_for}")]
    Timeout {
        /// What the caller was waiting for.
        waiting_for: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The server answered the handshake with an error numeric.
    #[error("registration failed during {stage}: server replied {numeric}")]
    RegistrationFailed {
        /// Stage that was waiting.
        stage: HandshakeStage,
        /// Numeric reply observed (400 or above).
        numeric: u16,
    },

    /// A command reply did not have the expected shape.
    #[error("malformed reply to '{command}': {reply:?}")]
    MalformedReply {
        /// Command name that produced the reply.
        command: String,
        /// Reply text received.
        reply: String,
    },

    /// The operation is not valid in the current session state.
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        /// Operation attempted.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },

    /// No nickname could be derived from the configuration.
    #[error("no nickname configured and no user to derive one from")]
    MissingIdentity,

    /// Transport failure other than a closed connection.
    #[error(transparent)]
    Transport(TransportError),
}

impl From<TransportError> for SessionError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::ConnectionClosed => Self::ConnectionClosed,
            other => Self::Transport(other),
        }
    }
}

impl SessionError {
    /// Returns true when the session can no longer be used.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::Transport(_))
    }
}

/// Errors raised while editing a buffer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    /// The coordinate holds no buffered edit.
    #[error("no edit buffered at {coordinate}")]
    NotBuffered {
        /// Coordinate that was missing.
        coordinate: Coordinate,
    },
}

/// Errors raised while transmitting buffered edits.
#[derive(Debug, Error)]
pub enum TransmitError {
    /// Compressing a batch failed.
    #[error("failed to encode batch for '{item}': {source}")]
    Encode {
        /// Item being encoded.
        item: String,
        /// Underlying compressor error.
        #[source]
        source: io::Error,
    },

    /// A single region cannot fit under the command length ceiling.
    #[error("a single region for '{item}' encodes to {length} characters, over the {limit} limit")]
    OversizedRegion {
        /// Item being encoded.
        item: String,
        /// Encoded length of the one-region command.
        length: usize,
        /// Configured ceiling.
        limit: usize,
    },

    /// The compactor produced regions that do not partition their input.
    #[error("compaction of '{item}' does not partition its input: {detail}")]
    CompactionInconsistency {
        /// Item whose regions are inconsistent.
        item: String,
        /// What went wrong.
        detail: String,
    },

    /// The session failed in a way that aborts transmission.
    #[error(transparent)]
    Session(#[from] SessionError),
}

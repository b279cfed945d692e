//! Session lifecycle: registration, channel join, login and shutdown.
//!
//! A [`Session`] owns the write half of the connection, one dispatcher
//! thread reading the other half, and the [`Correlator`] that pairs commands
//! with replies. The handshake runs strictly in order:
//!
//! ```text
//! Connected -> Registering -> AwaitingWelcome -> Registered
//!           -> Joining -> Joined -> Active -> Closed
//! ```
//!
//! Any state may fall to `Closed` when the transport ends.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use ircbuilder_config::Config;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::building::EditBuffer;
use crate::commands::CommandChannel;
use crate::correlator::{Correlator, ERROR_NUMERIC_FLOOR};
use crate::dispatch::Dispatcher;
use crate::errors::{HandshakeStage, SessionError, TransmitError, TransportError};
use crate::message::PRIVMSG;
use crate::transmit::TransmitSummary;
use crate::transport::{self, Connection, Transport};

/// Log target for session operations.
pub(crate) const SESSION_TARGET: &str = "ircbuilder::session";

/// Numeric closing the server welcome.
pub const END_OF_WELCOME: u16 = 376;
/// Numeric closing a channel member list.
pub const END_OF_MEMBER_LIST: u16 = 366;

const GENERATED_CHANNEL_LETTERS: usize = 6;
const CHANNEL_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Position in the session handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, nothing sent yet.
    Connected,
    /// Identity lines are being sent.
    Registering,
    /// Waiting for the end of the server welcome.
    AwaitingWelcome,
    /// Registered with the server.
    Registered,
    /// Waiting for the channel member list.
    Joining,
    /// Present in the working channel.
    Joined,
    /// Logged in to the game.
    Active,
    /// The transport has ended.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connected => "connected",
            Self::Registering => "registering",
            Self::AwaitingWelcome => "awaiting welcome",
            Self::Registered => "registered",
            Self::Joining => "joining",
            Self::Joined => "joined",
            Self::Active => "active",
            Self::Closed => "closed",
        };
        formatter.write_str(label)
    }
}

/// Game account credentials used by the `login` command.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    password: String,
}

impl Credentials {
    /// Bundles a user name and password.
    #[must_use]
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Credentials from configuration, when both parts are present.
    #[must_use]
    pub fn from_config(config: &Config) -> Option<Self> {
        match (&config.user, &config.password) {
            (Some(user), Some(password)) => Some(Self::new(user, password)),
            _ => None,
        }
    }

    /// Account name.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Tunables for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Own nickname.
    pub nick: String,
    /// Nickname of the command-executing bot.
    pub counterpart: String,
    /// Pause before each outbound line.
    pub send_delay: Duration,
    /// Deadline for application replies.
    pub command_timeout: Duration,
    /// Deadline for numeric replies.
    pub numeric_timeout: Duration,
    /// Ceiling on encoded `set_node_list` commands.
    pub max_command_len: usize,
}

impl SessionOptions {
    /// Options with default timings for `nick`.
    #[must_use]
    pub fn new(nick: impl Into<String>) -> Self {
        let defaults = Config::default();
        Self {
            nick: nick.into(),
            counterpart: defaults.counterpart().to_owned(),
            send_delay: defaults.send_delay(),
            command_timeout: defaults.command_timeout(),
            numeric_timeout: defaults.numeric_timeout(),
            max_command_len: defaults.max_command_len(),
        }
    }

    /// Derives options from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingIdentity`] when neither a nickname nor
    /// a user name is configured.
    pub fn from_config(config: &Config) -> Result<Self, SessionError> {
        let nick = config.nick().ok_or(SessionError::MissingIdentity)?;
        Ok(Self {
            nick,
            counterpart: config.counterpart().to_owned(),
            send_delay: config.send_delay(),
            command_timeout: config.command_timeout(),
            numeric_timeout: config.numeric_timeout(),
            max_command_len: config.max_command_len(),
        })
    }
}

/// A connection to the chat server that relays commands to the game.
///
/// Dropping a session that was not [`left`](Self::leave) parts the channel
/// and closes the connection.
pub struct Session {
    options: SessionOptions,
    transport: Arc<Transport>,
    correlator: Correlator,
    dispatcher: Option<JoinHandle<()>>,
    state: Mutex<SessionState>,
    channel: Option<String>,
    building: EditBuffer,
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("nick", &self.options.nick)
            .field("state", &self.state())
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connects, registers, joins and logs in according to `config`.
    ///
    /// The channel comes from configuration or is generated. Login is skipped
    /// when no credentials are configured.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any handshake step.
    pub fn connect(config: &Config) -> Result<Self, SessionError> {
        let options = SessionOptions::from_config(config)?;
        let connection = transport::connect(config.server())?;
        info!(target: SESSION_TARGET, server = %config.server(), nick = %options.nick, "connected");
        let mut session = Self::open(options, connection)?;
        session.register()?;
        session.join(config.channel())?;
        if let Some(credentials) = Credentials::from_config(config) {
            session.authenticate(&credentials)?;
        }
        Ok(session)
    }

    /// Starts a session over an established connection.
    ///
    /// Spawns the dispatcher; nothing is sent until [`Self::register`].
    ///
    /// # Errors
    ///
    /// Returns a transport error if the connection cannot be split or the
    /// dispatcher thread cannot be started.
    pub fn open(options: SessionOptions, connection: Connection) -> Result<Self, SessionError> {
        let (transport, reader) = Transport::split(connection, options.send_delay)?;
        let transport = Arc::new(transport);
        let (dispatcher, inboxes) =
            Dispatcher::new(Arc::clone(&transport), &options.nick, &options.counterpart);
        let handle = dispatcher
            .spawn(reader)
            .map_err(|error| SessionError::Transport(TransportError::Io(error)))?;
        let correlator = Correlator::new(
            Arc::clone(&transport),
            &options.counterpart,
            inboxes,
            options.command_timeout,
            options.numeric_timeout,
        );
        Ok(Self {
            options,
            transport,
            correlator,
            dispatcher: Some(handle),
            state: Mutex::new(SessionState::Connected),
            channel: None,
            building: EditBuffer::new(),
        })
    }

    /// Current handshake state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Own nickname.
    #[must_use]
    pub fn nick(&self) -> &str {
        &self.options.nick
    }

    /// Working channel, once joined.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Announces identity and waits for the end of the server welcome.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RegistrationFailed`] when the server answers
    /// with an error numeric, which also closes the session.
    pub fn register(&mut self) -> Result<(), SessionError> {
        self.require("register", &[SessionState::Connected])?;
        self.set_state(SessionState::Registering);
        let nick = self.options.nick.clone();
        let sent = ["CAP END".to_owned(), format!("USER {nick} 0 * :{nick}"), format!("NICK {nick}")]
            .iter()
            .try_for_each(|line| self.transport.send_line(line));
        self.observe(sent.map_err(SessionError::from), SessionState::Connected)?;

        self.set_state(SessionState::AwaitingWelcome);
        self.await_numeric(END_OF_WELCOME, HandshakeStage::Welcome, SessionState::Connected)?;
        self.set_state(SessionState::Registered);
        info!(target: SESSION_TARGET, nick = %nick, "registered");
        Ok(())
    }

    /// Joins `channel`, or a freshly generated one, and waits for its
    /// member list.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RegistrationFailed`] when the server refuses
    /// the join, which also closes the session.
    pub fn join(&mut self, channel: Option<&str>) -> Result<(), SessionError> {
        self.require("join a channel", &[SessionState::Registered])?;
        let channel = channel.map_or_else(generated_channel_name, str::to_owned);
        self.set_state(SessionState::Joining);
        let sent = self.transport.send_line(&format!("JOIN {channel}"));
        self.observe(sent.map_err(SessionError::from), SessionState::Registered)?;

        self.await_numeric(
            END_OF_MEMBER_LIST,
            HandshakeStage::ChannelJoin,
            SessionState::Registered,
        )?;
        info!(target: SESSION_TARGET, channel = %channel, "joined channel");
        self.channel = Some(channel);
        self.set_state(SessionState::Joined);
        Ok(())
    }

    /// Logs in to the game and returns the server's acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Timeout`] when no acknowledgement arrives; the
    /// session stays joined and the login may be retried.
    pub fn authenticate(&mut self, credentials: &Credentials) -> Result<String, SessionError> {
        self.require("log in", &[SessionState::Joined])?;
        let reply = self.correlator.exchange(&format!(
            "login {} {}",
            credentials.user, credentials.password
        ));
        let reply = self.observe(reply, SessionState::Joined)?;
        info!(target: SESSION_TARGET, user = %credentials.user, reply = %reply, "logged in");
        self.set_state(SessionState::Active);
        Ok(reply)
    }

    /// Waits for `expected` or any error numeric.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Timeout`] when neither arrives in time.
    pub fn wait_for_numeric(
        &self,
        expected: u16,
        timeout: Option<Duration>,
    ) -> Result<u16, SessionError> {
        let current = self.state();
        let result = self.correlator.wait_for_numeric(expected, timeout);
        self.observe(result, current)
    }

    /// Posts `text` to the working channel.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] before a channel is joined.
    pub fn post_to_chat(&self, text: &str) -> Result<(), SessionError> {
        let state = self.state();
        let Some(channel) = self.channel.as_deref() else {
            return Err(SessionError::InvalidState {
                operation: "post to chat",
                state,
            });
        };
        self.require("post to chat", &[SessionState::Joined, SessionState::Active])?;
        let sent = self
            .transport
            .send_line(&format!("{PRIVMSG} {channel} :{text}"));
        self.observe(sent.map_err(SessionError::from), state)
    }

    /// Edits buffered on this session, sent by [`Self::send_building`].
    pub fn building_mut(&mut self) -> &mut EditBuffer {
        &mut self.building
    }

    /// Edits buffered on this session.
    #[must_use]
    pub fn building(&self) -> &EditBuffer {
        &self.building
    }

    /// Transmits and clears the session's own edit buffer.
    ///
    /// Items matching an `end_list` prefix are sent last.
    ///
    /// # Errors
    ///
    /// See [`EditBuffer::send`].
    pub fn send_building(&mut self, end_list: &[&str]) -> Result<TransmitSummary, TransmitError> {
        let mut building = std::mem::take(&mut self.building);
        building.send(&*self, end_list, self.options.max_command_len)
    }

    /// Transmits a standalone buffer through this session and clears it.
    ///
    /// # Errors
    ///
    /// See [`EditBuffer::send`].
    pub fn send_buffer(
        &self,
        buffer: &mut EditBuffer,
        end_list: &[&str],
    ) -> Result<TransmitSummary, TransmitError> {
        buffer.send(self, end_list, self.options.max_command_len)
    }

    /// Ceiling on encoded `set_node_list` commands.
    #[must_use]
    pub fn max_command_len(&self) -> usize {
        self.options.max_command_len
    }

    /// Parts the channel and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the part request or the socket shutdown
    /// fails; the session is closed either way.
    pub fn leave(mut self) -> Result<(), SessionError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), SessionError> {
        let mut outcome = Ok(());
        let mut closed = true;
        if !self.transport.is_closed() {
            if let Some(channel) = self.channel.as_deref() {
                match self.transport.send_line(&format!("PART {channel}")) {
                    Ok(()) | Err(TransportError::ConnectionClosed) => {}
                    Err(error) => outcome = Err(SessionError::from(error)),
                }
            }
            if let Err(error) = self.transport.close() {
                closed = false;
                outcome = outcome.and(Err(SessionError::from(error)));
            }
        }
        if let Some(handle) = self.dispatcher.take() {
            reap_dispatcher(handle, closed);
        }
        if self.state() != SessionState::Closed {
            debug!(target: SESSION_TARGET, "session closed");
        }
        self.set_state(SessionState::Closed);
        outcome
    }

    fn require(
        &self,
        operation: &'static str,
        allowed: &[SessionState],
    ) -> Result<(), SessionError> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState { operation, state })
        }
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != next {
            debug!(target: SESSION_TARGET, from = %*state, to = %next, "state change");
        }
        *state = next;
    }

    /// Applies the state consequences of an operation outcome.
    ///
    /// Terminal errors close the session; timeouts fall back to `retry_from`.
    fn observe<T>(
        &self,
        result: Result<T, SessionError>,
        retry_from: SessionState,
    ) -> Result<T, SessionError> {
        if let Err(error) = &result {
            if error.is_terminal() {
                warn!(target: SESSION_TARGET, %error, "session closed by transport");
                self.set_state(SessionState::Closed);
            } else if matches!(error, SessionError::Timeout { .. }) {
                self.set_state(retry_from);
            }
        }
        result
    }

    fn await_numeric(
        &self,
        expected: u16,
        stage: HandshakeStage,
        retry_from: SessionState,
    ) -> Result<(), SessionError> {
        let numeric = self.correlator.wait_for_numeric(expected, None);
        let numeric = self.observe(numeric, retry_from)?;
        if numeric >= ERROR_NUMERIC_FLOOR {
            warn!(target: SESSION_TARGET, %stage, numeric, "handshake refused");
            self.set_state(SessionState::Closed);
            // The refusal is what gets reported; a failed shutdown adds nothing.
            let _ = self.transport.close();
            return Err(SessionError::RegistrationFailed { stage, numeric });
        }
        Ok(())
    }
}

impl CommandChannel for Session {
    fn send_command(&self, command: &str) -> Result<String, SessionError> {
        self.require(
            "send a command",
            &[
                SessionState::Registered,
                SessionState::Joined,
                SessionState::Active,
            ],
        )?;
        let current = self.state();
        let reply = self.correlator.exchange(&format!("cmd {command}"));
        self.observe(reply, current)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            debug!(target: SESSION_TARGET, %error, "shutdown on drop failed");
        }
    }
}

/// Joins the dispatcher once the socket is closed. When the close failed its
/// read may never return, so the thread is detached instead.
fn reap_dispatcher(handle: JoinHandle<()>, socket_closed: bool) {
    if !socket_closed {
        warn!(target: SESSION_TARGET, "socket close failed; detaching dispatcher");
        return;
    }
    if handle.join().is_err() {
        warn!(target: SESSION_TARGET, "dispatcher thread panicked");
    }
}

/// Random `##` channel name of six ASCII letters.
#[must_use]
pub fn generated_channel_name() -> String {
    let mut rng = rand::thread_rng();
    let letters: String = (0..GENERATED_CHANNEL_LETTERS)
        .map(|_| char::from(CHANNEL_ALPHABET[rng.gen_range(0..CHANNEL_ALPHABET.len())]))
        .collect();
    format!("##{letters}")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn generated_channels_are_prefixed_letters() {
        let name = generated_channel_name();
        assert_eq!(name.len(), 8);
        let letters = name.strip_prefix("##").expect("prefix");
        assert!(letters.chars().all(|ch| ch.is_ascii_alphabetic()), "{name}");
    }

    #[rstest]
    fn credentials_debug_hides_the_password() {
        let rendered = format!("{:?}", Credentials::new("bob", "hunter2"));
        assert!(rendered.contains("bob"));
        assert!(!rendered.contains("hunter2"));
    }

    #[rstest]
    fn options_need_a_nick_or_user() {
        let config = Config::default();
        assert!(matches!(
            SessionOptions::from_config(&config),
            Err(SessionError::MissingIdentity)
        ));
    }

    #[rstest]
    fn options_derive_the_nick_from_the_user() {
        let config = Config {
            user: Some(String::from("steve")),
            ..Config::default()
        };
        let options = SessionOptions::from_config(&config).expect("options");
        assert_eq!(options.nick, "pysteve");
        assert_eq!(options.counterpart, "mtserver");
        assert_eq!(options.max_command_len, 400);
    }

    #[rstest]
    fn a_failed_close_does_not_wait_for_the_dispatcher() {
        let (release, blocked) = std::sync::mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            let _ = blocked.recv();
        });

        reap_dispatcher(handle, false);

        drop(release);
    }

    #[rstest]
    fn a_clean_close_joins_the_dispatcher() {
        let finished = Arc::new(Mutex::new(false));
        let handle = {
            let finished = Arc::clone(&finished);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                *finished.lock().unwrap_or_else(PoisonError::into_inner) = true;
            })
        };

        reap_dispatcher(handle, true);

        assert!(*finished.lock().unwrap_or_else(PoisonError::into_inner));
    }

    #[rstest]
    fn state_labels_read_naturally() {
        assert_eq!(SessionState::AwaitingWelcome.to_string(), "awaiting welcome");
    }
}

//! Shared harness for the behavioural suites.

mod fake_server;

use std::time::Duration;

use anyhow::{Context, Result};

use crate::{EditBuffer, Session, SessionError, SessionOptions, TransmitError, TransmitSummary};

pub(in crate::tests) use fake_server::{FakeChatServer, Script, node_list_volume};

/// Nickname used by every scenario.
pub(in crate::tests) const NICK: &str = "pybob";

/// Prefix of every application command on the wire.
pub(in crate::tests) const COMMAND_PREFIX: &str = "PRIVMSG mtserver : cmd ";

/// Session options with no send delay and short deadlines.
pub(in crate::tests) fn test_options() -> SessionOptions {
    SessionOptions {
        send_delay: Duration::ZERO,
        command_timeout: Duration::from_millis(500),
        numeric_timeout: Duration::from_secs(2),
        ..SessionOptions::new(NICK)
    }
}

/// Scenario state. The session is declared first so it is dropped, and its
/// connection closed, before the server.
#[derive(Default)]
pub(in crate::tests) struct World {
    pub session: Option<Session>,
    pub server: Option<FakeChatServer>,
    pub buffer: EditBuffer,
    pub error: Option<SessionError>,
    pub transmit_error: Option<TransmitError>,
    pub reply: Option<String>,
    pub summary: Option<TransmitSummary>,
}

impl World {
    /// Starts `script` and opens an unregistered session against it.
    pub fn open(&mut self, script: Script) -> Result<()> {
        let server = FakeChatServer::spawn(script)?;
        let connection = server.connect()?;
        let session = Session::open(test_options(), connection).context("open session")?;
        self.server = Some(server);
        self.session = Some(session);
        Ok(())
    }

    /// Opens, registers and joins `#build`.
    pub fn open_joined(&mut self, script: Script) -> Result<()> {
        self.open(script)?;
        let session = self.session_mut();
        session.register().context("register")?;
        session.join(Some("#build")).context("join")?;
        Ok(())
    }

    pub fn session(&self) -> &Session {
        self.session.as_ref().expect("session opened")
    }

    pub fn session_mut(&mut self) -> &mut Session {
        self.session.as_mut().expect("session opened")
    }

    pub fn server(&self) -> &FakeChatServer {
        self.server.as_ref().expect("server started")
    }

    /// Application commands received by the server, without the prefix.
    pub fn commands_received(&self) -> Vec<String> {
        self.server()
            .received()
            .into_iter()
            .filter_map(|line| line.strip_prefix(COMMAND_PREFIX).map(str::to_owned))
            .collect()
    }
}

//! Synchronous request/response on top of the dispatcher inboxes.
//!
//! The wire carries no request ids, so a reply is simply the next payload
//! from the counterpart. The payload inbox lives behind a mutex that is held
//! for the whole send-and-wait exchange: concurrent callers queue up rather
//! than consume each other's replies.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::dispatch::Inboxes;
use crate::errors::SessionError;
use crate::message::PRIVMSG;
use crate::transport::Transport;

/// Log target for correlator operations.
pub(crate) const CORRELATOR_TARGET: &str = "ircbuilder::correlator";

/// Numeric replies at or above this value signal an error.
pub const ERROR_NUMERIC_FLOOR: u16 = 400;

/// Pairs outbound application commands with inbound replies.
pub(crate) struct Correlator {
    transport: Arc<Transport>,
    counterpart: String,
    numerics: Mutex<Receiver<u16>>,
    payloads: Mutex<Receiver<String>>,
    command_timeout: Duration,
    numeric_timeout: Duration,
}

impl Correlator {
    pub(crate) fn new(
        transport: Arc<Transport>,
        counterpart: impl Into<String>,
        inboxes: Inboxes,
        command_timeout: Duration,
        numeric_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            counterpart: counterpart.into(),
            numerics: Mutex::new(inboxes.numerics),
            payloads: Mutex::new(inboxes.payloads),
            command_timeout,
            numeric_timeout,
        }
    }

    pub(crate) fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Sends `text` to the counterpart and returns its first reply.
    pub(crate) fn exchange(&self, text: &str) -> Result<String, SessionError> {
        let payloads = lock(&self.payloads);
        self.transport
            .send_line(&format!("{PRIVMSG} {} : {text}", self.counterpart))?;
        receive_payload(&payloads, self.command_timeout)
    }

    /// Waits for `expected` or any error numeric, discarding others.
    ///
    /// `timeout` falls back to the configured numeric timeout.
    pub(crate) fn wait_for_numeric(
        &self,
        expected: u16,
        timeout: Option<Duration>,
    ) -> Result<u16, SessionError> {
        let timeout = timeout.unwrap_or(self.numeric_timeout);
        let numerics = lock(&self.numerics);
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match numerics.recv_timeout(remaining) {
                Ok(numeric) if numeric == expected || numeric >= ERROR_NUMERIC_FLOOR => {
                    debug!(target: CORRELATOR_TARGET, expected, numeric, "numeric received");
                    return Ok(numeric);
                }
                Ok(numeric) => {
                    debug!(target: CORRELATOR_TARGET, expected, numeric, "skipping numeric");
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(target: CORRELATOR_TARGET, expected, ?timeout, "timed out waiting for numeric");
                    return Err(SessionError::Timeout {
                        waiting_for: format!("numeric {expected}"),
                        timeout,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => return Err(SessionError::ConnectionClosed),
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn receive_payload(
    payloads: &Receiver<String>,
    timeout: Duration,
) -> Result<String, SessionError> {
    match payloads.recv_timeout(timeout) {
        Ok(payload) => Ok(payload),
        Err(RecvTimeoutError::Timeout) => {
            warn!(target: CORRELATOR_TARGET, ?timeout, "timed out waiting for reply");
            Err(SessionError::Timeout {
                waiting_for: String::from("command reply"),
                timeout,
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(SessionError::ConnectionClosed),
    }
}

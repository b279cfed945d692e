//! Typed world-editing commands.
//!
//! Every command travels as one application payload, `cmd <name> <args>`,
//! and the server answers with one payload. [`CommandChannel`] is the seam
//! between the wrappers and whatever carries the exchange; [`WorldCommands`]
//! layers the named commands on top of it.

use std::fmt;

use serde_json::json;

use crate::building::{Coordinate, Region};
use crate::errors::{SessionError, TransmitError};
use crate::transmit::{TransmitSummary, send_node_list};

/// Sign node used when none is specified.
pub const DEFAULT_SIGN_NODE: &str = "default:sign_wall_wood";

/// Carries one command to the server and returns its reply.
pub trait CommandChannel {
    /// Sends `command` (without the `cmd ` prefix) and waits for the reply.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Timeout`] when no reply arrives in time and a
    /// terminal error when the connection is gone.
    fn send_command(&self, command: &str) -> Result<String, SessionError>;
}

/// Direction a player faces to read a sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignFacing {
    /// Looking towards positive x.
    PlusX,
    /// Looking towards negative x.
    MinusX,
    /// Looking up.
    PlusY,
    /// Looking down.
    MinusY,
    /// Looking towards positive z.
    PlusZ,
    /// Looking towards negative z.
    MinusZ,
}

impl fmt::Display for SignFacing {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PlusX => "+x",
            Self::MinusX => "-x",
            Self::PlusY => "+y",
            Self::MinusY => "-y",
            Self::PlusZ => "+z",
            Self::MinusZ => "-z",
        };
        formatter.write_str(label)
    }
}

/// Named world commands available on every [`CommandChannel`].
pub trait WorldCommands: CommandChannel {
    /// Reads the item at `at`.
    ///
    /// # Errors
    ///
    /// Propagates the channel error.
    fn get_node(&self, at: Coordinate) -> Result<String, SessionError> {
        self.send_command(&format!("get_node {}", at.command_text()))
    }

    /// Sets one node.
    ///
    /// # Errors
    ///
    /// Propagates the channel error.
    fn set_node(&self, at: Coordinate, item: &str) -> Result<String, SessionError> {
        self.send_command(&format!("set_node {}{item}", at.command_text()))
    }

    /// Fills the inclusive box between two corners with one item.
    ///
    /// # Errors
    ///
    /// Propagates the channel error.
    fn set_nodes(
        &self,
        from: Coordinate,
        to: Coordinate,
        item: &str,
    ) -> Result<String, SessionError> {
        self.send_command(&format!(
            "set_nodes {}{}{item}",
            from.command_text(),
            to.command_text()
        ))
    }

    /// Counts nodes in a box that differ from `item`.
    ///
    /// # Errors
    ///
    /// Propagates the channel error.
    fn compare_nodes(
        &self,
        from: Coordinate,
        to: Coordinate,
        item: &str,
    ) -> Result<String, SessionError> {
        self.send_command(&format!(
            "compare_nodes {}{} {item}",
            from.command_text(),
            to.command_text()
        ))
    }

    /// Sends a region list for one item in size-bounded batches.
    ///
    /// # Errors
    ///
    /// See [`send_node_list`].
    fn set_node_list(
        &self,
        regions: &[Region],
        item: &str,
        limit: usize,
    ) -> Result<TransmitSummary, TransmitError> {
        send_node_list(self, item, regions, limit)
    }

    /// Places a sign carrying `text`. Line breaks are sent as `\n`.
    ///
    /// # Errors
    ///
    /// Propagates the channel error.
    fn set_sign(
        &self,
        at: Coordinate,
        facing: SignFacing,
        sign_node: &str,
        text: &str,
    ) -> Result<String, SessionError> {
        let text = text.replace('\r', "").replace('\n', "\\n");
        self.send_command(&format!(
            "set_sign {} {facing} {sign_node} {text}",
            at.command_text()
        ))
    }

    /// Adds a written book to the inventory holder at `at`.
    ///
    /// # Errors
    ///
    /// Propagates the channel error.
    fn add_book_to_chest(
        &self,
        at: Coordinate,
        title: &str,
        text: &str,
    ) -> Result<String, SessionError> {
        let book = json!({ "title": title, "text": text });
        self.send_command(&format!("add_book_to_chest {}{book}", at.command_text()))
    }

    /// Height of the highest solid node in column `(x, z)`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MalformedReply`] when the reply is not an
    /// integer.
    fn get_ground_level(&self, x: i64, z: i64) -> Result<i64, SessionError> {
        let reply = self.send_command(&format!("get_ground_level {x} {z}"))?;
        reply
            .trim()
            .parse()
            .map_err(|_| SessionError::MalformedReply {
                command: String::from("get_ground_level"),
                reply,
            })
    }

    /// Names of the players currently connected to the game.
    ///
    /// # Errors
    ///
    /// Propagates the channel error.
    fn get_connected_players(&self) -> Result<Vec<String>, SessionError> {
        let reply = self.send_command("get_connected_players")?;
        Ok(reply.split(' ').map(str::to_owned).collect())
    }
}

impl<C: CommandChannel + ?Sized> WorldCommands for C {}

/// Escapes characters that would break command argument parsing.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '\r' => {
                chars.next_if_eq(&'\n');
                escaped.push_str("&#10;");
            }
            '\n' => escaped.push_str("&#10;"),
            '(' => escaped.push_str("&#40;"),
            ')' => escaped.push_str("&#41;"),
            ',' => escaped.push_str("&#44;"),
            '\u{a7}' => escaped.push_str("&sect;"),
            other => escaped.push(other),
        }
    }
    escaped
}

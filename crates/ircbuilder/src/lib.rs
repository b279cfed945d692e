//! Chat-relay client for remote world editing.
//!
//! A [`Session`] connects to a chat server, registers a nickname, joins a
//! working channel and logs in to the game through a command-executing bot
//! (the counterpart). Commands are sent to the counterpart as private
//! messages and answered the same way; see [`WorldCommands`] for the named
//! commands.
//!
//! Bulk edits are recorded into an [`EditBuffer`], packed per item into
//! boxes and points, then sent as compressed `set_node_list` batches that
//! each stay under the command length ceiling:
//!
//! ```no_run
//! use ircbuilder::{Session, WorldCommands};
//! use ircbuilder_config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     user: Some("steve".into()),
//!     password: Some("secret".into()),
//!     ..Config::default()
//! };
//! let mut session = Session::connect(&config)?;
//! session.building_mut().record(0..10, 0, 0..10, "default:stone");
//! session.building_mut().record(0..10, 1..4, 0..10, "air");
//! let summary = session.send_building(&["air"])?;
//! println!("{summary}");
//! println!("{}", session.get_node((0, 0, 0).into())?);
//! session.leave()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Threads
//!
//! Each session runs one dispatcher thread that reads every inbound line,
//! answers keepalives, and routes numerics and counterpart replies into two
//! queues. The caller's thread sends and waits; writes from both threads are
//! serialised by the [`Transport`].

mod building;
mod commands;
mod correlator;
mod dispatch;
mod errors;
mod frame;
mod message;
mod session;
mod transmit;
mod transport;

pub use building::{
    Axis, Coordinate, EditBuffer, ItemGroup, Region, compact_item, round_half_up,
    verify_partition,
};
pub use commands::{CommandChannel, DEFAULT_SIGN_NODE, SignFacing, WorldCommands, escape};
pub use correlator::ERROR_NUMERIC_FLOOR;
pub use errors::{EditError, HandshakeStage, SessionError, TransmitError, TransportError};
pub use frame::FrameReader;
pub use session::{
    Credentials, END_OF_MEMBER_LIST, END_OF_WELCOME, Session, SessionOptions, SessionState,
    generated_channel_name,
};
pub use transmit::{TransmitSummary, order_items, send_item_groups, send_node_list};
pub use transport::{CONNECTION_TIMEOUT, Connection, Transport, connect};

#[cfg(test)]
mod tests;

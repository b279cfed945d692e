//! Argument definitions for the `ircbuilder` binary.
//!
//! Configuration flags (server, account, timeouts, logging) are consumed by
//! `ortho_config` before these definitions see the remaining tokens.

use clap::{Parser, Subcommand};

/// One-shot client for the game's chat command relay.
#[derive(Parser, Debug)]
#[command(name = "ircbuilder", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// The command to run once the session is established.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Commands executed against the game.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub(crate) enum CliCommand {
    /// Posts a message to the working channel.
    Chat {
        /// Message text.
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Sends a raw command to the game and prints its reply.
    Cmd {
        /// Command name followed by its arguments.
        #[arg(
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        text: Vec<String>,
    },
    /// Prints the item at a position.
    GetNode {
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
        #[arg(allow_hyphen_values = true)]
        z: f64,
    },
    /// Places one item at a position.
    SetNode {
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
        #[arg(allow_hyphen_values = true)]
        z: f64,
        /// Item name, for example `default:stone`.
        item: String,
    },
    /// Fills the box between two corners through the batched node list.
    Fill {
        #[arg(allow_hyphen_values = true)]
        x1: i64,
        #[arg(allow_hyphen_values = true)]
        y1: i64,
        #[arg(allow_hyphen_values = true)]
        z1: i64,
        #[arg(allow_hyphen_values = true)]
        x2: i64,
        #[arg(allow_hyphen_values = true)]
        y2: i64,
        #[arg(allow_hyphen_values = true)]
        z2: i64,
        /// Item name, for example `default:stone`.
        item: String,
    },
    /// Lists the players currently connected to the game.
    Players,
}

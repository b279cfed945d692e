use crate::endpoint::ServerEndpoint;
use crate::logging::LogFormat;

/// Default plaintext IRC port.
pub const DEFAULT_IRC_PORT: u16 = 6667;

/// Default host used when no server is configured.
pub const DEFAULT_HOST: &str = "localhost";

/// Nickname of the game-side bot that executes commands.
pub const DEFAULT_COUNTERPART: &str = "mtserver";

/// Longest nickname accepted by common IRC networks.
pub const NICK_MAX_LEN: usize = 9;

/// Pause before each outbound line, in milliseconds.
pub const DEFAULT_SEND_DELAY_MS: u64 = 100;

/// Time allowed for an application reply, in milliseconds.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5_000;

/// Time allowed for a numeric status reply, in milliseconds.
pub const DEFAULT_NUMERIC_TIMEOUT_MS: u64 = 15_000;

/// Longest encoded command line sent in one batch.
pub const DEFAULT_MAX_COMMAND_LEN: usize = 400;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default chat server endpoint.
#[must_use]
pub fn default_server_endpoint() -> ServerEndpoint {
    ServerEndpoint::new(DEFAULT_HOST, DEFAULT_IRC_PORT)
}

/// Owned counterpart nickname used where allocation is required (e.g. serde).
#[must_use]
pub fn default_counterpart() -> String {
    DEFAULT_COUNTERPART.to_owned()
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Derives a nickname from the game account name.
///
/// The nickname is the account name prefixed with `py`, truncated to
/// [`NICK_MAX_LEN`] characters.
#[must_use]
pub fn derived_nick(user: &str) -> String {
    format!("py{user}").chars().take(NICK_MAX_LEN).collect()
}

//! Shared configuration for the ircbuilder client and binary.
//!
//! Values are layered by `ortho_config`: built-in defaults, then a TOML file
//! (`--config-path` or `IRCBUILDER_CONFIG_PATH`), then `IRCBUILDER_*`
//! environment variables, then command-line flags.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod endpoint;
mod logging;

pub use defaults::{
    DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_COUNTERPART, DEFAULT_HOST, DEFAULT_IRC_PORT,
    DEFAULT_LOG_FILTER, DEFAULT_MAX_COMMAND_LEN, DEFAULT_NUMERIC_TIMEOUT_MS,
    DEFAULT_SEND_DELAY_MS, NICK_MAX_LEN, default_counterpart, default_log_filter_string,
    default_log_format, default_server_endpoint, derived_nick,
};
pub use endpoint::{EndpointParseError, ServerEndpoint};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved client configuration.
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "IRCBUILDER")]
pub struct Config {
    /// Chat server carrying the command channel.
    #[serde(default = "default_server_endpoint")]
    #[ortho_config(default = default_server_endpoint())]
    pub server: ServerEndpoint,
    /// Game account used by the `login` command.
    #[serde(default)]
    pub user: Option<String>,
    /// Game account password. Never logged.
    #[serde(default)]
    pub password: Option<String>,
    /// Nickname of the bot executing commands on the game side.
    #[serde(default = "default_counterpart")]
    #[ortho_config(default = default_counterpart())]
    pub counterpart: String,
    /// Own nickname; derived from `user` when absent.
    #[serde(default)]
    pub nick: Option<String>,
    /// Working channel; a random one is generated when absent.
    #[serde(default)]
    pub channel: Option<String>,
    /// Pause before each outbound line, in milliseconds.
    #[serde(default = "default_send_delay_ms")]
    #[ortho_config(default = DEFAULT_SEND_DELAY_MS)]
    pub send_delay_ms: u64,
    /// Time allowed for an application reply, in milliseconds.
    #[serde(default = "default_command_timeout_ms")]
    #[ortho_config(default = DEFAULT_COMMAND_TIMEOUT_MS)]
    pub command_timeout_ms: u64,
    /// Time allowed for a numeric status reply, in milliseconds.
    #[serde(default = "default_numeric_timeout_ms")]
    #[ortho_config(default = DEFAULT_NUMERIC_TIMEOUT_MS)]
    pub numeric_timeout_ms: u64,
    /// Longest encoded command line sent per batch.
    #[serde(default = "default_max_command_len")]
    #[ortho_config(default = DEFAULT_MAX_COMMAND_LEN)]
    pub max_command_len: usize,
    /// `tracing` filter expression.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

const fn default_send_delay_ms() -> u64 {
    DEFAULT_SEND_DELAY_MS
}

const fn default_command_timeout_ms() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_MS
}

const fn default_numeric_timeout_ms() -> u64 {
    DEFAULT_NUMERIC_TIMEOUT_MS
}

const fn default_max_command_len() -> usize {
    DEFAULT_MAX_COMMAND_LEN
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server_endpoint(),
            user: None,
            password: None,
            counterpart: default_counterpart(),
            nick: None,
            channel: None,
            send_delay_ms: DEFAULT_SEND_DELAY_MS,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            numeric_timeout_ms: DEFAULT_NUMERIC_TIMEOUT_MS,
            max_command_len: DEFAULT_MAX_COMMAND_LEN,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Chat server endpoint.
    #[must_use]
    pub const fn server(&self) -> &ServerEndpoint {
        &self.server
    }

    /// Nickname of the command-executing bot.
    #[must_use]
    pub fn counterpart(&self) -> &str {
        &self.counterpart
    }

    /// Own nickname, falling back to one derived from the account name.
    ///
    /// Returns `None` when neither a nickname nor an account is configured.
    #[must_use]
    pub fn nick(&self) -> Option<String> {
        self.nick
            .clone()
            .or_else(|| self.user.as_deref().map(derived_nick))
    }

    /// Explicit working channel, if any.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Pause before each outbound line.
    #[must_use]
    pub const fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    /// Time allowed for an application reply.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Time allowed for a numeric status reply.
    #[must_use]
    pub const fn numeric_timeout(&self) -> Duration {
        Duration::from_millis(self.numeric_timeout_ms)
    }

    /// Longest encoded command line sent per batch.
    #[must_use]
    pub const fn max_command_len(&self) -> usize {
        self.max_command_len
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

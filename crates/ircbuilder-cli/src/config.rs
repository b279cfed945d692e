//! Separates configuration flags from the command line.
//!
//! Leading flags named in [`CONFIG_CLI_FLAGS`] go to `ortho_config`; the
//! first token that is not one of them starts the command.

use std::ffi::{OsStr, OsString};

use ircbuilder_config::Config;
use ortho_config::OrthoConfig;

use crate::AppError;

/// Flags understood by the configuration loader.
///
/// MAINTENANCE: keep in step with the fields of `ircbuilder_config::Config`.
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--server",
    "--user",
    "--password",
    "--counterpart",
    "--nick",
    "--channel",
    "--send-delay-ms",
    "--command-timeout-ms",
    "--numeric-timeout-ms",
    "--max-command-len",
    "--log-filter",
    "--log-format",
];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the program name plus configuration flags.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

/// Whether `argument` is a configuration flag and, if so, whether its value
/// is the next token.
fn config_flag(argument: &OsStr) -> Option<bool> {
    let text = argument.to_string_lossy();
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (text.as_ref(), false),
    };
    CONFIG_CLI_FLAGS
        .contains(&flag)
        .then_some(!inline_value)
}

/// Arguments split at the start of the command.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ArgumentSplit {
    /// Program name followed by every configuration flag and value.
    pub(crate) config_arguments: Vec<OsString>,
    /// Program name followed by the command and its arguments.
    pub(crate) command_arguments: Vec<OsString>,
}

pub(crate) fn split_arguments(args: &[OsString]) -> ArgumentSplit {
    let Some((program, rest)) = args.split_first() else {
        return ArgumentSplit {
            config_arguments: Vec::new(),
            command_arguments: Vec::new(),
        };
    };

    let mut config_arguments = vec![program.clone()];
    let mut index = 0;
    while let Some(argument) = rest.get(index) {
        let Some(needs_value) = config_flag(argument) else {
            break;
        };
        config_arguments.push(argument.clone());
        index += 1;
        if needs_value {
            if let Some(value) = rest.get(index) {
                config_arguments.push(value.clone());
                index += 1;
            }
        }
    }

    let mut command_arguments = vec![program.clone()];
    command_arguments.extend(rest[index..].iter().cloned());
    ArgumentSplit {
        config_arguments,
        command_arguments,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[rstest]
    fn flags_with_separate_values_are_routed_to_the_loader() {
        let split = split_arguments(&os(&[
            "ircbuilder",
            "--user",
            "steve",
            "--log-format=json",
            "players",
        ]));

        assert_eq!(
            split.config_arguments,
            os(&["ircbuilder", "--user", "steve", "--log-format=json"])
        );
        assert_eq!(split.command_arguments, os(&["ircbuilder", "players"]));
    }

    #[rstest]
    fn flags_after_the_command_belong_to_the_command() {
        let split = split_arguments(&os(&["ircbuilder", "cmd", "--user", "x"]));

        assert_eq!(split.config_arguments, os(&["ircbuilder"]));
        assert_eq!(
            split.command_arguments,
            os(&["ircbuilder", "cmd", "--user", "x"])
        );
    }

    #[rstest]
    #[case("--help")]
    #[case("--version")]
    fn unknown_flags_start_the_command(#[case] flag: &str) {
        let split = split_arguments(&os(&["ircbuilder", flag]));
        assert_eq!(split.command_arguments, os(&["ircbuilder", flag]));
    }

    #[rstest]
    fn empty_arguments_split_to_nothing() {
        let split = split_arguments(&[]);
        assert!(split.config_arguments.is_empty());
        assert!(split.command_arguments.is_empty());
    }
}

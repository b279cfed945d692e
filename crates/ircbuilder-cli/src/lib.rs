//! Command-line runtime for the ircbuilder client.
//!
//! Loads layered configuration, installs telemetry, opens a fully
//! established session (registered, joined and logged in), runs one command
//! and leaves. Replies go to stdout; errors go to stderr with a failure exit
//! code.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use ircbuilder::{CommandChannel, Coordinate, Session, WorldCommands};
use ircbuilder_config::Config;
use tracing::debug;

mod cli;
mod config;
mod errors;
mod telemetry;

use cli::{Cli, CliCommand};
use config::{ConfigLoader, OrthoConfigLoader, split_arguments};
pub(crate) use errors::AppError;

const CLI_TARGET: &str = "ircbuilder::cli";

/// Bundles the output streams handed to the runtime.
struct IoStreams<'a, W: Write, E: Write> {
    stdout: &'a mut W,
    stderr: &'a mut E,
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams { stdout, stderr };
    run_with_loader(args, &mut io, &OrthoConfigLoader)
}

fn run_with_loader<I, W, E, L>(args: I, io: &mut IoStreams<'_, W, E>, loader: &L) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_arguments(&args);

    let cli = match Cli::try_parse_from(&split.command_arguments) {
        Ok(cli) => cli,
        // Help and version requests are not failures.
        Err(error) if !error.use_stderr() => {
            let _ = write!(io.stdout, "{error}");
            return ExitCode::SUCCESS;
        }
        Err(error) => return report(io.stderr, &AppError::CliUsage(error)),
    };

    let result = loader
        .load(&split.config_arguments)
        .and_then(|config| {
            telemetry::initialise(&config)?;
            Ok(config)
        })
        .and_then(|config| execute(&cli.command, &config, &mut *io.stdout));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report(io.stderr, &error),
    }
}

fn report<E: Write>(stderr: &mut E, error: &AppError) -> ExitCode {
    let _ = writeln!(stderr, "{error}");
    ExitCode::FAILURE
}

fn execute<W: Write>(command: &CliCommand, config: &Config, stdout: &mut W) -> Result<(), AppError> {
    let mut session = Session::connect(config)?;
    debug!(target: CLI_TARGET, ?command, channel = session.channel(), "session ready");
    let outcome = run_command(&mut session, command, stdout);
    // Leave even when the command failed; the command's error wins.
    let left = session.leave();
    outcome?;
    left.map_err(AppError::from)
}

fn run_command<W: Write>(
    session: &mut Session,
    command: &CliCommand,
    stdout: &mut W,
) -> Result<(), AppError> {
    match command {
        CliCommand::Chat { text } => session.post_to_chat(&text.join(" "))?,
        CliCommand::Cmd { text } => {
            writeln!(stdout, "{}", session.send_command(&text.join(" "))?)?;
        }
        CliCommand::GetNode { x, y, z } => {
            writeln!(stdout, "{}", session.get_node(Coordinate::rounded(*x, *y, *z))?)?;
        }
        CliCommand::SetNode { x, y, z, item } => {
            let reply = session.set_node(Coordinate::rounded(*x, *y, *z), item)?;
            writeln!(stdout, "{reply}")?;
        }
        CliCommand::Fill {
            x1,
            y1,
            z1,
            x2,
            y2,
            z2,
            item,
        } => {
            session
                .building_mut()
                .record_cuboid((*x1, *y1, *z1), (*x2, *y2, *z2), item.as_str());
            writeln!(stdout, "{}", session.send_building(&[])?)?;
        }
        CliCommand::Players => {
            for player in session.get_connected_players()? {
                writeln!(stdout, "{player}")?;
            }
        }
    }
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use rstest::rstest;

    use super::*;

    /// Returns a fixed configuration and records what it was asked to load.
    struct StubLoader {
        config: Config,
        seen: RefCell<Vec<OsString>>,
    }

    impl ConfigLoader for StubLoader {
        fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
            *self.seen.borrow_mut() = args.to_vec();
            Ok(self.config.clone())
        }
    }

    fn run_stubbed(args: &[&str], config: Config) -> (ExitCode, String, String, Vec<OsString>) {
        let loader = StubLoader {
            config,
            seen: RefCell::default(),
        };
        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
        let mut io = IoStreams {
            stdout: &mut stdout,
            stderr: &mut stderr,
        };
        let code = run_with_loader(args.iter().map(OsString::from), &mut io, &loader);
        (
            code,
            String::from_utf8(stdout).expect("utf-8 stdout"),
            String::from_utf8(stderr).expect("utf-8 stderr"),
            loader.seen.into_inner(),
        )
    }

    #[rstest]
    fn missing_identity_is_reported_before_connecting() {
        let (code, stdout, stderr, seen) =
            run_stubbed(&["ircbuilder", "--counterpart", "bot", "players"], Config::default());

        assert_eq!(code, ExitCode::FAILURE);
        assert!(stdout.is_empty());
        assert!(stderr.contains("no nickname configured"), "stderr: {stderr}");
        assert_eq!(seen, ["ircbuilder", "--counterpart", "bot"].map(OsString::from));
    }

    #[rstest]
    fn help_is_written_to_stdout() {
        let (code, stdout, stderr, _) = run_stubbed(&["ircbuilder", "--help"], Config::default());

        assert_eq!(code, ExitCode::SUCCESS);
        assert!(stdout.contains("get-node"), "stdout: {stdout}");
        assert!(stderr.is_empty());
    }

    #[rstest]
    fn usage_errors_fail() {
        let (code, _, stderr, seen) = run_stubbed(&["ircbuilder", "dig"], Config::default());

        assert_eq!(code, ExitCode::FAILURE);
        assert!(stderr.contains("dig"), "stderr: {stderr}");
        assert!(seen.is_empty());
    }
}

//! Command-line runtime for the valform formatter tool.
//!
//! The module owns argument parsing, configuration bootstrapping and
//! telemetry, then builds a [`FormatterService`] over the configured
//! formatters directory and runs one command against it. Results are written
//! to stdout as JSON. The runtime can be driven from tests with substitute
//! configuration loaders and IO streams.

use std::ffi::OsString;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use valform_config::Config;
use valform_plugins::{CatalogRow, FormatterService, ProcessRunner, ProcessTimeouts, Verb};

mod cli;
mod config;
mod errors;
mod telemetry;

use cli::{Cli, CliCommand, ValueArgs};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
use config::split_config_arguments;
pub(crate) use errors::AppError;

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: keep in sync with the fields of `valform_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--formatters-dir",
    "--start-timeout-ms",
    "--run-timeout-ms",
    "--log-filter",
    "--log-format",
];

/// Answer to `installed`.
#[derive(Debug, Serialize)]
struct Installation<'a> {
    name: &'a str,
    installed: bool,
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, R, W, E>(args: I, stdin: &mut R, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: Read,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdin, stdout, stderr, &OrthoConfigLoader)
}

pub(crate) fn run_with_loader<I, R, W, E, L>(
    args: I,
    stdin: &mut R,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: Read,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let arguments: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&arguments);

    let result = Cli::try_parse_from(&split.command_arguments)
        .map_err(AppError::CliUsage)
        .and_then(|cli| loader.load(&split.config_arguments).map(|config| (cli, config)))
        .and_then(|(cli, config)| {
            telemetry::initialise(&config)?;
            execute(cli.command, &config, stdin, stdout)
        });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            drop(writeln!(stderr, "{error}"));
            ExitCode::FAILURE
        }
    }
}

fn execute<R, W>(
    command: CliCommand,
    config: &Config,
    stdin: &mut R,
    stdout: &mut W,
) -> Result<(), AppError>
where
    R: Read,
    W: Write,
{
    let (start, run) = config.timeouts();
    let runner = ProcessRunner::new(ProcessTimeouts::new(start, run));
    let service = FormatterService::new(config.formatters_dir().into_std_path_buf(), runner);
    service.load();

    match command {
        CliCommand::List => emit(stdout, &service.rows()),
        CliCommand::Show { name } => {
            let meta = service.lookup(&name)?;
            emit(stdout, &CatalogRow::from(&meta))
        }
        CliCommand::Installed { name } => emit(
            stdout,
            &Installation {
                installed: service.is_installed(&name),
                name: &name,
            },
        ),
        CliCommand::Decode(value) => respond(&service, Verb::Decode, &value, stdin, stdout),
        CliCommand::Encode(value) => respond(&service, Verb::Encode, &value, stdin, stdout),
        CliCommand::Validate(value) => respond(&service, Verb::Validate, &value, stdin, stdout),
    }
}

fn respond<R, W>(
    service: &FormatterService<ProcessRunner>,
    verb: Verb,
    value: &ValueArgs,
    stdin: &mut R,
    stdout: &mut W,
) -> Result<(), AppError>
where
    R: Read,
    W: Write,
{
    let data = read_value(value, stdin)?;
    emit(stdout, &service.respond(&value.name, verb, &data)?)
}

fn read_value<R: Read>(value: &ValueArgs, stdin: &mut R) -> Result<Vec<u8>, AppError> {
    match value.input.as_deref() {
        Some(path) if path != Path::new("-") => {
            fs::read(path).map_err(|source| AppError::ReadInput {
                path: path.to_path_buf(),
                source,
            })
        }
        _ => {
            let mut buffer = Vec::new();
            stdin
                .read_to_end(&mut buffer)
                .map_err(AppError::ReadStdin)?;
            Ok(buffer)
        }
    }
}

fn emit<W: Write, T: Serialize + ?Sized>(stdout: &mut W, value: &T) -> Result<(), AppError> {
    serde_json::to_writer_pretty(&mut *stdout, value).map_err(AppError::Serialise)?;
    writeln!(stdout).map_err(AppError::Write)
}

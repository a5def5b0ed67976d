//! CLI argument definitions for the valform tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Command-line interface for the valform formatter tool.
#[derive(Parser, Debug)]
#[command(name = "valform", disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// The operation to perform.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Operations exposed by the binary.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Lists every installed formatter as JSON rows.
    List,
    /// Shows one formatter's catalog row.
    Show {
        /// Formatter name.
        name: String,
    },
    /// Reports whether a formatter is installed.
    Installed {
        /// Formatter name.
        name: String,
    },
    /// Decodes a value for display.
    Decode(ValueArgs),
    /// Encodes edited text back into a value.
    Encode(ValueArgs),
    /// Asks a formatter whether a value is valid.
    Validate(ValueArgs),
}

/// Formatter name and value source shared by the value commands.
#[derive(Args, Debug, Clone)]
pub(crate) struct ValueArgs {
    /// Formatter name.
    pub(crate) name: String,
    /// File holding the raw value; standard input when omitted or `-`.
    #[arg(value_name = "FILE")]
    pub(crate) input: Option<PathBuf>,
}

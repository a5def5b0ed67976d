//! CLI entrypoint for the valform formatter tool.
//!
//! The binary delegates to [`valform_cli::run`], which loads configuration,
//! scans the formatters directory and runs the requested command.

use std::io::{self, StderrLock, StdinLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdin: StdinLock<'_> = io::stdin().lock();
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    valform_cli::run(std::env::args_os(), &mut stdin, &mut stdout, &mut stderr)
}

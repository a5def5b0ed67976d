//! Error types for the CLI runtime.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use valform_plugins::FormatterError;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("failed to read value from {path}: {source}")]
    ReadInput { path: PathBuf, source: io::Error },
    #[error("failed to read value from standard input: {0}")]
    ReadStdin(io::Error),
    #[error("failed to serialise result: {0}")]
    Serialise(serde_json::Error),
    #[error("failed to write result: {0}")]
    Write(io::Error),
    #[error(transparent)]
    Formatter(#[from] FormatterError),
}

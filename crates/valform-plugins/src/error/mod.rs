//! Domain errors raised by formatter operations.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. I/O errors are wrapped in `Arc`
//! to satisfy the `result_large_err` Clippy lint.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors arising from formatter discovery and invocation.
#[derive(Debug, Clone, Error)]
pub enum FormatterError {
    /// The requested formatter is not present in the catalog.
    #[error("can't find formatter with name: {name}")]
    UnknownFormatter {
        /// Name that was looked up.
        name: String,
    },

    /// A decode, encode or validate call failed for a known formatter.
    #[error("cannot {verb} value using {name} formatter: {reason}")]
    Operation {
        /// Formatter name.
        name: String,
        /// Protocol verb that was invoked.
        verb: String,
        /// Underlying process or protocol failure.
        reason: Box<Self>,
    },

    /// A `usage.json` file could not be read as a JSON array of strings.
    #[error("formatter {path} has invalid usage.json file: {message}")]
    ManifestInvalid {
        /// Plugin directory holding the manifest.
        path: PathBuf,
        /// Description of the parse or validation failure.
        message: String,
    },

    /// The `info` query produced no usable metadata.
    #[error("formatter {path} returned empty output for info command: {reason}")]
    PluginInfoEmpty {
        /// Plugin directory that was queried.
        path: PathBuf,
        /// Underlying failure, rendered for diagnosis.
        reason: Box<Self>,
    },

    /// The plugin process could not be spawned.
    #[error("cannot start process {command}: {message}")]
    SpawnFailed {
        /// Space-joined command line.
        command: String,
        /// Human-readable failure description.
        message: String,
        /// Optional underlying I/O error.
        #[source]
        source: Option<Arc<std::io::Error>>,
    },

    /// The plugin process did not reach a running state in time.
    #[error("process {command} did not start within {timeout_ms} ms")]
    StartTimeout {
        /// Space-joined command line.
        command: String,
        /// Configured start timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The plugin process did not exit in time and was killed.
    #[error("process {command} was killed by timeout after {timeout_ms} ms")]
    RunTimeout {
        /// Space-joined command line.
        command: String,
        /// Configured run timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The plugin wrote nothing to stdout.
    #[error("formatter produced no output for {verb} command")]
    NoOutput {
        /// Protocol verb that was invoked.
        verb: String,
    },

    /// The plugin wrote something other than a single JSON object.
    #[error("formatter returned invalid json: {output}")]
    InvalidOutput {
        /// Raw stdout text, lossily decoded.
        output: String,
    },

    /// The plugin answered with an empty JSON object.
    #[error("formatter returned an empty object for {verb} command")]
    EmptyResponse {
        /// Protocol verb that was invoked.
        verb: String,
    },

    /// A completion sink was required but none was supplied.
    #[error("invalid callback")]
    InvalidCompletionSink,

    /// The plugin directory could not be created or enumerated.
    #[error("cannot scan formatters directory {path}: {source}")]
    Directory {
        /// Directory that was scanned.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// An I/O error occurred while communicating with the plugin process.
    #[error("I/O error communicating with process {command}: {source}")]
    Io {
        /// Space-joined command line.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl FormatterError {
    /// Returns the innermost failure, unwrapping per-operation and
    /// per-formatter context.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Operation { reason, .. } | Self::PluginInfoEmpty { reason, .. } => {
                reason.root_cause()
            }
            other => other,
        }
    }

    /// Returns `true` for failures of the plugin process itself (spawn,
    /// timeouts, pipe I/O) as opposed to protocol or catalog failures.
    #[must_use]
    pub fn is_process_failure(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::SpawnFailed { .. }
                | Self::StartTimeout { .. }
                | Self::RunTimeout { .. }
                | Self::Io { .. }
        )
    }

    /// Returns `true` when the plugin ran but its stdout violated the
    /// protocol.
    #[must_use]
    pub fn is_protocol_failure(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::NoOutput { .. } | Self::InvalidOutput { .. } | Self::EmptyResponse { .. }
        )
    }
}

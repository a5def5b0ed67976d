//! Layered configuration shared by the valform tools.
//!
//! Values are resolved from built-in defaults, an optional configuration
//! file, `VALFORM_*` environment variables and command-line flags, in
//! increasing order of precedence. Every field is optional; the accessor
//! methods fall back to the defaults in this crate.

mod defaults;
mod logging;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use self::defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_TIMEOUT_MS, FORMATTERS_DIR_NAME, default_formatters_dir,
    default_log_filter, default_log_format,
};
pub use self::logging::{LogFormat, LogFormatParseError};

/// Resolved configuration for the formatter engine and its binary.
///
/// The loader seeds a defaults layer from the built-in values so that a host
/// with no file, environment or flags still resolves to a complete
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "VALFORM")]
pub struct Config {
    /// Directory scanned for formatter plugins.
    pub formatters_dir: Option<Utf8PathBuf>,
    /// Budget for a formatter process to start, in milliseconds.
    #[ortho_config(default = DEFAULT_TIMEOUT_MS)]
    pub start_timeout_ms: Option<u64>,
    /// Budget for a started formatter process to exit, in milliseconds.
    #[ortho_config(default = DEFAULT_TIMEOUT_MS)]
    pub run_timeout_ms: Option<u64>,
    /// `tracing` filter expression.
    #[ortho_config(default = String::from(DEFAULT_LOG_FILTER))]
    pub log_filter: Option<String>,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: Option<LogFormat>,
}

impl Config {
    /// Loads configuration from defaults, files, the environment and the
    /// process arguments.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any layer is malformed.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads configuration treating `args` as the command line.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any layer is malformed.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Directory scanned for formatter plugins.
    #[must_use]
    pub fn formatters_dir(&self) -> Utf8PathBuf {
        self.formatters_dir
            .as_deref()
            .map_or_else(default_formatters_dir, Utf8Path::to_path_buf)
    }

    /// Start budget in milliseconds.
    #[must_use]
    pub fn start_timeout_ms(&self) -> u64 {
        self.start_timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    /// Run budget in milliseconds.
    #[must_use]
    pub fn run_timeout_ms(&self) -> u64 {
        self.run_timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    /// Start and run budgets as durations.
    #[must_use]
    pub fn timeouts(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.start_timeout_ms()),
            Duration::from_millis(self.run_timeout_ms()),
        )
    }

    /// `tracing` filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(default_log_format)
    }
}

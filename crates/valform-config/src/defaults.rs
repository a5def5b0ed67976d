use std::env;

use camino::Utf8PathBuf;
use dirs::{config_dir, home_dir};

use crate::logging::LogFormat;

/// Default budget, in milliseconds, for a formatter to start and to run.
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Name of the formatters directory beneath the application config path.
pub const FORMATTERS_DIR_NAME: &str = "formatters";

/// Default log filter expression used by the binary.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binary.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Computes the default formatters directory:
/// `<user config dir>/valform/formatters`.
#[must_use]
pub fn default_formatters_dir() -> Utf8PathBuf {
    let mut base = config_base_directory();
    base.push("valform");
    base.push(FORMATTERS_DIR_NAME);
    base
}

fn config_base_directory() -> Utf8PathBuf {
    config_dir()
        .or_else(|| home_dir().map(|home| home.join(".config")))
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_else(fallback_base_directory)
}

fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

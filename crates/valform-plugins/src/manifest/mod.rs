//! Formatter manifest reading.
//!
//! Each formatter lives in its own subdirectory of the formatters directory
//! and declares how it is launched in a `usage.json` file: a JSON array of
//! strings forming the command prefix, e.g.
//! `["/usr/bin/python3", "msgpack_formatter.py"]`. The protocol verb is
//! appended to that prefix on every invocation.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::FormatterError;

/// File name of the per-formatter manifest.
pub const MANIFEST_FILE: &str = "usage.json";

/// Launch description read from a formatter's `usage.json`.
///
/// # Example
///
/// ```
/// use valform_plugins::PluginManifest;
/// use std::path::PathBuf;
///
/// let manifest = PluginManifest::new(
///     vec!["/usr/bin/python3".into(), "formatter.py".into()],
///     PathBuf::from("/formatters/msgpack"),
/// );
/// assert_eq!(manifest.command_line(), "/usr/bin/python3 formatter.py");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginManifest {
    invocation_prefix: Vec<String>,
    working_directory: PathBuf,
}

impl PluginManifest {
    /// Creates a manifest from an already-parsed prefix.
    #[must_use]
    pub const fn new(invocation_prefix: Vec<String>, working_directory: PathBuf) -> Self {
        Self {
            invocation_prefix,
            working_directory,
        }
    }

    /// Reads `usage.json` from `directory`.
    ///
    /// Returns `Ok(None)` when the directory has no manifest, so plain
    /// subdirectories are skipped silently.
    ///
    /// # Errors
    ///
    /// Returns [`FormatterError::ManifestInvalid`] when the file exists but
    /// cannot be read, is not a JSON array of strings, or is an empty array.
    pub fn read(directory: &Path) -> Result<Option<Self>, FormatterError> {
        let path = directory.join(MANIFEST_FILE);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(invalid(directory, format!("cannot read manifest: {err}")));
            }
        };

        let prefix: Vec<String> = serde_json::from_slice(&raw)
            .map_err(|err| invalid(directory, format!("expected a JSON array of strings: {err}")))?;

        if prefix.is_empty() {
            return Err(invalid(directory, String::from("command prefix is empty")));
        }

        Ok(Some(Self::new(prefix, directory.to_path_buf())))
    }

    /// Returns the command prefix shared by every verb.
    #[must_use]
    pub fn invocation_prefix(&self) -> &[String] {
        &self.invocation_prefix
    }

    /// Returns the directory the formatter runs in.
    #[must_use]
    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// Returns the prefix joined with single spaces, for display.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.invocation_prefix.join(" ")
    }
}

fn invalid(directory: &Path, message: String) -> FormatterError {
    FormatterError::ManifestInvalid {
        path: directory.to_path_buf(),
        message,
    }
}

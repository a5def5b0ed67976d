//! In-memory catalog of installed formatters.
//!
//! The catalog is built by scanning a formatters directory: every immediate
//! subdirectory holding a `usage.json` manifest is queried with `info`, and
//! each formatter that answers is recorded under its directory name. A
//! catalog is immutable once built; reloading produces a fresh one.
//!
//! Entries keep scan order. When two entries share a name the name index
//! resolves to the later one while both stay in the listing.

mod view;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::FormatterError;
use crate::manifest::PluginManifest;
use crate::process::CommandExecutor;
use crate::protocol::{InfoResponse, invoke};
use crate::sink::ErrorChannel;

pub use self::view::{CatalogRole, CatalogRow};

/// Tracing target for catalog operations.
const CATALOG_TARGET: &str = "valform_plugins::catalog";

/// A formatter that answered `info` during a scan.
///
/// # Example
///
/// ```
/// use valform_plugins::{PluginManifest, PluginMetadata};
/// use std::path::PathBuf;
///
/// let manifest = PluginManifest::new(vec!["./hexdump".into()], PathBuf::from("/f/hexdump"));
/// let meta = PluginMetadata::new("hexdump", "0.3", "Hex viewer", &manifest);
/// assert_eq!(meta.name(), "hexdump");
/// assert_eq!(meta.command_line(), "./hexdump");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMetadata {
    name: String,
    version: String,
    description: String,
    manifest: PluginManifest,
}

impl PluginMetadata {
    /// Creates metadata for a formatter launched per `manifest`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        manifest: &PluginManifest,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            manifest: manifest.clone(),
        }
    }

    /// Returns the catalog key (the formatter's directory name).
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the formatter-supplied version, possibly empty.
    #[must_use]
    pub const fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Returns the formatter-supplied description, possibly empty.
    #[must_use]
    pub const fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the command prefix from `usage.json`.
    #[must_use]
    pub fn invocation_prefix(&self) -> &[String] {
        self.manifest.invocation_prefix()
    }

    /// Returns the directory the formatter runs in.
    #[must_use]
    pub fn working_directory(&self) -> &Path {
        self.manifest.working_directory()
    }

    /// Returns the command prefix joined with spaces.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.manifest.command_line()
    }

    /// Returns the launch description.
    #[must_use]
    pub const fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }
}

/// Registry of formatters found by one scan.
///
/// # Example
///
/// ```
/// use valform_plugins::{Catalog, PluginManifest, PluginMetadata};
/// use std::path::PathBuf;
///
/// let manifest = PluginManifest::new(vec!["./fmt".into()], PathBuf::from("/f/a"));
/// let catalog = Catalog::from_entries(vec![
///     PluginMetadata::new("a", "1", "first", &manifest),
///     PluginMetadata::new("a", "2", "second", &manifest),
/// ]);
/// assert_eq!(catalog.len(), 2);
/// assert_eq!(catalog.lookup("a").map(|m| m.version()), Some("2"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<PluginMetadata>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from entries in scan order.
    #[must_use]
    pub fn from_entries(entries: Vec<PluginMetadata>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.name.clone(), position))
            .collect();
        Self { entries, index }
    }

    /// Scans `directory` and queries every formatter found there.
    ///
    /// The directory is created when missing. Per-formatter failures are
    /// reported on `errors` and the scan moves on; a directory that cannot be
    /// created or listed yields an empty catalog after one report.
    pub fn scan<E>(directory: &Path, executor: &E, errors: &dyn ErrorChannel) -> Self
    where
        E: CommandExecutor + ?Sized,
    {
        let candidates = match candidate_directories(directory, errors) {
            Ok(candidates) => candidates,
            Err(err) => {
                report(errors, &err);
                return Self::new();
            }
        };

        let mut entries = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match probe(&candidate, executor, errors) {
                Ok(Some(entry)) => {
                    debug!(
                        target: CATALOG_TARGET,
                        formatter = entry.name(),
                        version = entry.version(),
                        "registered formatter"
                    );
                    entries.push(entry);
                }
                Ok(None) => {}
                Err(err) => report(errors, &err),
            }
        }

        info!(
            target: CATALOG_TARGET,
            directory = %directory.display(),
            formatters = entries.len(),
            "formatter catalog loaded"
        );
        Self::from_entries(entries)
    }

    /// Looks up a formatter by exact name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&PluginMetadata> {
        self.index
            .get(name)
            .and_then(|&position| self.entries.get(position))
    }

    /// Returns `true` when `name` resolves to a formatter.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns every entry name in catalog order, duplicates included.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(PluginMetadata::name).collect()
    }

    /// Returns each resolvable name once, in catalog order.
    ///
    /// A duplicated name is listed at the position of the entry it resolves
    /// to.
    #[must_use]
    pub fn plain_list(&self) -> Vec<String> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(position, entry)| self.index.get(entry.name()) == Some(position))
            .map(|(_, entry)| entry.name.clone())
            .collect()
    }

    /// Returns all entries in catalog order.
    #[must_use]
    pub fn entries(&self) -> &[PluginMetadata] {
        &self.entries
    }

    /// Returns the number of entries, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no formatter was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lists immediate subdirectories in file-name order, creating `directory`
/// first when it does not exist.
fn candidate_directories(
    directory: &Path,
    errors: &dyn ErrorChannel,
) -> Result<Vec<PathBuf>, FormatterError> {
    let directory_error = |source: std::io::Error| FormatterError::Directory {
        path: directory.to_path_buf(),
        source: Arc::new(source),
    };

    if !directory.exists() {
        fs::create_dir_all(directory).map_err(directory_error)?;
        debug!(
            target: CATALOG_TARGET,
            directory = %directory.display(),
            "created formatters directory"
        );
    }

    let listed = fs::read_dir(directory).map_err(directory_error)?;
    Ok(keep_directories(
        directory,
        listed.map(|entry| entry.map(|found| found.path())),
        errors,
    ))
}

/// Keeps the listed paths that are directories. An entry that cannot be read
/// is reported and skipped without affecting its siblings.
fn keep_directories<I>(directory: &Path, listed: I, errors: &dyn ErrorChannel) -> Vec<PathBuf>
where
    I: IntoIterator<Item = std::io::Result<PathBuf>>,
{
    let mut candidates = Vec::new();
    for entry in listed {
        match entry {
            // Follows symlinks so linked formatter checkouts are picked up.
            Ok(path) if path.is_dir() => candidates.push(path),
            Ok(_) => {}
            Err(source) => report(
                errors,
                &FormatterError::Directory {
                    path: directory.to_path_buf(),
                    source: Arc::new(source),
                },
            ),
        }
    }
    candidates.sort();
    candidates
}

/// Reads the manifest in `candidate` and asks the formatter for its info.
fn probe<E>(
    candidate: &Path,
    executor: &E,
    errors: &dyn ErrorChannel,
) -> Result<Option<PluginMetadata>, FormatterError>
where
    E: CommandExecutor + ?Sized,
{
    let Some(manifest) = PluginManifest::read(candidate)? else {
        return Ok(None);
    };
    let Some(name) = candidate.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Ok(None);
    };

    let info = invoke::<InfoResponse, E>(executor, &manifest, &[], errors).map_err(|reason| {
        FormatterError::PluginInfoEmpty {
            path: candidate.to_path_buf(),
            reason: Box::new(reason),
        }
    })?;

    Ok(Some(PluginMetadata::new(
        name,
        info.version,
        info.description,
        &manifest,
    )))
}

fn report(errors: &dyn ErrorChannel, err: &FormatterError) {
    warn!(target: CATALOG_TARGET, error = %err, "formatter catalog error");
    errors.error(&err.to_string());
}

#[cfg(test)]
mod tests;

//! Read-only row view of the catalog for list-style presentation.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::{Catalog, PluginMetadata};

/// Column identifiers used to bind catalog rows to a list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogRole {
    /// Formatter name.
    Name,
    /// Formatter version.
    Version,
    /// Formatter description.
    Description,
    /// Space-joined command prefix.
    Cmd,
}

impl CatalogRole {
    /// All roles in presentation order.
    pub const ALL: [Self; 4] = [Self::Name, Self::Version, Self::Description, Self::Cmd];

    /// Returns the stable binding key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Version => "version",
            Self::Description => "description",
            Self::Cmd => "cmd",
        }
    }
}

impl fmt::Display for CatalogRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CatalogRole {
    type Err = String;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.key() == key)
            .ok_or_else(|| format!("unknown catalog role: {key}"))
    }
}

/// One catalog entry flattened for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogRow {
    /// Formatter name.
    pub name: String,
    /// Formatter version.
    pub version: String,
    /// Formatter description.
    pub description: String,
    /// Space-joined command prefix.
    pub cmd: String,
}

impl CatalogRow {
    /// Returns the value bound to `role`.
    #[must_use]
    pub fn field(&self, role: CatalogRole) -> &str {
        match role {
            CatalogRole::Name => &self.name,
            CatalogRole::Version => &self.version,
            CatalogRole::Description => &self.description,
            CatalogRole::Cmd => &self.cmd,
        }
    }
}

impl From<&PluginMetadata> for CatalogRow {
    fn from(meta: &PluginMetadata) -> Self {
        Self {
            name: meta.name().to_owned(),
            version: meta.version().to_owned(),
            description: meta.description().to_owned(),
            cmd: meta.command_line(),
        }
    }
}

impl Catalog {
    /// Returns every entry as a display row, in catalog order.
    #[must_use]
    pub fn rows(&self) -> Vec<CatalogRow> {
        self.entries().iter().map(CatalogRow::from).collect()
    }

    /// Returns the value of `role` for the row at `position`, or `None` when
    /// the position is out of range.
    #[must_use]
    pub fn field(&self, position: usize, role: CatalogRole) -> Option<String> {
        self.entries()
            .get(position)
            .map(|meta| CatalogRow::from(meta).field(role).to_owned())
    }
}

//! Access modes, store metadata and display-mode selection.

use serde::Serialize;

use super::{EntityDescriptor, Table};

/// How the current connection was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    /// Normal read-write open succeeded.
    ReadWrite,
    /// Read-write open failed; the file is open through an immutable
    /// read-only handle instead. Mutations will fail.
    ReadOnlyFallback,
    /// The caller explicitly requested a read-only open.
    ReadOnlyRequested,
}

impl AccessMode {
    /// Whether mutations can be expected to succeed on this handle.
    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

/// Persistence-framework metadata read from an object-graph store.
///
/// Present only for `.store` files with a readable `Z_METADATA` table. Used
/// to pick a display convention; the raw dictionary is passed through for
/// display layers that want more.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseMetadata {
    /// `NSPersistenceFrameworkVersion`, when present.
    pub persistence_version: Option<i64>,
    /// The full metadata property list.
    pub raw: plist::Dictionary,
}

/// Persistence version above which a store is treated as `SwiftData` rather
/// than `CoreData`.
const SWIFTDATA_VERSION_THRESHOLD: i64 = 800;

/// Which convention the connected file should be presented under.
///
/// Selected once per connection from the detected persistence version, or
/// forced to `Sqlite` by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Plain SQLite tables.
    #[default]
    Sqlite,
    /// `CoreData` store (persistence version at or below the threshold).
    CoreData,
    /// `SwiftData` store (persistence version above the threshold).
    SwiftData,
}

impl DisplayMode {
    /// Selects a display mode from the connection's metadata.
    ///
    /// `force_sqlite` wins over everything; otherwise a file without
    /// metadata is plain SQLite, and the persistence version splits
    /// `CoreData` from `SwiftData`.
    #[must_use]
    pub fn select(force_sqlite: bool, metadata: Option<&DatabaseMetadata>) -> Self {
        if force_sqlite {
            return Self::Sqlite;
        }
        match metadata.and_then(|m| m.persistence_version) {
            Some(version) if version > SWIFTDATA_VERSION_THRESHOLD => Self::SwiftData,
            Some(_) => Self::CoreData,
            None => Self::Sqlite,
        }
    }
}

/// A table as presented to the display layer, tagged with the convention it
/// was resolved under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DisplayedObject {
    /// A plain SQLite table.
    Table(Table),
    /// A `CoreData` entity.
    Entity(EntityDescriptor),
    /// A `SwiftData` model.
    Model(EntityDescriptor),
}

impl DisplayedObject {
    /// The underlying physical table regardless of convention.
    #[must_use]
    pub fn table(&self) -> &Table {
        match self {
            Self::Table(table) => table,
            Self::Entity(entity) | Self::Model(entity) => &entity.table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(version: Option<i64>) -> DatabaseMetadata {
        DatabaseMetadata {
            persistence_version: version,
            raw: plist::Dictionary::new(),
        }
    }

    #[test]
    fn test_display_mode_forced_sqlite() {
        let meta = metadata(Some(1000));
        assert_eq!(DisplayMode::select(true, Some(&meta)), DisplayMode::Sqlite);
    }

    #[test]
    fn test_display_mode_from_version() {
        assert_eq!(
            DisplayMode::select(false, Some(&metadata(Some(1000)))),
            DisplayMode::SwiftData
        );
        assert_eq!(
            DisplayMode::select(false, Some(&metadata(Some(620)))),
            DisplayMode::CoreData
        );
        assert_eq!(
            DisplayMode::select(false, Some(&metadata(None))),
            DisplayMode::Sqlite
        );
        assert_eq!(DisplayMode::select(false, None), DisplayMode::Sqlite);
    }

    #[test]
    fn test_access_mode_writability() {
        assert!(AccessMode::ReadWrite.is_writable());
        assert!(!AccessMode::ReadOnlyFallback.is_writable());
        assert!(!AccessMode::ReadOnlyRequested.is_writable());
    }
}

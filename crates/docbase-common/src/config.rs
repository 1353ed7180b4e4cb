//! Configuration types for docbase
//!
//! This module defines the options surface passed to `Database::create` and
//! `Database::open`, and the persisted properties file those options seed.

use serde::{Deserialize, Serialize};

/// Options governing `Database::create`/`Database::open` (§6).
#[derive(Clone, Debug)]
pub struct DatabaseOptions {
    /// Initial chunk capacity for new tables.
    pub chunk_size: usize,
    /// Table registry filename.
    pub table_index: String,
    /// Commit on every write.
    pub auto_commit: bool,
    /// Make `create` idempotent against an existing directory.
    pub open_if_exists: bool,
    /// Make `open` materialize a missing directory.
    pub create_if_missing: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            table_index: "tables".to_string(),
            auto_commit: false,
            open_if_exists: false,
            create_if_missing: true,
        }
    }
}

impl DatabaseOptions {
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn with_table_index(mut self, name: impl Into<String>) -> Self {
        self.table_index = name.into();
        self
    }

    #[must_use]
    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    #[must_use]
    pub fn with_open_if_exists(mut self, open_if_exists: bool) -> Self {
        self.open_if_exists = open_if_exists;
        self
    }

    #[must_use]
    pub fn with_create_if_missing(mut self, create_if_missing: bool) -> Self {
        self.create_if_missing = create_if_missing;
        self
    }
}

/// The persisted form of the properties file at `<directory>/properties`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Properties {
    pub chunk_size: usize,
    pub table_index: String,
    pub auto_commit: bool,
}

impl From<&DatabaseOptions> for Properties {
    fn from(opts: &DatabaseOptions) -> Self {
        Self {
            chunk_size: opts.chunk_size,
            table_index: opts.table_index.clone(),
            auto_commit: opts.auto_commit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = DatabaseOptions::default();
        assert_eq!(opts.chunk_size, 8192);
        assert_eq!(opts.table_index, "tables");
        assert!(!opts.auto_commit);
        assert!(!opts.open_if_exists);
        assert!(opts.create_if_missing);
    }

    #[test]
    fn test_builder_overrides() {
        let opts = DatabaseOptions::default()
            .with_chunk_size(16)
            .with_auto_commit(true);
        assert_eq!(opts.chunk_size, 16);
        assert!(opts.auto_commit);
    }

    #[test]
    fn test_properties_from_options() {
        let opts = DatabaseOptions::default().with_chunk_size(4);
        let props = Properties::from(&opts);
        assert_eq!(props.chunk_size, 4);
        assert_eq!(props.table_index, "tables");
    }
}

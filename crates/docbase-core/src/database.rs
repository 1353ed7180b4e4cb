//! Database (§4.3): directory layout, properties, table registry, and
//! exit-time durability.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use docbase_common::{DatabaseOptions, Error, Properties, Result, codec};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::table::{Table, TableIndexCommitter};

/// Shared state behind every `Database` handle, held by an `Arc` so that
/// `Table` can hold a `Weak` back-reference without forming a cycle.
pub struct DatabaseInner {
    directory: PathBuf,
    table_index_name: String,
    chunk_size: usize,
    auto_commit: bool,
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl TableIndexCommitter for DatabaseInner {
    fn commit_table_index(&self) {
        if let Err(e) = self.write_table_index() {
            warn!(error = %e, "failed to persist table index");
        }
    }
}

impl DatabaseInner {
    fn table_index_path(&self) -> PathBuf {
        self.directory.join(&self.table_index_name)
    }

    fn write_table_index(&self) -> Result<()> {
        let index: HashMap<String, Vec<String>> = self
            .tables
            .read()
            .iter()
            .map(|(name, table)| (name.clone(), table.chunk_names()))
            .collect();
        let bytes = codec::encode(&index)?;
        let path = self.table_index_path();
        fs::write(&path, bytes).map_err(|e| Error::io(path, e))
    }
}

/// An open handle to a chunked document database directory.
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Fails with `AlreadyExistsError` if the directory exists and
    /// `open_if_exists` is false; otherwise creates the directory, writes
    /// the properties file and an empty table index, and opens it.
    pub fn create(directory: impl Into<PathBuf>, options: &DatabaseOptions) -> Result<Self> {
        let directory = directory.into();
        if directory.exists() && !options.open_if_exists {
            return Err(Error::already_exists(directory.display().to_string()));
        }
        if !directory.exists() {
            fs::create_dir_all(&directory).map_err(|e| Error::io(directory.clone(), e))?;

            let properties = Properties::from(options);
            let properties_bytes = codec::encode(&properties)?;
            let properties_path = directory.join("properties");
            fs::write(&properties_path, properties_bytes)
                .map_err(|e| Error::io(properties_path, e))?;

            let empty_index: HashMap<String, Vec<String>> = HashMap::new();
            let index_bytes = codec::encode(&empty_index)?;
            let index_path = directory.join(&options.table_index);
            fs::write(&index_path, index_bytes).map_err(|e| Error::io(index_path, e))?;

            info!(dir = %directory.display(), "created new database directory");
        }
        Self::open(directory, options)
    }

    /// Fails with `NotFoundError` if the directory does not exist and
    /// `create_if_missing` is false; otherwise delegates to `create`, or
    /// (if the directory exists) reads properties and the table index and
    /// materializes every recorded table.
    pub fn open(directory: impl Into<PathBuf>, options: &DatabaseOptions) -> Result<Self> {
        let directory = directory.into();
        if !directory.exists() {
            if !options.create_if_missing {
                return Err(Error::not_found(directory.display().to_string()));
            }
            return Self::create(directory, options);
        }

        let properties_path = directory.join("properties");
        let properties: Properties = {
            let bytes = fs::read(&properties_path).map_err(|e| Error::io(properties_path.clone(), e))?;
            codec::decode(&bytes).map_err(|_| Error::corrupt_chunk(properties_path))?
        };

        let inner = Arc::new(DatabaseInner {
            directory: directory.clone(),
            table_index_name: properties.table_index.clone(),
            chunk_size: properties.chunk_size,
            auto_commit: properties.auto_commit,
            tables: RwLock::new(HashMap::new()),
        });

        let index_path = directory.join(&properties.table_index);
        let table_index: HashMap<String, Vec<String>> = if index_path.exists() {
            let bytes = fs::read(&index_path).map_err(|e| Error::io(index_path.clone(), e))?;
            codec::decode(&bytes).map_err(|_| Error::corrupt_chunk(index_path))?
        } else {
            HashMap::new()
        };

        {
            let mut tables = inner.tables.write();
            for (name, chunk_names) in table_index {
                let table = Table::open(
                    name.clone(),
                    directory.clone(),
                    &chunk_names,
                    inner.chunk_size,
                    inner.auto_commit,
                    Arc::downgrade(&inner),
                )?;
                table.load_indexes()?;
                tables.insert(name, table);
            }
        }

        info!(dir = %directory.display(), tables = inner.tables.read().len(), "opened database");
        Ok(Self { inner })
    }

    /// Returns the existing table or creates a new one, as a deliberate
    /// convenience over the stricter `new_table`.
    pub fn table(&self, name: &str) -> Result<Arc<Table>> {
        if let Some(table) = self.inner.tables.read().get(name) {
            return Ok(Arc::clone(table));
        }
        self.new_table(name)
    }

    /// Fails with `AlreadyExistsError` if the name is already registered.
    pub fn new_table(&self, name: &str) -> Result<Arc<Table>> {
        let mut tables = self.inner.tables.write();
        if tables.contains_key(name) {
            return Err(Error::already_exists(format!("table '{name}'")));
        }
        let table = Table::create(
            name,
            self.inner.directory.clone(),
            self.inner.chunk_size,
            self.inner.auto_commit,
            Arc::downgrade(&self.inner),
        )?;
        tables.insert(name.to_string(), Arc::clone(&table));
        drop(tables);
        self.inner.commit_table_index();
        Ok(table)
    }

    /// Validates the drop key, removes every chunk file for the table,
    /// removes it from the registry, and marks the handle dropped.
    pub fn drop_table(&self, name: &str, drop_key: &str) -> Result<()> {
        let table = self
            .inner
            .tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("table '{name}'")))?;

        if table.drop_key() != drop_key {
            return Err(Error::AuthorizationError {
                table: name.to_string(),
            });
        }

        table.destroy()?;
        self.inner.tables.write().remove(name);
        self.inner.commit_table_index();
        info!(table = name, "dropped table");
        Ok(())
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.inner.directory
    }

    /// Collects every dirty chunk across all tables, enqueues a commit on
    /// each, and waits for every chunk's commit pipeline to drain before
    /// returning. Surfaces the last commit error observed by any chunk, if
    /// any.
    pub fn close(&self) -> Result<()> {
        let tables: Vec<Arc<Table>> = self.inner.tables.read().values().cloned().collect();
        for table in &tables {
            table.commit()?;
        }
        for table in &tables {
            table.wait_drained();
        }
        for table in &tables {
            if let Some(err) = table.last_error() {
                return Err(Error::io(
                    self.inner.directory.clone(),
                    std::io::Error::other(err),
                ));
            }
        }
        info!(dir = %self.inner.directory.display(), "database closed");
        Ok(())
    }
}

//! Table (§4.2): an ordered sequence of chunks, routing, scanning, and
//! field indexing.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use docbase_common::{Error, Key, RecordId, Result, Value, codec, id};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::chunk::Chunk;
use crate::document::Document;

/// A non-owning callback the table's parent database implements, used only
/// to ask the database to persist its table index after a rollover or a
/// commit. Kept as a trait so `Table` never holds a strong or concrete
/// reference back to its parent (would form an ownership cycle).
pub trait TableIndexCommitter: Send + Sync {
    fn commit_table_index(&self);
}

type FieldIndex = HashMap<Value, Vec<(String, RecordId)>>;

/// Collection of ordered chunks for one named table.
pub struct Table {
    pub name: String,
    path: PathBuf,
    chunk_size: usize,
    auto_commit: AtomicBool,
    chunks: RwLock<Vec<Arc<Chunk>>>,
    indexes: Mutex<HashMap<String, FieldIndex>>,
    dropped: AtomicBool,
    db: Weak<dyn TableIndexCommitter>,
}

impl Table {
    /// Constructs a table with one freshly created, empty active chunk
    /// (used by `Database::new_table` and `Database::create`'s default
    /// table registry).
    pub fn create(
        name: impl Into<String>,
        path: PathBuf,
        chunk_size: usize,
        auto_commit: bool,
        db: Weak<dyn TableIndexCommitter>,
    ) -> Result<Arc<Self>> {
        let name = name.into();
        let table = Arc::new(Self {
            chunks: RwLock::new(Vec::new()),
            chunk_size,
            auto_commit: AtomicBool::new(auto_commit),
            indexes: Mutex::new(HashMap::new()),
            dropped: AtomicBool::new(false),
            db,
            path,
            name,
        });
        table.new_chunk()?;
        Ok(table)
    }

    /// Constructs handles for each recorded chunk name without loading
    /// their contents (used by `Database::open`).
    pub fn open(
        name: impl Into<String>,
        path: PathBuf,
        chunk_names: &[String],
        chunk_size: usize,
        auto_commit: bool,
        db: Weak<dyn TableIndexCommitter>,
    ) -> Result<Arc<Self>> {
        let name = name.into();
        let mut chunks = Vec::with_capacity(chunk_names.len());
        for chunk_name in chunk_names {
            let chunk_path = path.join(chunk_name);
            chunks.push(Arc::new(Chunk::open(chunk_name.clone(), chunk_path, chunk_size)?));
        }
        let table = Arc::new(Self {
            chunks: RwLock::new(chunks),
            chunk_size,
            auto_commit: AtomicBool::new(auto_commit),
            indexes: Mutex::new(HashMap::new()),
            dropped: AtomicBool::new(false),
            db,
            path,
            name,
        });
        if table.chunks.read().is_empty() {
            table.new_chunk()?;
        }
        Ok(table)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.dropped.load(Ordering::SeqCst) {
            return Err(Error::TableDroppedError(self.name.clone()));
        }
        Ok(())
    }

    /// Last element of `chunks`; the only target of new-key inserts.
    fn active_chunk(&self) -> Result<Arc<Chunk>> {
        self.chunks
            .read()
            .last()
            .cloned()
            .ok_or_else(|| Error::EmptyTableError(self.name.clone()))
    }

    fn new_chunk(&self) -> Result<Arc<Chunk>> {
        let chunk_name = format!("{}-{}", self.name, id::generate_chunk_suffix());
        let chunk_path = self.path.join(&chunk_name);
        let chunk = Arc::new(Chunk::open(chunk_name, chunk_path, self.chunk_size)?);
        self.chunks.write().push(Arc::clone(&chunk));
        Ok(chunk)
    }

    fn find_chunk(&self, key: &RecordId) -> Result<Option<Arc<Chunk>>> {
        for chunk in self.chunks.read().iter() {
            if chunk.contains(key)? {
                return Ok(Some(Arc::clone(chunk)));
            }
        }
        Ok(None)
    }

    #[must_use]
    pub fn chunk_names(&self) -> Vec<String> {
        self.chunks.read().iter().map(|c| c.name.clone()).collect()
    }

    #[must_use]
    pub fn auto_commit(&self) -> bool {
        self.auto_commit.load(Ordering::SeqCst)
    }

    pub fn set_auto_commit(&self, value: bool) {
        self.auto_commit.store(value, Ordering::SeqCst);
    }

    /// Deterministic confirmation token for `Database::drop_table`; not a
    /// security boundary.
    #[must_use]
    pub fn drop_key(&self) -> String {
        format!("DROP{}{}{}", self.name, self.chunk_size, self.path.display())
    }

    /// Inserts a record, replacing the auto-generate sentinel with a fresh
    /// 16-hex-char token if needed, and routing to an existing chunk or
    /// rolling over to a new active chunk.
    pub fn insert(self: &Arc<Self>, key: Key, value: Value) -> Result<Document> {
        self.ensure_alive()?;
        let record_id = match key {
            Key::Auto => RecordId::Str(id::generate_record_id()),
            Key::Given(id) => id,
        };

        let auto_commit = self.auto_commit();
        let chunk = match self.find_chunk(&record_id)? {
            Some(chunk) => chunk,
            None => {
                if self.active_chunk()?.is_full()? {
                    self.new_chunk()?;
                    self.commit()?;
                    info!(table = %self.name, "rolled over to a new active chunk");
                }
                self.active_chunk()?
            }
        };

        chunk.write(record_id.clone(), value.clone(), auto_commit)?;
        Ok(Document::new(record_id, value, Arc::downgrade(self)))
    }

    pub fn delete(&self, key: &RecordId) -> Result<bool> {
        self.ensure_alive()?;
        match self.find_chunk(key)? {
            Some(chunk) => chunk.delete(key),
            None => Ok(false),
        }
    }

    /// First-hit across chunks in creation order, wrapped as a `Document`.
    pub fn get(self: &Arc<Self>, key: &RecordId) -> Result<Option<Document>> {
        Ok(self
            .raw_get(key)?
            .map(|value| Document::new(key.clone(), value, Arc::downgrade(self))))
    }

    /// First-hit across chunks in creation order, returned directly.
    pub fn raw_get(&self, key: &RecordId) -> Result<Option<Value>> {
        self.ensure_alive()?;
        for chunk in self.chunks.read().iter() {
            if let Some(value) = chunk.get(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// All (id, value) pairs, iterating chunks in reverse creation order.
    pub fn items(&self) -> Result<Vec<(RecordId, Value)>> {
        self.ensure_alive()?;
        let mut out = Vec::new();
        for chunk in self.chunks.read().iter().rev() {
            out.extend(chunk.items()?);
        }
        Ok(out)
    }

    /// Forces `auto_commit=false`, inserts every pair, issues one commit,
    /// then restores the previous flag.
    pub fn bulk_insert(self: &Arc<Self>, data: Vec<(Key, Value)>) -> Result<()> {
        let previous = self.auto_commit();
        self.set_auto_commit(false);
        let result = (|| {
            for (key, value) in data {
                self.insert(key, value)?;
            }
            self.commit()
        })();
        self.set_auto_commit(previous);
        result
    }

    pub fn query(
        &self,
        predicate: impl Fn(&RecordId, &Value) -> bool,
    ) -> Result<Vec<(RecordId, Value)>> {
        Ok(self
            .items()?
            .into_iter()
            .filter(|(id, value)| predicate(id, value))
            .collect())
    }

    pub fn query_one(
        &self,
        predicate: impl Fn(&RecordId, &Value) -> bool,
    ) -> Result<Option<(RecordId, Value)>> {
        Ok(self
            .items()?
            .into_iter()
            .find(|(id, value)| predicate(id, value)))
    }

    /// Scans every chunk and builds a field-value → [(chunk_name, id)]
    /// index, skipping records whose field value is falsy. Persists to
    /// `<name>-<field>.index` and updates the in-memory index.
    pub fn create_index(&self, field: &str) -> Result<()> {
        self.ensure_alive()?;
        let mut index: FieldIndex = HashMap::new();
        for chunk in self.chunks.read().iter() {
            for (id, value) in chunk.items()? {
                if let Some(field_value) = value.get(field) {
                    if field_value.is_truthy() {
                        index
                            .entry(field_value.clone())
                            .or_default()
                            .push((chunk.name.clone(), id));
                    }
                }
            }
        }

        let index_path = self.path.join(format!("{}-{}.index", self.name, field));
        let wrapped: HashMap<String, FieldIndex> =
            HashMap::from([(field.to_string(), index.clone())]);
        let bytes = codec::encode(&wrapped)?;
        let tmp_path = index_path.with_extension("index.tmp");
        fs::write(&tmp_path, &bytes).map_err(|e| Error::io(tmp_path.clone(), e))?;
        fs::rename(&tmp_path, &index_path).map_err(|e| Error::io(index_path.clone(), e))?;

        self.indexes.lock().insert(field.to_string(), index);
        debug!(table = %self.name, field, "built field index");
        Ok(())
    }

    /// At startup, reads every `<name>-*.index` file into `indexes`.
    /// A decode failure on one field is logged as a warning and does not
    /// prevent the others from loading.
    pub fn load_indexes(&self) -> Result<()> {
        let prefix = format!("{}-", self.name);
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io(self.path.clone(), e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| Error::io(self.path.clone(), e))?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let Some(field) = file_name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".index"))
            else {
                continue;
            };

            match fs::read(entry.path()) {
                Ok(bytes) => match codec::decode::<HashMap<String, FieldIndex>>(&bytes) {
                    Ok(mut wrapped) => match wrapped.remove(field) {
                        Some(index) => {
                            self.indexes.lock().insert(field.to_string(), index);
                        }
                        None => {
                            warn!(table = %self.name, field, "field index file missing its wrapper key, skipping");
                        }
                    },
                    Err(_) => {
                        warn!(table = %self.name, field, "failed to decode field index, skipping");
                    }
                },
                Err(e) => {
                    warn!(table = %self.name, field, error = %e, "failed to read field index, skipping");
                }
            }
        }
        Ok(())
    }

    /// Looks up `indexes[field][match_value]` and resolves each recorded
    /// id via `get`. Fails with `NoSuchIndexError` if the field has no
    /// loaded index.
    pub fn get_indexed(self: &Arc<Self>, field: &str, match_value: &Value) -> Result<Vec<Document>> {
        self.ensure_alive()?;
        let entries = {
            let indexes = self.indexes.lock();
            let field_index = indexes
                .get(field)
                .ok_or_else(|| Error::NoSuchIndexError(field.to_string()))?;
            field_index.get(match_value).cloned().unwrap_or_default()
        };

        let mut docs = Vec::with_capacity(entries.len());
        for (_chunk_name, id) in entries {
            if let Some(doc) = self.get(&id)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    /// Currently-dirty chunks, in creation order.
    fn dirty_chunks(&self) -> Vec<Arc<Chunk>> {
        self.chunks
            .read()
            .iter()
            .filter(|c| c.dirty())
            .cloned()
            .collect()
    }

    /// Enqueues a commit on every dirty chunk, then asks the parent
    /// database to persist the table index.
    pub fn commit(&self) -> Result<()> {
        for chunk in self.dirty_chunks() {
            chunk.commit()?;
        }
        if let Some(db) = self.db.upgrade() {
            db.commit_table_index();
        }
        Ok(())
    }

    /// Blocks until every chunk's commit pipeline has drained.
    pub fn wait_drained(&self) {
        for chunk in self.chunks.read().iter() {
            chunk.wait_drained();
        }
    }

    /// The most recent background commit error across this table's
    /// chunks, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.chunks.read().iter().find_map(|c| c.last_error())
    }

    /// Removes every chunk file and marks this handle dropped. Further
    /// operations on it fail with `TableDroppedError`.
    pub(crate) fn destroy(&self) -> Result<()> {
        for chunk in self.chunks.read().iter() {
            chunk.remove_file()?;
        }
        for field in self.indexes.lock().keys() {
            let index_path = self.path.join(format!("{}-{}.index", self.name, field));
            let _ = fs::remove_file(index_path);
        }
        self.dropped.store(true, Ordering::SeqCst);
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

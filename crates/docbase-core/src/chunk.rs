//! One shard of a table: lazy-loaded in-memory mapping plus its durable
//! commit pipeline (§4.1).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use docbase_common::{Error, RecordId, Result, Value, codec};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

#[cfg(not(test))]
const IDLE_TIMEOUT: Duration = Duration::from_secs(15);
// Shortened so tests can observe the idle-exit/respawn cycle without a
// 15-second sleep; the constant itself is what changes, not the logic.
#[cfg(test)]
const IDLE_TIMEOUT: Duration = Duration::from_millis(150);

/// A snapshot of a chunk's items handed off to the commit worker. Later
/// snapshots in the queue override earlier ones for the same key.
type Snapshot = HashMap<RecordId, Value>;

/// One shard file of a table.
///
/// `items` is mutated only by the foreground; the background worker only
/// ever sees deep copies handed to it through `tx`.
pub struct Chunk {
    pub name: String,
    path: PathBuf,
    max_size: usize,
    items: Mutex<Option<HashMap<RecordId, Value>>>,
    dirty: AtomicBool,
    pipeline: Mutex<Option<Pipeline>>,
    last_error: Arc<Mutex<Option<String>>>,
    pending: Arc<(Mutex<u64>, Condvar)>,
}

struct Pipeline {
    tx: crossbeam_channel::Sender<Snapshot>,
    worker: Option<JoinHandle<()>>,
}

impl Chunk {
    /// Constructs a handle without touching the filesystem. Fails with
    /// `ConfigError` if `max_size == 0`.
    pub fn open(name: impl Into<String>, path: impl Into<PathBuf>, max_size: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(Error::config("chunk max_size must be positive"));
        }
        Ok(Self {
            name: name.into(),
            path: path.into(),
            max_size,
            items: Mutex::new(None),
            dirty: AtomicBool::new(false),
            pipeline: Mutex::new(None),
            last_error: Arc::new(Mutex::new(None)),
            pending: Arc::new((Mutex::new(0), Condvar::new())),
        })
    }

    /// If not yet loaded and the file exists, reads and decodes the full
    /// mapping. If the file does not exist, the chunk is "loaded-empty".
    fn ensure_loaded(&self) -> Result<()> {
        let mut guard = self.items.lock();
        if guard.is_some() {
            return Ok(());
        }
        if !self.path.exists() {
            debug!(chunk = %self.name, "chunk file absent, loading empty");
            *guard = Some(HashMap::new());
            return Ok(());
        }
        let bytes = fs::read(&self.path).map_err(|e| Error::io(self.path.clone(), e))?;
        let items: HashMap<RecordId, Value> =
            codec::decode(&bytes).map_err(|_| Error::corrupt_chunk(self.path.clone()))?;
        debug!(chunk = %self.name, count = items.len(), "loaded chunk from disk");
        *guard = Some(items);
        Ok(())
    }

    /// Runs `f` against the loaded item map, triggering a lazy load first.
    fn with_items<T>(&self, f: impl FnOnce(&HashMap<RecordId, Value>) -> T) -> Result<T> {
        self.ensure_loaded()?;
        let guard = self.items.lock();
        Ok(f(guard.as_ref().expect("just loaded")))
    }

    /// Number of items currently in memory (triggers lazy load).
    pub fn len(&self) -> Result<usize> {
        self.with_items(HashMap::len)
    }

    #[must_use]
    pub fn is_empty_unloaded(&self) -> bool {
        self.items.lock().is_none()
    }

    /// `|items| ≥ max_size`.
    pub fn is_full(&self) -> Result<bool> {
        self.with_items(|items| items.len() >= self.max_size)
    }

    pub fn contains(&self, key: &RecordId) -> Result<bool> {
        self.with_items(|items| items.contains_key(key))
    }

    pub fn get(&self, key: &RecordId) -> Result<Option<Value>> {
        self.with_items(|items| items.get(key).cloned())
    }

    /// All items, as an owned snapshot (for scans).
    pub fn items(&self) -> Result<Vec<(RecordId, Value)>> {
        self.with_items(|items| items.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Sets `items[key] = value`, marks dirty, and optionally commits.
    pub fn write(&self, key: RecordId, value: Value, commit_now: bool) -> Result<()> {
        self.ensure_loaded()?;
        {
            let mut guard = self.items.lock();
            guard.as_mut().expect("just loaded").insert(key, value);
        }
        self.dirty.store(true, Ordering::SeqCst);
        if commit_now {
            self.commit()?;
        }
        Ok(())
    }

    /// Removes the entry if present; marks dirty on success.
    pub fn delete(&self, key: &RecordId) -> Result<bool> {
        self.ensure_loaded()?;
        let removed = {
            let mut guard = self.items.lock();
            guard.as_mut().expect("just loaded").remove(key).is_some()
        };
        if removed {
            self.dirty.store(true, Ordering::SeqCst);
        }
        Ok(removed)
    }

    #[must_use]
    pub fn dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Enqueues a snapshot of current items to the commit pipeline; clears
    /// `dirty` synchronously. The worker is lazily spawned on first commit,
    /// and respawned if the previous one exited on its idle timeout.
    pub fn commit(&self) -> Result<()> {
        self.ensure_loaded()?;
        let snapshot = {
            let guard = self.items.lock();
            guard.as_ref().expect("just loaded").clone()
        };

        let mut pipeline_guard = self.pipeline.lock();
        let stale = matches!(
            pipeline_guard.as_ref(),
            Some(pipeline) if pipeline.worker.as_ref().is_some_and(JoinHandle::is_finished)
        );
        if pipeline_guard.is_none() || stale {
            if let Some(old) = pipeline_guard.take() {
                drop(old.tx);
                if let Some(handle) = old.worker {
                    let _ = handle.join();
                }
            }
            *pipeline_guard = Some(self.spawn_worker());
        }
        let pipeline = pipeline_guard.as_ref().expect("just spawned");

        pipeline
            .tx
            .send(snapshot)
            .map_err(|_| Error::io(self.path.clone(), std::io::Error::other("commit worker gone")))?;

        // Only counted once the worker is guaranteed to see it, so
        // `wait_drained` can't block on a send that never happened.
        let (lock, _) = &*self.pending;
        *lock.lock() += 1;

        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn spawn_worker(&self) -> Pipeline {
        let (tx, rx) = crossbeam_channel::unbounded::<Snapshot>();
        let path = self.path.clone();
        let name = self.name.clone();
        let last_error = Arc::clone(&self.last_error);
        let pending = Arc::clone(&self.pending);

        let worker = thread::spawn(move || commit_worker(&name, &path, &rx, &last_error, &pending));

        Pipeline {
            tx,
            worker: Some(worker),
        }
    }

    /// The most recent error observed by the background worker, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Blocks until this chunk's commit queue is fully drained and the
    /// worker has nothing left to write.
    pub fn wait_drained(&self) {
        let (lock, cvar) = &*self.pending;
        let mut pending = lock.lock();
        while *pending > 0 {
            cvar.wait(&mut pending);
        }
    }

    /// Removes this chunk's backing file. Used when the owning table is
    /// dropped.
    pub fn remove_file(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| Error::io(self.path.clone(), e))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn commit_worker(
    name: &str,
    path: &Path,
    rx: &crossbeam_channel::Receiver<Snapshot>,
    last_error: &Arc<Mutex<Option<String>>>,
    pending: &Arc<(Mutex<u64>, Condvar)>,
) {
    info!(chunk = %name, "commit worker starting");
    loop {
        let first = match rx.recv_timeout(IDLE_TIMEOUT) {
            Ok(snapshot) => snapshot,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                info!(chunk = %name, "commit worker idle, exiting");
                return;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!(chunk = %name, "commit worker channel closed, exiting");
                return;
            }
        };

        let mut merged = first;
        let mut coalesced = 0usize;
        while let Ok(next) = rx.try_recv() {
            merged.extend(next);
            coalesced += 1;
        }
        if coalesced > 0 {
            debug!(chunk = %name, coalesced, "coalesced queued snapshots before write");
        }

        if let Err(e) = write_then_rename(path, &merged) {
            error!(chunk = %name, error = %e, "commit worker write failed");
            *last_error.lock() = Some(e.to_string());
        }

        let drained = 1 + coalesced;
        let (lock, cvar) = &**pending;
        let mut guard = lock.lock();
        *guard = guard.saturating_sub(drained as u64);
        if *guard == 0 {
            cvar.notify_all();
        }
    }
}

/// Stages the encoded snapshot to a sibling temp file and renames it over
/// the target, so a reader never observes a half-written chunk file.
fn write_then_rename(path: &Path, items: &HashMap<RecordId, Value>) -> Result<()> {
    let bytes = codec::encode(items)?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &bytes).map_err(|e| Error::io(tmp_path.clone(), e))?;
    fs::rename(&tmp_path, path).map_err(|e| Error::io(path.to_path_buf(), e))?;
    Ok(())
}

impl Drop for Chunk {
    fn drop(&mut self) {
        if let Some(pipeline) = self.pipeline.get_mut().take() {
            drop(pipeline.tx);
            if let Some(handle) = pipeline.worker {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_rejects_zero_max_size() {
        let dir = tempdir().unwrap();
        let err = Chunk::open("t-0001", dir.path().join("t-0001"), 0).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_write_then_get_before_commit() {
        let dir = tempdir().unwrap();
        let chunk = Chunk::open("t-0001", dir.path().join("t-0001"), 8).unwrap();
        chunk
            .write(RecordId::from("a"), Value::Int(1), false)
            .unwrap();
        assert_eq!(chunk.get(&RecordId::from("a")).unwrap(), Some(Value::Int(1)));
        assert!(chunk.dirty());
    }

    #[test]
    fn test_commit_clears_dirty_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t-0001");
        let chunk = Chunk::open("t-0001", path.clone(), 8).unwrap();
        chunk
            .write(RecordId::from("a"), Value::Int(1), false)
            .unwrap();
        chunk.commit().unwrap();
        assert!(!chunk.dirty());
        chunk.wait_drained();
        assert!(path.exists());
    }

    #[test]
    fn test_reload_after_commit_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t-0001");
        let chunk = Chunk::open("t-0001", path.clone(), 8).unwrap();
        chunk
            .write(RecordId::from("a"), Value::Int(7), true)
            .unwrap();
        chunk.wait_drained();

        let reopened = Chunk::open("t-0001", path, 8).unwrap();
        assert_eq!(
            reopened.get(&RecordId::from("a")).unwrap(),
            Some(Value::Int(7))
        );
    }

    #[test]
    fn test_is_full_semantics() {
        let dir = tempdir().unwrap();
        let chunk = Chunk::open("t-0001", dir.path().join("t-0001"), 2).unwrap();
        chunk.write(RecordId::from("a"), Value::Int(1), false).unwrap();
        assert!(!chunk.is_full().unwrap());
        chunk.write(RecordId::from("b"), Value::Int(2), false).unwrap();
        assert!(chunk.is_full().unwrap());
    }

    #[test]
    fn test_delete_marks_dirty_only_when_removed() {
        let dir = tempdir().unwrap();
        let chunk = Chunk::open("t-0001", dir.path().join("t-0001"), 8).unwrap();
        assert!(!chunk.delete(&RecordId::from("missing")).unwrap());
        assert!(!chunk.dirty());

        chunk.write(RecordId::from("a"), Value::Int(1), true).unwrap();
        chunk.wait_drained();
        assert!(!chunk.dirty());

        assert!(chunk.delete(&RecordId::from("a")).unwrap());
        assert!(chunk.dirty());
    }

    #[test]
    fn test_coalescing_leaves_final_value_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t-0001");
        let chunk = Chunk::open("t-0001", path.clone(), 8).unwrap();
        for i in 0..20i64 {
            chunk
                .write(RecordId::from("k"), Value::Int(i), true)
                .unwrap();
        }
        chunk.wait_drained();

        let reopened = Chunk::open("t-0001", path, 8).unwrap();
        assert_eq!(
            reopened.get(&RecordId::from("k")).unwrap(),
            Some(Value::Int(19))
        );
    }

    #[test]
    fn test_corrupt_file_surfaces_corrupt_chunk_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t-0001");
        fs::write(&path, b"not a valid bincode payload at all, nope").unwrap();
        let chunk = Chunk::open("t-0001", path, 8).unwrap();
        let err = chunk.len().unwrap_err();
        assert!(matches!(err, Error::CorruptChunkError { .. }));
    }

    #[test]
    fn test_commit_respawns_worker_after_idle_exit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t-0001");
        let chunk = Chunk::open("t-0001", path.clone(), 8).unwrap();

        chunk.write(RecordId::from("a"), Value::Int(1), true).unwrap();
        chunk.wait_drained();

        // Let the worker hit its idle timeout and exit on its own.
        thread::sleep(IDLE_TIMEOUT * 3);

        chunk.write(RecordId::from("b"), Value::Int(2), true).unwrap();
        chunk.wait_drained();

        assert!(chunk.last_error().is_none());
        let reopened = Chunk::open("t-0001", path, 8).unwrap();
        assert_eq!(reopened.get(&RecordId::from("a")).unwrap(), Some(Value::Int(1)));
        assert_eq!(reopened.get(&RecordId::from("b")).unwrap(), Some(Value::Int(2)));
    }
}

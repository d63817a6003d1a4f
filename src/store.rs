use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use redb::{Database, ReadableDatabase, TableDefinition};

use crate::error::{Error, Result};

pub const FINGERPRINT_FILE: &str = "fingerprint";
pub const MODEL_FILE: &str = "model.json";
pub const MATRIX_FILE: &str = "matrix.bin";

const CACHE: TableDefinition<&str, &[u8]> = TableDefinition::new("cache");

const FINGERPRINT_KEY: &str = "fingerprint";
const MODEL_KEY: &str = "model";
const MATRIX_KEY: &str = "matrix";

/// The raw on-disk triple, before any decoding or validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Marker text; a valid marker is a 64-char hex fingerprint.
    pub fingerprint: String,
    pub model: Vec<u8>,
    pub matrix: Vec<u8>,
}

/// Where a cache record lives.
///
/// `load` returns `Ok(None)` whenever any of the three artifacts is
/// absent. Decoding and fingerprint validation happen in the caller.
pub trait CacheStore {
    fn load(&self) -> Result<Option<StoredRecord>>;
    fn save(&self, record: &StoredRecord) -> Result<()>;
    fn clear(&self) -> Result<()>;
    /// Human-readable location for logs and status output.
    fn describe(&self) -> String;
}

/// A directory holding three files: `fingerprint`, `model.json` and
/// `matrix.bin`.
///
/// Each file is written to a temp file in the same directory and renamed
/// into place. The marker is removed before the artifacts are replaced
/// and written last, so a marker is only ever present next to the
/// artifacts it was written with.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// The directory is created lazily on the first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fingerprint_path(&self) -> PathBuf {
        self.root.join(FINGERPRINT_FILE)
    }

    pub fn model_path(&self) -> PathBuf {
        self.root.join(MODEL_FILE)
    }

    pub fn matrix_path(&self) -> PathBuf {
        self.root.join(MATRIX_FILE)
    }
}

impl CacheStore for DirStore {
    fn load(&self) -> Result<Option<StoredRecord>> {
        let Some(marker) = read_optional(&self.fingerprint_path())? else {
            return Ok(None);
        };
        let Some(model) = read_optional(&self.model_path())? else {
            tracing::debug!(dir = %self.root.display(), "model artifact missing");
            return Ok(None);
        };
        let Some(matrix) = read_optional(&self.matrix_path())? else {
            tracing::debug!(dir = %self.root.display(), "matrix artifact missing");
            return Ok(None);
        };

        Ok(Some(StoredRecord {
            fingerprint: String::from_utf8_lossy(&marker).trim().to_string(),
            model,
            matrix,
        }))
    }

    fn save(&self, record: &StoredRecord) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .map_err(|_| Error::CacheDir(self.root.clone()))?;

        remove_optional(&self.fingerprint_path())?;
        write_atomic(&self.root, MODEL_FILE, &record.model)?;
        write_atomic(&self.root, MATRIX_FILE, &record.matrix)?;
        write_atomic(
            &self.root,
            FINGERPRINT_FILE,
            record.fingerprint.as_bytes(),
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        remove_optional(&self.fingerprint_path())?;
        remove_optional(&self.model_path())?;
        remove_optional(&self.matrix_path())?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_optional(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(name)).map_err(|e| e.error)?;
    Ok(())
}

/// Keeps the three artifacts as values of one redb table, replaced
/// together in a single write transaction.
pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl RedbStore {
    /// Open or create a cache database at the given path.
    ///
    /// A file that redb cannot open is treated like any other corrupt
    /// cache: it is removed and a fresh database is created in its place.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use fewshot::store::{CacheStore, RedbStore};
    ///
    /// let store = RedbStore::open(&tmp.path().join("cache.redb")).unwrap();
    /// assert!(store.load().unwrap().is_none());
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|_| Error::CacheDir(parent.to_path_buf()))?;
        }
        let db = match create_database(path) {
            Ok(db) => db,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    "cache database unusable, recreating: {e}"
                );
                remove_optional(path)?;
                create_database(path)?
            }
        };

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }
}

fn create_database(path: &Path) -> Result<Database> {
    let db = Database::create(path)?;

    let txn = db.begin_write()?;
    txn.open_table(CACHE)?;
    txn.commit()?;

    Ok(db)
}

impl CacheStore for RedbStore {
    fn load(&self) -> Result<Option<StoredRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CACHE)?;

        let Some(marker) = table.get(FINGERPRINT_KEY)? else {
            return Ok(None);
        };
        let Some(model) = table.get(MODEL_KEY)? else {
            return Ok(None);
        };
        let Some(matrix) = table.get(MATRIX_KEY)? else {
            return Ok(None);
        };

        Ok(Some(StoredRecord {
            fingerprint: String::from_utf8_lossy(marker.value())
                .trim()
                .to_string(),
            model: model.value().to_vec(),
            matrix: matrix.value().to_vec(),
        }))
    }

    fn save(&self, record: &StoredRecord) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(CACHE)?;
            table.insert(FINGERPRINT_KEY, record.fingerprint.as_bytes())?;
            table.insert(MODEL_KEY, record.model.as_slice())?;
            table.insert(MATRIX_KEY, record.matrix.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(CACHE)?;
            table.remove(FINGERPRINT_KEY)?;
            table.remove(MODEL_KEY)?;
            table.remove(MATRIX_KEY)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// In-process store for tests and embedding callers that do not want
/// disk state.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<StoredRecord>>,
    saves: AtomicUsize,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose saves always fail. Stands in when no cache location
    /// is usable, so builds report that nothing was persisted.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    /// Number of successful saves so far.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current contents, bypassing `load`.
    pub fn snapshot(&self) -> Option<StoredRecord> {
        self.record.lock().ok().and_then(|guard| guard.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<StoredRecord>>> {
        self.record
            .lock()
            .map_err(|_| Error::Config("memory store lock poisoned".into()))
    }
}

impl CacheStore for MemoryStore {
    fn load(&self) -> Result<Option<StoredRecord>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, record: &StoredRecord) -> Result<()> {
        if self.read_only {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "memory store is read-only",
            )));
        }
        *self.lock()? = Some(record.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tag: &str) -> StoredRecord {
        StoredRecord {
            fingerprint: format!("fp-{tag}"),
            model: format!("model-{tag}").into_bytes(),
            matrix: vec![1, 2, 3],
        }
    }

    #[test]
    fn dir_store_empty_loads_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStore::new(tmp.path().join("cache"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn dir_store_save_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStore::new(tmp.path().join("nested").join("cache"));
        store.save(&record("a")).unwrap();

        assert!(store.fingerprint_path().exists());
        assert!(store.model_path().exists());
        assert!(store.matrix_path().exists());
        assert_eq!(store.load().unwrap(), Some(record("a")));
    }

    #[test]
    fn dir_store_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStore::new(tmp.path());
        store.save(&record("a")).unwrap();
        store.save(&record("b")).unwrap();
        assert_eq!(store.load().unwrap(), Some(record("b")));
    }

    #[test]
    fn dir_store_missing_artifact_loads_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStore::new(tmp.path());
        store.save(&record("a")).unwrap();
        std::fs::remove_file(store.matrix_path()).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn dir_store_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStore::new(tmp.path());
        store.save(&record("a")).unwrap();
        let count = std::fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(count, 3);
    }

    #[test]
    fn dir_store_clear_removes_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStore::new(tmp.path());
        store.save(&record("a")).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn dir_store_unwritable_location_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = DirStore::new(&blocker);
        assert!(store.save(&record("a")).is_err());
    }

    #[test]
    fn redb_store_roundtrip_and_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.redb");

        {
            let store = RedbStore::open(&path).unwrap();
            assert!(store.load().unwrap().is_none());
            store.save(&record("a")).unwrap();
        }

        {
            let store = RedbStore::open(&path).unwrap();
            assert_eq!(store.load().unwrap(), Some(record("a")));
            store.clear().unwrap();
            assert!(store.load().unwrap().is_none());
        }
    }

    #[test]
    fn redb_store_recreates_corrupt_database() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.redb");
        std::fs::write(&path, b"definitely not a redb file").unwrap();

        let store = RedbStore::open(&path).unwrap();
        assert!(store.load().unwrap().is_none());
        store.save(&record("a")).unwrap();
        assert_eq!(store.load().unwrap(), Some(record("a")));
    }

    #[test]
    fn memory_store_counts_saves() {
        let store = MemoryStore::new();
        assert_eq!(store.saves(), 0);
        store.save(&record("a")).unwrap();
        store.save(&record("b")).unwrap();
        assert_eq!(store.saves(), 2);
        assert_eq!(store.snapshot(), Some(record("b")));
    }

    #[test]
    fn read_only_memory_store_rejects_saves() {
        let store = MemoryStore::read_only();
        assert!(store.save(&record("a")).is_err());
        assert_eq!(store.saves(), 0);
        assert!(store.load().unwrap().is_none());
    }
}

//! Journaled on-disk collection store.

use super::journal::{Journal, JournalOp};
use super::{key_all, key_of, LocalStore};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::types::{Record, RecordKey, Registry};
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Magic bytes for the store manifest.
const STORE_MAGIC: &[u8; 4] = b"CST\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

/// One collection: its journal plus the replayed view.
struct Container {
    primary_key: String,
    journal: Journal,
    records: BTreeMap<RecordKey, Record>,
}

/// Durable store backed by one journal file per collection.
///
/// The directory is held under an exclusive lock for the lifetime of the
/// handle. Each collection sits behind its own mutex, so calls against
/// different collections never contend.
pub struct DiskStore {
    config: StoreConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    containers: HashMap<String, Mutex<Container>>,
}

impl DiskStore {
    /// Open the store, creating the directory and any missing containers.
    ///
    /// Idempotent across runs: existing journals are replayed, absent ones
    /// are created empty. Environment failures surface as
    /// [`StoreError::StorageUnavailable`].
    pub fn open(config: StoreConfig, registry: &Registry) -> Result<Self> {
        if !config.path.exists() {
            if !config.create_if_missing {
                return Err(StoreError::StorageUnavailable(format!(
                    "{} does not exist",
                    config.path.display()
                )));
            }
            fs::create_dir_all(&config.path).map_err(|e| unavailable(&config.path, e))?;
            Self::write_manifest(&config.path).map_err(|e| unavailable(&config.path, e))?;
        } else {
            Self::verify_manifest(&config.path)?;
        }

        let lock_file = Self::acquire_lock(&config.path)?;

        let mut containers = HashMap::new();
        for spec in registry.iter() {
            let path = Self::journal_path(&config.path, &spec.name)?;
            let (journal, ops) = Journal::open(&path)?;
            let mut records = BTreeMap::new();
            for op in ops {
                op.apply(&mut records);
            }
            debug!(collection = %spec.name, records = records.len(), frames = journal.frames(), "replayed collection");
            containers.insert(
                spec.name.clone(),
                Mutex::new(Container {
                    primary_key: spec.primary_key.clone(),
                    journal,
                    records,
                }),
            );
        }

        info!(path = %config.path.display(), collections = containers.len(), "opened local store");

        Ok(Self {
            config,
            _lock_file: lock_file,
            containers,
        })
    }

    /// Base directory of the store.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Frame count of a collection's journal.
    pub fn journal_frames(&self, collection: &str) -> Result<u64> {
        Ok(self.container(collection)?.lock().journal.frames())
    }

    fn container(&self, collection: &str) -> Result<&Mutex<Container>> {
        self.containers
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }

    /// Append `op`, apply it, and compact if the journal has grown long.
    ///
    /// The write is durable once the append returns; a failed compaction is
    /// logged and retried on the next commit.
    fn commit(&self, collection: &str, op: JournalOp) -> Result<()> {
        let mut guard = self.container(collection)?.lock();
        let container = &mut *guard;

        container.journal.append(&op)?;
        op.apply(&mut container.records);

        if container.journal.frames() >= self.config.compact_after.max(2) {
            let entries = container
                .records
                .iter()
                .map(|(k, r)| (k.clone(), r.clone()))
                .collect();
            match container.journal.compact(entries) {
                Ok(()) => {
                    debug!(collection, records = container.records.len(), "compacted journal")
                }
                Err(e) => warn!(collection, error = %e, "journal compaction failed"),
            }
        }
        Ok(())
    }

    fn journal_path(base: &Path, collection: &str) -> Result<PathBuf> {
        let valid = !collection.is_empty()
            && collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidFormat(format!(
                "collection name not usable as a file name: {collection:?}"
            )));
        }
        Ok(base.join(format!("{collection}.journal")))
    }

    fn write_manifest(path: &Path) -> std::io::Result<()> {
        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        let manifest = path.join("MANIFEST");
        if !manifest.exists() {
            // Directory created by someone else; adopt it.
            return Self::write_manifest(path).map_err(|e| unavailable(path, e));
        }

        let mut file = File::open(&manifest).map_err(|e| unavailable(path, e))?;
        let mut header = [0u8; 5];
        file.read_exact(&mut header)?;
        if &header[..4] != STORE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid store magic".into()));
        }
        if header[4] != STORE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported store version: {}",
                header[4]
            )));
        }
        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join("LOCK"))
            .map_err(|e| unavailable(path, e))?;
        lock_file.try_lock_exclusive().map_err(|_| StoreError::Locked)?;
        Ok(lock_file)
    }
}

fn unavailable(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::StorageUnavailable(format!("{}: {e}", path.display()))
}

impl LocalStore for DiskStore {
    fn get_all(&self, collection: &str) -> Result<Vec<Record>> {
        let guard = self.container(collection)?.lock();
        Ok(guard.records.values().cloned().collect())
    }

    fn put_all(&self, collection: &str, records: &[Record]) -> Result<()> {
        let primary_key = self.container(collection)?.lock().primary_key.clone();
        let entries = key_all(collection, &primary_key, records)?;
        self.commit(collection, JournalOp::Replace(entries))
    }

    fn put(&self, collection: &str, record: &Record) -> Result<()> {
        let primary_key = self.container(collection)?.lock().primary_key.clone();
        let key = key_of(collection, &primary_key, record)?;
        self.commit(
            collection,
            JournalOp::Put {
                key,
                record: record.clone(),
            },
        )
    }

    fn delete(&self, collection: &str, key: &RecordKey) -> Result<()> {
        if !self.container(collection)?.lock().records.contains_key(key) {
            return Ok(());
        }
        self.commit(collection, JournalOp::Delete(key.clone()))
    }

    fn clear(&self, collection: &str) -> Result<()> {
        self.commit(collection, JournalOp::Clear)
    }
}

//! Local durable store.
//!
//! Every known collection gets its own container keyed by the collection's
//! primary-key field. Two implementations share the [`LocalStore`] contract:
//!
//! - [`DiskStore`]: journaled files under a locked directory
//! - [`MemoryStore`]: process memory only, for tests and throwaway sessions

mod disk;
mod journal;
mod memory;

pub use disk::DiskStore;
pub use journal::{Journal, JournalOp};
pub use memory::MemoryStore;

use crate::error::{Result, StoreError};
use crate::types::{Record, RecordKey};

/// Synchronous key-value storage for whole collections.
///
/// Errors are never retried here; they propagate to the caller.
pub trait LocalStore: Send + Sync {
    /// Every record currently stored, ordered by key. Empty if none.
    fn get_all(&self, collection: &str) -> Result<Vec<Record>>;

    /// Replace the stored set with exactly `records`, atomically.
    fn put_all(&self, collection: &str, records: &[Record]) -> Result<()>;

    /// Upsert one record by primary key.
    fn put(&self, collection: &str, record: &Record) -> Result<()>;

    /// Remove one record. No-op if absent.
    fn delete(&self, collection: &str, key: &RecordKey) -> Result<()>;

    /// Remove every record.
    fn clear(&self, collection: &str) -> Result<()>;
}

/// Extract the primary key or fail with [`StoreError::MissingKey`].
pub(crate) fn key_of(collection: &str, primary_key: &str, record: &Record) -> Result<RecordKey> {
    record.key(primary_key).ok_or_else(|| StoreError::MissingKey {
        collection: collection.to_string(),
        field: primary_key.to_string(),
    })
}

/// Key every record up front so a bad record rejects the whole batch.
pub(crate) fn key_all(
    collection: &str,
    primary_key: &str,
    records: &[Record],
) -> Result<Vec<(RecordKey, Record)>> {
    records
        .iter()
        .map(|r| Ok((key_of(collection, primary_key, r)?, r.clone())))
        .collect()
}

//! Persistence service: one collection-addressed API over two storage tiers.
//!
//! Policy, per call:
//! - reads prefer the remote and converge the local store to it, falling back
//!   to the local store on any remote failure
//! - writes go to the local store first (errors propagate), then best-effort
//!   to the remote (errors go to the observer only)
//!
//! Conflicts resolve last-writer-wins per record via upsert by primary key.

use crate::error::{RemoteError, RemoteResult, Result, StoreError};
use crate::local::LocalStore;
use crate::observe::{RemoteOp, SyncObserver, TracingObserver};
use crate::remote::RemoteStore;
use crate::types::{CollectionSpec, Record, RecordKey, Registry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Where the records returned by [`PersistenceService::fetch`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// Remote answered; the local store now matches it.
    Remote,
    /// Remote failed; last-known-good local data.
    Local,
    /// Remote answered, but a local write landed while the read was in flight.
    LocalNewer,
}

/// Result of a read through the service.
#[derive(Clone, Debug, PartialEq)]
pub struct Fetched {
    pub records: Vec<Record>,
    pub source: Source,
}

pub struct PersistenceService {
    registry: Registry,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    observer: Arc<dyn SyncObserver>,
    /// Taken from the remote, so reads have a single bound.
    read_timeout: Duration,

    /// Per-collection local write counter. Held while writing locally so a
    /// remote read can tell whether it was overtaken.
    generations: HashMap<String, Mutex<u64>>,
}

impl PersistenceService {
    pub fn new(
        registry: Registry,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        let generations = registry
            .names()
            .map(|name| (name.to_string(), Mutex::new(0)))
            .collect();
        let read_timeout = remote.read_timeout();
        Self {
            registry,
            local,
            remote,
            observer: Arc::new(TracingObserver),
            read_timeout,
            generations,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn spec(&self, collection: &str) -> Result<&CollectionSpec> {
        self.registry
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }

    fn generation(&self, collection: &str) -> Result<&Mutex<u64>> {
        self.generations
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }

    // --- Read path ---

    /// Read a collection, reporting where the data came from. Never fails.
    pub async fn fetch(&self, collection: &str) -> Fetched {
        let (spec, generation) = match (self.spec(collection), self.generation(collection)) {
            (Ok(spec), Ok(generation)) => (spec, generation),
            _ => {
                warn!(collection, "read of unknown collection");
                return Fetched {
                    records: Vec::new(),
                    source: Source::Local,
                };
            }
        };

        let started_at = *generation.lock();
        let result = match tokio::time::timeout(self.read_timeout, self.remote.fetch_all(spec)).await
        {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(self.read_timeout)),
        };

        let records = match result {
            Ok(records) => {
                self.observer.remote_succeeded(RemoteOp::Fetch, collection);
                records
            }
            Err(e) => {
                self.observer.remote_failed(RemoteOp::Fetch, collection, &e);
                self.observer.local_fallback(collection);
                return Fetched {
                    records: self.local_or_empty(collection),
                    source: Source::Local,
                };
            }
        };

        {
            let current = generation.lock();
            if *current != started_at {
                drop(current);
                self.observer.stale_read_discarded(collection);
                return Fetched {
                    records: self.local_or_empty(collection),
                    source: Source::LocalNewer,
                };
            }
            // Converge while holding the counter so no local write interleaves.
            if let Err(e) = self.local.put_all(collection, &records) {
                warn!(collection, error = %e, "failed to mirror remote collection locally");
            }
        }

        Fetched {
            records,
            source: Source::Remote,
        }
    }

    /// Read a collection, preferring remote data. Never fails.
    pub async fn get_all(&self, collection: &str) -> Vec<Record> {
        self.fetch(collection).await.records
    }

    /// Read the local store only, bypassing the remote.
    pub fn get_local(&self, collection: &str) -> Result<Vec<Record>> {
        self.spec(collection)?;
        self.local.get_all(collection)
    }

    fn local_or_empty(&self, collection: &str) -> Vec<Record> {
        self.local.get_all(collection).unwrap_or_else(|e| {
            warn!(collection, error = %e, "local read failed, returning empty collection");
            Vec::new()
        })
    }

    // --- Write paths ---

    /// Run a local write under the collection's generation lock.
    fn write_local(
        &self,
        collection: &str,
        write: impl FnOnce(&dyn LocalStore) -> Result<()>,
    ) -> Result<()> {
        let mut generation = self.generation(collection)?.lock();
        write(self.local.as_ref())?;
        *generation += 1;
        Ok(())
    }

    fn report(&self, op: RemoteOp, collection: &str, result: RemoteResult<()>) {
        match result {
            Ok(()) => self.observer.remote_succeeded(op, collection),
            Err(e) => self.observer.remote_failed(op, collection, &e),
        }
    }

    /// Upsert one record. Returns once it is durable on this device.
    pub async fn put(&self, collection: &str, record: &Record) -> Result<()> {
        let spec = self.spec(collection)?;
        self.write_local(collection, |local| local.put(collection, record))?;

        let result = self.remote.upsert(spec, std::slice::from_ref(record)).await;
        self.report(RemoteOp::Upsert, collection, result);
        Ok(())
    }

    /// Replace a whole collection locally, then upsert it remotely.
    ///
    /// An empty set clears the local collection but never touches the remote.
    pub async fn put_all(&self, collection: &str, records: &[Record]) -> Result<()> {
        let spec = self.spec(collection)?;
        self.write_local(collection, |local| local.put_all(collection, records))?;

        if records.is_empty() {
            debug!(collection, "empty bulk save, remote left untouched");
            return Ok(());
        }

        let result = self.remote.upsert(spec, records).await;
        self.report(RemoteOp::Upsert, collection, result);
        Ok(())
    }

    /// Delete one record by primary key.
    ///
    /// If the remote delete never lands, the record can reappear on the next
    /// remote-preferred read.
    pub async fn delete(&self, collection: &str, key: &RecordKey) -> Result<()> {
        let spec = self.spec(collection)?;
        self.write_local(collection, |local| local.delete(collection, key))?;

        let result = self.remote.delete_one(spec, key).await;
        self.report(RemoteOp::DeleteOne, collection, result);
        Ok(())
    }

    /// Remove every record of a collection on both tiers.
    pub async fn clear(&self, collection: &str) -> Result<()> {
        let spec = self.spec(collection)?;
        self.write_local(collection, |local| local.clear(collection))?;

        let result = self.remote.delete_all(spec).await;
        self.report(RemoteOp::DeleteAll, collection, result);
        Ok(())
    }
}

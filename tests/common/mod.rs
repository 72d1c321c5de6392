//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use campus_store::{
    CollectionSpec, DiskStore, PersistenceService, Record, RecordKey, Registry, RemoteError,
    RemoteResult, RemoteStore, StoreConfig, SyncStats,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// In-process stand-in for the remote backend.
///
/// Tables are keyed by remote table name. Fetches snapshot the table before
/// any configured delay, like a response computed before a later write.
#[derive(Default)]
pub struct FakeRemote {
    tables: Mutex<HashMap<String, BTreeMap<String, Record>>>,
    offline: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
    upsert_delays: Mutex<Vec<Duration>>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    fetches: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock() = Some(delay);
    }

    /// Delay the next upsert by `delay` before it applies. Queued delays are
    /// used one per upsert, in order.
    pub fn delay_next_upsert(&self, delay: Duration) {
        self.upsert_delays.lock().push(delay);
    }

    /// Make every call against `table` fail while the rest stay up.
    pub fn fail_table(&self, table: &str) {
        self.failing.lock().insert(table.to_string());
    }

    /// Make fetches of `table` panic, as a crashing task would.
    pub fn panic_on_fetch(&self, table: &str) {
        self.panicking.lock().insert(table.to_string());
    }

    /// Replace a table's rows, keyed by `key_field`.
    pub fn seed(&self, table: &str, key_field: &str, rows: Vec<Record>) {
        let rows = rows
            .into_iter()
            .map(|r| (r.key(key_field).unwrap().0, r))
            .collect();
        self.tables.lock().insert(table.to_string(), rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.tables
            .lock()
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Calls made so far, as `"op:table"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    /// Fetches that have reached the backend.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn record_call(&self, op: &str, table: &str) -> RemoteResult<()> {
        self.calls.lock().push(format!("{op}:{table}"));
        if self.offline.load(Ordering::SeqCst) || self.failing.lock().contains(table) {
            Err(RemoteError::Status {
                status: 503,
                body: "unreachable".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn fetch_all(&self, spec: &CollectionSpec) -> RemoteResult<Vec<Record>> {
        self.record_call("fetch", &spec.table)?;
        if self.panicking.lock().contains(&spec.table) {
            panic!("fetch of {} crashed", spec.table);
        }
        let rows = self.rows(&spec.table);
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(rows)
    }

    async fn upsert(&self, spec: &CollectionSpec, records: &[Record]) -> RemoteResult<()> {
        self.record_call("upsert", &spec.table)?;
        let delay = {
            let mut delays = self.upsert_delays.lock();
            (!delays.is_empty()).then(|| delays.remove(0))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut tables = self.tables.lock();
        let table = tables.entry(spec.table.clone()).or_default();
        for record in records {
            let key = record.key(&spec.primary_key).ok_or_else(|| RemoteError::Status {
                status: 400,
                body: format!("missing {}", spec.primary_key),
            })?;
            table.insert(key.0, record.clone());
        }
        Ok(())
    }

    async fn delete_one(&self, spec: &CollectionSpec, key: &RecordKey) -> RemoteResult<()> {
        self.record_call("delete_one", &spec.table)?;
        if let Some(table) = self.tables.lock().get_mut(&spec.table) {
            table.remove(key.as_str());
        }
        Ok(())
    }

    async fn delete_all(&self, spec: &CollectionSpec) -> RemoteResult<()> {
        self.record_call("delete_all", &spec.table)?;
        self.tables.lock().remove(&spec.table);
        Ok(())
    }
}

pub fn rec(value: Value) -> Record {
    Record::from_value(value).unwrap()
}

pub struct Harness {
    pub dir: TempDir,
    pub remote: Arc<FakeRemote>,
    pub stats: Arc<SyncStats>,
    pub service: Arc<PersistenceService>,
}

/// Disk-backed service talking to a fresh [`FakeRemote`].
pub fn harness() -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
    let dir = TempDir::new().unwrap();
    let registry = Registry::school();
    let local = Arc::new(
        DiskStore::open(
            StoreConfig {
                path: dir.path().join("store"),
                ..Default::default()
            },
            &registry,
        )
        .unwrap(),
    );
    let remote = Arc::new(FakeRemote::new());
    let stats = Arc::new(SyncStats::new());
    let service = Arc::new(
        PersistenceService::new(registry, local, remote.clone()).with_observer(stats.clone()),
    );
    Harness {
        dir,
        remote,
        stats,
        service,
    }
}

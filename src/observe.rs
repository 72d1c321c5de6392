//! Observability hook for the persistence service.
//!
//! Remote failures never reach callers of the service, so they are reported
//! here instead. The default observer logs at debug level; [`SyncStats`]
//! keeps counters that can be read back by the host or by tests.

use crate::error::RemoteError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Which remote call an event refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    Fetch,
    Upsert,
    DeleteOne,
    DeleteAll,
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteOp::Fetch => "fetch",
            RemoteOp::Upsert => "upsert",
            RemoteOp::DeleteOne => "delete_one",
            RemoteOp::DeleteAll => "delete_all",
        };
        f.write_str(name)
    }
}

/// Receives sync events from the persistence service.
///
/// All methods default to doing nothing.
pub trait SyncObserver: Send + Sync {
    fn remote_succeeded(&self, _op: RemoteOp, _collection: &str) {}

    fn remote_failed(&self, _op: RemoteOp, _collection: &str, _error: &RemoteError) {}

    /// A read was served from the local store because the remote failed.
    fn local_fallback(&self, _collection: &str) {}

    /// A remote read finished after a newer local write and was dropped.
    fn stale_read_discarded(&self, _collection: &str) {}
}

/// Logs every event through `tracing` at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn remote_succeeded(&self, op: RemoteOp, collection: &str) {
        debug!(%op, collection, "remote call succeeded");
    }

    fn remote_failed(&self, op: RemoteOp, collection: &str, error: &RemoteError) {
        debug!(%op, collection, %error, "remote call failed");
    }

    fn local_fallback(&self, collection: &str) {
        debug!(collection, "serving collection from local store");
    }

    fn stale_read_discarded(&self, collection: &str) {
        debug!(collection, "discarded remote read superseded by local write");
    }
}

/// Counting observer. Also forwards to [`TracingObserver`].
#[derive(Debug, Default)]
pub struct SyncStats {
    remote_ok: AtomicU64,
    remote_failed: AtomicU64,
    local_fallbacks: AtomicU64,
    stale_reads: AtomicU64,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remote_ok(&self) -> u64 {
        self.remote_ok.load(Ordering::Relaxed)
    }

    pub fn remote_failures(&self) -> u64 {
        self.remote_failed.load(Ordering::Relaxed)
    }

    pub fn local_fallbacks(&self) -> u64 {
        self.local_fallbacks.load(Ordering::Relaxed)
    }

    pub fn stale_reads(&self) -> u64 {
        self.stale_reads.load(Ordering::Relaxed)
    }
}

impl SyncObserver for SyncStats {
    fn remote_succeeded(&self, op: RemoteOp, collection: &str) {
        self.remote_ok.fetch_add(1, Ordering::Relaxed);
        TracingObserver.remote_succeeded(op, collection);
    }

    fn remote_failed(&self, op: RemoteOp, collection: &str, error: &RemoteError) {
        self.remote_failed.fetch_add(1, Ordering::Relaxed);
        TracingObserver.remote_failed(op, collection, error);
    }

    fn local_fallback(&self, collection: &str) {
        self.local_fallbacks.fetch_add(1, Ordering::Relaxed);
        TracingObserver.local_fallback(collection);
    }

    fn stale_read_discarded(&self, collection: &str) {
        self.stale_reads.fetch_add(1, Ordering::Relaxed);
        TracingObserver.stale_read_discarded(collection);
    }
}

//! Remote store adapter.
//!
//! A thin async client for the shared relational backend. Adapters do not
//! retry or queue; a failed call is simply reported to the caller.

mod rest;

pub use rest::RestRemote;

use crate::config::DEFAULT_READ_TIMEOUT;
use crate::error::{RemoteError, RemoteResult};
use crate::types::{CollectionSpec, Record, RecordKey};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Select every row of the collection's table.
    async fn fetch_all(&self, spec: &CollectionSpec) -> RemoteResult<Vec<Record>>;

    /// Insert-or-update rows by `spec.primary_key`.
    async fn upsert(&self, spec: &CollectionSpec, records: &[Record]) -> RemoteResult<()>;

    /// Delete the row whose primary key equals `key`.
    async fn delete_one(&self, spec: &CollectionSpec, key: &RecordKey) -> RemoteResult<()>;

    /// Delete every row in the table.
    async fn delete_all(&self, spec: &CollectionSpec) -> RemoteResult<()>;

    /// How long a caller should wait for [`RemoteStore::fetch_all`].
    fn read_timeout(&self) -> Duration {
        DEFAULT_READ_TIMEOUT
    }
}

/// Remote that is never reachable. Used when no backend is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineRemote;

#[async_trait]
impl RemoteStore for OfflineRemote {
    async fn fetch_all(&self, _spec: &CollectionSpec) -> RemoteResult<Vec<Record>> {
        Err(RemoteError::Offline)
    }

    async fn upsert(&self, _spec: &CollectionSpec, _records: &[Record]) -> RemoteResult<()> {
        Err(RemoteError::Offline)
    }

    async fn delete_one(&self, _spec: &CollectionSpec, _key: &RecordKey) -> RemoteResult<()> {
        Err(RemoteError::Offline)
    }

    async fn delete_all(&self, _spec: &CollectionSpec) -> RemoteResult<()> {
        Err(RemoteError::Offline)
    }
}

//! # Campus Store
//!
//! Local-first persistence for named collections of opaque records.
//!
//! ## Core Concepts
//!
//! - **Local store**: journaled on-device storage, always available
//! - **Remote store**: shared backend, reachable only when networked
//! - **Persistence service**: remote-preferred reads, local-first writes
//! - **Save scheduler**: per-collection debounce of in-memory changes
//! - **Hydration**: concurrent startup load with default seeds
//!
//! ## Example
//!
//! ```ignore
//! use campus_store::*;
//! use std::sync::Arc;
//!
//! let registry = Registry::school();
//! let local = Arc::new(DiskStore::open(StoreConfig::default(), &registry)?);
//! let remote: Arc<dyn RemoteStore> = match RemoteConfig::from_env() {
//!     Some(config) => Arc::new(RestRemote::new(config)?),
//!     None => Arc::new(OfflineRemote),
//! };
//! let service = Arc::new(PersistenceService::new(registry, local, remote));
//!
//! let session = Session::new(service, SchedulerConfig::default());
//! session.hydrate(&Seeds::default()).await;
//! session.upsert("students", Record::new().with("id", "s1").with("name", "Amit"));
//! session.flush().await?;
//! ```

pub mod config;
pub mod error;
pub mod hydrate;
pub mod local;
pub mod observe;
pub mod remote;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod types;

// Re-exports
pub use config::{RemoteConfig, SchedulerConfig, StoreConfig, DEFAULT_READ_TIMEOUT};
pub use error::{RemoteError, RemoteResult, Result, StoreError};
pub use hydrate::{hydrate, CollectionLoad, Hydrated, HydrationReport, Seeds};
pub use local::{DiskStore, LocalStore, MemoryStore};
pub use observe::{RemoteOp, SyncObserver, SyncStats, TracingObserver};
pub use remote::{OfflineRemote, RemoteStore, RestRemote};
pub use scheduler::SaveScheduler;
pub use service::{Fetched, PersistenceService, Source};
pub use session::Session;
pub use snapshot::{export_local, restore, DatabaseSnapshot};
pub use state::{AppState, SnapshotSource};
pub use types::*;

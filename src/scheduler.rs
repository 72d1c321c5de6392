//! Debounced save scheduler.
//!
//! At most one timer is pending per collection. A new mutation cancels the
//! pending timer and starts a fresh one; when a timer survives its idle
//! window the collection's snapshot is read (at fire time, not at schedule
//! time) and written through [`PersistenceService::put_all`].
//!
//! Saves of one collection never overlap: a timer that fires while an
//! earlier save of the same collection is still in flight waits for it, then
//! reads the snapshot. The last write to land is always the latest state.
//!
//! The scheduler starts disarmed. Until [`SaveScheduler::arm`] is called,
//! typically at the end of hydration, mutations are not persisted, so an
//! empty not-yet-hydrated collection can never overwrite stored data.

use crate::config::SchedulerConfig;
use crate::error::{Result, StoreError};
use crate::service::PersistenceService;
use crate::state::SnapshotSource;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as WriteSlot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct Pending {
    ticket: u64,
    handle: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<String, Pending>>>;

/// One write slot per collection, created on first use.
#[derive(Clone, Default)]
struct WriteSlots(Arc<Mutex<HashMap<String, Arc<WriteSlot<()>>>>>);

impl WriteSlots {
    fn get(&self, collection: &str) -> Arc<WriteSlot<()>> {
        Arc::clone(
            self.0
                .lock()
                .entry(collection.to_string())
                .or_insert_with(|| Arc::new(WriteSlot::new(()))),
        )
    }
}

/// Snapshot a collection and write it, holding its write slot.
async fn save(
    service: &PersistenceService,
    source: &dyn SnapshotSource,
    slots: &WriteSlots,
    collection: &str,
) -> Result<usize> {
    let slot = slots.get(collection);
    let _writing = slot.lock().await;
    let records = source.snapshot(collection);
    service.put_all(collection, &records).await?;
    Ok(records.len())
}

pub struct SaveScheduler {
    service: Arc<PersistenceService>,
    source: Arc<dyn SnapshotSource>,
    idle_window: Duration,
    armed: AtomicBool,
    next_ticket: AtomicU64,
    pending: PendingMap,
    slots: WriteSlots,
}

impl SaveScheduler {
    pub fn new(
        service: Arc<PersistenceService>,
        source: Arc<dyn SnapshotSource>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            service,
            source,
            idle_window: config.idle_window,
            armed: AtomicBool::new(false),
            next_ticket: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            slots: WriteSlots::default(),
        }
    }

    /// Allow scheduled saves to run.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Note a mutation of `collection`.
    ///
    /// Returns `false` if the scheduler is not armed and nothing was scheduled.
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, collection: &str) -> bool {
        if !self.is_armed() {
            debug!(collection, "save suppressed before hydration");
            return false;
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let mut pending = self.pending.lock();

        if let Some(previous) = pending.remove(collection) {
            previous.handle.abort();
        }

        let handle = tokio::spawn(fire(
            Arc::clone(&self.service),
            Arc::clone(&self.source),
            Arc::clone(&self.pending),
            self.slots.clone(),
            collection.to_string(),
            ticket,
            self.idle_window,
        ));
        pending.insert(collection.to_string(), Pending { ticket, handle });
        true
    }

    /// Collections with a timer still pending.
    pub fn pending(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pending.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Cancel every pending timer and write those collections now.
    ///
    /// Meant for shutdown; without it, mutations younger than the idle
    /// window are lost when the process exits. Every collection is attempted;
    /// the first failure is returned once all have been tried.
    pub async fn flush(&self) -> Result<()> {
        let mut drained: Vec<String> = {
            let mut pending = self.pending.lock();
            pending
                .drain()
                .map(|(collection, p)| {
                    p.handle.abort();
                    collection
                })
                .collect()
        };
        drained.sort();

        let mut first_error: Option<StoreError> = None;
        for collection in drained {
            match save(&self.service, self.source.as_ref(), &self.slots, &collection).await {
                Ok(records) => debug!(collection, records, "flushed collection"),
                Err(e) => {
                    warn!(collection, error = %e, "flush failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

async fn fire(
    service: Arc<PersistenceService>,
    source: Arc<dyn SnapshotSource>,
    pending: PendingMap,
    slots: WriteSlots,
    collection: String,
    ticket: u64,
    idle_window: Duration,
) {
    tokio::time::sleep(idle_window).await;

    // Leave the map before writing so a newer mutation schedules a fresh
    // timer instead of aborting this write mid-flight.
    {
        let mut pending = pending.lock();
        match pending.get(&collection) {
            Some(p) if p.ticket == ticket => {
                pending.remove(&collection);
            }
            _ => return,
        }
    }

    match save(&service, source.as_ref(), &slots, &collection).await {
        Ok(records) => debug!(collection, records, "saved collection"),
        Err(e) => warn!(collection, error = %e, "scheduled save failed"),
    }
}

//! Application session: in-memory state wired to the save scheduler.

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::hydrate::{hydrate, HydrationReport, Seeds};
use crate::scheduler::SaveScheduler;
use crate::service::PersistenceService;
use crate::state::AppState;
use crate::types::{Record, RecordKey, STUDENTS, USERS};
use std::sync::Arc;

/// Owns the in-memory collections for one run of the application.
///
/// Mutations go through the session so each one reaches the save
/// scheduler. Nothing is persisted until [`Session::hydrate`] has finished.
pub struct Session {
    service: Arc<PersistenceService>,
    state: Arc<AppState>,
    scheduler: SaveScheduler,
}

impl Session {
    pub fn new(service: Arc<PersistenceService>, config: SchedulerConfig) -> Self {
        let state = Arc::new(AppState::new(service.registry().clone()));
        let scheduler = SaveScheduler::new(Arc::clone(&service), state.clone(), config);
        Self {
            service,
            state,
            scheduler,
        }
    }

    /// Load every collection, apply seeds, then arm the scheduler.
    ///
    /// Seeded collections are scheduled so the seeds reach storage.
    pub async fn hydrate(&self, seeds: &Seeds) -> HydrationReport {
        let hydrated = hydrate(&self.service, seeds).await;
        for (name, records) in hydrated.collections {
            self.state.replace(&name, records);
        }

        self.scheduler.arm();

        let report = hydrated.report;
        if report.seeded_student {
            self.scheduler.schedule(STUDENTS);
        }
        if report.seeded_admin {
            self.scheduler.schedule(USERS);
        }
        report
    }

    pub fn is_loaded(&self) -> bool {
        self.scheduler.is_armed()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn scheduler(&self) -> &SaveScheduler {
        &self.scheduler
    }

    /// Replace a collection and schedule its save.
    pub fn set(&self, collection: &str, records: Vec<Record>) {
        self.state.replace(collection, records);
        self.scheduler.schedule(collection);
    }

    /// Insert or replace one record and schedule the collection's save.
    pub fn upsert(&self, collection: &str, record: Record) -> bool {
        let changed = self.state.upsert(collection, record);
        if changed {
            self.scheduler.schedule(collection);
        }
        changed
    }

    /// Remove one record from memory and from both stores.
    ///
    /// The delete goes straight to the service rather than through the
    /// scheduler, since a bulk save never removes rows remotely.
    pub async fn remove(&self, collection: &str, key: &RecordKey) -> Result<bool> {
        let removed = self.state.remove(collection, key);
        if self.is_loaded() {
            self.service.delete(collection, key).await?;
        }
        Ok(removed)
    }

    /// Write out every pending collection immediately.
    pub async fn flush(&self) -> Result<()> {
        self.scheduler.flush().await
    }
}

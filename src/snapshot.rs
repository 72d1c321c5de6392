//! Full-database export and restore.
//!
//! A snapshot maps collection names to their complete record lists.
//! Restoring is a bulk save per collection, nothing more.

use crate::error::{Result, StoreError};
use crate::service::PersistenceService;
use crate::types::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatabaseSnapshot {
    pub collections: BTreeMap<String, Vec<Record>>,
}

impl DatabaseSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StoreError::Deserialization(e.to_string()))
    }
}

/// Snapshot the local store. The remote is not consulted.
pub fn export_local(service: &PersistenceService) -> Result<DatabaseSnapshot> {
    let mut collections = BTreeMap::new();
    for name in service.registry().names() {
        collections.insert(name.to_string(), service.get_local(name)?);
    }
    Ok(DatabaseSnapshot { collections })
}

/// Bulk-save every known collection in the snapshot.
///
/// Unknown collections are skipped. Returns how many were restored.
pub async fn restore(service: &PersistenceService, snapshot: &DatabaseSnapshot) -> Result<usize> {
    let mut restored = 0;
    for (name, records) in &snapshot.collections {
        if !service.registry().contains(name) {
            warn!(collection = %name, "skipping unknown collection in snapshot");
            continue;
        }
        service.put_all(name, records).await?;
        restored += 1;
    }
    info!(restored, "restored snapshot");
    Ok(restored)
}

//! Hydration bootstrap: the one-time load of every collection at startup.
//!
//! All collections are read concurrently through the persistence service,
//! one task per collection. A collection whose task fails is loaded from the
//! local store instead; it never holds up the others.

use crate::service::{PersistenceService, Source};
use crate::types::{Record, STUDENTS, USERS};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Records inserted when a fresh install has nothing to show.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Seeds {
    /// Placeholder added to an empty students collection.
    pub student: Record,
    /// Account appended when no user holds `admin_role`.
    pub admin: Record,
    /// Field holding a user's role.
    pub role_field: String,
    /// Role value that grants administrative access.
    pub admin_role: String,
}

impl Default for Seeds {
    fn default() -> Self {
        let student = Record::from_value(json!({
            "id": "placeholder-student",
            "name": "Sample Student",
            "class": "1",
            "rollNo": "1",
        }))
        .unwrap_or_default();
        let admin = Record::from_value(json!({
            "id": "default-admin",
            "username": "admin",
            "name": "Administrator",
            "role": "admin",
        }))
        .unwrap_or_default();

        Self {
            student,
            admin,
            role_field: "role".to_string(),
            admin_role: "admin".to_string(),
        }
    }
}

/// How one collection was loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionLoad {
    pub collection: String,
    pub source: Source,
    pub records: usize,
}

/// Summary of a hydration run.
#[derive(Clone, Debug, Default)]
pub struct HydrationReport {
    /// One entry per collection, in registry order.
    pub loads: Vec<CollectionLoad>,
    pub seeded_student: bool,
    pub seeded_admin: bool,
}

impl HydrationReport {
    pub fn load(&self, collection: &str) -> Option<&CollectionLoad> {
        self.loads.iter().find(|l| l.collection == collection)
    }
}

/// Collections as loaded, with seeds applied.
pub struct Hydrated {
    pub collections: HashMap<String, Vec<Record>>,
    pub report: HydrationReport,
}

/// Load every registered collection concurrently and apply seeds.
pub async fn hydrate(service: &Arc<PersistenceService>, seeds: &Seeds) -> Hydrated {
    let mut tasks = JoinSet::new();
    for name in service.registry().names() {
        let service = Arc::clone(service);
        let name = name.to_string();
        tasks.spawn(async move {
            let fetched = service.fetch(&name).await;
            (name, fetched)
        });
    }

    let mut fetched = HashMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, result)) => {
                fetched.insert(name, result);
            }
            Err(e) => warn!(error = %e, "hydration task failed"),
        }
    }

    let mut collections = HashMap::new();
    let mut report = HydrationReport::default();
    for name in service.registry().names() {
        let (records, source) = match fetched.remove(name) {
            Some(f) => (f.records, f.source),
            None => {
                let records = service.get_local(name).unwrap_or_else(|e| {
                    warn!(collection = name, error = %e, "local read failed during hydration");
                    Vec::new()
                });
                (records, Source::Local)
            }
        };
        report.loads.push(CollectionLoad {
            collection: name.to_string(),
            source,
            records: records.len(),
        });
        collections.insert(name.to_string(), records);
    }

    if let Some(students) = collections.get_mut(STUDENTS) {
        if students.is_empty() {
            students.push(seeds.student.clone());
            report.seeded_student = true;
        }
    }

    if let Some(users) = collections.get_mut(USERS) {
        let has_admin = users.iter().any(|u| {
            u.get(&seeds.role_field).and_then(|v| v.as_str()) == Some(seeds.admin_role.as_str())
        });
        if !has_admin {
            users.push(seeds.admin.clone());
            report.seeded_admin = true;
        }
    }

    let remote = report
        .loads
        .iter()
        .filter(|l| l.source == Source::Remote)
        .count();
    info!(
        collections = report.loads.len(),
        remote,
        seeded_student = report.seeded_student,
        seeded_admin = report.seeded_admin,
        "hydration complete"
    );

    Hydrated {
        collections,
        report,
    }
}

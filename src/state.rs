//! In-memory application state: the single writer of truth during a session.

use crate::types::{Record, RecordKey, Registry};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Something the save scheduler can read a collection snapshot from.
pub trait SnapshotSource: Send + Sync {
    /// Full current contents of the collection.
    fn snapshot(&self, collection: &str) -> Vec<Record>;
}

/// Named collections held in memory.
pub struct AppState {
    registry: Registry,
    collections: RwLock<HashMap<String, Vec<Record>>>,
}

impl AppState {
    pub fn new(registry: Registry) -> Self {
        let collections = registry
            .names()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();
        Self {
            registry,
            collections: RwLock::new(collections),
        }
    }

    /// Replace a collection wholesale.
    pub fn replace(&self, collection: &str, records: Vec<Record>) {
        self.collections.write().insert(collection.to_string(), records);
    }

    /// Mutate a collection in place.
    pub fn update<R>(&self, collection: &str, f: impl FnOnce(&mut Vec<Record>) -> R) -> R {
        let mut collections = self.collections.write();
        f(collections.entry(collection.to_string()).or_default())
    }

    /// Insert or replace a record by the collection's primary key.
    ///
    /// Returns `false` if the record has no key or the collection is unknown.
    pub fn upsert(&self, collection: &str, record: Record) -> bool {
        let Some(spec) = self.registry.get(collection) else {
            return false;
        };
        let Some(key) = record.key(&spec.primary_key) else {
            return false;
        };
        let primary_key = spec.primary_key.clone();
        self.update(collection, |records| {
            match records
                .iter_mut()
                .find(|r| r.key(&primary_key).as_ref() == Some(&key))
            {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
        });
        true
    }

    /// Remove a record by primary key. Returns whether one was removed.
    pub fn remove(&self, collection: &str, key: &RecordKey) -> bool {
        let Some(spec) = self.registry.get(collection) else {
            return false;
        };
        let primary_key = spec.primary_key.clone();
        self.update(collection, |records| {
            let before = records.len();
            records.retain(|r| r.key(&primary_key).as_ref() != Some(key));
            records.len() != before
        })
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, Vec::len)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl SnapshotSource for AppState {
    fn snapshot(&self, collection: &str) -> Vec<Record> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ANNUAL_RECORDS, FEES};
    use serde_json::json;

    fn rec(value: serde_json::Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn test_upsert_replaces_by_key() {
        let state = AppState::new(Registry::school());

        assert!(state.upsert(FEES, rec(json!({"id": "f1", "amount": 100}))));
        assert!(state.upsert(FEES, rec(json!({"id": "f2", "amount": 50}))));
        assert!(state.upsert(FEES, rec(json!({"id": "f1", "amount": 120}))));

        let fees = state.snapshot(FEES);
        assert_eq!(fees.len(), 2);
        assert_eq!(fees[0].get("amount"), Some(&json!(120)));
    }

    #[test]
    fn test_upsert_uses_collection_key() {
        let state = AppState::new(Registry::school());

        assert!(state.upsert(ANNUAL_RECORDS, rec(json!({"studentId": "s1", "total": 1}))));
        assert!(state.upsert(ANNUAL_RECORDS, rec(json!({"studentId": "s1", "total": 2}))));
        assert!(!state.upsert(ANNUAL_RECORDS, rec(json!({"id": "s2"}))));

        assert_eq!(state.len(ANNUAL_RECORDS), 1);
    }

    #[test]
    fn test_remove() {
        let state = AppState::new(Registry::school());
        state.replace(FEES, vec![rec(json!({"id": "a"})), rec(json!({"id": "b"}))]);

        assert!(state.remove(FEES, &RecordKey::from("a")));
        assert!(!state.remove(FEES, &RecordKey::from("a")));
        assert_eq!(state.snapshot(FEES), vec![rec(json!({"id": "b"}))]);
    }
}

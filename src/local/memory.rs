//! In-memory collection store.

use super::{key_all, key_of, LocalStore};
use crate::error::{Result, StoreError};
use crate::types::{Record, RecordKey, Registry};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

struct Container {
    primary_key: String,
    records: BTreeMap<RecordKey, Record>,
}

/// [`LocalStore`] that lives only as long as the process.
pub struct MemoryStore {
    containers: HashMap<String, Mutex<Container>>,
}

impl MemoryStore {
    pub fn new(registry: &Registry) -> Self {
        let containers = registry
            .iter()
            .map(|spec| {
                (
                    spec.name.clone(),
                    Mutex::new(Container {
                        primary_key: spec.primary_key.clone(),
                        records: BTreeMap::new(),
                    }),
                )
            })
            .collect();
        Self { containers }
    }

    fn container(&self, collection: &str) -> Result<&Mutex<Container>> {
        self.containers
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }
}

impl LocalStore for MemoryStore {
    fn get_all(&self, collection: &str) -> Result<Vec<Record>> {
        Ok(self.container(collection)?.lock().records.values().cloned().collect())
    }

    fn put_all(&self, collection: &str, records: &[Record]) -> Result<()> {
        let mut container = self.container(collection)?.lock();
        let entries = key_all(collection, &container.primary_key, records)?;
        container.records = entries.into_iter().collect();
        Ok(())
    }

    fn put(&self, collection: &str, record: &Record) -> Result<()> {
        let mut container = self.container(collection)?.lock();
        let key = key_of(collection, &container.primary_key, record)?;
        container.records.insert(key, record.clone());
        Ok(())
    }

    fn delete(&self, collection: &str, key: &RecordKey) -> Result<()> {
        self.container(collection)?.lock().records.remove(key);
        Ok(())
    }

    fn clear(&self, collection: &str) -> Result<()> {
        self.container(collection)?.lock().records.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::USERS;
    use serde_json::json;

    #[test]
    fn test_memory_store_contract() {
        let store = MemoryStore::new(&Registry::school());
        let a = Record::from_value(json!({"id": "a", "role": "teacher"})).unwrap();
        let b = Record::from_value(json!({"id": "b", "role": "admin"})).unwrap();

        store.put_all(USERS, &[a.clone(), b.clone()]).unwrap();
        assert_eq!(store.get_all(USERS).unwrap(), vec![a.clone(), b]);

        store.delete(USERS, &RecordKey::from("b")).unwrap();
        assert_eq!(store.get_all(USERS).unwrap(), vec![a]);

        store.clear(USERS).unwrap();
        assert!(store.get_all(USERS).unwrap().is_empty());
    }
}

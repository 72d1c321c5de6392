//! Core types: records, keys and the collection registry.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const STUDENTS: &str = "students";
pub const ATTENDANCE: &str = "attendance";
pub const EXAMS: &str = "exams";
pub const RESULTS: &str = "results";
pub const ANNUAL_RECORDS: &str = "annualRecords";
pub const CUSTOM_FIELDS: &str = "customFields";
pub const HOLIDAYS: &str = "holidays";
pub const USERS: &str = "users";
pub const FEES: &str = "fees";
pub const HOMEWORK: &str = "homework";
pub const ANNOUNCEMENTS: &str = "announcements";

/// Primary key value of a record.
///
/// Keys are compared as strings; numeric key fields are rendered in their
/// JSON form, so `1` and `"1"` address the same record.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey(pub String);

impl RecordKey {
    /// Extract a key from a JSON value. Only strings and numbers qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(RecordKey(s.clone())),
            Value::Number(n) => Some(RecordKey(n.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordKey({})", self.0)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        RecordKey(s.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(s: String) -> Self {
        RecordKey(s)
    }
}

/// An opaque record. The store only ever looks at its primary-key field.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a record from a JSON value; `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Record(map)),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Set a field, returning the record for chaining.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Primary key under the given field name.
    pub fn key(&self, field: &str) -> Option<RecordKey> {
        self.0.get(field).and_then(RecordKey::from_value)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Record(map)
    }
}

/// Static description of one collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Logical name used by the application.
    pub name: String,
    /// Table name on the remote backend.
    pub table: String,
    /// Primary-key field, also the upsert conflict key.
    pub primary_key: String,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            primary_key: "id".to_string(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = field.into();
        self
    }
}

/// Fixed set of collections known to the store, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    specs: Vec<CollectionSpec>,
}

impl Registry {
    pub fn new(specs: Vec<CollectionSpec>) -> Self {
        Self { specs }
    }

    /// The school administration collections.
    pub fn school() -> Self {
        Self::new(vec![
            CollectionSpec::new(STUDENTS),
            CollectionSpec::new(ATTENDANCE),
            CollectionSpec::new(EXAMS),
            CollectionSpec::new(RESULTS),
            CollectionSpec::new(ANNUAL_RECORDS)
                .with_table("annual_records")
                .with_primary_key("studentId"),
            CollectionSpec::new(CUSTOM_FIELDS).with_table("custom_field_defs"),
            CollectionSpec::new(HOLIDAYS),
            CollectionSpec::new(USERS),
            CollectionSpec::new(FEES),
            CollectionSpec::new(HOMEWORK),
            CollectionSpec::new(ANNOUNCEMENTS),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&CollectionSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectionSpec> {
        self.specs.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

//! Business records.
//!
//! A record is a flat JSON object on the wire and in the store:
//! `{"id": ..., "createdAt": ..., "lastModifiedAt": ..., <business fields>}`.
//! The sync layer never looks inside the business fields.

use crate::{Error, RecordId, Result, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys owned by the record envelope rather than the business payload.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "createdAt", "lastModifiedAt"];

/// A business entity of some entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Record {
    pub id: RecordId,
    pub created_at: Timestamp,
    pub last_modified_at: Timestamp,
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates a record with the given id, stamping both timestamps with now.
    /// Reserved keys in `fields` are dropped.
    pub fn new(id: RecordId, fields: Map<String, Value>) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            created_at: now,
            last_modified_at: now,
            fields: strip_reserved(fields),
        }
    }

    /// Creates a record with a freshly generated client id.
    pub fn new_local(fields: Map<String, Value>) -> Self {
        Self::new(RecordId::generate(), fields)
    }

    /// Returns a business field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Shallow-merges `patch` into the business fields and restamps
    /// `last_modified_at`. Reserved keys in the patch are ignored.
    pub fn merge(&mut self, patch: Map<String, Value>) {
        for (key, value) in strip_reserved(patch) {
            self.fields.insert(key, value);
        }
        self.touch();
    }

    /// Advances `last_modified_at`.
    pub fn touch(&mut self) {
        self.last_modified_at = self.last_modified_at.tick();
    }

    /// Returns a copy of this record under a different id.
    #[must_use]
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = id;
        self
    }

    /// Parses a record from its JSON object form.
    ///
    /// Numeric ids are accepted and stringified. Timestamps may be epoch
    /// milliseconds or RFC 3339 strings; missing ones default to now.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(Error::InvalidRecord("expected a JSON object".to_string()));
        };

        let id = match map.remove("id") {
            Some(Value::String(s)) if !s.is_empty() => RecordId::new(s),
            Some(Value::Number(n)) => RecordId::new(n.to_string()),
            Some(other) => {
                return Err(Error::InvalidRecord(format!("invalid id: {other}")));
            }
            None => return Err(Error::InvalidRecord("missing id".to_string())),
        };

        let created_at = take_timestamp(&mut map, "createdAt");
        let last_modified_at = take_timestamp(&mut map, "lastModifiedAt");
        let now = Timestamp::now();
        let created_at = created_at.unwrap_or(now);

        Ok(Self {
            id,
            created_at,
            last_modified_at: last_modified_at.unwrap_or(created_at),
            fields: map,
        })
    }

    /// Renders the record as its JSON object form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + RESERVED_FIELDS.len());
        map.insert("id".to_string(), Value::String(self.id.to_string()));
        map.insert("createdAt".to_string(), Value::from(self.created_at.as_millis()));
        map.insert(
            "lastModifiedAt".to_string(),
            Value::from(self.last_modified_at.as_millis()),
        );
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

impl TryFrom<Value> for Record {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.to_value()
    }
}

fn strip_reserved(mut fields: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_FIELDS {
        fields.remove(key);
    }
    fields
}

fn take_timestamp(map: &mut Map<String, Value>, key: &str) -> Option<Timestamp> {
    match map.remove(key)? {
        Value::Number(n) => n.as_i64().map(Timestamp::from_millis),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| Timestamp::from_millis(dt.timestamp_millis())),
        _ => None,
    }
}

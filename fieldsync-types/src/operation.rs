//! Pending operations: durable, deferred mutation intents.
//!
//! An operation is entity-qualified (`CREATE_ACCOUNT`, `DELETE_CONTACT`) and
//! carries a JSON payload: the full record for create/update, `{"id": ...}`
//! for delete. The queue assigns the id and timestamp on enqueue.

use crate::{EntityType, Error, OperationId, Record, RecordId, Result, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// What a pending operation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationAction {
    Create,
    Update,
    Delete,
}

impl OperationAction {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            OperationAction::Create => "CREATE",
            OperationAction::Update => "UPDATE",
            OperationAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OperationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity-qualified operation type, stored as `<ACTION>_<QUALIFIER>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OperationKind {
    pub action: OperationAction,
    pub entity_type: EntityType,
}

impl OperationKind {
    #[must_use]
    pub const fn new(action: OperationAction, entity_type: EntityType) -> Self {
        Self {
            action,
            entity_type,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.action, self.entity_type.qualifier())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (action, qualifier) = s
            .split_once('_')
            .ok_or_else(|| Error::InvalidOperationType(s.to_string()))?;

        let action = match action {
            "CREATE" => OperationAction::Create,
            "UPDATE" => OperationAction::Update,
            "DELETE" => OperationAction::Delete,
            _ => return Err(Error::InvalidOperationType(s.to_string())),
        };
        let entity_type = EntityType::ALL
            .into_iter()
            .find(|t| t.qualifier() == qualifier)
            .ok_or_else(|| Error::InvalidOperationType(s.to_string()))?;

        Ok(Self::new(action, entity_type))
    }
}

impl TryFrom<String> for OperationKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<OperationKind> for String {
    fn from(kind: OperationKind) -> Self {
        kind.to_string()
    }
}

/// An operation about to be enqueued (no id or timestamp yet).
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub kind: OperationKind,
    pub data: Value,
}

impl NewOperation {
    /// Deferred create carrying the full local record.
    #[must_use]
    pub fn create(entity_type: EntityType, record: &Record) -> Self {
        Self {
            kind: OperationKind::new(OperationAction::Create, entity_type),
            data: record.to_value(),
        }
    }

    /// Deferred update carrying the full merged record.
    #[must_use]
    pub fn update(entity_type: EntityType, record: &Record) -> Self {
        Self {
            kind: OperationKind::new(OperationAction::Update, entity_type),
            data: record.to_value(),
        }
    }

    /// Deferred delete referencing the record id.
    #[must_use]
    pub fn delete(entity_type: EntityType, id: &RecordId) -> Self {
        Self {
            kind: OperationKind::new(OperationAction::Delete, entity_type),
            data: serde_json::json!({ "id": id.as_str() }),
        }
    }
}

/// A queued, unconfirmed mutation intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: OperationId,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub data: Value,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub processing: bool,
}

impl PendingOperation {
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.kind.entity_type
    }

    #[must_use]
    pub fn action(&self) -> OperationAction {
        self.kind.action
    }

    /// The id of the record this operation targets.
    #[must_use]
    pub fn record_id(&self) -> Option<RecordId> {
        match self.data.get("id")? {
            Value::String(s) if !s.is_empty() => Some(RecordId::new(s.as_str())),
            Value::Number(n) => Some(RecordId::new(n.to_string())),
            _ => None,
        }
    }

    /// Parses the payload as a full record (create/update payloads).
    pub fn record(&self) -> Result<Record> {
        Record::from_value(self.data.clone())
    }
}

/// Sorts operations into replay order: creation timestamp, then queue id.
pub fn sort_for_replay(ops: &mut [PendingOperation]) {
    ops.sort_by_key(|op| (op.timestamp, op.id));
}

//! Identifier types used throughout fieldsync.
//!
//! Record identifiers are opaque strings. The server issues its own; while
//! offline the client generates `<millis><7 chars of [a-z0-9]>`, which keeps
//! local ids sortable by creation time and distinguishable from most server
//! ids.

use crate::{Error, Timestamp};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const CLIENT_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const CLIENT_ID_SUFFIX_LEN: usize = 7;

/// A business record category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Account,
    Contact,
    Assessment,
    Checklist,
}

impl EntityType {
    /// Every known entity type.
    pub const ALL: [EntityType; 4] = [
        EntityType::Account,
        EntityType::Contact,
        EntityType::Assessment,
        EntityType::Checklist,
    ];

    /// Lowercase singular name (`account`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityType::Account => "account",
            EntityType::Contact => "contact",
            EntityType::Assessment => "assessment",
            EntityType::Checklist => "checklist",
        }
    }

    /// Local store table holding records of this type.
    #[must_use]
    pub const fn table_name(&self) -> &'static str {
        match self {
            EntityType::Account => "accounts",
            EntityType::Contact => "contacts",
            EntityType::Assessment => "assessments",
            EntityType::Checklist => "checklists",
        }
    }

    /// Qualifier used in queued operation types (`CREATE_ACCOUNT`).
    #[must_use]
    pub const fn qualifier(&self) -> &'static str {
        match self {
            EntityType::Account => "ACCOUNT",
            EntityType::Contact => "CONTACT",
            EntityType::Assessment => "ASSESSMENT",
            EntityType::Checklist => "CHECKLIST",
        }
    }

    /// Default remote endpoint path segment.
    #[must_use]
    pub const fn default_endpoint(&self) -> &'static str {
        self.table_name()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    /// Accepts the singular name, the table name, or the qualifier, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        EntityType::ALL
            .into_iter()
            .find(|t| {
                t.as_str().eq_ignore_ascii_case(s)
                    || t.table_name().eq_ignore_ascii_case(s)
                    || t.qualifier().eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| Error::UnknownEntityType(s.to_string()))
    }
}

/// Identifier of a business record within its entity-type table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a client-side identifier for a record created offline.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..CLIENT_ID_SUFFIX_LEN)
            .map(|_| CLIENT_ID_ALPHABET[rng.gen_range(0..CLIENT_ID_ALPHABET.len())] as char)
            .collect();
        Self(format!("{}{}", Timestamp::now().as_millis(), suffix))
    }

    /// Returns true if the identifier has the client-generated shape.
    #[must_use]
    pub fn is_client_generated(&self) -> bool {
        let s = self.0.as_str();
        if !s.is_ascii() || s.len() <= CLIENT_ID_SUFFIX_LEN {
            return false;
        }
        let (millis, suffix) = s.split_at(s.len() - CLIENT_ID_SUFFIX_LEN);
        millis.bytes().all(|b| b.is_ascii_digit())
            && suffix
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Queue-assigned identifier of a pending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(i64);

impl OperationId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

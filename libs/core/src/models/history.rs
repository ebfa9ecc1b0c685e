//! Versioned resource and history ledger models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// The current state of a live resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedResource {
    pub resource_type: String,
    pub id: String,
    /// Version ID (starts at 1)
    pub version_id: i32,
    pub resource: JsonValue,
    pub last_updated: DateTime<Utc>,
}

/// What a history entry recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Create,
    Update,
    Delete,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Create => "create",
            HistoryAction::Update => "update",
            HistoryAction::Delete => "delete",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(HistoryAction::Create),
            "update" => Ok(HistoryAction::Update),
            "delete" => Ok(HistoryAction::Delete),
            other => Err(Error::Internal(format!(
                "Unknown history action '{}' in ledger",
                other
            ))),
        }
    }
}

/// One immutable row of a resource's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub resource_type: String,
    pub id: String,
    pub version_id: i32,
    /// Representation as of this version. Tombstones carry only `resourceType` and `id`.
    pub resource: JsonValue,
    pub action: HistoryAction,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn is_deleted(&self) -> bool {
        self.action == HistoryAction::Delete
    }
}

/// A page of history, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryPage {
    pub entries: Vec<HistoryEntry>,
    /// Total number of versions recorded for the resource, regardless of paging.
    pub total: i64,
}

/// Representation stored for a deleted resource.
pub fn tombstone(resource_type: &str, id: &str) -> JsonValue {
    serde_json::json!({
        "resourceType": resource_type,
        "id": id
    })
}

/// Serializer collaborator: turns a domain entity into its nested-value representation.
///
/// Implementations must be pure (no I/O).
pub trait ToRepresentation {
    fn to_representation(&self) -> JsonValue;
}

impl ToRepresentation for JsonValue {
    fn to_representation(&self) -> JsonValue {
        self.clone()
    }
}

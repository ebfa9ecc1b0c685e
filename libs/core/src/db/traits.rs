//! Storage traits consumed by the record services
//!
//! Any backend (PostgreSQL, in-memory, ...) can implement these. The services never assume a
//! particular persistence technology.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    models::{HistoryEntry, HistoryPage, PatientDemographics, PatientLink, VersionedResource},
    Result,
};

/// Append-only, version-aware resource ledger.
///
/// Every mutating call appends exactly one history entry. The expected-version check and the
/// version increment of `update`/`delete` must be a single atomic compare-and-set: of two
/// callers presenting the same expected version, exactly one succeeds and the other gets
/// `VersionConflict`.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Record version 1 of a new resource.
    ///
    /// # Errors
    /// * `AlreadyExists` - if the resource was ever created (even if since deleted)
    async fn create(&self, resource_type: &str, id: &str, resource: JsonValue)
        -> Result<HistoryEntry>;

    /// Record a new version if the current version equals `expected_version`.
    ///
    /// # Errors
    /// * `ResourceNotFound` - if the resource was never created
    /// * `VersionConflict` - if the current version differs from `expected_version`
    /// * `ResourceDeleted` - if the current version is a tombstone
    async fn update(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: i32,
        resource: JsonValue,
    ) -> Result<HistoryEntry>;

    /// Append a tombstone if the current version equals `expected_version`.
    ///
    /// Same error rules as [`VersionStore::update`].
    async fn delete(&self, resource_type: &str, id: &str, expected_version: i32)
        -> Result<HistoryEntry>;

    /// Read the current version of a live resource.
    ///
    /// # Errors
    /// * `ResourceNotFound` - never created
    /// * `ResourceDeleted` - current version is a tombstone
    async fn read(&self, resource_type: &str, id: &str) -> Result<VersionedResource>;

    /// Read one historical version (tombstones included).
    ///
    /// # Errors
    /// * `VersionNotFound` - version out of range
    async fn vread(&self, resource_type: &str, id: &str, version_id: i32) -> Result<HistoryEntry>;

    /// List history newest first.
    ///
    /// # Errors
    /// * `ResourceNotFound` - never created
    async fn history(
        &self,
        resource_type: &str,
        id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<HistoryPage>;

    /// The newest entry recorded at or before `at`.
    ///
    /// # Errors
    /// * `ResourceNotFound` - never created, or nothing recorded at that instant
    async fn version_at(
        &self,
        resource_type: &str,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<HistoryEntry>;
}

/// Read-only access to patient demographics for matching.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    /// Current demographics of a live patient.
    async fn get_patient(&self, id: &str) -> Result<Option<PatientDemographics>>;

    /// Indexed lookup: live patients whose last name equals `last_name` under
    /// [`normalize_name`](crate::models::normalize_name), at most `limit` of them, ordered by id.
    async fn find_by_last_name(
        &self,
        last_name: &str,
        limit: i64,
    ) -> Result<Vec<PatientDemographics>>;
}

/// Directed edge list of patient identity links.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn insert_link(&self, link: &PatientLink) -> Result<()>;

    async fn get_link(&self, id: Uuid) -> Result<Option<PatientLink>>;

    /// Links whose source is `patient_id`, newest first.
    async fn links_from(&self, patient_id: &str) -> Result<Vec<PatientLink>>;

    /// Returns whether a link was removed.
    async fn delete_link(&self, id: Uuid) -> Result<bool>;
}

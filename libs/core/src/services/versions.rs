//! Version service - validated, observed access to the version ledger

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::{
    config::HistoryConfig,
    db::VersionStore,
    metrics::{status_label, VERSION_CONFLICTS_TOTAL, VERSION_WRITES_TOTAL},
    models::{HistoryAction, HistoryEntry, HistoryPage, ToRepresentation, VersionedResource},
    Error, Result,
};

const MAX_ID_LENGTH: usize = 64;

pub struct VersionService {
    store: Arc<dyn VersionStore>,
    history: HistoryConfig,
}

impl VersionService {
    pub fn new(store: Arc<dyn VersionStore>, history: HistoryConfig) -> Self {
        Self { store, history }
    }

    /// Record version 1 of a new resource.
    pub async fn record_create(
        &self,
        resource_type: &str,
        id: &str,
        resource: JsonValue,
    ) -> Result<i32> {
        validate_key(resource_type, id)?;
        let result = self.store.create(resource_type, id, resource).await;
        self.observe_write(resource_type, id, HistoryAction::Create, &result);
        Ok(result?.version_id)
    }

    /// Serialize `entity` and record it as version 1.
    pub async fn create_entity<E>(&self, resource_type: &str, id: &str, entity: &E) -> Result<i32>
    where
        E: ToRepresentation + Sync,
    {
        self.record_create(resource_type, id, entity.to_representation())
            .await
    }

    /// Record a new version if the stored version still equals `expected_version`.
    pub async fn record_update(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: i32,
        resource: JsonValue,
    ) -> Result<i32> {
        Ok(self
            .append_update(resource_type, id, expected_version, resource)
            .await?
            .version_id)
    }

    pub(crate) async fn append_update(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: i32,
        resource: JsonValue,
    ) -> Result<HistoryEntry> {
        validate_key(resource_type, id)?;
        validate_version(expected_version)?;
        let result = self
            .store
            .update(resource_type, id, expected_version, resource)
            .await;
        self.observe_write(resource_type, id, HistoryAction::Update, &result);
        result
    }

    /// Append a tombstone; returns the tombstone's version.
    pub async fn record_delete(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: i32,
    ) -> Result<i32> {
        validate_key(resource_type, id)?;
        validate_version(expected_version)?;
        let result = self.store.delete(resource_type, id, expected_version).await;
        self.observe_write(resource_type, id, HistoryAction::Delete, &result);
        Ok(result?.version_id)
    }

    pub async fn get_current(&self, resource_type: &str, id: &str) -> Result<VersionedResource> {
        validate_key(resource_type, id)?;
        tracing::debug!(resource_type, id, "Reading current version");
        self.store.read(resource_type, id).await
    }

    pub async fn get_version(
        &self,
        resource_type: &str,
        id: &str,
        version_id: i32,
    ) -> Result<HistoryEntry> {
        validate_key(resource_type, id)?;
        tracing::debug!(resource_type, id, version_id, "Reading version");
        self.store.vread(resource_type, id, version_id).await
    }

    /// History newest first. `limit` defaults to `history.default_page_size` and is clamped to
    /// `history.max_page_size`.
    pub async fn list_versions(
        &self,
        resource_type: &str,
        id: &str,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<HistoryPage> {
        validate_key(resource_type, id)?;
        if offset < 0 {
            return Err(Error::invalid_argument(
                "offset",
                format!("must not be negative (got {})", offset),
            ));
        }
        let limit = match limit {
            Some(l) if l < 0 => {
                return Err(Error::invalid_argument(
                    "limit",
                    format!("must not be negative (got {})", l),
                ))
            }
            Some(l) => l.min(self.history.max_page_size),
            None => self.history.default_page_size,
        };

        tracing::debug!(resource_type, id, limit, offset, "Listing history");
        self.store.history(resource_type, id, limit, offset).await
    }

    /// The entry that was current at `at` (FHIR `_history?_at=`).
    pub async fn version_at(
        &self,
        resource_type: &str,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<HistoryEntry> {
        validate_key(resource_type, id)?;
        tracing::debug!(resource_type, id, at = %at, "Reading version as of instant");
        self.store.version_at(resource_type, id, at).await
    }

    fn observe_write(
        &self,
        resource_type: &str,
        id: &str,
        action: HistoryAction,
        result: &Result<HistoryEntry>,
    ) {
        VERSION_WRITES_TOTAL
            .with_label_values(&[resource_type, action.as_str(), status_label(result)])
            .inc();

        match result {
            Ok(entry) => tracing::info!(
                resource_type,
                id,
                action = %action,
                version_id = entry.version_id,
                "Recorded version"
            ),
            Err(Error::VersionConflict {
                expected, actual, ..
            }) => {
                VERSION_CONFLICTS_TOTAL
                    .with_label_values(&[resource_type])
                    .inc();
                tracing::warn!(
                    resource_type,
                    id,
                    action = %action,
                    expected,
                    actual,
                    "Version conflict"
                );
            }
            Err(e) => tracing::debug!(
                resource_type,
                id,
                action = %action,
                error = %e,
                "Write rejected"
            ),
        }
    }
}

/// Resource types are FHIR-style type names; ids follow the FHIR id syntax.
fn validate_key(resource_type: &str, id: &str) -> Result<()> {
    let mut chars = resource_type.chars();
    let type_ok = chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric());
    if !type_ok {
        return Err(Error::invalid_argument(
            "resource_type",
            format!("'{}' is not a valid resource type name", resource_type),
        ));
    }

    let id_ok = !id.is_empty()
        && id.len() <= MAX_ID_LENGTH
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if !id_ok {
        return Err(Error::invalid_argument(
            "id",
            format!("'{}' is not a valid resource id", id),
        ));
    }

    Ok(())
}

fn validate_version(version: i32) -> Result<()> {
    if version < 1 {
        return Err(Error::invalid_argument(
            "expected_version",
            format!("versions start at 1 (got {})", version),
        ));
    }
    Ok(())
}

//! In-memory storage adapter
//!
//! Implements all three storage traits over process-local maps. A write performs its version
//! check and its append under one write lock, so the compare-and-set is atomic. History entries
//! are stored as `Arc`s that are fully built before being pushed; readers clone them out and
//! never see a half-written entry.
//!
//! Used by tests and by embedders that do not need durability.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    db::traits::{LinkStore, PatientDirectory, VersionStore},
    models::{
        normalize_name, tombstone, HistoryAction, HistoryEntry, HistoryPage, PatientDemographics,
        PatientLink, VersionedResource, PATIENT_RESOURCE_TYPE,
    },
    Error, Result,
};

type ResourceKey = (String, String);

#[derive(Default)]
struct Ledger {
    /// `entries[n]` holds version `n + 1`
    entries: Vec<Arc<HistoryEntry>>,
    deleted: bool,
}

impl Ledger {
    fn current_version(&self) -> i32 {
        self.entries.len() as i32
    }

    fn head(&self) -> Option<&Arc<HistoryEntry>> {
        self.entries.last()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    ledgers: RwLock<HashMap<ResourceKey, Ledger>>,
    /// Insertion order is creation order
    links: RwLock<Vec<PatientLink>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(resource_type: &str, id: &str) -> ResourceKey {
        (resource_type.to_string(), id.to_string())
    }

    fn append_version(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: i32,
        resource: JsonValue,
        action: HistoryAction,
    ) -> Result<HistoryEntry> {
        let mut ledgers = self.ledgers.write();
        let ledger = ledgers
            .get_mut(&Self::key(resource_type, id))
            .ok_or_else(|| Error::not_found(resource_type, id))?;

        let current = ledger.current_version();
        if current != expected_version {
            return Err(Error::conflict(resource_type, id, expected_version, current));
        }
        if ledger.deleted {
            return Err(Error::deleted(resource_type, id, current));
        }

        let entry = HistoryEntry {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            version_id: current + 1,
            resource,
            action,
            recorded_at: Utc::now(),
        };
        ledger.entries.push(Arc::new(entry.clone()));
        ledger.deleted = action == HistoryAction::Delete;

        Ok(entry)
    }
}

fn clamp_to_usize(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

#[async_trait]
impl VersionStore for MemoryStore {
    async fn create(
        &self,
        resource_type: &str,
        id: &str,
        resource: JsonValue,
    ) -> Result<HistoryEntry> {
        let mut ledgers = self.ledgers.write();
        let key = Self::key(resource_type, id);
        if ledgers.contains_key(&key) {
            return Err(Error::AlreadyExists {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            });
        }

        let entry = HistoryEntry {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            version_id: 1,
            resource,
            action: HistoryAction::Create,
            recorded_at: Utc::now(),
        };
        ledgers.insert(
            key,
            Ledger {
                entries: vec![Arc::new(entry.clone())],
                deleted: false,
            },
        );

        Ok(entry)
    }

    async fn update(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: i32,
        resource: JsonValue,
    ) -> Result<HistoryEntry> {
        self.append_version(
            resource_type,
            id,
            expected_version,
            resource,
            HistoryAction::Update,
        )
    }

    async fn delete(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: i32,
    ) -> Result<HistoryEntry> {
        self.append_version(
            resource_type,
            id,
            expected_version,
            tombstone(resource_type, id),
            HistoryAction::Delete,
        )
    }

    async fn read(&self, resource_type: &str, id: &str) -> Result<VersionedResource> {
        let ledgers = self.ledgers.read();
        let ledger = ledgers
            .get(&Self::key(resource_type, id))
            .ok_or_else(|| Error::not_found(resource_type, id))?;
        let head = ledger
            .head()
            .ok_or_else(|| Error::not_found(resource_type, id))?;

        if ledger.deleted {
            return Err(Error::deleted(resource_type, id, head.version_id));
        }

        Ok(VersionedResource {
            resource_type: head.resource_type.clone(),
            id: head.id.clone(),
            version_id: head.version_id,
            resource: head.resource.clone(),
            last_updated: head.recorded_at,
        })
    }

    async fn vread(&self, resource_type: &str, id: &str, version_id: i32) -> Result<HistoryEntry> {
        let entry = {
            let ledgers = self.ledgers.read();
            usize::try_from(version_id)
                .ok()
                .and_then(|v| v.checked_sub(1))
                .and_then(|index| {
                    ledgers
                        .get(&Self::key(resource_type, id))
                        .and_then(|l| l.entries.get(index))
                        .cloned()
                })
        };

        entry
            .map(|e| (*e).clone())
            .ok_or_else(|| Error::VersionNotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
                version_id,
            })
    }

    async fn history(
        &self,
        resource_type: &str,
        id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<HistoryPage> {
        let snapshot: Vec<Arc<HistoryEntry>> = {
            let ledgers = self.ledgers.read();
            ledgers
                .get(&Self::key(resource_type, id))
                .ok_or_else(|| Error::not_found(resource_type, id))?
                .entries
                .clone()
        };

        let total = snapshot.len() as i64;
        let entries = snapshot
            .iter()
            .rev()
            .skip(clamp_to_usize(offset))
            .take(clamp_to_usize(limit))
            .map(|e| (**e).clone())
            .collect();

        Ok(HistoryPage { entries, total })
    }

    async fn version_at(
        &self,
        resource_type: &str,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<HistoryEntry> {
        let ledgers = self.ledgers.read();
        ledgers
            .get(&Self::key(resource_type, id))
            .and_then(|l| l.entries.iter().rev().find(|e| e.recorded_at <= at))
            .map(|e| (**e).clone())
            .ok_or_else(|| Error::not_found(resource_type, id))
    }
}

#[async_trait]
impl PatientDirectory for MemoryStore {
    async fn get_patient(&self, id: &str) -> Result<Option<PatientDemographics>> {
        let ledgers = self.ledgers.read();
        Ok(ledgers
            .get(&Self::key(PATIENT_RESOURCE_TYPE, id))
            .filter(|l| !l.deleted)
            .and_then(Ledger::head)
            .map(|head| PatientDemographics::from_representation(id, &head.resource)))
    }

    async fn find_by_last_name(
        &self,
        last_name: &str,
        limit: i64,
    ) -> Result<Vec<PatientDemographics>> {
        let wanted = normalize_name(last_name);

        let mut found: Vec<PatientDemographics> = {
            let ledgers = self.ledgers.read();
            ledgers
                .iter()
                .filter(|((resource_type, _), ledger)| {
                    resource_type == PATIENT_RESOURCE_TYPE && !ledger.deleted
                })
                .filter_map(|((_, id), ledger)| {
                    ledger
                        .head()
                        .map(|head| PatientDemographics::from_representation(id, &head.resource))
                })
                .filter(|p| {
                    p.last_name
                        .as_deref()
                        .is_some_and(|name| normalize_name(name) == wanted)
                })
                .collect()
        };

        found.sort_by(|a, b| a.id.cmp(&b.id));
        found.truncate(clamp_to_usize(limit));
        Ok(found)
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn insert_link(&self, link: &PatientLink) -> Result<()> {
        self.links.write().push(link.clone());
        Ok(())
    }

    async fn get_link(&self, id: Uuid) -> Result<Option<PatientLink>> {
        Ok(self.links.read().iter().find(|l| l.id == id).cloned())
    }

    async fn links_from(&self, patient_id: &str) -> Result<Vec<PatientLink>> {
        let mut links: Vec<PatientLink> = self
            .links
            .read()
            .iter()
            .rev()
            .filter(|l| l.source_patient_id == patient_id)
            .cloned()
            .collect();
        // Stable: equal timestamps keep newest-inserted first
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    async fn delete_link(&self, id: Uuid) -> Result<bool> {
        let mut links = self.links.write();
        let before = links.len();
        links.retain(|l| l.id != id);
        Ok(links.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn versions_are_gapless_and_history_is_newest_first() {
        let store = MemoryStore::new();
        store
            .create("Observation", "o1", json!({"status": "preliminary"}))
            .await
            .unwrap();
        store
            .update("Observation", "o1", 1, json!({"status": "final"}))
            .await
            .unwrap();
        store.delete("Observation", "o1", 2).await.unwrap();

        let page = store.history("Observation", "o1", 10, 0).await.unwrap();
        assert_eq!(page.total, 3);
        let versions: Vec<i32> = page.entries.iter().map(|e| e.version_id).collect();
        assert_eq!(versions, vec![3, 2, 1]);
        assert!(page.entries[0].is_deleted());
        assert_eq!(
            page.entries[0].resource,
            json!({"resourceType": "Observation", "id": "o1"})
        );
    }

    #[tokio::test]
    async fn stale_expected_version_reports_actual() {
        let store = MemoryStore::new();
        store.create("Patient", "p1", json!({})).await.unwrap();
        store.update("Patient", "p1", 1, json!({"a": 1})).await.unwrap();

        let err = store
            .update("Patient", "p1", 1, json!({"a": 2}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn deleted_patients_leave_the_directory() {
        let store = MemoryStore::new();
        let doe = json!({"resourceType": "Patient", "name": [{"family": "Doe"}]});
        store.create("Patient", "a", doe.clone()).await.unwrap();
        store.create("Patient", "b", doe).await.unwrap();
        store.delete("Patient", "b", 1).await.unwrap();

        let found = store.find_by_last_name("DOE", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
        assert!(store.get_patient("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_name_lookup_normalises_unicode_form() {
        let store = MemoryStore::new();
        let decomposed = json!({"resourceType": "Patient", "name": [{"family": " RENE\u{301} "}]});
        store.create("Patient", "a", decomposed).await.unwrap();

        let found = store.find_by_last_name("Ren\u{e9}", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
    }
}

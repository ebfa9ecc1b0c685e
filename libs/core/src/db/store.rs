//! PostgreSQL-backed `VersionStore` implementation
//!
//! Two tables back the ledger:
//! - `resource_heads`: one row per resource holding the current version counter
//! - `resource_history`: append-only snapshots, one row per version
//!
//! A write bumps the head row with a conditional `UPDATE ... WHERE current_version = $expected`
//! and appends the history row in the same transaction. The row lock taken by the UPDATE
//! serialises racing writers; the loser re-evaluates the predicate against the committed
//! head and matches zero rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};

use crate::{
    db::traits::VersionStore,
    models::{tombstone, HistoryAction, HistoryEntry, HistoryPage, VersionedResource},
    Error, Result,
};

/// PostgreSQL-backed VersionStore implementation
#[derive(Clone)]
pub struct PostgresVersionStore {
    pub(crate) pool: PgPool,
}

impl PostgresVersionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn append_version(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: i32,
        resource: JsonValue,
        action: HistoryAction,
    ) -> Result<HistoryEntry> {
        let mut tx = self.pool.begin().await?;

        // Compare-and-set on the head row
        let bumped = sqlx::query(
            "UPDATE resource_heads
             SET current_version = current_version + 1, deleted = $4
             WHERE resource_type = $1 AND id = $2
               AND current_version = $3 AND deleted = false
             RETURNING current_version",
        )
        .bind(resource_type)
        .bind(id)
        .bind(expected_version)
        .bind(action == HistoryAction::Delete)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = bumped else {
            return Err(Self::rejection(&mut tx, resource_type, id, expected_version).await);
        };
        let version_id: i32 = row.get("current_version");

        let entry = Self::insert_history(&mut tx, resource_type, id, version_id, resource, action)
            .await?;
        tx.commit().await?;

        Ok(entry)
    }

    /// Explains why the compare-and-set matched no row.
    async fn rejection(
        tx: &mut Transaction<'_, Postgres>,
        resource_type: &str,
        id: &str,
        expected_version: i32,
    ) -> Error {
        let head = sqlx::query(
            "SELECT current_version, deleted FROM resource_heads
             WHERE resource_type = $1 AND id = $2",
        )
        .bind(resource_type)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await;

        match head {
            Err(e) => Error::Database(e),
            Ok(None) => Error::not_found(resource_type, id),
            Ok(Some(row)) => {
                let current: i32 = row.get("current_version");
                let deleted: bool = row.get("deleted");
                if current != expected_version {
                    Error::conflict(resource_type, id, expected_version, current)
                } else if deleted {
                    Error::deleted(resource_type, id, current)
                } else {
                    // The head moved and came back between the two statements; report it
                    // as a conflict so the caller re-reads.
                    Error::conflict(resource_type, id, expected_version, current)
                }
            }
        }
    }

    async fn insert_history(
        tx: &mut Transaction<'_, Postgres>,
        resource_type: &str,
        id: &str,
        version_id: i32,
        resource: JsonValue,
        action: HistoryAction,
    ) -> Result<HistoryEntry> {
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO resource_history (resource_type, id, version_id, resource, action, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(resource_type)
        .bind(id)
        .bind(version_id)
        .bind(&resource)
        .bind(action.as_str())
        .bind(now)
        .execute(&mut **tx)
        .await?;

        Ok(HistoryEntry {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            version_id,
            resource,
            action,
            recorded_at: now,
        })
    }

    pub(crate) fn entry_from_row(row: &PgRow) -> Result<HistoryEntry> {
        let action: String = row.get("action");
        Ok(HistoryEntry {
            resource_type: row.get("resource_type"),
            id: row.get("id"),
            version_id: row.get("version_id"),
            resource: row.get("resource"),
            action: action.parse()?,
            recorded_at: row.get("recorded_at"),
        })
    }
}

#[async_trait]
impl VersionStore for PostgresVersionStore {
    async fn create(
        &self,
        resource_type: &str,
        id: &str,
        resource: JsonValue,
    ) -> Result<HistoryEntry> {
        let mut tx = self.pool.begin().await?;

        // The head row exists for every resource ever created, deleted or not
        let inserted = sqlx::query(
            "INSERT INTO resource_heads (resource_type, id, current_version, deleted)
             VALUES ($1, $2, 1, false)
             ON CONFLICT (resource_type, id) DO NOTHING
             RETURNING current_version",
        )
        .bind(resource_type)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            return Err(Error::AlreadyExists {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            });
        }

        let entry =
            Self::insert_history(&mut tx, resource_type, id, 1, resource, HistoryAction::Create)
                .await?;
        tx.commit().await?;

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
        .await
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
        .await
    }

    async fn read(&self, resource_type: &str, id: &str) -> Result<VersionedResource> {
        let row = sqlx::query(
            "SELECT h.version_id, h.resource, h.recorded_at, hd.deleted
             FROM resource_heads hd
             JOIN resource_history h
               ON h.resource_type = hd.resource_type
              AND h.id = hd.id
              AND h.version_id = hd.current_version
             WHERE hd.resource_type = $1 AND hd.id = $2",
        )
        .bind(resource_type)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found(resource_type, id))?;

        let version_id: i32 = row.get("version_id");
        if row.get::<bool, _>("deleted") {
            return Err(Error::deleted(resource_type, id, version_id));
        }

        Ok(VersionedResource {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            version_id,
            resource: row.get("resource"),
            last_updated: row.get("recorded_at"),
        })
    }

    async fn vread(&self, resource_type: &str, id: &str, version_id: i32) -> Result<HistoryEntry> {
        let row = sqlx::query(
            "SELECT resource_type, id, version_id, resource, action, recorded_at
             FROM resource_history
             WHERE resource_type = $1 AND id = $2 AND version_id = $3",
        )
        .bind(resource_type)
        .bind(id)
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::VersionNotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            version_id,
        })?;

        Self::entry_from_row(&row)
    }

    async fn history(
        &self,
        resource_type: &str,
        id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<HistoryPage> {
        // Versions are gapless from 1, so the head counter is the total. Bounding the page by
        // it keeps entries and total consistent with each other under concurrent appends.
        let head = sqlx::query(
            "SELECT current_version FROM resource_heads
             WHERE resource_type = $1 AND id = $2",
        )
        .bind(resource_type)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found(resource_type, id))?;
        let current_version: i32 = head.get("current_version");

        let rows = sqlx::query(
            "SELECT resource_type, id, version_id, resource, action, recorded_at
             FROM resource_history
             WHERE resource_type = $1 AND id = $2 AND version_id <= $3
             ORDER BY version_id DESC
             LIMIT $4 OFFSET $5",
        )
        .bind(resource_type)
        .bind(id)
        .bind(current_version)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .iter()
            .map(Self::entry_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(HistoryPage {
            entries,
            total: i64::from(current_version),
        })
    }

    async fn version_at(
        &self,
        resource_type: &str,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<HistoryEntry> {
        let row = sqlx::query(
            "SELECT resource_type, id, version_id, resource, action, recorded_at
             FROM resource_history
             WHERE resource_type = $1 AND id = $2 AND recorded_at <= $3
             ORDER BY version_id DESC
             LIMIT 1",
        )
        .bind(resource_type)
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found(resource_type, id))?;

        Self::entry_from_row(&row)
    }
}

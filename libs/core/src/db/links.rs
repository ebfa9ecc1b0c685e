//! PostgreSQL-backed `LinkStore` implementation

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::{db::traits::LinkStore, models::PatientLink, Result};

#[derive(Clone)]
pub struct PostgresLinkStore {
    pool: PgPool,
}

impl PostgresLinkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn link_from_row(row: &PgRow) -> Result<PatientLink> {
        let link_type: String = row.get("link_type");
        Ok(PatientLink {
            id: row.get("id"),
            source_patient_id: row.get("source_patient_id"),
            target_patient_id: row.get("target_patient_id"),
            link_type: link_type.parse()?,
            confidence: row.get("confidence"),
            match_method: row.get("match_method"),
            created_at: row.get("created_at"),
            created_by: row.get("created_by"),
        })
    }
}

#[async_trait]
impl LinkStore for PostgresLinkStore {
    async fn insert_link(&self, link: &PatientLink) -> Result<()> {
        sqlx::query(
            "INSERT INTO patient_links
                (id, source_patient_id, target_patient_id, link_type,
                 confidence, match_method, created_at, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(link.id)
        .bind(&link.source_patient_id)
        .bind(&link.target_patient_id)
        .bind(link.link_type.as_str())
        .bind(link.confidence)
        .bind(&link.match_method)
        .bind(link.created_at)
        .bind(&link.created_by)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_link(&self, id: Uuid) -> Result<Option<PatientLink>> {
        let row = sqlx::query(
            "SELECT id, source_patient_id, target_patient_id, link_type,
                    confidence, match_method, created_at, created_by
             FROM patient_links
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::link_from_row).transpose()
    }

    async fn links_from(&self, patient_id: &str) -> Result<Vec<PatientLink>> {
        let rows = sqlx::query(
            "SELECT id, source_patient_id, target_patient_id, link_type,
                    confidence, match_method, created_at, created_by
             FROM patient_links
             WHERE source_patient_id = $1
             ORDER BY created_at DESC",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::link_from_row).collect()
    }

    async fn delete_link(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM patient_links WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

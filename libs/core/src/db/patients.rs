//! Patient directory backed by the version ledger
//!
//! Demographics are read out of the current, non-deleted `Patient` representations. The last-name
//! lookup uses the expression index on
//! `lower(normalize(btrim(resource #>> '{name,0,family}'), NFC))`, the SQL form of
//! [`normalize_name`](crate::models::normalize_name).

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};

use crate::{
    db::traits::PatientDirectory,
    models::{PatientDemographics, PATIENT_RESOURCE_TYPE},
    Result,
};

#[derive(Clone)]
pub struct PostgresPatientDirectory {
    pool: PgPool,
}

impl PostgresPatientDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PatientDirectory for PostgresPatientDirectory {
    async fn get_patient(&self, id: &str) -> Result<Option<PatientDemographics>> {
        let row = sqlx::query(
            "SELECT h.resource
             FROM resource_heads hd
             JOIN resource_history h
               ON h.resource_type = hd.resource_type
              AND h.id = hd.id
              AND h.version_id = hd.current_version
             WHERE hd.resource_type = $1 AND hd.id = $2 AND hd.deleted = false",
        )
        .bind(PATIENT_RESOURCE_TYPE)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let resource: JsonValue = row.get("resource");
            PatientDemographics::from_representation(id, &resource)
        }))
    }

    async fn find_by_last_name(
        &self,
        last_name: &str,
        limit: i64,
    ) -> Result<Vec<PatientDemographics>> {
        let rows = sqlx::query(
            "SELECT hd.id, h.resource
             FROM resource_heads hd
             JOIN resource_history h
               ON h.resource_type = hd.resource_type
              AND h.id = hd.id
              AND h.version_id = hd.current_version
             WHERE hd.resource_type = $1
               AND hd.deleted = false
               AND lower(normalize(btrim(h.resource #>> '{name,0,family}'), NFC))
                   = lower(normalize(btrim($2), NFC))
             ORDER BY hd.id
             LIMIT $3",
        )
        .bind(PATIENT_RESOURCE_TYPE)
        .bind(last_name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                let resource: JsonValue = row.get("resource");
                PatientDemographics::from_representation(&id, &resource)
            })
            .collect())
    }
}

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Emergency, MedicalDocument, User};

const KIND_USER: &str = "user";
const KIND_EMERGENCY: &str = "emergency";
const KIND_DOCUMENT: &str = "document";

/// PostgreSQL backend. One `records` table with a kind discriminator and a
/// JSONB payload, filtered with `->>` path operators.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the schema if it is missing. Safe to run on every boot.
    pub async fn migrate(pool: &PgPool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS records (
                 id UUID PRIMARY KEY,
                 kind TEXT NOT NULL,
                 data JSONB NOT NULL,
                 updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
             )",
        )
        .execute(pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS records_kind_idx ON records (kind)")
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn put<T: Serialize>(&self, kind: &str, id: Uuid, record: &T) -> Result<()> {
        let data = serde_json::to_value(record)?;
        sqlx::query(
            "INSERT INTO records (id, kind, data, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()",
        )
        .bind(id)
        .bind(kind)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, kind: &str, id: Uuid) -> Result<Option<T>> {
        let row = sqlx::query("SELECT data FROM records WHERE id = $1 AND kind = $2")
            .bind(id)
            .bind(kind)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let data: Value = row.get("data");
                Ok(Some(serde_json::from_value(data)?))
            }
            None => Ok(None),
        }
    }

    fn decode_rows<T: DeserializeOwned>(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<T>> {
        rows.into_iter()
            .map(|row| {
                let data: Value = row.get("data");
                Ok(serde_json::from_value(data)?)
            })
            .collect()
    }

    pub async fn create_user(&self, user: &User) -> Result<()> {
        self.put(KIND_USER, user.id, user).await
    }

    pub async fn user(&self, id: Uuid) -> Result<Option<User>> {
        self.get(KIND_USER, id).await
    }

    pub async fn update_user(&self, user: &User) -> Result<()> {
        self.put(KIND_USER, user.id, user).await
    }

    pub async fn active_hospitals(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT data FROM records
             WHERE kind = $1
               AND data->>'role' = 'hospital'
               AND (data->>'active')::boolean
             ORDER BY data->>'registeredAt' ASC",
        )
        .bind(KIND_USER)
        .fetch_all(&self.pool)
        .await?;
        Self::decode_rows(rows)
    }

    pub async fn active_drivers_with_license(&self, license: &str) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT data FROM records
             WHERE kind = $1
               AND data->>'role' = 'driver'
               AND (data->>'active')::boolean
               AND data->>'linkedHospitalLicense' = $2
             ORDER BY data->>'registeredAt' ASC",
        )
        .bind(KIND_USER)
        .bind(license)
        .fetch_all(&self.pool)
        .await?;
        Self::decode_rows(rows)
    }

    pub async fn create_emergency(&self, emergency: &Emergency) -> Result<()> {
        self.put(KIND_EMERGENCY, emergency.id, emergency).await
    }

    pub async fn emergency(&self, id: Uuid) -> Result<Option<Emergency>> {
        self.get(KIND_EMERGENCY, id).await
    }

    pub async fn update_emergency(&self, emergency: &Emergency) -> Result<()> {
        self.put(KIND_EMERGENCY, emergency.id, emergency).await
    }

    pub async fn hospital_emergencies(&self, hospital_id: Uuid, max: u32) -> Result<Vec<Emergency>> {
        let rows = sqlx::query(
            "SELECT data FROM records
             WHERE kind = $1
               AND data->>'assignedHospitalId' = $2
             ORDER BY data->>'triggeredAt' DESC
             LIMIT $3",
        )
        .bind(KIND_EMERGENCY)
        .bind(hospital_id.to_string())
        .bind(max as i64)
        .fetch_all(&self.pool)
        .await?;
        Self::decode_rows(rows)
    }

    pub async fn driver_active_emergency(&self, driver_id: Uuid) -> Result<Option<Emergency>> {
        let row = sqlx::query(
            "SELECT data FROM records
             WHERE kind = $1
               AND data->>'assignedDriverId' = $2
               AND data->>'status' <> 'completed'
             ORDER BY data->>'triggeredAt' DESC
             LIMIT 1",
        )
        .bind(KIND_EMERGENCY)
        .bind(driver_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => {
                let data: Value = row.get("data");
                Ok(Some(serde_json::from_value(data)?))
            }
            None => Ok(None),
        }
    }

    pub async fn create_document(&self, document: &MedicalDocument) -> Result<()> {
        self.put(KIND_DOCUMENT, document.id, document).await
    }

    pub async fn document(&self, id: Uuid) -> Result<Option<MedicalDocument>> {
        self.get(KIND_DOCUMENT, id).await
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM records WHERE id = $1 AND kind = $2")
            .bind(id)
            .bind(KIND_DOCUMENT)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn emergency_documents(&self, emergency_id: Uuid) -> Result<Vec<MedicalDocument>> {
        let rows = sqlx::query(
            "SELECT data FROM records
             WHERE kind = $1
               AND data->>'emergencyId' = $2
             ORDER BY data->>'createdAt' ASC",
        )
        .bind(KIND_DOCUMENT)
        .bind(emergency_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Self::decode_rows(rows)
    }

    pub async fn expired_documents(&self, now: DateTime<Utc>) -> Result<Vec<MedicalDocument>> {
        // Timestamps serialize as RFC 3339 UTC, so lexical comparison on
        // the JSON string matches chronological order.
        let rows = sqlx::query(
            "SELECT data FROM records
             WHERE kind = $1
               AND data->>'expiresAt' <= $2",
        )
        .bind(KIND_DOCUMENT)
        .bind(now.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
        .fetch_all(&self.pool)
        .await?;
        Self::decode_rows(rows)
    }
}

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use super::{EntityKind, Store};
use crate::analytics::{self, TopDrugsQuery};
use crate::models::{Prescription, PrescriptionRequest, TopDrugRow};

/// Postgres-backed store
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for Database {
    async fn exists(&self, kind: EntityKind, id: i32) -> Result<bool> {
        // Table names come from a closed enum, never from input
        let query = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", kind.table());

        let exists: bool = sqlx::query_scalar(&query)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn physician_treats_patient(&self, physician_id: i32, patient_id: i32) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM patient_physicians WHERE physician_id = $1 AND patient_id = $2)",
        )
        .bind(physician_id)
        .bind(patient_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Insert a prescription dated today on the server clock
    async fn insert_prescription(&self, request: &PrescriptionRequest) -> Result<Prescription> {
        let row = sqlx::query(
            "INSERT INTO prescriptions (patient_id, physician_id, drug_id, quantity, sig, prescribed_date)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, prescribed_date, created_at, updated_at",
        )
        .bind(request.patient_id)
        .bind(request.physician_id)
        .bind(request.drug_id)
        .bind(request.quantity)
        .bind(&request.instructions)
        .bind(analytics::today())
        .fetch_one(&self.pool)
        .await?;

        let id: i32 = row.get("id");
        let prescribed_date: NaiveDate = row.get("prescribed_date");
        let created_at: DateTime<Utc> = row.get("created_at");
        let updated_at: DateTime<Utc> = row.get("updated_at");

        Ok(Prescription {
            id,
            patient_id: request.patient_id,
            physician_id: request.physician_id,
            drug_id: request.drug_id,
            quantity: request.quantity,
            instructions: request.instructions.clone(),
            prescribed_date,
            created_at,
            updated_at,
        })
    }

    async fn top_drugs(&self, query: &TopDrugsQuery) -> Result<Vec<TopDrugRow>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT
                d.id AS drug_id,
                d.name AS drug_name,
                COALESCE(d.generic_name, '') AS generic_name,
                SUM(p.quantity)::BIGINT AS total_quantity,
                COUNT(p.id) AS prescription_count
             FROM prescriptions p
             JOIN drugs d ON p.drug_id = d.id
             WHERE p.prescribed_date >= ",
        );
        builder.push_bind(query.from);
        builder.push(" AND p.prescribed_date <= ");
        builder.push_bind(query.to);

        if let Some(patient_id) = query.patient_id {
            builder.push(" AND p.patient_id = ");
            builder.push_bind(patient_id);
        }

        builder.push(
            " GROUP BY d.id, d.name, d.generic_name
              ORDER BY total_quantity DESC, d.id ASC
              LIMIT ",
        );
        builder.push_bind(query.limit);

        let rows = builder
            .build_query_as::<TopDrugRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}

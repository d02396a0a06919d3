// src/db/consultation_repo.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::consultation::{Consultation, ConsultationFilter, ConsultationItem, ConsultationStatus},
};

#[derive(Clone, Default)]
pub struct ConsultationRepository;

// Linha de consulta ainda por gravar
pub struct NewConsultationItem<'a> {
    pub procedure_id: Uuid,
    pub plan_item_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub tooth_number: Option<i16>,
    pub faces: Option<&'a [String]>,
}

impl ConsultationRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        patient_id: Uuid,
        entity_id: Uuid,
        doctor_id: Option<Uuid>,
        notes: Option<&str>,
    ) -> Result<Consultation, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let consultation = sqlx::query_as::<_, Consultation>(
            r#"
            INSERT INTO consultations (tenant_id, patient_id, entity_id, doctor_id, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(patient_id)
        .bind(entity_id)
        .bind(doctor_id)
        .bind(notes)
        .fetch_one(executor)
        .await?;

        Ok(consultation)
    }

    pub async fn find<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        consultation_id: Uuid,
    ) -> Result<Option<Consultation>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let consultation = sqlx::query_as::<_, Consultation>(
            "SELECT * FROM consultations WHERE id = $1 AND tenant_id = $2",
        )
        .bind(consultation_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(consultation)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: &ConsultationFilter,
    ) -> Result<Vec<Consultation>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let consultations = sqlx::query_as::<_, Consultation>(
            r#"
            SELECT * FROM consultations
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR patient_id = $2)
              AND ($3::uuid IS NULL OR doctor_id = $3)
              AND ($4::consultation_status IS NULL OR status = $4)
            ORDER BY started_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(filter.patient_id)
        .bind(filter.doctor_id)
        .bind(filter.status)
        .fetch_all(executor)
        .await?;

        Ok(consultations)
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        consultation_id: Uuid,
        status: ConsultationStatus,
        notes: Option<&str>,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<Consultation, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let consultation = sqlx::query_as::<_, Consultation>(
            r#"
            UPDATE consultations
            SET status = $3,
                notes = COALESCE($4, notes),
                ended_at = COALESCE($5, ended_at),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(consultation_id)
        .bind(tenant_id)
        .bind(status)
        .bind(notes)
        .bind(ended_at)
        .fetch_one(executor)
        .await?;

        Ok(consultation)
    }

    // =========================================================================
    //  ITENS
    // =========================================================================

    pub async fn list_items<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        consultation_id: Uuid,
    ) -> Result<Vec<ConsultationItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, ConsultationItem>(
            r#"
            SELECT * FROM consultation_items
            WHERE tenant_id = $1 AND consultation_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(consultation_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        consultation_id: Uuid,
        item: &NewConsultationItem<'_>,
    ) -> Result<ConsultationItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total = item.unit_price * Decimal::from(item.quantity);

        let created = sqlx::query_as::<_, ConsultationItem>(
            r#"
            INSERT INTO consultation_items (
                tenant_id, consultation_id, procedure_id, plan_item_id,
                quantity, unit_price, total, tooth_number, faces
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(consultation_id)
        .bind(item.procedure_id)
        .bind(item.plan_item_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(total)
        .bind(item.tooth_number)
        .bind(item.faces)
        .fetch_one(executor)
        .await?;

        Ok(created)
    }

    pub async fn find_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<ConsultationItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, ConsultationItem>(
            "SELECT * FROM consultation_items WHERE id = $1 AND tenant_id = $2",
        )
        .bind(item_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(item)
    }

    pub async fn delete_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM consultation_items WHERE id = $1 AND tenant_id = $2")
            .bind(item_id)
            .bind(tenant_id)
            .execute(executor)
            .await?;

        Ok(())
    }
}

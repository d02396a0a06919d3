// src/db/catalog_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::catalog::{PayerEntity, Patient, Price, Procedure},
};

#[derive(Clone, Default)]
pub struct CatalogRepository;

impl CatalogRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  PACIENTES
    // =========================================================================

    pub async fn create_patient<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        name: &str,
        tax_number: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Patient, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Patient>(
            r#"
            INSERT INTO patients (tenant_id, name, tax_number, email, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .bind(tax_number)
        .bind(email)
        .bind(phone)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, "Paciente"))
    }

    pub async fn list_patients<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Vec<Patient>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let patients = sqlx::query_as::<_, Patient>(
            "SELECT * FROM patients WHERE tenant_id = $1 ORDER BY name ASC",
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(patients)
    }

    pub async fn find_patient<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<Patient>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let patient = sqlx::query_as::<_, Patient>(
            "SELECT * FROM patients WHERE id = $1 AND tenant_id = $2",
        )
        .bind(patient_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(patient)
    }

    // =========================================================================
    //  ENTIDADES
    // =========================================================================

    pub async fn create_entity<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        slug: &str,
        name: &str,
    ) -> Result<PayerEntity, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, PayerEntity>(
            r#"
            INSERT INTO payer_entities (tenant_id, slug, name)
            VALUES ($1, $2, $3)
            RETURNING id, tenant_id, slug, name
            "#,
        )
        .bind(tenant_id)
        .bind(slug)
        .bind(name)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, "Entidade"))
    }

    pub async fn list_entities<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Vec<PayerEntity>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entities = sqlx::query_as::<_, PayerEntity>(
            "SELECT id, tenant_id, slug, name FROM payer_entities WHERE tenant_id = $1 ORDER BY name ASC",
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(entities)
    }

    pub async fn find_entity<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        entity_id: Uuid,
    ) -> Result<Option<PayerEntity>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entity = sqlx::query_as::<_, PayerEntity>(
            "SELECT id, tenant_id, slug, name FROM payer_entities WHERE id = $1 AND tenant_id = $2",
        )
        .bind(entity_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(entity)
    }

    // =========================================================================
    //  ARTIGOS (Procedimentos)
    // =========================================================================

    pub async fn create_procedure<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        code: &str,
        description: &str,
        category: &str,
        requires_tooth: bool,
        requires_faces: bool,
        face_count: Option<i16>,
    ) -> Result<Procedure, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Procedure>(
            r#"
            INSERT INTO procedures (
                tenant_id, code, description, category,
                requires_tooth, requires_faces, face_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(code)
        .bind(description)
        .bind(category)
        .bind(requires_tooth)
        .bind(requires_faces)
        .bind(face_count)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, "Artigo"))
    }

    pub async fn list_procedures<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Vec<Procedure>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let procedures = sqlx::query_as::<_, Procedure>(
            "SELECT * FROM procedures WHERE tenant_id = $1 ORDER BY category ASC, code ASC",
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(procedures)
    }

    pub async fn find_procedure<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        procedure_id: Uuid,
    ) -> Result<Option<Procedure>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let procedure = sqlx::query_as::<_, Procedure>(
            "SELECT * FROM procedures WHERE id = $1 AND tenant_id = $2",
        )
        .bind(procedure_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(procedure)
    }

    // =========================================================================
    //  PREÇOS
    // =========================================================================

    pub async fn upsert_price<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        procedure_id: Uuid,
        entity_id: Uuid,
        entity_price: Decimal,
        patient_price: Decimal,
    ) -> Result<Price, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let price = sqlx::query_as::<_, Price>(
            r#"
            INSERT INTO prices (tenant_id, procedure_id, entity_id, entity_price, patient_price)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tenant_id, procedure_id, entity_id)
            DO UPDATE SET
                entity_price = EXCLUDED.entity_price,
                patient_price = EXCLUDED.patient_price,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(procedure_id)
        .bind(entity_id)
        .bind(entity_price)
        .bind(patient_price)
        .fetch_one(executor)
        .await?;

        Ok(price)
    }

    pub async fn find_price<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        procedure_id: Uuid,
        entity_id: Uuid,
    ) -> Result<Option<Price>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let price = sqlx::query_as::<_, Price>(
            r#"
            SELECT * FROM prices
            WHERE tenant_id = $1 AND procedure_id = $2 AND entity_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(procedure_id)
        .bind(entity_id)
        .fetch_optional(executor)
        .await?;

        Ok(price)
    }

    pub async fn list_prices<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        entity_id: Option<Uuid>,
    ) -> Result<Vec<Price>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let prices = sqlx::query_as::<_, Price>(
            r#"
            SELECT * FROM prices
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR entity_id = $2)
            ORDER BY entity_id, procedure_id
            "#,
        )
        .bind(tenant_id)
        .bind(entity_id)
        .fetch_all(executor)
        .await?;

        Ok(prices)
    }

    pub async fn update_price<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        procedure_id: Uuid,
        entity_id: Uuid,
        entity_price: Option<Decimal>,
        patient_price: Option<Decimal>,
    ) -> Result<Option<Price>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let price = sqlx::query_as::<_, Price>(
            r#"
            UPDATE prices SET
                entity_price = COALESCE($4, entity_price),
                patient_price = COALESCE($5, patient_price),
                updated_at = NOW()
            WHERE tenant_id = $1 AND procedure_id = $2 AND entity_id = $3
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(procedure_id)
        .bind(entity_id)
        .bind(entity_price)
        .bind(patient_price)
        .fetch_optional(executor)
        .await?;

        Ok(price)
    }

    /// Devolve `true` se havia um preço para apagar.
    pub async fn delete_price<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        procedure_id: Uuid,
        entity_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "DELETE FROM prices WHERE tenant_id = $1 AND procedure_id = $2 AND entity_id = $3",
        )
        .bind(tenant_id)
        .bind(procedure_id)
        .bind(entity_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
